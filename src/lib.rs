pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod sheet;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::{run, RunReport, RunSummary};
