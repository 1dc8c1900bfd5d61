use std::fmt;

/// An untyped spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Number(f64),
    Text(String),
}

static EMPTY: RawCell = RawCell::Empty;

impl RawCell {
    /// Classify a text field, as read from a CSV export.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            RawCell::Empty
        } else if let Ok(n) = trimmed.parse::<f64>() {
            RawCell::Number(n)
        } else {
            RawCell::Text(raw.to_string())
        }
    }

    /// Blank text counts as empty too.
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Number(_) => false,
            RawCell::Text(t) => t.trim().is_empty(),
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Empty => Ok(()),
            // whole numbers (wave ordinals) print without a fraction
            RawCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            RawCell::Number(n) => write!(f, "{}", n),
            RawCell::Text(t) => f.write_str(t),
        }
    }
}

/// One sheet as ordered rows of cells, descriptive rows included.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Cell at (`row`, `col`); positions past the end of a ragged row are empty.
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }
}
