use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MhwError {
    #[error("Shape mismatch: {what} (expected {expected}, got {got})")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        got: String,
    },

    #[error("Insufficient data: baseline needs {needed} timesteps, field has {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Grid assignment failed: {axis} {value} (rounded to {rounded}) is not on the grid")]
    GridAssignment {
        axis: &'static str,
        value: f64,
        rounded: f64,
    },

    #[error("Eddy time {time} is outside the usable range 1..={max}")]
    TimeOutOfRange { time: f64, max: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {}:{}: {}", .path.display(), .line, .msg)]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MhwError {
    pub fn shape(what: &'static str, expected: impl ToString, got: impl ToString) -> Self {
        MhwError::ShapeMismatch {
            what,
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MhwError>;
