use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate cloud: {points} points, at least {required} required")]
    DegenerateCloud { points: usize, required: usize },

    #[error("Degenerate pose: {0}")]
    DegeneratePose(String),

    #[error("Missing pose prior for scan {index} ({available} priors available)")]
    MissingPosePrior { index: usize, available: usize },

    #[error("Missing input file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Fewer than `required` points where a statistic needs them.
    pub fn degenerate(points: usize, required: usize) -> Self {
        Error::DegenerateCloud { points, required }
    }
}
