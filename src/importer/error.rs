use crate::model::Field;
use std::path::PathBuf;

/// Why a single CSV row could not become a telemetry point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("timestamp missing")]
    MissingTimestamp,

    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: Field, value: f64 },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingTimestamp | ValidationError::InvalidTimestamp { .. } => {
                "timestamp"
            }
            ValidationError::OutOfRange { field, .. } => field.name(),
        }
    }
}

/// Failure of a whole import run.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Only raised when invalid rows are not being skipped.
    #[error("row {row}: {source}")]
    InvalidRow {
        row: usize,
        #[source]
        source: ValidationError,
    },

    /// A live point that failed range checks.
    #[error("invalid point: {0}")]
    InvalidPoint(#[from] ValidationError),

    #[error("could not decode {} as UTF-8, Latin-1 or Windows-1252", .path.display())]
    Undecodable { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("repository error: {0:#}")]
    Repository(anyhow::Error),
}
