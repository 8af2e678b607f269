use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SageError>;

/// Errors raised by the hierarchical recommender
#[derive(Debug, Error)]
pub enum SageError {
    #[error("File or directory {} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("Unsupported file format for {}: expected .csv, .json or .jsonl", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Dataset is empty after loading")]
    EmptyDataset,

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Board '{0}' not found in embeddings")]
    BoardNotFound(String),

    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("{0} has not been computed yet")]
    NotReady(&'static str),

    #[error("Linear algebra failure: {0}")]
    Linalg(String),
}

impl SageError {
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// True for missing-file, bad-format and empty-dataset conditions
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            SageError::NotFound { .. }
                | SageError::UnsupportedFormat { .. }
                | SageError::EmptyDataset
                | SageError::Io(_)
                | SageError::Csv(_)
                | SageError::Json { .. }
        )
    }
}
