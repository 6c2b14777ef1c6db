use std::error::Error;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a bucket tier, or of the gateway writing to every tier.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A single tier failed; `message` names the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// No tier accepted a write. `primary` reads "not configured" in file-only mode.
    #[error("every storage tier failed (primary: {primary}; secondary: {secondary})")]
    AllTiersFailed { primary: String, secondary: String },
}

impl StorageError {
    /// Wrap a SQLite or file store failure, keeping it as the source.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
