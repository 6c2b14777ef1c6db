//! Error types raised by the JSON file store.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Convenient result alias returning [`FileStoreError`] failures.
pub type FileResult<T> = Result<T, FileStoreError>;

/// Failures that can occur while reading or writing the bucket file.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The data directory could not be created.
    #[error("failed to create data directory `{path}`")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The bucket file exists but could not be read.
    #[error("failed to read bucket file `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The bucket file is not a valid document.
    #[error("failed to decode bucket file `{path}`")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Serializing the document failed.
    #[error("failed to encode bucket document")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    /// Writing or renaming the temporary file failed.
    #[error("failed to write bucket file `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A transaction was committed without a bucket to persist.
    #[error("no bucket staged for `{path}`")]
    NothingStaged { path: PathBuf },
}
