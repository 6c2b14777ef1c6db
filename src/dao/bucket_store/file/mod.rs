mod error;
mod models;
mod store;

pub use error::FileStoreError;
pub use store::FileBucketStore;

use crate::dao::storage::StorageError;

impl From<FileStoreError> for StorageError {
    fn from(err: FileStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
