mod config;
mod error;
mod store;

pub use config::{DEFAULT_BUSY_TIMEOUT, SqliteConfig};
pub use error::SqliteDaoError;
pub use store::SqliteBucketStore;

use crate::dao::storage::StorageError;

impl From<SqliteDaoError> for StorageError {
    fn from(err: SqliteDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
