use std::path::PathBuf;

use rusqlite::Error as SqliteError;
use thiserror::Error;

pub type SqliteResult<T> = std::result::Result<T, SqliteDaoError>;

#[derive(Debug, Error)]
pub enum SqliteDaoError {
    #[error("failed to open SQLite database `{path}`")]
    Open {
        path: PathBuf,
        #[source]
        source: SqliteError,
    },
    #[error("failed to configure SQLite connection")]
    Configure {
        #[source]
        source: SqliteError,
    },
    #[error("failed to initialize schema")]
    Schema {
        #[source]
        source: SqliteError,
    },
    #[error("failed to acquire the bucket write lock")]
    Lock {
        #[source]
        source: SqliteError,
    },
    #[error("failed to load the bucket row")]
    LoadBucket {
        #[source]
        source: SqliteError,
    },
    #[error("failed to save the bucket row")]
    SaveBucket {
        #[source]
        source: SqliteError,
    },
    #[error("failed to append draw record `{id}`")]
    AppendDraw {
        id: uuid::Uuid,
        #[source]
        source: SqliteError,
    },
    #[error("failed to load cooldown of `{user}`")]
    LoadCooldown {
        user: String,
        #[source]
        source: SqliteError,
    },
    #[error("failed to save cooldown of `{user}`")]
    SaveCooldown {
        user: String,
        #[source]
        source: SqliteError,
    },
    #[error("failed to list draw records")]
    ListDraws {
        #[source]
        source: SqliteError,
    },
    #[error("failed to commit the bucket transaction")]
    Commit {
        #[source]
        source: SqliteError,
    },
    #[error("stored ticket list is not valid JSON")]
    DecodeTickets {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode ticket list")]
    EncodeTickets {
        #[source]
        source: serde_json::Error,
    },
    #[error("SQLite health check failed")]
    HealthCheck {
        #[source]
        source: SqliteError,
    },
}
