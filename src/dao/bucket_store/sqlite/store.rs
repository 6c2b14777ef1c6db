use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use tracing::warn;
use uuid::Uuid;

use super::{
    config::SqliteConfig,
    error::{SqliteDaoError, SqliteResult},
};
use crate::dao::{
    bucket_store::{BucketStore, BucketTransaction},
    models::{BucketEntity, CloserEntity, DrawRecordEntity, UserCooldownEntity},
    storage::StorageResult,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bucket_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    tickets TEXT NOT NULL,
    draws_in_cycle INTEGER NOT NULL,
    cycle_length INTEGER NOT NULL,
    last_reset TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS closers (
    name TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    display_name TEXT NOT NULL,
    color TEXT NOT NULL,
    default_weight REAL NOT NULL,
    current_weight REAL NOT NULL,
    active INTEGER NOT NULL,
    lifetime_draws INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS draw_records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user TEXT NOT NULL,
    closer_drawn TEXT NOT NULL,
    draw_kind TEXT NOT NULL,
    customer_label TEXT,
    tickets_remaining_after INTEGER NOT NULL,
    weight_after REAL NOT NULL,
    drawn_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_cooldowns (
    user TEXT PRIMARY KEY,
    last_draw_at TEXT NOT NULL,
    last_closer_drawn TEXT NOT NULL,
    last_draw_kind TEXT NOT NULL,
    last_customer_label TEXT
);
";

/// Relational tier backed by a SQLite database shared by every worker process.
///
/// Write transactions start with `BEGIN IMMEDIATE`, which takes the database
/// write lock before the bucket row is read. Other processes block (up to the
/// busy timeout) until the holder commits or rolls back.
#[derive(Clone)]
pub struct SqliteBucketStore {
    inner: Arc<SqliteInner>,
}

struct SqliteInner {
    connection: Mutex<Connection>,
}

impl SqliteBucketStore {
    /// Open the database, apply pragmas and make sure the schema exists.
    pub fn open(config: SqliteConfig) -> SqliteResult<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty())
            && let Err(err) = std::fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), error = %err, "failed to create database directory");
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let connection = Connection::open_with_flags(&config.path, flags).map_err(|source| {
            SqliteDaoError::Open {
                path: config.path.clone(),
                source,
            }
        })?;

        connection
            .busy_timeout(config.busy_timeout)
            .map_err(|source| SqliteDaoError::Configure { source })?;
        connection
            .execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(|source| SqliteDaoError::Configure { source })?;
        connection
            .execute_batch(SCHEMA)
            .map_err(|source| SqliteDaoError::Schema { source })?;

        Ok(Self {
            inner: Arc::new(SqliteInner {
                connection: Mutex::new(connection),
            }),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl BucketStore for SqliteBucketStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn begin(&self) -> StorageResult<Box<dyn BucketTransaction + '_>> {
        let connection = self.connection();
        connection
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|source| SqliteDaoError::Lock { source })?;

        Ok(Box::new(SqliteTransaction {
            connection,
            finished: false,
        }))
    }

    fn load_bucket(&self) -> StorageResult<Option<BucketEntity>> {
        Ok(select_bucket(&self.connection())?)
    }

    fn find_cooldown(&self, user: &str) -> StorageResult<Option<UserCooldownEntity>> {
        Ok(select_cooldown(&self.connection(), user)?)
    }

    fn recent_draws(&self, limit: usize) -> StorageResult<Vec<DrawRecordEntity>> {
        let connection = self.connection();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = connection
            .prepare(
                "SELECT id, user, closer_drawn, draw_kind, customer_label,
                        tickets_remaining_after, weight_after, drawn_at
                 FROM draw_records ORDER BY seq DESC LIMIT ?1",
            )
            .map_err(|source| SqliteDaoError::ListDraws { source })?;

        let records = statement
            .query_map(params![limit], draw_record_from_row)
            .map_err(|source| SqliteDaoError::ListDraws { source })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| SqliteDaoError::ListDraws { source })?;

        Ok(records)
    }

    fn health_check(&self) -> StorageResult<()> {
        self.connection()
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|source| SqliteDaoError::HealthCheck { source })?;
        Ok(())
    }
}

struct SqliteTransaction<'a> {
    connection: MutexGuard<'a, Connection>,
    finished: bool,
}

impl BucketTransaction for SqliteTransaction<'_> {
    fn load(&mut self) -> StorageResult<Option<BucketEntity>> {
        Ok(select_bucket(&self.connection)?)
    }

    fn find_cooldown(&mut self, user: &str) -> StorageResult<Option<UserCooldownEntity>> {
        Ok(select_cooldown(&self.connection, user)?)
    }

    fn save(&mut self, bucket: &BucketEntity) -> StorageResult<()> {
        let tickets = serde_json::to_string(&bucket.tickets)
            .map_err(|source| SqliteDaoError::EncodeTickets { source })?;
        let save_err = |source| SqliteDaoError::SaveBucket { source };

        self.connection
            .execute(
                "INSERT INTO bucket_state (id, tickets, draws_in_cycle, cycle_length, last_reset)
                 VALUES (1, ?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    tickets = excluded.tickets,
                    draws_in_cycle = excluded.draws_in_cycle,
                    cycle_length = excluded.cycle_length,
                    last_reset = excluded.last_reset",
                params![
                    tickets,
                    bucket.draws_in_cycle,
                    bucket.cycle_length,
                    bucket.last_reset
                ],
            )
            .map_err(save_err)?;

        self.connection
            .execute("DELETE FROM closers", [])
            .map_err(save_err)?;

        for (position, (name, closer)) in bucket.closers.iter().enumerate() {
            let weight = bucket.weights.get(name).copied().unwrap_or(0.0);
            let draws = bucket.lifetime_stats.get(name).copied().unwrap_or(0);
            self.connection
                .execute(
                    "INSERT INTO closers (name, position, display_name, color, default_weight,
                                          current_weight, active, lifetime_draws)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        name,
                        i64::try_from(position).unwrap_or(i64::MAX),
                        closer.display_name,
                        closer.color,
                        closer.default_weight,
                        weight,
                        closer.active,
                        i64::try_from(draws).unwrap_or(i64::MAX),
                    ],
                )
                .map_err(save_err)?;
        }

        Ok(())
    }

    fn append_draw(&mut self, record: &DrawRecordEntity) -> StorageResult<()> {
        self.connection
            .execute(
                "INSERT INTO draw_records (id, user, closer_drawn, draw_kind, customer_label,
                                           tickets_remaining_after, weight_after, drawn_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.user,
                    record.closer_drawn,
                    record.draw_kind,
                    record.customer_label,
                    record.tickets_remaining_after,
                    record.weight_after,
                    record.drawn_at,
                ],
            )
            .map_err(|source| SqliteDaoError::AppendDraw {
                id: record.id,
                source,
            })?;
        Ok(())
    }

    fn upsert_cooldown(&mut self, cooldown: &UserCooldownEntity) -> StorageResult<()> {
        self.connection
            .execute(
                "INSERT INTO user_cooldowns (user, last_draw_at, last_closer_drawn,
                                             last_draw_kind, last_customer_label)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user) DO UPDATE SET
                    last_draw_at = excluded.last_draw_at,
                    last_closer_drawn = excluded.last_closer_drawn,
                    last_draw_kind = excluded.last_draw_kind,
                    last_customer_label = excluded.last_customer_label",
                params![
                    cooldown.user,
                    cooldown.last_draw_at,
                    cooldown.last_closer_drawn,
                    cooldown.last_draw_kind,
                    cooldown.last_customer_label,
                ],
            )
            .map_err(|source| SqliteDaoError::SaveCooldown {
                user: cooldown.user.clone(),
                source,
            })?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.connection
            .execute_batch("COMMIT")
            .map_err(|source| SqliteDaoError::Commit { source })?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.connection.execute_batch("ROLLBACK") {
            warn!(error = %err, "failed to roll back bucket transaction");
        }
    }
}

fn select_bucket(connection: &Connection) -> SqliteResult<Option<BucketEntity>> {
    let load_err = |source| SqliteDaoError::LoadBucket { source };

    let row = connection
        .query_row(
            "SELECT tickets, draws_in_cycle, cycle_length, last_reset FROM bucket_state WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .map_err(load_err)?;

    let Some((tickets, draws_in_cycle, cycle_length, last_reset)) = row else {
        return Ok(None);
    };

    let tickets: Vec<String> = serde_json::from_str(&tickets)
        .map_err(|source| SqliteDaoError::DecodeTickets { source })?;

    let mut statement = connection
        .prepare(
            "SELECT name, display_name, color, default_weight, current_weight, active, lifetime_draws
             FROM closers ORDER BY position",
        )
        .map_err(load_err)?;
    let rows = statement
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                CloserEntity {
                    display_name: row.get(1)?,
                    color: row.get(2)?,
                    default_weight: row.get(3)?,
                    active: row.get(5)?,
                },
                row.get::<_, f64>(4)?,
                row.get::<_, i64>(6)?,
            ))
        })
        .map_err(load_err)?;

    let mut closers = IndexMap::new();
    let mut weights = IndexMap::new();
    let mut lifetime_stats = IndexMap::new();
    for row in rows {
        let (name, closer, weight, draws) = row.map_err(load_err)?;
        weights.insert(name.clone(), weight);
        lifetime_stats.insert(name.clone(), u64::try_from(draws).unwrap_or(0));
        closers.insert(name, closer);
    }

    Ok(Some(BucketEntity {
        closers,
        weights,
        tickets,
        draws_in_cycle,
        lifetime_stats,
        cycle_length,
        last_reset,
    }))
}

fn select_cooldown(connection: &Connection, user: &str) -> SqliteResult<Option<UserCooldownEntity>> {
    connection
        .query_row(
            "SELECT user, last_draw_at, last_closer_drawn, last_draw_kind, last_customer_label
             FROM user_cooldowns WHERE user = ?1",
            params![user],
            |row| {
                Ok(UserCooldownEntity {
                    user: row.get(0)?,
                    last_draw_at: row.get(1)?,
                    last_closer_drawn: row.get(2)?,
                    last_draw_kind: row.get(3)?,
                    last_customer_label: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(|source| SqliteDaoError::LoadCooldown {
            user: user.to_owned(),
            source,
        })
}

fn draw_record_from_row(row: &Row<'_>) -> rusqlite::Result<DrawRecordEntity> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(DrawRecordEntity {
        id,
        user: row.get(1)?,
        closer_drawn: row.get(2)?,
        draw_kind: row.get(3)?,
        customer_label: row.get(4)?,
        tickets_remaining_after: row.get(5)?,
        weight_after: row.get(6)?,
        drawn_at: row.get(7)?,
    })
}
