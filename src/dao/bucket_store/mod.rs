pub mod file;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use crate::dao::models::{BucketEntity, DrawRecordEntity, UserCooldownEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over one persistence tier holding the singleton bucket.
pub trait BucketStore: Send + Sync {
    /// Short backend label used in logs and health reports.
    fn backend(&self) -> &'static str;
    /// Open a write transaction. Backends that can lock do so before returning.
    fn begin(&self) -> StorageResult<Box<dyn BucketTransaction + '_>>;
    /// Read the bucket without taking the write lock.
    fn load_bucket(&self) -> StorageResult<Option<BucketEntity>>;
    fn find_cooldown(&self, user: &str) -> StorageResult<Option<UserCooldownEntity>>;
    /// Most recent draws first.
    fn recent_draws(&self, limit: usize) -> StorageResult<Vec<DrawRecordEntity>>;
    fn health_check(&self) -> StorageResult<()>;
}

/// Read-modify-write unit of work against one tier.
///
/// Dropping a transaction without calling [`BucketTransaction::commit`] discards
/// every staged write and releases the lock.
pub trait BucketTransaction {
    fn load(&mut self) -> StorageResult<Option<BucketEntity>>;
    fn find_cooldown(&mut self, user: &str) -> StorageResult<Option<UserCooldownEntity>>;
    fn save(&mut self, bucket: &BucketEntity) -> StorageResult<()>;
    fn append_draw(&mut self, record: &DrawRecordEntity) -> StorageResult<()>;
    fn upsert_cooldown(&mut self, cooldown: &UserCooldownEntity) -> StorageResult<()>;
    fn commit(self: Box<Self>) -> StorageResult<()>;
}
