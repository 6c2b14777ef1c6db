use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};
use tempfile::TempDir;
use time::macros::datetime;

use crate::{
    config::BucketConfig,
    dao::bucket_store::{BucketStore, file::FileBucketStore},
    state::{AppState, SharedState, clock::ManualClock},
};

/// State backed by stores in a temporary directory, a manual clock and a seeded rng.
pub(crate) struct TestBed {
    pub state: SharedState,
    pub clock: Arc<ManualClock>,
    _dir: TempDir,
}

pub(crate) fn test_bed(seed: u64) -> TestBed {
    build(seed, primary)
}

/// Bed without a primary store: the file store's gate is the only lock.
pub(crate) fn file_only_bed(seed: u64) -> TestBed {
    build(seed, |_| None)
}

fn build(seed: u64, primary: impl FnOnce(&BucketConfig) -> Option<Arc<dyn BucketStore>>) -> TestBed {
    let dir = tempfile::tempdir().unwrap();
    let config = BucketConfig::default().with_data_dir(dir.path());
    let clock = Arc::new(ManualClock::new(datetime!(2026-05-04 09:00 UTC)));

    let secondary = Arc::new(FileBucketStore::open(&config.data_dir).unwrap());
    let state = AppState::with_stores(
        config.clone(),
        primary(&config),
        secondary,
        clock.clone(),
        StdRng::seed_from_u64(seed),
    );

    TestBed {
        state,
        clock,
        _dir: dir,
    }
}

#[cfg(feature = "sqlite-store")]
fn primary(config: &BucketConfig) -> Option<Arc<dyn BucketStore>> {
    use crate::dao::bucket_store::sqlite::{SqliteBucketStore, SqliteConfig};

    Some(Arc::new(
        SqliteBucketStore::open(SqliteConfig::new(&config.database_path)).unwrap(),
    ))
}

#[cfg(not(feature = "sqlite-store"))]
fn primary(_config: &BucketConfig) -> Option<Arc<dyn BucketStore>> {
    None
}
