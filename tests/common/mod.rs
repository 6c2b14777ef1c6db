#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use closer_bucket::{
    AppState, BucketConfig, SharedState,
    dao::bucket_store::{BucketStore, file::FileBucketStore},
    state::clock::{Clock, ManualClock},
};
use rand::{SeedableRng, rngs::StdRng};
use time::macros::datetime;

/// Independent engine instance over the stores in `dir`, as a separate process would open them.
pub fn open_state(dir: &Path, seed: u64, clock: Arc<dyn Clock>) -> SharedState {
    let config = BucketConfig::default().with_data_dir(dir);
    let secondary = Arc::new(FileBucketStore::open(&config.data_dir).unwrap());
    AppState::with_stores(
        config.clone(),
        primary(&config),
        secondary,
        clock,
        StdRng::seed_from_u64(seed),
    )
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(datetime!(2026-06-01 08:30 UTC)))
}

#[cfg(feature = "sqlite-store")]
pub fn primary(config: &BucketConfig) -> Option<Arc<dyn BucketStore>> {
    use closer_bucket::dao::bucket_store::sqlite::{SqliteBucketStore, SqliteConfig};

    Some(Arc::new(
        SqliteBucketStore::open(SqliteConfig::new(&config.database_path)).unwrap(),
    ))
}

#[cfg(not(feature = "sqlite-store"))]
pub fn primary(_config: &BucketConfig) -> Option<Arc<dyn BucketStore>> {
    None
}
