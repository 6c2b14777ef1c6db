pub mod bucket;
pub mod clock;
pub mod cooldown;
pub mod draw_engine;
pub mod phase;
pub mod roster;

use std::sync::{Arc, Mutex, PoisonError};

use rand::{SeedableRng, rngs::StdRng};
use time::OffsetDateTime;
use tracing::info;

use crate::{
    config::BucketConfig,
    dao::{
        bucket_store::{BucketStore, file::FileBucketStore},
        gateway::PersistenceGateway,
        storage::StorageResult,
    },
    state::{
        clock::{Clock, SystemClock},
        draw_engine::DrawEngine,
    },
};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, the persistence gateway and the draw engine.
///
/// Holds no bucket data; every operation reads the bucket from storage.
pub struct AppState {
    config: BucketConfig,
    gateway: PersistenceGateway,
    engine: DrawEngine,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl AppState {
    /// Open the stores described by `config`.
    ///
    /// A primary store that cannot be opened leaves the engine running on the
    /// file store alone.
    pub fn open(config: BucketConfig) -> StorageResult<SharedState> {
        let secondary = FileBucketStore::open(&config.data_dir)?;
        info!(path = %secondary.path().display(), "opened file store");
        let primary = open_primary(&config);

        Ok(Self::with_stores(
            config,
            primary,
            Arc::new(secondary),
            Arc::new(SystemClock),
            StdRng::from_os_rng(),
        ))
    }

    /// Assemble a state from explicit stores, clock and random source.
    pub fn with_stores(
        config: BucketConfig,
        primary: Option<Arc<dyn BucketStore>>,
        secondary: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> SharedState {
        let gateway = PersistenceGateway::new(primary, secondary, config.seed());
        let engine = DrawEngine::new(config.degression_rule(), config.cooldown_policy());
        Arc::new(Self {
            config,
            gateway,
            engine,
            clock,
            rng: Mutex::new(rng),
        })
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub fn engine(&self) -> &DrawEngine {
        &self.engine
    }

    /// Current UTC instant according to the injected clock.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now_utc()
    }

    /// Run `f` with exclusive access to the random source.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

#[cfg(feature = "sqlite-store")]
fn open_primary(config: &BucketConfig) -> Option<Arc<dyn BucketStore>> {
    use crate::dao::bucket_store::sqlite::{SqliteBucketStore, SqliteConfig};
    use tracing::warn;

    let sqlite_config =
        SqliteConfig::new(&config.database_path).with_busy_timeout(config.busy_timeout);
    match SqliteBucketStore::open(sqlite_config) {
        Ok(store) => {
            info!(path = %config.database_path.display(), "opened sqlite store");
            Some(Arc::new(store))
        }
        Err(err) => {
            warn!(
                path = %config.database_path.display(),
                error = %err,
                "failed to open sqlite store; running on the file store only"
            );
            None
        }
    }
}

#[cfg(not(feature = "sqlite-store"))]
fn open_primary(_config: &BucketConfig) -> Option<Arc<dyn BucketStore>> {
    None
}
