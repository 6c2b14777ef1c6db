//! Application-level configuration loading: draw tuning, cooldown windows, storage locations
//! and the roster a fresh bucket is bootstrapped from.

use std::{
    collections::HashMap,
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration as StdDuration,
};

use serde::Deserialize;
use time::{Duration, UtcOffset};
use tracing::{info, warn};

use crate::{
    dao::gateway::BucketSeed,
    state::{
        cooldown::{CooldownPolicy, parse_offset},
        draw_engine::DegressionRule,
        roster::{Closer, ClosersRegistry},
    },
};

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/closer_bucket.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CLOSER_BUCKET_CONFIG_PATH";
/// Environment variable pointing at the file store directory.
const DATA_DIR_ENV: &str = "CLOSER_BUCKET_DATA_DIR";
/// Environment variable pointing at the SQLite database.
const DATABASE_ENV: &str = "CLOSER_BUCKET_DATABASE";
const DEFAULT_DATA_DIR: &str = "data";
const DATABASE_FILE_NAME: &str = "closer_bucket.sqlite3";

/// Largest cycle length accepted from configuration or from an administrator.
pub const MAX_CYCLE_LENGTH: u32 = 100;

const DEFAULT_REDUCTION_STEP: f64 = 1.0;
const DEFAULT_MIN_WEIGHT: f64 = 0.0;
const DEFAULT_MAX_WEIGHT: f64 = 100.0;
const DEFAULT_CYCLE_LENGTH: u32 = 20;
const DEFAULT_COOLDOWN_SECS: u64 = 60;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct BucketConfig {
    /// Weight removed from a closer each time it is drawn.
    pub reduction_step: f64,
    /// Floor of degraded weights.
    pub min_weight: f64,
    /// Ceiling accepted for any weight set by an administrator.
    pub max_weight: f64,
    /// Cycle length used when bootstrapping a fresh bucket.
    pub cycle_length: u32,
    /// Window applied to draw kinds without a dedicated entry.
    pub default_cooldown: Duration,
    /// Window per draw kind.
    pub cooldowns: HashMap<String, Duration>,
    /// Offset assumed for stored timestamps that carry none.
    pub reference_offset: UtcOffset,
    /// How long a writer waits for the database lock.
    pub busy_timeout: StdDuration,
    /// Roster used when no store holds a bucket yet.
    pub closers: Vec<Closer>,
    /// Directory of the file store.
    pub data_dir: PathBuf,
    /// Location of the SQLite database.
    pub database_path: PathBuf,
}

impl BucketConfig {
    /// Load the configuration from the default path (or its environment override),
    /// falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`, falling back to built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(
                        path = %path.display(),
                        closers = raw.closers.as_ref().map_or(0, Vec::len),
                        "loaded closer bucket config"
                    );
                    raw
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    RawConfig::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                RawConfig::default()
            }
        };

        let (data_dir, database_path) = resolve_data_paths();
        Self::from_raw(raw, data_dir, database_path)
    }

    /// Point both stores below `data_dir`.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self.database_path = self.data_dir.join(DATABASE_FILE_NAME);
        self
    }

    pub fn degression_rule(&self) -> DegressionRule {
        DegressionRule {
            reduction_step: self.reduction_step,
            min_weight: self.min_weight,
        }
    }

    pub fn cooldown_policy(&self) -> CooldownPolicy {
        CooldownPolicy::new(
            self.default_cooldown,
            self.cooldowns.clone(),
            self.reference_offset,
        )
    }

    pub fn seed(&self) -> BucketSeed {
        BucketSeed {
            roster: ClosersRegistry::new(self.closers.iter().cloned()),
            cycle_length: self.cycle_length,
        }
    }

    fn from_raw(raw: RawConfig, data_dir: PathBuf, database_path: PathBuf) -> Self {
        let reduction_step = match raw.reduction_step {
            Some(step) if step.is_finite() && step >= 0.0 => step,
            Some(step) => {
                warn!(reduction_step = step, "invalid reduction step; using default");
                DEFAULT_REDUCTION_STEP
            }
            None => DEFAULT_REDUCTION_STEP,
        };

        let min_weight = raw.min_weight.unwrap_or(DEFAULT_MIN_WEIGHT);
        let max_weight = raw.max_weight.unwrap_or(DEFAULT_MAX_WEIGHT);
        let (min_weight, max_weight) = if min_weight.is_finite()
            && max_weight.is_finite()
            && 0.0 <= min_weight
            && min_weight <= max_weight
        {
            (min_weight, max_weight)
        } else {
            warn!(min_weight, max_weight, "invalid weight bounds; using defaults");
            (DEFAULT_MIN_WEIGHT, DEFAULT_MAX_WEIGHT)
        };

        let cycle_length = match raw.cycle_length {
            Some(length) if (1..=MAX_CYCLE_LENGTH).contains(&length) => length,
            Some(length) => {
                warn!(cycle_length = length, "invalid cycle length; using default");
                DEFAULT_CYCLE_LENGTH
            }
            None => DEFAULT_CYCLE_LENGTH,
        };

        let reference_offset = match raw.reference_utc_offset.as_deref().map(parse_offset) {
            Some(Ok(offset)) => offset,
            Some(Err(err)) => {
                warn!(error = %err, "invalid reference offset; assuming UTC");
                UtcOffset::UTC
            }
            None => UtcOffset::UTC,
        };

        let cooldowns = raw
            .cooldowns
            .unwrap_or_else(default_cooldowns)
            .into_iter()
            .map(|(kind, secs)| (kind, seconds(secs)))
            .collect();

        let closers = raw
            .closers
            .map(|closers| {
                closers
                    .into_iter()
                    .filter_map(|closer| closer.into_closer(max_weight))
                    .collect::<Vec<_>>()
            })
            .filter(|closers| {
                let usable = !closers.is_empty();
                if !usable {
                    warn!("config lists no usable closer; using the built-in roster");
                }
                usable
            })
            .unwrap_or_else(default_closers);

        Self {
            reduction_step,
            min_weight,
            max_weight,
            cycle_length,
            default_cooldown: seconds(raw.default_cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS)),
            cooldowns,
            reference_offset,
            busy_timeout: StdDuration::from_millis(
                raw.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            ),
            closers,
            data_dir,
            database_path,
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        let database_path = data_dir.join(DATABASE_FILE_NAME);
        Self::from_raw(RawConfig::default(), data_dir, database_path)
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    reduction_step: Option<f64>,
    min_weight: Option<f64>,
    max_weight: Option<f64>,
    cycle_length: Option<u32>,
    default_cooldown_secs: Option<u64>,
    cooldowns: Option<HashMap<String, u64>>,
    reference_utc_offset: Option<String>,
    busy_timeout_ms: Option<u64>,
    closers: Option<Vec<RawCloser>>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single roster entry inside the configuration file.
struct RawCloser {
    name: String,
    display_name: Option<String>,
    color: String,
    default_weight: f64,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl RawCloser {
    fn into_closer(self, max_weight: f64) -> Option<Closer> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            warn!("skipping configured closer without a name");
            return None;
        }
        if !(self.default_weight.is_finite()
            && 0.0 <= self.default_weight
            && self.default_weight <= max_weight)
        {
            warn!(
                closer = %name,
                default_weight = self.default_weight,
                "skipping configured closer with an out of range weight"
            );
            return None;
        }

        Some(Closer {
            display_name: self.display_name.unwrap_or_else(|| name.clone()),
            name,
            color: self.color,
            default_weight: self.default_weight,
            active: self.active,
        })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env_path(CONFIG_PATH_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn resolve_data_paths() -> (PathBuf, PathBuf) {
    let data_dir = env_path(DATA_DIR_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let database_path = env_path(DATABASE_ENV).unwrap_or_else(|| data_dir.join(DATABASE_FILE_NAME));
    (data_dir, database_path)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

fn default_cooldowns() -> HashMap<String, u64> {
    HashMap::from([("lead".to_string(), 60), ("test".to_string(), 0)])
}

/// Built-in roster shipped with the binary.
fn default_closers() -> Vec<Closer> {
    [
        ("alpha", "Alpha", "#1f77b4", 9.0),
        ("bravo", "Bravo", "#ff7f0e", 9.0),
        ("charlie", "Charlie", "#2ca02c", 2.0),
    ]
    .into_iter()
    .map(|(name, display_name, color, default_weight)| Closer {
        name: name.into(),
        display_name: display_name.into(),
        color: color.into(),
        default_weight,
        active: true,
    })
    .collect()
}
