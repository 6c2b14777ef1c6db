use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dao::models::{BucketEntity, DrawRecordEntity, UserCooldownEntity};

pub const BUCKET_FILE_NAME: &str = "closer_bucket.json";

/// On-disk layout of the bucket file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDocument {
    #[serde(flatten)]
    pub bucket: BucketEntity,
    /// Written for readers that expect the flat default map; ignored on read.
    #[serde(default, skip_deserializing)]
    pub default_weights: IndexMap<String, f64>,
    #[serde(default)]
    pub draw_history: Vec<DrawRecordEntity>,
    #[serde(default)]
    pub user_cooldowns: IndexMap<String, UserCooldownEntity>,
}

impl FileDocument {
    pub fn new(
        bucket: BucketEntity,
        draw_history: Vec<DrawRecordEntity>,
        user_cooldowns: IndexMap<String, UserCooldownEntity>,
    ) -> Self {
        let default_weights = bucket
            .closers
            .iter()
            .map(|(name, closer)| (name.clone(), closer.default_weight))
            .collect();
        Self {
            bucket,
            default_weights,
            draw_history,
            user_cooldowns,
        }
    }
}
