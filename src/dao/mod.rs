/// Persistence tiers holding the bucket.
pub mod bucket_store;
/// Two-tier repository combining the stores.
pub mod gateway;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
