//! Library crate for closer-bucket: a weighted lottery assigning closers to users,
//! shared by several processes through a locked relational store and a JSON file store.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod services;
pub mod state;

pub use config::BucketConfig;
pub use error::ServiceError;
pub use state::{AppState, SharedState};
