/// Administrative mutations of the bucket and its roster.
pub mod admin_service;
/// Weighted draw and cooldown checks.
pub mod draw_service;
/// Health check service.
pub mod health_service;
/// Read-only projections of the bucket.
pub mod public_service;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use crate::{
    error::ServiceError,
    state::{AppState, SharedState},
};

/// Run storage-bound `work` on the blocking pool.
async fn run_blocking<T, F>(state: &SharedState, work: F) -> Result<T, ServiceError>
where
    F: FnOnce(&AppState) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state)).await?
}
