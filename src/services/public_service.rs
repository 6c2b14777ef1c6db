//! Service helpers that expose read-only projections of the bucket.

use crate::{
    dto::public::{CompositionResponse, RecentDrawsResponse, RosterResponse, StatsResponse},
    error::ServiceError,
    services::run_blocking,
    state::SharedState,
};

/// Largest history page returned by [`recent_draws`].
pub const MAX_RECENT_DRAWS: usize = 500;

/// Return the ticket composition of the current cycle.
pub async fn get_composition(state: &SharedState) -> Result<CompositionResponse, ServiceError> {
    run_blocking(state, |state| {
        let bucket = state.gateway().load(state.now());
        Ok(CompositionResponse::from(&bucket))
    })
    .await
}

/// Return the configured closers in roster order.
pub async fn get_roster(state: &SharedState) -> Result<RosterResponse, ServiceError> {
    run_blocking(state, |state| {
        let bucket = state.gateway().load(state.now());
        Ok(RosterResponse::from(&bucket))
    })
    .await
}

/// Return lifetime draw counts per closer.
pub async fn get_stats(state: &SharedState) -> Result<StatsResponse, ServiceError> {
    run_blocking(state, |state| {
        let bucket = state.gateway().load(state.now());
        Ok(StatsResponse::from(&bucket))
    })
    .await
}

/// Return up to `limit` draws, newest first.
pub async fn recent_draws(
    state: &SharedState,
    limit: usize,
) -> Result<RecentDrawsResponse, ServiceError> {
    if limit == 0 || limit > MAX_RECENT_DRAWS {
        return Err(ServiceError::InvalidInput(format!(
            "limit must be between 1 and {MAX_RECENT_DRAWS}"
        )));
    }

    run_blocking(state, move |state| {
        let draws = state.gateway().recent_draws(limit)?;
        Ok(RecentDrawsResponse {
            draws: draws.into_iter().map(Into::into).collect(),
        })
    })
    .await
}
