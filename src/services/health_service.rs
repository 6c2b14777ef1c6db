use tracing::warn;

use crate::{
    dto::health::HealthResponse, error::ServiceError, services::run_blocking, state::SharedState,
};

/// Probe both storage tiers, logging every failing one.
pub async fn health(state: &SharedState) -> Result<HealthResponse, ServiceError> {
    run_blocking(state, |state| {
        let health = state.gateway().health();
        for tier in health.primary.iter().chain([&health.secondary]) {
            if let Some(error) = &tier.error {
                warn!(backend = tier.backend, error = %error, "storage health check failed");
            }
        }
        Ok(HealthResponse::from(health))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::test_bed;

    #[tokio::test]
    async fn temporary_stores_are_healthy() {
        let bed = test_bed(30);
        let response = health(&bed.state).await.unwrap();
        assert!(response.secondary.healthy);
        if cfg!(feature = "sqlite-store") {
            assert_eq!(response.status, "ok");
        } else {
            assert_eq!(response.status, "degraded");
        }
    }
}
