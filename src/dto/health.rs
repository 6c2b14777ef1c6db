use serde::Serialize;

use crate::dao::gateway::{GatewayHealth, TierStatus};

/// Health of one storage tier.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TierHealth {
    pub backend: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TierStatus> for TierHealth {
    fn from(status: TierStatus) -> Self {
        Self {
            backend: status.backend.to_string(),
            healthy: status.is_healthy(),
            error: status.error,
        }
    }
}

/// Health report of the engine's storage.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct HealthResponse {
    /// Health status ("ok", "degraded" or "unavailable").
    pub status: String,
    pub primary: Option<TierHealth>,
    pub secondary: TierHealth,
}

impl From<GatewayHealth> for HealthResponse {
    fn from(health: GatewayHealth) -> Self {
        let primary_ok = health.primary.as_ref().is_some_and(TierStatus::is_healthy);
        let secondary_ok = health.secondary.is_healthy();
        let status = match (primary_ok, secondary_ok) {
            (true, true) => "ok",
            (false, false) => "unavailable",
            _ => "degraded",
        };

        Self {
            status: status.to_string(),
            primary: health.primary.map(Into::into),
            secondary: health.secondary.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(backend: &'static str, error: Option<&str>) -> TierStatus {
        TierStatus {
            backend,
            error: error.map(str::to_owned),
        }
    }

    #[test]
    fn missing_primary_is_degraded() {
        let response = HealthResponse::from(GatewayHealth {
            primary: None,
            secondary: tier("file", None),
        });
        assert_eq!(response.status, "degraded");
    }

    #[test]
    fn both_tiers_down_is_unavailable() {
        let response = HealthResponse::from(GatewayHealth {
            primary: Some(tier("sqlite", Some("locked"))),
            secondary: tier("file", Some("read only")),
        });
        assert_eq!(response.status, "unavailable");
        assert_eq!(response.primary.unwrap().error.as_deref(), Some("locked"));
    }

    #[test]
    fn healthy_tiers_are_ok() {
        let response = HealthResponse::from(GatewayHealth {
            primary: Some(tier("sqlite", None)),
            secondary: tier("file", None),
        });
        assert_eq!(response.status, "ok");
    }
}
