//! Administrative mutations of the bucket. Every helper runs inside the bucket
//! lock and persists through the gateway before returning the new composition.

use tracing::info;
use validator::Validate;

use crate::{
    dto::{
        admin::{AddCloserRequest, SetCycleLengthRequest, SetWeightRequest, UpdateCloserRequest},
        public::CompositionResponse,
        validation::validate_closer_name,
    },
    error::ServiceError,
    services::run_blocking,
    state::{AppState, SharedState, bucket::BucketState, phase::ResetReason, roster::Closer},
};

fn ensure_weight(state: &AppState, field: &str, value: f64) -> Result<(), ServiceError> {
    let max_weight = state.config().max_weight;
    if !value.is_finite() || value < 0.0 || value > max_weight {
        return Err(ServiceError::InvalidInput(format!(
            "{field} must be between 0 and {max_weight} (got {value})"
        )));
    }
    Ok(())
}

/// Apply `mutate` to the locked bucket, rebuild it for `reason` and persist it.
fn mutate_bucket<F>(
    state: &AppState,
    reason: ResetReason,
    mutate: F,
) -> Result<CompositionResponse, ServiceError>
where
    F: FnOnce(&mut BucketState) -> Result<(), ServiceError>,
{
    let now = state.now();
    state.gateway().transact(now, |session| {
        let bucket = session.bucket_mut();
        mutate(bucket)?;
        bucket.reset(reason, now);
        Ok::<_, ServiceError>(CompositionResponse::from(&*bucket))
    })
}

// ---------------------------------------------------------------------------
// Weights and cycle
// ---------------------------------------------------------------------------

/// Overwrite one closer's current weight and rebuild the tickets from the current weights.
pub async fn set_weight(
    state: &SharedState,
    request: SetWeightRequest,
) -> Result<CompositionResponse, ServiceError> {
    request.validate()?;

    run_blocking(state, move |state| {
        ensure_weight(state, "weight", request.weight)?;
        let composition = mutate_bucket(state, ResetReason::WeightChanged, |bucket| {
            bucket.set_weight(&request.closer, request.weight)?;
            Ok(())
        })?;
        info!(closer = %request.closer, weight = request.weight, "closer weight updated");
        Ok(composition)
    })
    .await
}

/// Restore every weight to its default and start a new cycle.
pub async fn reset_all(state: &SharedState) -> Result<CompositionResponse, ServiceError> {
    run_blocking(state, |state| {
        let composition = mutate_bucket(state, ResetReason::Manual, |_| Ok(()))?;
        info!(tickets = composition.total_tickets, "bucket reset to defaults");
        Ok(composition)
    })
    .await
}

/// Change the cycle length and restore default weights.
pub async fn set_cycle_length(
    state: &SharedState,
    request: SetCycleLengthRequest,
) -> Result<CompositionResponse, ServiceError> {
    request.validate()?;

    run_blocking(state, move |state| {
        let composition = mutate_bucket(state, ResetReason::CycleResized, |bucket| {
            bucket.set_cycle_length(request.cycle_length);
            Ok(())
        })?;
        info!(cycle_length = request.cycle_length, "cycle length updated");
        Ok(composition)
    })
    .await
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Register a closer with its default weight.
pub async fn add_closer(
    state: &SharedState,
    request: AddCloserRequest,
) -> Result<CompositionResponse, ServiceError> {
    request.validate()?;

    run_blocking(state, move |state| {
        ensure_weight(state, "default_weight", request.default_weight)?;
        let name = request.name.clone();
        let closer = Closer {
            name: request.name,
            display_name: request.display_name.trim().to_owned(),
            color: request.color,
            default_weight: request.default_weight,
            active: request.active,
        };

        let composition = mutate_bucket(state, ResetReason::RosterChanged, |bucket| {
            bucket.add_closer(closer)?;
            Ok(())
        })?;
        info!(closer = %name, "closer added");
        Ok(composition)
    })
    .await
}

/// Remove a closer together with its weight, tickets and stats.
pub async fn remove_closer(
    state: &SharedState,
    name: String,
) -> Result<CompositionResponse, ServiceError> {
    validate_closer_name(&name)
        .map_err(|err| ServiceError::InvalidInput(format!("invalid closer name: {err}")))?;

    run_blocking(state, move |state| {
        let composition = mutate_bucket(state, ResetReason::RosterChanged, |bucket| {
            bucket.remove_closer(&name)?;
            Ok(())
        })?;
        info!(closer = %name, "closer removed");
        Ok(composition)
    })
    .await
}

/// Update a closer's display data, default weight or active flag.
///
/// Display-only edits keep the tickets as they are; weight and activation
/// edits rebuild them from the current weights.
pub async fn update_closer_metadata(
    state: &SharedState,
    name: String,
    request: UpdateCloserRequest,
) -> Result<CompositionResponse, ServiceError> {
    request.validate()?;
    if request.is_empty() {
        return Err(ServiceError::InvalidInput("nothing to update".into()));
    }

    run_blocking(state, move |state| {
        if let Some(default_weight) = request.default_weight {
            ensure_weight(state, "default_weight", default_weight)?;
        }

        let now = state.now();
        let structural = request.is_structural();
        let composition = state.gateway().transact(now, |session| {
            let bucket = session.bucket_mut();
            let closer = bucket
                .closer_mut(&name)
                .ok_or_else(|| ServiceError::NotFound(format!("closer `{name}` not found")))?;

            if let Some(display_name) = request.display_name {
                closer.display_name = display_name.trim().to_owned();
            }
            if let Some(color) = request.color {
                closer.color = color;
            }
            if let Some(default_weight) = request.default_weight {
                closer.default_weight = default_weight;
            }
            if let Some(active) = request.active {
                closer.active = active;
            }

            if structural {
                bucket.reset(ResetReason::RosterChanged, now);
            }
            Ok::<_, ServiceError>(CompositionResponse::from(&*bucket))
        })?;

        info!(closer = %name, structural, "closer updated");
        Ok(composition)
    })
    .await
}
