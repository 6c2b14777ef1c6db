//! Draw a closer for a user and answer cooldown questions.

use tracing::{debug, info};
use validator::Validate;

use crate::{
    dto::draw::{CooldownRequest, CooldownResponse, DrawRequest, DrawResponse},
    error::ServiceError,
    services::run_blocking,
    state::{SharedState, draw_engine::DrawOutcome},
};

/// Draw one closer for `request.user`.
///
/// The cooldown is re-read inside the bucket lock so two concurrent draws by
/// the same user cannot both pass it.
pub async fn draw(state: &SharedState, request: DrawRequest) -> Result<DrawResponse, ServiceError> {
    request.validate()?;

    run_blocking(state, move |state| {
        let now = state.now();
        let ticket = request.ticket();
        let engine = state.engine();

        let outcome = state
            .gateway()
            .transact(now, |session| -> Result<DrawOutcome, ServiceError> {
                let previous = session.find_cooldown(ticket.user)?;
                let status = engine.check_cooldown(previous.as_ref(), ticket.draw_kind, now);
                if !status.allowed {
                    return Ok(DrawOutcome::CoolingDown {
                        remaining_seconds: status.remaining_seconds,
                    });
                }

                let outcome = state.with_rng(|rng| {
                    engine.draw(session.bucket_mut(), previous.as_ref(), &ticket, rng, now)
                })?;
                if let DrawOutcome::Drawn(drawn) = &outcome {
                    session.record_draw(drawn.record.clone(), drawn.cooldown.clone());
                }
                Ok(outcome)
            })?;

        match &outcome {
            DrawOutcome::Drawn(drawn) => info!(
                user = ticket.user,
                draw_kind = ticket.draw_kind,
                closer = %drawn.closer.name,
                weight_after = drawn.weight_after,
                tickets_remaining = drawn.tickets_remaining,
                "closer drawn"
            ),
            DrawOutcome::CoolingDown { remaining_seconds } => debug!(
                user = ticket.user,
                remaining_seconds,
                "draw refused during cooldown"
            ),
        }

        Ok(outcome.into())
    })
    .await
}

/// Whether `request.user` may draw `request.draw_kind` now. Never takes the bucket lock.
pub async fn check_cooldown(
    state: &SharedState,
    request: CooldownRequest,
) -> Result<CooldownResponse, ServiceError> {
    request.validate()?;

    run_blocking(state, move |state| {
        let user = request.user.trim().to_owned();
        let previous = state.gateway().find_cooldown(&user)?;
        let status = state
            .engine()
            .check_cooldown(previous.as_ref(), &request.draw_kind, state.now());

        Ok(CooldownResponse {
            user,
            draw_kind: request.draw_kind,
            allowed: status.allowed,
            remaining_seconds: status.remaining_seconds,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::{
        services::test_support::{file_only_bed, test_bed},
        state::phase::ResetReason,
    };

    fn expect_drawn(response: DrawResponse) -> (String, Vec<ResetReason>) {
        match response {
            DrawResponse::Drawn { closer, resets, .. } => (closer.name, resets),
            other => panic!("expected a draw, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_lead_draw_waits_for_the_window() {
        let bed = test_bed(1);

        let first = draw(&bed.state, DrawRequest::new("maria", "lead"))
            .await
            .unwrap();
        expect_drawn(first);

        bed.clock.advance(Duration::seconds(20));
        let second = draw(&bed.state, DrawRequest::new("maria", "lead"))
            .await
            .unwrap();
        assert_eq!(
            second,
            DrawResponse::CoolingDown {
                remaining_seconds: 40
            }
        );

        let status = check_cooldown(&bed.state, CooldownRequest::new("maria", "lead"))
            .await
            .unwrap();
        assert!(!status.allowed);
        assert_eq!(status.remaining_seconds, 40);

        bed.clock.advance(Duration::seconds(40));
        let third = draw(&bed.state, DrawRequest::new("maria", "lead"))
            .await
            .unwrap();
        expect_drawn(third);
    }

    #[tokio::test]
    async fn rejected_draw_changes_nothing() {
        let bed = test_bed(2);
        draw(&bed.state, DrawRequest::new("maria", "lead"))
            .await
            .unwrap();
        let before = bed.state.gateway().load(bed.state.now());

        draw(&bed.state, DrawRequest::new("maria", "lead"))
            .await
            .unwrap();
        assert_eq!(bed.state.gateway().load(bed.state.now()), before);
        assert_eq!(bed.state.gateway().recent_draws(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_users_are_not_blocked() {
        let bed = test_bed(3);
        draw(&bed.state, DrawRequest::new("maria", "lead"))
            .await
            .unwrap();
        let other = draw(&bed.state, DrawRequest::new("joao", "lead"))
            .await
            .unwrap();
        expect_drawn(other);
    }

    #[tokio::test]
    async fn zero_window_kind_never_blocks() {
        let bed = test_bed(4);
        for _ in 0..5 {
            let response = draw(&bed.state, DrawRequest::new("maria", "test"))
                .await
                .unwrap();
            expect_drawn(response);
        }
    }

    #[tokio::test]
    async fn blank_user_is_invalid_input() {
        let bed = test_bed(5);
        let err = draw(&bed.state, DrawRequest::new(" ", "lead"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn draws_are_recorded_with_their_label() {
        let bed = test_bed(6);
        draw(
            &bed.state,
            DrawRequest::new("maria", "lead").with_customer_label("ACME Corp"),
        )
        .await
        .unwrap();

        let history = bed.state.gateway().recent_draws(1).unwrap();
        assert_eq!(history[0].user, "maria");
        assert_eq!(history[0].customer_label.as_deref(), Some("ACME Corp"));
        assert_eq!(history[0].drawn_at, "2026-05-04T09:00:00Z");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_draws_on_the_file_store_alone_are_all_kept() {
        let bed = file_only_bed(8);

        let draws = (0..40).map(|i| {
            let state = bed.state.clone();
            async move { draw(&state, DrawRequest::new(format!("user-{i}"), "test")).await }
        });
        for response in futures::future::join_all(draws).await {
            expect_drawn(response.unwrap());
        }

        let bucket = bed.state.gateway().load(bed.state.now());
        assert_eq!(bucket.total_draws(), 40);
        // Two full cycles of twenty.
        assert_eq!(bucket.draws_in_cycle(), 0);
        assert_eq!(bucket.tickets().len(), 20);
        assert_eq!(bed.state.gateway().recent_draws(100).unwrap().len(), 40);
    }

    #[tokio::test]
    async fn full_cycle_resets_to_defaults() {
        let bed = test_bed(7);
        let mut resets = Vec::new();
        for _ in 0..20 {
            let (_, mut performed) = expect_drawn(
                draw(&bed.state, DrawRequest::new("maria", "test"))
                    .await
                    .unwrap(),
            );
            resets.append(&mut performed);
        }

        assert_eq!(resets, vec![ResetReason::CycleLimit]);
        let bucket = bed.state.gateway().load(bed.state.now());
        assert_eq!(bucket.draws_in_cycle(), 0);
        assert_eq!(bucket.tickets().len(), 20);
        assert_eq!(bucket.total_draws(), 20);
    }
}
