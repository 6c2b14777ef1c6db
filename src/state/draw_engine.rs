//! Weighted draw over the ticket multiset with degressive weights.

use rand::Rng;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{DrawRecordEntity, UserCooldownEntity},
    state::{
        bucket::BucketState,
        cooldown::{CooldownPolicy, CooldownStatus, TimeoutGuard, format_timestamp},
        phase::ResetReason,
        roster::Closer,
    },
};

/// How much a closer's weight drops each time it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegressionRule {
    /// Amount subtracted from the drawn closer's weight.
    pub reduction_step: f64,
    /// Lower bound of any degraded weight.
    pub min_weight: f64,
}

impl Default for DegressionRule {
    fn default() -> Self {
        Self {
            reduction_step: 1.0,
            min_weight: 0.0,
        }
    }
}

/// Caller-supplied parameters of one draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawTicket<'a> {
    pub user: &'a str,
    pub draw_kind: &'a str,
    pub customer_label: Option<&'a str>,
}

/// Successful pick together with the rows that must be persisted for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnCloser {
    /// The closer that was drawn.
    pub closer: Closer,
    /// Weight of the closer right after degradation.
    pub weight_after: f64,
    /// Tickets left for the next draw (after any reset performed by this draw).
    pub tickets_remaining: u32,
    /// Draws left before the cycle-length reset.
    pub draws_until_reset: u32,
    /// Resets performed by this draw, in order.
    pub resets: Vec<ResetReason>,
    /// Append-only history row.
    pub record: DrawRecordEntity,
    /// Upserted cooldown row of the user.
    pub cooldown: UserCooldownEntity,
}

/// Result of a draw attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOutcome {
    /// The user is still in cooldown; nothing changed.
    CoolingDown { remaining_seconds: u64 },
    /// A closer was drawn and the bucket was mutated.
    Drawn(Box<DrawnCloser>),
}

/// Draw failures that are not cooldown rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    /// Even a default-weight rebuild yields no tickets.
    #[error("no closer is drawable: every active closer has a default weight of zero")]
    NothingDrawable,
}

/// Stateless draw algorithm; all state lives in the [`BucketState`] it is handed.
#[derive(Debug, Clone)]
pub struct DrawEngine {
    rule: DegressionRule,
    cooldowns: CooldownPolicy,
}

impl DrawEngine {
    pub fn new(rule: DegressionRule, cooldowns: CooldownPolicy) -> Self {
        Self { rule, cooldowns }
    }

    pub fn cooldowns(&self) -> &CooldownPolicy {
        &self.cooldowns
    }

    /// Cooldown check for a user whose last draw is `previous`.
    pub fn check_cooldown(
        &self,
        previous: Option<&UserCooldownEntity>,
        draw_kind: &str,
        now: OffsetDateTime,
    ) -> CooldownStatus {
        TimeoutGuard::new(&self.cooldowns).check(previous, draw_kind, now)
    }

    /// Run one draw against `bucket`.
    ///
    /// On [`DrawOutcome::CoolingDown`] and on error the bucket is left untouched.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        bucket: &mut BucketState,
        previous: Option<&UserCooldownEntity>,
        ticket: &DrawTicket<'_>,
        rng: &mut R,
        now: OffsetDateTime,
    ) -> Result<DrawOutcome, DrawError> {
        let status = self.check_cooldown(previous, ticket.draw_kind, now);
        if !status.allowed {
            debug!(
                user = ticket.user,
                remaining_seconds = status.remaining_seconds,
                "draw rejected by cooldown"
            );
            return Ok(DrawOutcome::CoolingDown {
                remaining_seconds: status.remaining_seconds,
            });
        }

        let mut working = bucket.clone();
        let mut resets = Vec::new();

        // A snapshot can arrive empty or already past its cycle limit.
        if let Some(reason) = working.phase().pending_reset() {
            working.reset(reason, now);
            resets.push(reason);
            if working.tickets().is_empty() {
                return Err(DrawError::NothingDrawable);
            }
        }

        let index = rng.random_range(0..working.tickets().len());
        let name = working
            .take_ticket(index)
            .ok_or(DrawError::NothingDrawable)?;
        let weight_after =
            working.degrade(&name, self.rule.reduction_step, self.rule.min_weight);
        working.record_pick(&name);
        let tickets_after_pick = working.tickets().len();

        if working.draws_in_cycle() >= working.cycle_length() {
            working.reset(ResetReason::CycleLimit, now);
            resets.push(ResetReason::CycleLimit);
        }

        let closer = working
            .roster()
            .get(&name)
            .cloned()
            .ok_or(DrawError::NothingDrawable)?;

        for reason in &resets {
            info!(reason = ?reason, tickets = working.tickets().len(), "bucket reset");
        }

        let drawn_at = format_timestamp(now);
        let record = DrawRecordEntity {
            id: Uuid::new_v4(),
            user: ticket.user.to_owned(),
            closer_drawn: name.clone(),
            draw_kind: ticket.draw_kind.to_owned(),
            customer_label: ticket.customer_label.map(str::to_owned),
            tickets_remaining_after: u32::try_from(tickets_after_pick).unwrap_or(u32::MAX),
            weight_after,
            drawn_at: drawn_at.clone(),
        };
        let cooldown = UserCooldownEntity {
            user: ticket.user.to_owned(),
            last_draw_at: drawn_at,
            last_closer_drawn: name,
            last_draw_kind: ticket.draw_kind.to_owned(),
            last_customer_label: ticket.customer_label.map(str::to_owned),
        };

        *bucket = working;

        Ok(DrawOutcome::Drawn(Box::new(DrawnCloser {
            closer,
            weight_after,
            tickets_remaining: u32::try_from(bucket.tickets().len()).unwrap_or(u32::MAX),
            draws_until_reset: bucket.draws_until_reset(),
            resets,
            record,
            cooldown,
        })))
    }
}
