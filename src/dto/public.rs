use serde::Serialize;
use uuid::Uuid;

use crate::{
    dao::models::DrawRecordEntity,
    dto::common::{CloserView, share},
    state::{bucket::BucketState, cooldown::format_timestamp, phase::BucketPhase},
};

/// One closer's slice of the current bucket.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CloserComposition {
    pub name: String,
    pub display_name: String,
    pub color: String,
    pub active: bool,
    pub weight: f64,
    pub default_weight: f64,
    pub tickets: u32,
    /// Probability of being drawn next.
    pub share: f64,
}

/// Inspectable view of the ticket multiset.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CompositionResponse {
    pub phase: BucketPhase,
    pub total_tickets: u32,
    pub draws_in_cycle: u32,
    pub cycle_length: u32,
    pub draws_until_reset: u32,
    pub last_reset: String,
    pub closers: Vec<CloserComposition>,
}

impl From<&BucketState> for CompositionResponse {
    fn from(bucket: &BucketState) -> Self {
        let counts = bucket.ticket_counts();
        let total: u32 = counts.values().sum();
        let closers = bucket
            .roster()
            .iter()
            .map(|closer| {
                let tickets = counts.get(&closer.name).copied().unwrap_or(0);
                CloserComposition {
                    name: closer.name.clone(),
                    display_name: closer.display_name.clone(),
                    color: closer.color.clone(),
                    active: closer.active,
                    weight: bucket.weight(&closer.name),
                    default_weight: closer.default_weight,
                    tickets,
                    share: share(tickets.into(), total.into()),
                }
            })
            .collect();

        Self {
            phase: bucket.phase(),
            total_tickets: total,
            draws_in_cycle: bucket.draws_in_cycle(),
            cycle_length: bucket.cycle_length(),
            draws_until_reset: bucket.draws_until_reset(),
            last_reset: format_timestamp(bucket.last_reset()),
            closers,
        }
    }
}

/// Response payload listing the configured closers.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RosterResponse {
    pub closers: Vec<CloserView>,
}

impl From<&BucketState> for RosterResponse {
    fn from(bucket: &BucketState) -> Self {
        Self {
            closers: bucket.roster().iter().map(CloserView::from).collect(),
        }
    }
}

/// Lifetime draw count of one closer.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CloserStats {
    pub name: String,
    pub display_name: String,
    pub lifetime_draws: u64,
    pub share: f64,
}

/// Lifetime statistics of the bucket.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StatsResponse {
    pub total_draws: u64,
    pub draws_in_cycle: u32,
    pub cycle_length: u32,
    pub last_reset: String,
    pub closers: Vec<CloserStats>,
}

impl From<&BucketState> for StatsResponse {
    fn from(bucket: &BucketState) -> Self {
        let total = bucket.total_draws();
        let closers = bucket
            .roster()
            .iter()
            .map(|closer| {
                let lifetime_draws = bucket
                    .lifetime_stats()
                    .get(&closer.name)
                    .copied()
                    .unwrap_or(0);
                CloserStats {
                    name: closer.name.clone(),
                    display_name: closer.display_name.clone(),
                    lifetime_draws,
                    share: share(lifetime_draws, total),
                }
            })
            .collect();

        Self {
            total_draws: total,
            draws_in_cycle: bucket.draws_in_cycle(),
            cycle_length: bucket.cycle_length(),
            last_reset: format_timestamp(bucket.last_reset()),
            closers,
        }
    }
}

/// One entry of the draw history.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DrawRecordView {
    pub id: Uuid,
    pub user: String,
    pub closer: String,
    pub draw_kind: String,
    pub customer_label: Option<String>,
    pub tickets_remaining_after: u32,
    pub weight_after: f64,
    pub drawn_at: String,
}

impl From<DrawRecordEntity> for DrawRecordView {
    fn from(record: DrawRecordEntity) -> Self {
        Self {
            id: record.id,
            user: record.user,
            closer: record.closer_drawn,
            draw_kind: record.draw_kind,
            customer_label: record.customer_label,
            tickets_remaining_after: record.tickets_remaining_after,
            weight_after: record.weight_after,
            drawn_at: record.drawn_at,
        }
    }
}

/// Most recent draws, newest first.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RecentDrawsResponse {
    pub draws: Vec<DrawRecordView>,
}
