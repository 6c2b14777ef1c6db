//! The singleton bucket: weights, tickets, cycle counters and lifetime stats.

use indexmap::IndexMap;
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    dao::models::BucketEntity,
    state::{
        cooldown::{format_timestamp, parse_timestamp},
        phase::{BucketPhase, ResetReason},
        roster::{Closer, ClosersRegistry, RosterError},
    },
};

/// Tickets a closer receives for `weight`: `round(weight)` when positive, else none.
pub fn ticket_count(weight: f64) -> u32 {
    if weight.is_finite() && weight > 0.0 {
        weight.round() as u32
    } else {
        0
    }
}

/// Build the ticket multiset for the active closers of `roster`.
pub fn build_tickets(roster: &ClosersRegistry, weights: &IndexMap<String, f64>) -> Vec<String> {
    roster
        .iter()
        .filter(|closer| closer.active)
        .flat_map(|closer| {
            let weight = weights.get(&closer.name).copied().unwrap_or(0.0);
            std::iter::repeat_n(closer.name.clone(), ticket_count(weight) as usize)
        })
        .collect()
}

/// Reasons a persisted bucket cannot be turned back into a [`BucketState`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketDecodeError {
    #[error("persisted bucket has no closers")]
    EmptyRoster,
    #[error("persisted bucket references unknown closer `{0}`")]
    UnknownTicket(String),
    #[error("persisted bucket has an invalid last reset `{0}`")]
    InvalidLastReset(String),
    #[error("persisted bucket has a zero cycle length")]
    ZeroCycleLength,
}

/// In-memory snapshot of the bucket, mutated by one draw or one admin action at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketState {
    roster: ClosersRegistry,
    weights: IndexMap<String, f64>,
    tickets: Vec<String>,
    draws_in_cycle: u32,
    lifetime_stats: IndexMap<String, u64>,
    cycle_length: u32,
    last_reset: OffsetDateTime,
}

impl BucketState {
    /// Fresh bucket built from each closer's default weight.
    pub fn bootstrap(roster: ClosersRegistry, cycle_length: u32, now: OffsetDateTime) -> Self {
        let weights = default_weights(&roster);
        let lifetime_stats = roster.iter().map(|c| (c.name.clone(), 0)).collect();
        let tickets = build_tickets(&roster, &weights);
        Self {
            roster,
            weights,
            tickets,
            draws_in_cycle: 0,
            lifetime_stats,
            cycle_length: cycle_length.max(1),
            last_reset: now,
        }
    }

    pub fn roster(&self) -> &ClosersRegistry {
        &self.roster
    }

    pub fn weights(&self) -> &IndexMap<String, f64> {
        &self.weights
    }

    /// Current weight of `name`, zero when unknown.
    pub fn weight(&self, name: &str) -> f64 {
        self.weights.get(name).copied().unwrap_or(0.0)
    }

    pub fn tickets(&self) -> &[String] {
        &self.tickets
    }

    /// Ticket count per closer in roster order, including closers without tickets.
    pub fn ticket_counts(&self) -> IndexMap<String, u32> {
        let mut counts: IndexMap<String, u32> =
            self.roster.iter().map(|c| (c.name.clone(), 0)).collect();
        for ticket in &self.tickets {
            if let Some(count) = counts.get_mut(ticket) {
                *count += 1;
            }
        }
        counts
    }

    pub fn draws_in_cycle(&self) -> u32 {
        self.draws_in_cycle
    }

    pub fn lifetime_stats(&self) -> &IndexMap<String, u64> {
        &self.lifetime_stats
    }

    pub fn total_draws(&self) -> u64 {
        self.lifetime_stats.values().sum()
    }

    pub fn cycle_length(&self) -> u32 {
        self.cycle_length
    }

    pub fn last_reset(&self) -> OffsetDateTime {
        self.last_reset
    }

    pub fn phase(&self) -> BucketPhase {
        BucketPhase::classify(self.tickets.len(), self.draws_in_cycle, self.cycle_length)
    }

    /// Draws left before the cycle-length reset kicks in.
    pub fn draws_until_reset(&self) -> u32 {
        self.cycle_length.saturating_sub(self.draws_in_cycle)
    }

    /// Rebuild the tickets and start a new cycle.
    ///
    /// Default-restoring reasons put every weight back to its configured default first.
    pub fn reset(&mut self, reason: ResetReason, now: OffsetDateTime) {
        if reason.restores_defaults() {
            self.weights = default_weights(&self.roster);
        }
        self.tickets = build_tickets(&self.roster, &self.weights);
        self.draws_in_cycle = 0;
        self.last_reset = now;
    }

    /// Overwrite one closer's current weight. Tickets are untouched until the next reset.
    pub fn set_weight(&mut self, name: &str, value: f64) -> Result<(), RosterError> {
        let weight = self
            .weights
            .get_mut(name)
            .ok_or_else(|| RosterError::Unknown(name.to_owned()))?;
        *weight = value;
        Ok(())
    }

    pub fn set_cycle_length(&mut self, cycle_length: u32) {
        self.cycle_length = cycle_length.max(1);
    }

    /// Register a closer with its default weight and empty stats.
    pub fn add_closer(&mut self, closer: Closer) -> Result<(), RosterError> {
        let name = closer.name.clone();
        let default_weight = closer.default_weight;
        self.roster.insert(closer)?;
        self.weights.insert(name.clone(), default_weight);
        self.lifetime_stats.entry(name).or_insert(0);
        Ok(())
    }

    /// Drop a closer with its weight, stats and tickets.
    pub fn remove_closer(&mut self, name: &str) -> Result<Closer, RosterError> {
        let removed = self.roster.remove(name)?;
        self.weights.shift_remove(name);
        self.lifetime_stats.shift_remove(name);
        self.tickets.retain(|ticket| ticket != name);
        Ok(removed)
    }

    pub fn closer_mut(&mut self, name: &str) -> Option<&mut Closer> {
        self.roster.get_mut(name)
    }

    /// Remove the ticket at `index`, returning the closer it belonged to.
    pub(crate) fn take_ticket(&mut self, index: usize) -> Option<String> {
        (index < self.tickets.len()).then(|| self.tickets.remove(index))
    }

    /// Lower `name`'s weight by `step`, never below `floor`. Returns the new weight.
    pub(crate) fn degrade(&mut self, name: &str, step: f64, floor: f64) -> f64 {
        let weight = self.weights.entry(name.to_owned()).or_insert(0.0);
        *weight = (*weight - step).max(floor);
        *weight
    }

    pub(crate) fn record_pick(&mut self, name: &str) {
        self.draws_in_cycle = self.draws_in_cycle.saturating_add(1);
        *self.lifetime_stats.entry(name.to_owned()).or_insert(0) += 1;
    }
}

fn default_weights(roster: &ClosersRegistry) -> IndexMap<String, f64> {
    roster
        .iter()
        .map(|closer| (closer.name.clone(), closer.default_weight))
        .collect()
}

impl TryFrom<BucketEntity> for BucketState {
    type Error = BucketDecodeError;

    fn try_from(entity: BucketEntity) -> Result<Self, Self::Error> {
        if entity.closers.is_empty() {
            return Err(BucketDecodeError::EmptyRoster);
        }
        if entity.cycle_length == 0 {
            return Err(BucketDecodeError::ZeroCycleLength);
        }

        let last_reset = parse_timestamp(&entity.last_reset, UtcOffset::UTC)
            .map_err(|_| BucketDecodeError::InvalidLastReset(entity.last_reset.clone()))?;

        let roster = ClosersRegistry::new(entity.closers.into_iter().map(Closer::from));

        if let Some(unknown) = entity.tickets.iter().find(|t| !roster.contains(t)) {
            return Err(BucketDecodeError::UnknownTicket(unknown.clone()));
        }

        let weights = roster
            .iter()
            .map(|closer| {
                let weight = entity
                    .weights
                    .get(&closer.name)
                    .copied()
                    .unwrap_or(closer.default_weight);
                (closer.name.clone(), weight.max(0.0))
            })
            .collect();
        let lifetime_stats = roster
            .iter()
            .map(|closer| {
                let draws = entity.lifetime_stats.get(&closer.name).copied().unwrap_or(0);
                (closer.name.clone(), draws)
            })
            .collect();

        Ok(Self {
            roster,
            weights,
            tickets: entity.tickets,
            draws_in_cycle: entity.draws_in_cycle,
            lifetime_stats,
            cycle_length: entity.cycle_length,
            last_reset,
        })
    }
}

impl From<&BucketState> for BucketEntity {
    fn from(state: &BucketState) -> Self {
        Self {
            closers: state
                .roster
                .iter()
                .map(|closer| (closer.name.clone(), closer.into()))
                .collect(),
            weights: state.weights.clone(),
            tickets: state.tickets.clone(),
            draws_in_cycle: state.draws_in_cycle,
            lifetime_stats: state.lifetime_stats.clone(),
            cycle_length: state.cycle_length,
            last_reset: format_timestamp(state.last_reset),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn closer(name: &str, default_weight: f64) -> Closer {
        Closer {
            name: name.into(),
            display_name: name.to_uppercase(),
            color: "#336699".into(),
            default_weight,
            active: true,
        }
    }

    fn bucket() -> BucketState {
        BucketState::bootstrap(
            ClosersRegistry::new([
                closer("alpha", 9.0),
                closer("bravo", 9.0),
                closer("charlie", 2.0),
            ]),
            20,
            datetime!(2026-01-05 12:00 UTC),
        )
    }

    fn assert_tickets_match_weights(state: &BucketState) {
        let counts = state.ticket_counts();
        for closer in state.roster().iter() {
            let expected = if closer.active {
                ticket_count(state.weight(&closer.name))
            } else {
                0
            };
            assert_eq!(counts[&closer.name], expected, "{}", closer.name);
        }
        assert_eq!(counts.values().sum::<u32>() as usize, state.tickets().len());
    }

    #[test]
    fn ticket_count_rounds_positive_weights_only() {
        assert_eq!(ticket_count(9.0), 9);
        assert_eq!(ticket_count(2.5), 3);
        assert_eq!(ticket_count(2.49), 2);
        assert_eq!(ticket_count(0.4), 0);
        assert_eq!(ticket_count(0.0), 0);
        assert_eq!(ticket_count(-3.0), 0);
        assert_eq!(ticket_count(f64::NAN), 0);
    }

    #[test]
    fn bootstrap_builds_one_ticket_per_weight_unit() {
        let state = bucket();
        assert_eq!(state.tickets().len(), 20);
        assert_tickets_match_weights(&state);
        assert_eq!(state.phase(), BucketPhase::Active);
    }

    #[test]
    fn fractional_and_zero_weights_follow_the_rounding_rule() {
        let mut state = bucket();
        state.set_weight("alpha", 0.0).unwrap();
        state.set_weight("bravo", 3.5).unwrap();
        state.set_weight("charlie", 0.49).unwrap();
        state.reset(ResetReason::WeightChanged, datetime!(2026-01-05 13:00 UTC));

        assert_eq!(state.ticket_counts()["alpha"], 0);
        assert_eq!(state.ticket_counts()["bravo"], 4);
        assert_eq!(state.ticket_counts()["charlie"], 0);
        assert_tickets_match_weights(&state);
    }

    #[test]
    fn inactive_closers_get_no_tickets() {
        let mut state = bucket();
        state.closer_mut("alpha").unwrap().active = false;
        state.reset(ResetReason::RosterChanged, datetime!(2026-01-05 13:00 UTC));
        assert_eq!(state.ticket_counts()["alpha"], 0);
        assert_eq!(state.tickets().len(), 11);
        assert_tickets_match_weights(&state);
    }

    #[test]
    fn default_reset_discards_degraded_weights() {
        let mut state = bucket();
        state.degrade("alpha", 1.0, 0.0);
        state.degrade("alpha", 1.0, 0.0);
        state.record_pick("alpha");
        assert_eq!(state.weight("alpha"), 7.0);

        let now = datetime!(2026-01-05 14:00 UTC);
        state.reset(ResetReason::Manual, now);
        assert_eq!(state.weight("alpha"), 9.0);
        assert_eq!(state.draws_in_cycle(), 0);
        assert_eq!(state.last_reset(), now);
        assert_eq!(state.lifetime_stats()["alpha"], 1);
    }

    #[test]
    fn degrade_never_goes_below_floor() {
        let mut state = bucket();
        assert_eq!(state.degrade("charlie", 1.5, 0.0), 0.5);
        assert_eq!(state.degrade("charlie", 1.5, 0.0), 0.0);
        assert_eq!(state.degrade("charlie", 1.5, 0.0), 0.0);
    }

    #[test]
    fn removing_a_closer_drops_its_tickets_and_stats() {
        let mut state = bucket();
        state.remove_closer("charlie").unwrap();
        assert!(!state.tickets().iter().any(|t| t == "charlie"));
        assert!(!state.lifetime_stats().contains_key("charlie"));
        assert!(!state.weights().contains_key("charlie"));
    }

    #[test]
    fn entity_round_trip_preserves_the_snapshot() {
        let mut state = bucket();
        state.take_ticket(0);
        state.degrade("alpha", 1.0, 0.0);
        state.record_pick("alpha");

        let entity = BucketEntity::from(&state);
        assert_eq!(entity.last_reset, "2026-01-05T12:00:00Z");
        let restored = BucketState::try_from(entity).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn corrupt_entities_are_rejected() {
        let mut entity = BucketEntity::from(&bucket());
        entity.tickets.push("zulu".into());
        assert_eq!(
            BucketState::try_from(entity),
            Err(BucketDecodeError::UnknownTicket("zulu".into()))
        );

        let mut entity = BucketEntity::from(&bucket());
        entity.closers.clear();
        assert_eq!(
            BucketState::try_from(entity),
            Err(BucketDecodeError::EmptyRoster)
        );

        let mut entity = BucketEntity::from(&bucket());
        entity.last_reset = "soon".into();
        assert!(matches!(
            BucketState::try_from(entity),
            Err(BucketDecodeError::InvalidLastReset(_))
        ));
    }
}
