use serde::Serialize;

/// Phase of the current cycle, derived from the bucket counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketPhase {
    /// Tickets remain and the cycle limit has not been reached.
    Active,
    /// Every ticket has been drawn.
    Empty,
    /// The cycle reached its configured length.
    CycleLimit,
}

/// Why the bucket was rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    /// The bucket was empty when a draw arrived.
    Exhausted,
    /// The cycle reached its configured length.
    CycleLimit,
    /// An administrator restored the defaults.
    Manual,
    /// An administrator changed one closer's weight.
    WeightChanged,
    /// An administrator resized the cycle.
    CycleResized,
    /// The roster gained, lost, or reconfigured a closer.
    RosterChanged,
}

impl BucketPhase {
    /// Classify a bucket from its remaining tickets and cycle counters.
    ///
    /// An empty bucket wins over a reached cycle limit.
    pub fn classify(tickets: usize, draws_in_cycle: u32, cycle_length: u32) -> Self {
        if tickets == 0 {
            BucketPhase::Empty
        } else if draws_in_cycle >= cycle_length {
            BucketPhase::CycleLimit
        } else {
            BucketPhase::Active
        }
    }

    /// Reset owed by this phase before the next draw can happen.
    pub fn pending_reset(self) -> Option<ResetReason> {
        match self {
            BucketPhase::Active => None,
            BucketPhase::Empty => Some(ResetReason::Exhausted),
            BucketPhase::CycleLimit => Some(ResetReason::CycleLimit),
        }
    }
}

impl ResetReason {
    /// Whether the reset restores configured defaults rather than current weights.
    pub fn restores_defaults(self) -> bool {
        !matches!(self, ResetReason::WeightChanged | ResetReason::RosterChanged)
    }
}
