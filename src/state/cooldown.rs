//! Per-user cooldown evaluation and the timestamp normalization it depends on.
//!
//! Stored timestamps come in several encodings (explicit offset, `Z` suffix,
//! no offset at all). Every one of them is normalized to a UTC instant before
//! comparison, and new timestamps are always written as UTC RFC 3339.

use std::{borrow::Cow, collections::HashMap};

use serde::Serialize;
use thiserror::Error;
use time::{
    Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};
use tracing::warn;

use crate::dao::models::UserCooldownEntity;

/// Encodings accepted for timestamps that carry no offset.
const NAIVE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
];

const OFFSET_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// Raised when a stored timestamp matches none of the accepted encodings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized timestamp `{raw}`")]
pub struct TimestampError {
    /// The offending input.
    pub raw: String,
}

/// Parse a stored timestamp into a UTC instant.
///
/// Offset-less values are interpreted in `reference_offset`.
pub fn parse_timestamp(
    raw: &str,
    reference_offset: UtcOffset,
) -> Result<OffsetDateTime, TimestampError> {
    let trimmed = raw.trim();
    let normalized: Cow<'_, str> = if trimmed.as_bytes().get(10) == Some(&b' ') {
        let mut owned = trimmed.to_owned();
        owned.replace_range(10..11, "T");
        Cow::Owned(owned)
    } else {
        Cow::Borrowed(trimmed)
    };

    if let Ok(parsed) = OffsetDateTime::parse(&normalized, &Rfc3339) {
        return Ok(parsed.to_offset(UtcOffset::UTC));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(&normalized, *format).ok())
        .map(|naive| naive.assume_offset(reference_offset).to_offset(UtcOffset::UTC))
        .ok_or_else(|| TimestampError {
            raw: raw.to_owned(),
        })
}

/// Parse a `+HH:MM` / `-HH:MM` offset; `Z` and `UTC` mean zero.
pub fn parse_offset(raw: &str) -> Result<UtcOffset, TimestampError> {
    match raw.trim() {
        "Z" | "z" | "UTC" | "utc" => Ok(UtcOffset::UTC),
        other => UtcOffset::parse(other, OFFSET_FORMAT).map_err(|_| TimestampError {
            raw: raw.to_owned(),
        }),
    }
}

/// Canonical representation written to every store.
pub fn format_timestamp(instant: OffsetDateTime) -> String {
    instant
        .to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Cooldown windows per draw kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownPolicy {
    default_window: Duration,
    windows: HashMap<String, Duration>,
    reference_offset: UtcOffset,
}

impl CooldownPolicy {
    pub fn new(
        default_window: Duration,
        windows: HashMap<String, Duration>,
        reference_offset: UtcOffset,
    ) -> Self {
        Self {
            default_window,
            windows,
            reference_offset,
        }
    }

    /// Window for `draw_kind`; unknown kinds use the default window.
    pub fn window_for(&self, draw_kind: &str) -> Duration {
        self.windows
            .get(draw_kind)
            .copied()
            .unwrap_or(self.default_window)
    }
}

/// Answer of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    /// Whether the user may draw now.
    pub allowed: bool,
    /// Whole seconds (rounded up) until the user may draw again.
    pub remaining_seconds: u64,
}

impl CooldownStatus {
    pub const ALLOWED: Self = Self {
        allowed: true,
        remaining_seconds: 0,
    };
}

/// Stateless cooldown evaluator. Never locks and never writes.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard<'a> {
    policy: &'a CooldownPolicy,
}

impl<'a> TimeoutGuard<'a> {
    pub fn new(policy: &'a CooldownPolicy) -> Self {
        Self { policy }
    }

    /// Evaluate whether a user whose last draw is `previous` may draw `draw_kind` at `now`.
    ///
    /// Unparseable timestamps fail open.
    pub fn check(
        &self,
        previous: Option<&UserCooldownEntity>,
        draw_kind: &str,
        now: OffsetDateTime,
    ) -> CooldownStatus {
        let Some(previous) = previous else {
            return CooldownStatus::ALLOWED;
        };

        let window = self.policy.window_for(draw_kind);
        if window <= Duration::ZERO {
            return CooldownStatus::ALLOWED;
        }

        let last_draw_at =
            match parse_timestamp(&previous.last_draw_at, self.policy.reference_offset) {
                Ok(instant) => instant,
                Err(err) => {
                    warn!(
                        user = %previous.user,
                        error = %err,
                        "ignoring unparseable last draw timestamp"
                    );
                    return CooldownStatus::ALLOWED;
                }
            };

        let elapsed = now - last_draw_at;
        if elapsed >= window {
            return CooldownStatus::ALLOWED;
        }

        // A timestamp in the future never blocks for longer than one window.
        let remaining = (window - elapsed).min(window);
        CooldownStatus {
            allowed: false,
            remaining_seconds: ceil_seconds(remaining),
        }
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let mut seconds = duration.whole_seconds();
    if duration.subsec_nanoseconds() > 0 {
        seconds += 1;
    }
    u64::try_from(seconds).unwrap_or(0)
}
