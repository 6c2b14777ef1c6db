use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closer definition persisted alongside the bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloserEntity {
    /// Human readable name shown to users.
    pub display_name: String,
    /// Hex color (`#rrggbb`) used by the admin views.
    pub color: String,
    /// Weight restored on every reset.
    pub default_weight: f64,
    /// Inactive closers keep their weight but receive no tickets.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Singleton bucket snapshot, including the roster it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketEntity {
    /// Roster keyed by closer name, in insertion order.
    pub closers: IndexMap<String, CloserEntity>,
    /// Current (possibly degraded) weight per closer.
    pub weights: IndexMap<String, f64>,
    /// Remaining tickets, one entry per ticket.
    pub tickets: Vec<String>,
    /// Draws performed since the last reset.
    pub draws_in_cycle: u32,
    /// Draw count per closer since the bucket was created.
    pub lifetime_stats: IndexMap<String, u64>,
    /// Number of draws after which the bucket resets.
    pub cycle_length: u32,
    /// Canonical UTC RFC 3339 timestamp of the last reset.
    pub last_reset: String,
}

/// Append-only record of one successful draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawRecordEntity {
    /// Stable identifier of the record.
    pub id: Uuid,
    /// User that requested the draw.
    pub user: String,
    /// Name of the closer that was drawn.
    pub closer_drawn: String,
    /// Kind of draw (selects the cooldown window).
    pub draw_kind: String,
    /// Optional free-form customer label supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_label: Option<String>,
    /// Tickets left in the bucket right after the pick.
    pub tickets_remaining_after: u32,
    /// Weight of the drawn closer right after degradation.
    pub weight_after: f64,
    /// Canonical UTC RFC 3339 timestamp of the draw.
    pub drawn_at: String,
}

/// Last draw performed by a user, upserted on every draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCooldownEntity {
    /// User the cooldown applies to.
    pub user: String,
    /// Timestamp of the last draw. Older rows may carry non-UTC encodings.
    pub last_draw_at: String,
    /// Closer drawn on the last draw.
    pub last_closer_drawn: String,
    /// Kind of the last draw.
    pub last_draw_kind: String,
    /// Customer label of the last draw, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_customer_label: Option<String>,
}
