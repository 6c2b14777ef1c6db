//! Payloads of the draw and cooldown operations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        common::CloserSummary,
        validation::{validate_closer_name, validate_not_blank},
    },
    state::{
        draw_engine::{DrawOutcome, DrawTicket},
        phase::ResetReason,
    },
};

/// Draw kind used when the caller does not name one.
pub const DEFAULT_DRAW_KIND: &str = "lead";

fn default_draw_kind() -> String {
    DEFAULT_DRAW_KIND.into()
}

/// Request to draw a closer for `user`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DrawRequest {
    #[validate(custom(function = "validate_not_blank"), length(max = 120))]
    pub user: String,
    #[serde(default = "default_draw_kind")]
    #[validate(custom(function = "validate_closer_name"))]
    pub draw_kind: String,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub customer_label: Option<String>,
}

impl DrawRequest {
    pub fn new(user: impl Into<String>, draw_kind: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            draw_kind: draw_kind.into(),
            customer_label: None,
        }
    }

    pub fn with_customer_label(mut self, label: impl Into<String>) -> Self {
        self.customer_label = Some(label.into());
        self
    }

    pub(crate) fn ticket(&self) -> DrawTicket<'_> {
        DrawTicket {
            user: self.user.trim(),
            draw_kind: &self.draw_kind,
            customer_label: self
                .customer_label
                .as_deref()
                .map(str::trim)
                .filter(|label| !label.is_empty()),
        }
    }
}

/// Outcome of a draw as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrawResponse {
    /// A closer was assigned.
    Drawn {
        draw_id: Uuid,
        closer: CloserSummary,
        weight_after: f64,
        tickets_remaining: u32,
        draws_until_reset: u32,
        resets: Vec<ResetReason>,
        drawn_at: String,
    },
    /// The user must wait before drawing again.
    CoolingDown { remaining_seconds: u64 },
}

impl From<DrawOutcome> for DrawResponse {
    fn from(outcome: DrawOutcome) -> Self {
        match outcome {
            DrawOutcome::CoolingDown { remaining_seconds } => {
                DrawResponse::CoolingDown { remaining_seconds }
            }
            DrawOutcome::Drawn(drawn) => {
                let drawn = *drawn;
                DrawResponse::Drawn {
                    draw_id: drawn.record.id,
                    closer: CloserSummary::from(&drawn.closer),
                    weight_after: drawn.weight_after,
                    tickets_remaining: drawn.tickets_remaining,
                    draws_until_reset: drawn.draws_until_reset,
                    resets: drawn.resets,
                    drawn_at: drawn.record.drawn_at,
                }
            }
        }
    }
}

/// Request to check whether `user` may draw `draw_kind` now.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CooldownRequest {
    #[validate(custom(function = "validate_not_blank"), length(max = 120))]
    pub user: String,
    #[serde(default = "default_draw_kind")]
    #[validate(custom(function = "validate_closer_name"))]
    pub draw_kind: String,
}

impl CooldownRequest {
    pub fn new(user: impl Into<String>, draw_kind: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            draw_kind: draw_kind.into(),
        }
    }
}

/// Cooldown answer for one user and draw kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CooldownResponse {
    pub user: String,
    pub draw_kind: String,
    pub allowed: bool,
    pub remaining_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_request_defaults_kind_and_validates() {
        let request: DrawRequest = serde_json::from_str(r#"{"user": "maria"}"#).unwrap();
        assert_eq!(request.draw_kind, DEFAULT_DRAW_KIND);
        assert!(request.validate().is_ok());

        let blank = DrawRequest::new("  ", "lead");
        assert!(blank.validate().is_err());

        let long_label = DrawRequest::new("maria", "lead").with_customer_label("x".repeat(121));
        assert!(long_label.validate().is_err());
    }

    #[test]
    fn ticket_drops_empty_labels() {
        let request = DrawRequest::new(" maria ", "lead").with_customer_label("   ");
        let ticket = request.ticket();
        assert_eq!(ticket.user, "maria");
        assert_eq!(ticket.customer_label, None);
    }

    #[test]
    fn cooling_down_serializes_with_status_tag() {
        let json = serde_json::to_value(DrawResponse::CoolingDown {
            remaining_seconds: 12,
        })
        .unwrap();
        assert_eq!(json["status"], "cooling_down");
        assert_eq!(json["remaining_seconds"], 12);
    }
}
