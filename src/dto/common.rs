use serde::Serialize;

use crate::state::roster::Closer;

/// Identity and display data of a closer.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CloserSummary {
    pub name: String,
    pub display_name: String,
    pub color: String,
}

impl From<&Closer> for CloserSummary {
    fn from(closer: &Closer) -> Self {
        Self {
            name: closer.name.clone(),
            display_name: closer.display_name.clone(),
            color: closer.color.clone(),
        }
    }
}

/// Full configuration of a closer as listed in the roster.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CloserView {
    pub name: String,
    pub display_name: String,
    pub color: String,
    pub default_weight: f64,
    pub active: bool,
}

impl From<&Closer> for CloserView {
    fn from(closer: &Closer) -> Self {
        Self {
            name: closer.name.clone(),
            display_name: closer.display_name.clone(),
            color: closer.color.clone(),
            default_weight: closer.default_weight,
            active: closer.active,
        }
    }
}

/// Fraction of `part` over `total`, zero when `total` is zero.
pub(crate) fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
