//! DTO definitions used by the administrative operations.

use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dto::validation::{validate_closer_name, validate_color};

/// Request to overwrite one closer's current weight.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetWeightRequest {
    #[validate(custom(function = "validate_closer_name"))]
    pub closer: String,
    pub weight: f64,
}

/// Request to change how many draws make up a cycle.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetCycleLengthRequest {
    #[validate(range(min = 1, max = 100))]
    pub cycle_length: u32,
}

fn default_active() -> bool {
    true
}

/// Request to register a new closer.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddCloserRequest {
    #[validate(custom(function = "validate_closer_name"))]
    pub name: String,
    #[validate(length(min = 1, max = 80))]
    pub display_name: String,
    #[validate(custom(function = "validate_color"))]
    pub color: String,
    pub default_weight: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Partial update of a closer's configuration. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateCloserRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub default_weight: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl UpdateCloserRequest {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.color.is_none()
            && self.default_weight.is_none()
            && self.active.is_none()
    }

    /// Whether applying the update changes who gets tickets.
    pub fn is_structural(&self) -> bool {
        self.default_weight.is_some() || self.active.is_some()
    }
}

impl Validate for UpdateCloserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref display_name) = self.display_name
            && (display_name.trim().is_empty() || display_name.chars().count() > 80)
        {
            let mut err = ValidationError::new("display_name_length");
            err.message = Some("Display name must hold 1 to 80 characters".into());
            errors.add("display_name", err);
        }

        if let Some(ref color) = self.color
            && let Err(err) = validate_color(color)
        {
            errors.add("color", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_closer_requires_hex_color() {
        let request: AddCloserRequest = serde_json::from_str(
            r#"{"name": "dora", "display_name": "Dora", "color": "red", "default_weight": 3}"#,
        )
        .unwrap();
        assert!(request.active);
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("color"));
    }

    #[test]
    fn cycle_length_is_bounded() {
        assert!(SetCycleLengthRequest { cycle_length: 0 }.validate().is_err());
        assert!(SetCycleLengthRequest { cycle_length: 1 }.validate().is_ok());
        assert!(SetCycleLengthRequest { cycle_length: 100 }.validate().is_ok());
        assert!(SetCycleLengthRequest { cycle_length: 101 }.validate().is_err());
    }

    #[test]
    fn update_validates_only_present_fields() {
        assert!(UpdateCloserRequest::default().validate().is_ok());
        assert!(UpdateCloserRequest::default().is_empty());

        let bad = UpdateCloserRequest {
            display_name: Some(" ".into()),
            color: Some("#12345".into()),
            ..Default::default()
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("display_name"));
        assert!(errors.field_errors().contains_key("color"));

        let structural = UpdateCloserRequest {
            active: Some(false),
            ..Default::default()
        };
        assert!(structural.is_structural());
    }
}
