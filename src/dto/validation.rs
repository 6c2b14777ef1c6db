//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted closer key.
pub const MAX_CLOSER_NAME_LEN: usize = 64;

/// Validates that a color is a `#rrggbb` hex triplet.
///
/// # Examples
///
/// ```ignore
/// validate_color("#1f77b4") // Ok
/// validate_color("#1F77B4") // Ok
/// validate_color("1f77b4")  // Err - missing hash
/// validate_color("#fff")    // Err - short form
/// ```
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    let Some(hex) = color.strip_prefix('#') else {
        let mut err = ValidationError::new("color_format");
        err.message = Some("Color must start with `#`".into());
        return Err(err);
    };

    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut err = ValidationError::new("color_format");
        err.message = Some(format!("Color must look like #rrggbb (got `{color}`)").into());
        return Err(err);
    }

    Ok(())
}

/// Validates a closer key: non-empty, no surrounding whitespace, no control characters.
pub fn validate_closer_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("closer_name_empty");
        err.message = Some("Closer name must not be empty".into());
        return Err(err);
    }

    if name.chars().count() > MAX_CLOSER_NAME_LEN {
        let mut err = ValidationError::new("closer_name_length");
        err.message =
            Some(format!("Closer name must be at most {MAX_CLOSER_NAME_LEN} characters").into());
        return Err(err);
    }

    if name.trim() != name || name.chars().any(char::is_control) {
        let mut err = ValidationError::new("closer_name_format");
        err.message = Some(
            "Closer name must not contain control characters or surrounding spaces".into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a free-form identifier contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}
