//! Validation helpers for DTOs.

use serde_json::Value;
use validator::ValidationError;

/// Longest accepted player identifier.
pub const MAX_PLAYER_ID_LEN: usize = 64;
/// Longest accepted display name, counted in characters after trimming.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Validates a player identifier issued by the identity provider.
///
/// # Examples
///
/// ```ignore
/// validate_player_id("user_42-a") // Ok
/// validate_player_id("")          // Err - empty
/// validate_player_id("a b")       // Err - whitespace
/// ```
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_PLAYER_ID_LEN {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!(
                "Player ID must be between 1 and {MAX_PLAYER_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some("Player ID may only contain letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a display name: not blank and at most [`MAX_DISPLAY_NAME_LEN`] characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        let mut err = ValidationError::new("display_name_length");
        err.message =
            Some(format!("Display name must be at most {MAX_DISPLAY_NAME_LEN} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Validates freeform stroke data: a non-empty JSON array.
pub fn validate_strokes(strokes: &Value) -> Result<(), ValidationError> {
    match strokes {
        Value::Array(items) if !items.is_empty() => Ok(()),
        _ => {
            let mut err = ValidationError::new("strokes_format");
            err.message = Some("Strokes must be a non-empty array".into());
            Err(err)
        }
    }
}
