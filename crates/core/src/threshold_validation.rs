//! Shared range-checking helpers for scores, thresholds and lifts.

use crate::error::CoreError;

/// Validate that a value falls within `[0.0, 1.0]`.
///
/// Returns a `CoreError::Validation` naming the field if out of range.
pub fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a signed delta (e.g. an alignment lift) falls within `[-1.0, 1.0]`.
pub fn validate_signed_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between -1.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}
