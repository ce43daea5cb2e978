//! Data Sanitization
//!
//! Keeps values coming from storage or callers inside the ranges the
//! planning modules assume.

use crate::types::{DEFAULT_DIFFICULTY, DEFAULT_MASTERY};

/// True for NaN or infinite values.
pub fn is_invalid(value: f64) -> bool {
    value.is_nan() || value.is_infinite()
}

/// Clamp into [0, 1]; NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Difficulty in [0, 1], falling back to the default for invalid values
pub fn sanitize_difficulty(value: f64) -> f64 {
    if is_invalid(value) {
        DEFAULT_DIFFICULTY
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Mastery in [0, 1], treating invalid values as "not mastered"
pub fn sanitize_mastery(value: f64) -> f64 {
    if is_invalid(value) {
        DEFAULT_MASTERY
    } else {
        value.clamp(0.0, 1.0)
    }
}
