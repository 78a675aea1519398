//! Utility functions for reidtrack.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::OnceLock;

use crate::{Error, Result};

/// Check that a named parameter is finite and within [0, 1].
pub fn validate_unit_interval(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidConfig(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

/// Check that a named parameter is finite and non-negative.
pub fn validate_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidConfig(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Log a warning message only once per process.
///
/// Subsequent calls with the same message are ignored.
pub fn warn_once(message: &str) {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    let mut guard = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.insert(message.to_string()) {
        log::warn!("{}", message);
    }
}

/// Largest even `u32`.
const MAX_EVEN_U32: u32 = u32::MAX - 1;

/// Round a non-negative length up to the next even integer.
///
/// Video encoders commonly require even frame dimensions. Lengths beyond the
/// `u32` range saturate to the largest even value.
pub fn ceil_to_even(value: f64) -> u32 {
    let even = (value.max(0.0).ceil() / 2.0).ceil() * 2.0;
    if even >= MAX_EVEN_U32 as f64 {
        MAX_EVEN_U32
    } else {
        even as u32
    }
}
