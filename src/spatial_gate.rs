//! Loss-scaled spatial gating of re-acquisition candidates.
//!
//! A subject cannot move further than `base_speed` pixels per frame, so the
//! search radius grows with the number of frames it has been out of contact,
//! up to a hard cap.

/// Maximum plausible displacement after `frames_lost` unconfirmed frames.
///
/// # Arguments
/// * `base_speed` - Pixels per frame
/// * `frames_lost` - Consecutive frames without confirmation
/// * `cap` - Upper bound on the radius
#[inline]
pub fn max_radius(base_speed: f64, frames_lost: u32, cap: f64) -> f64 {
    (base_speed * frames_lost as f64).min(cap)
}

/// Whether two centers lie within `radius` of each other (inclusive).
#[inline]
pub fn within_radius(a: (f64, f64), b: (f64, f64), radius: f64) -> bool {
    gated_distance(a, b, radius).is_some()
}

/// Distance between two centers if it is within `radius` (inclusive),
/// `None` otherwise.
#[inline]
pub fn gated_distance(a: (f64, f64), b: (f64, f64), radius: f64) -> Option<f64> {
    let distance = center_distance(a, b);
    (distance <= radius).then_some(distance)
}

/// Euclidean distance between two points.
#[inline]
pub fn center_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Normalized closeness of a gated candidate, 1.0 at the center and 0.0 at
/// the edge of the radius.
///
/// A zero radius only admits candidates at distance zero, which score 1.0.
#[inline]
pub fn distance_score(distance: f64, radius: f64) -> f64 {
    if radius <= 0.0 {
        return 1.0;
    }
    (1.0 - distance / radius).clamp(0.0, 1.0)
}
