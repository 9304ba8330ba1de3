//! # Geographic Utilities
//!
//! Pure geometry used by the snapping pipeline. Nothing here touches the network.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`is_valid_coordinate`] | Finite, in-range latitude/longitude check |
//! | [`validate_trace`] | Reject traces that are too short or contain invalid points |
//! | [`densify`] | Linear interpolation between consecutive points |
//! | [`dedupe_near`] | Collapse consecutive near-duplicates under a per-axis epsilon |
//! | [`clamp_steps_per_segment`] | Round and clamp the densification step count |
//! | [`clamp_dedupe_epsilon`] | Clamp the dedupe epsilon |
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`path_length_meters`] | Total length of a trace in meters |
//!
//! ## Example
//!
//! ```rust
//! use trace_snapper::{LatLngPoint, geo_utils};
//!
//! let trace = vec![LatLngPoint::new(0.0, 0.0), LatLngPoint::new(1.0, 1.0)];
//!
//! let dense = geo_utils::densify(&trace, 10);
//! assert_eq!(dense.len(), 11);
//! assert_eq!(dense[10], LatLngPoint::new(1.0, 1.0));
//!
//! let cleaned = geo_utils::dedupe_near(&dense, 0.5);
//! assert_eq!(cleaned.len(), 2);
//! ```
//!
//! ## Dedupe distance
//!
//! [`dedupe_near`] compares latitude and longitude independently rather than
//! measuring a Euclidean or great-circle distance. Snapped output of existing
//! clients depends on this, so it must stay per-axis.

use geo::{Distance, Haversine, Point};

use crate::error::ValidationError;
use crate::LatLngPoint;

/// Smallest and largest accepted densification step counts.
pub const MIN_STEPS_PER_SEGMENT: u32 = 1;
pub const MAX_STEPS_PER_SEGMENT: u32 = 100;
pub const DEFAULT_STEPS_PER_SEGMENT: u32 = 30;

/// Smallest and largest accepted dedupe epsilons, in degrees.
pub const MIN_DEDUPE_EPSILON: f64 = 0.000_001;
pub const MAX_DEDUPE_EPSILON: f64 = 0.01;
pub const DEFAULT_DEDUPE_EPSILON: f64 = 0.000_01;

/// Segment count above which densification is split across rayon workers.
#[cfg(feature = "parallel")]
const PARALLEL_MIN_SEGMENTS: usize = 1024;

// =============================================================================
// Validation
// =============================================================================

/// Check that a latitude/longitude pair is finite and inside WGS84 ranges.
#[inline]
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Validate a trace before any processing.
///
/// A trace needs at least two points and every point must pass
/// [`is_valid_coordinate`]. The first offending point is reported.
pub fn validate_trace(points: &[LatLngPoint]) -> Result<(), ValidationError> {
    if points.len() < 2 {
        return Err(ValidationError::TooFewPoints { count: points.len() });
    }
    match points.iter().position(|p| !p.is_valid()) {
        Some(index) => Err(ValidationError::InvalidPoint { index }),
        None => Ok(()),
    }
}

// =============================================================================
// Densification
// =============================================================================

/// Insert `steps_per_segment` linearly interpolated points per segment.
///
/// The first input point is emitted once; each consecutive pair `(from, to)`
/// then contributes the points at `t = step / steps_per_segment` for
/// `step = 1..=steps_per_segment`, the last of which is `to` itself.
/// Traces with fewer than two points are returned unchanged.
///
/// The step count is not clamped here; callers pass a value already run
/// through [`clamp_steps_per_segment`].
///
/// # Example
///
/// ```rust
/// use trace_snapper::{LatLngPoint, geo_utils};
///
/// let dense = geo_utils::densify(
///     &[LatLngPoint::new(0.0, 0.0), LatLngPoint::new(1.0, 1.0)],
///     10,
/// );
/// assert_eq!(dense.len(), 11);
/// assert_eq!(dense[5], LatLngPoint::new(0.5, 0.5));
/// ```
pub fn densify(points: &[LatLngPoint], steps_per_segment: u32) -> Vec<LatLngPoint> {
    if points.len() < 2 {
        return points.to_vec();
    }

    let segments = points.len() - 1;
    let mut dense = Vec::with_capacity(1 + segments * steps_per_segment as usize);
    dense.push(points[0]);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        if segments >= PARALLEL_MIN_SEGMENTS {
            // par_extend appends in segment order
            dense.par_extend(
                points
                    .par_windows(2)
                    .flat_map_iter(|w| interpolate_segment(w[0], w[1], steps_per_segment)),
            );
            return dense;
        }
    }

    for w in points.windows(2) {
        dense.extend(interpolate_segment(w[0], w[1], steps_per_segment));
    }
    dense
}

/// Points strictly after `from` up to and including `to`.
fn interpolate_segment(
    from: LatLngPoint,
    to: LatLngPoint,
    steps: u32,
) -> impl Iterator<Item = LatLngPoint> {
    (1..=steps).map(move |step| {
        let t = step as f64 / steps as f64;
        LatLngPoint {
            lat: from.lat + (to.lat - from.lat) * t,
            lng: from.lng + (to.lng - from.lng) * t,
        }
    })
}

// =============================================================================
// Deduplication
// =============================================================================

/// Collapse consecutive near-duplicate points.
///
/// The first point is always kept. Each later point is kept only when it
/// differs from the last *kept* point by more than `epsilon` on at least
/// one axis. Non-consecutive repeats (a path that loops back) are never
/// removed, so traversal order is preserved.
pub fn dedupe_near(points: &[LatLngPoint], epsilon: f64) -> Vec<LatLngPoint> {
    let mut result: Vec<LatLngPoint> = Vec::with_capacity(points.len());

    for &curr in points {
        match result.last() {
            Some(prev) => {
                let lat_diff = (curr.lat - prev.lat).abs();
                let lng_diff = (curr.lng - prev.lng).abs();
                if lat_diff > epsilon || lng_diff > epsilon {
                    result.push(curr);
                }
            }
            None => result.push(curr),
        }
    }

    result
}

// =============================================================================
// Parameter Clamping
// =============================================================================

/// Round a requested step count and clamp it to
/// `MIN_STEPS_PER_SEGMENT..=MAX_STEPS_PER_SEGMENT`.
///
/// Non-finite input falls back to [`DEFAULT_STEPS_PER_SEGMENT`].
pub fn clamp_steps_per_segment(requested: f64) -> u32 {
    if !requested.is_finite() {
        return DEFAULT_STEPS_PER_SEGMENT;
    }
    requested
        .round()
        .clamp(MIN_STEPS_PER_SEGMENT as f64, MAX_STEPS_PER_SEGMENT as f64) as u32
}

/// Clamp a dedupe epsilon to `MIN_DEDUPE_EPSILON..=MAX_DEDUPE_EPSILON`.
///
/// Non-finite input falls back to [`DEFAULT_DEDUPE_EPSILON`].
pub fn clamp_dedupe_epsilon(requested: f64) -> f64 {
    if !requested.is_finite() {
        return DEFAULT_DEDUPE_EPSILON;
    }
    requested.clamp(MIN_DEDUPE_EPSILON, MAX_DEDUPE_EPSILON)
}

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two points in meters.
#[inline]
pub fn haversine_distance(p1: &LatLngPoint, p2: &LatLngPoint) -> f64 {
    Haversine::distance(Point::from(*p1), Point::from(*p2))
}

/// Total length of a trace in meters. Empty or single-point traces return 0.0.
pub fn path_length_meters(points: &[LatLngPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lng: f64) -> LatLngPoint {
        LatLngPoint::new(lat, lng)
    }

    #[test]
    fn test_valid_coordinate_bounds() {
        assert!(is_valid_coordinate(90.0, 180.0));
        assert!(is_valid_coordinate(-90.0, -180.0));
        assert!(!is_valid_coordinate(95.0, 0.0));
        assert!(!is_valid_coordinate(0.0, -180.5));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
        assert!(!is_valid_coordinate(0.0, f64::INFINITY));
    }

    #[test]
    fn test_validate_trace() {
        assert_eq!(
            validate_trace(&[p(0.0, 0.0)]),
            Err(ValidationError::TooFewPoints { count: 1 })
        );
        assert_eq!(
            validate_trace(&[p(0.0, 0.0), p(95.0, 0.0), p(1.0, 1.0)]),
            Err(ValidationError::InvalidPoint { index: 1 })
        );
        assert_eq!(validate_trace(&[p(0.0, 0.0), p(1.0, 1.0)]), Ok(()));
    }

    #[test]
    fn test_densify_exact_count() {
        let dense = densify(&[p(0.0, 0.0), p(1.0, 1.0)], 10);
        assert_eq!(dense.len(), 11);
        assert_eq!(dense[0], p(0.0, 0.0));
        assert_eq!(dense[10], p(1.0, 1.0));
    }

    #[test]
    fn test_densify_shares_segment_endpoints() {
        let dense = densify(&[p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0)], 4);
        // 1 start + 4 per segment, with the middle vertex emitted exactly once
        assert_eq!(dense.len(), 9);
        assert_eq!(dense[4], p(0.0, 1.0));
        assert_eq!(dense[5], p(0.25, 1.0));
        assert_eq!(dense.iter().filter(|&&q| q == p(0.0, 1.0)).count(), 1);
    }

    #[test]
    fn test_densify_short_input_unchanged() {
        assert!(densify(&[], 10).is_empty());
        assert_eq!(densify(&[p(3.0, 4.0)], 10), vec![p(3.0, 4.0)]);
    }

    #[test]
    fn test_densify_single_step_is_identity() {
        let trace = vec![p(0.0, 0.0), p(0.5, 0.5), p(1.0, 0.0)];
        assert_eq!(densify(&trace, 1), trace);
    }

    #[test]
    fn test_dedupe_collapses_only_near_duplicates() {
        let points = vec![p(0.0, 0.0), p(0.0, 0.000_000_1), p(0.0, 1.0)];
        assert_eq!(dedupe_near(&points, 0.000_01), vec![p(0.0, 0.0), p(0.0, 1.0)]);
    }

    #[test]
    fn test_dedupe_is_per_axis() {
        // Euclidean distance exceeds epsilon but neither axis does
        let points = vec![p(0.0, 0.0), p(0.000_009, 0.000_009)];
        assert_eq!(dedupe_near(&points, 0.000_01).len(), 1);
    }

    #[test]
    fn test_dedupe_compares_against_last_kept() {
        // Slow drift: each step is small but the third point is far from the first
        let points = vec![p(0.0, 0.0), p(0.0, 0.000_006), p(0.0, 0.000_012)];
        assert_eq!(dedupe_near(&points, 0.000_01), vec![p(0.0, 0.0), p(0.0, 0.000_012)]);
    }

    #[test]
    fn test_dedupe_keeps_loop_back() {
        let points = vec![p(0.0, 0.0), p(0.0, 1.0), p(0.0, 0.0)];
        assert_eq!(dedupe_near(&points, 0.000_01), points);
    }

    #[test]
    fn test_dedupe_idempotent() {
        let dense = densify(&[p(0.0, 0.0), p(0.0001, 0.0001), p(0.0001, 0.0002)], 30);
        let once = dedupe_near(&dense, 0.000_01);
        let twice = dedupe_near(&once, 0.000_01);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dedupe_empty() {
        assert!(dedupe_near(&[], 0.000_01).is_empty());
    }

    #[test]
    fn test_clamp_steps() {
        assert_eq!(clamp_steps_per_segment(0.0), 1);
        assert_eq!(clamp_steps_per_segment(-5.0), 1);
        assert_eq!(clamp_steps_per_segment(12.6), 13);
        assert_eq!(clamp_steps_per_segment(1000.0), 100);
        assert_eq!(clamp_steps_per_segment(f64::NAN), DEFAULT_STEPS_PER_SEGMENT);
    }

    #[test]
    fn test_clamp_epsilon() {
        assert_eq!(clamp_dedupe_epsilon(0.0), MIN_DEDUPE_EPSILON);
        assert_eq!(clamp_dedupe_epsilon(1.0), MAX_DEDUPE_EPSILON);
        assert_eq!(clamp_dedupe_epsilon(0.0005), 0.0005);
        assert_eq!(clamp_dedupe_epsilon(f64::INFINITY), DEFAULT_DEDUPE_EPSILON);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_densify_matches_sequential() {
        let trace: Vec<LatLngPoint> = (0..2000)
            .map(|i| p(i as f64 * 0.0001, (i % 7) as f64 * 0.0001))
            .collect();
        let dense = densify(&trace, 3);
        let sequential: Vec<LatLngPoint> = std::iter::once(trace[0])
            .chain(trace.windows(2).flat_map(|w| interpolate_segment(w[0], w[1], 3)))
            .collect();
        assert_eq!(dense, sequential);
    }

    #[test]
    fn test_path_length() {
        assert_eq!(path_length_meters(&[p(51.5074, -0.1278)]), 0.0);
        let length = path_length_meters(&[p(51.5074, -0.1278), p(51.5080, -0.1280)]);
        assert!(length > 0.0 && length < 100.0); // about 68m
    }
}
