//! # Trace Snapper
//!
//! Road-snapping for recorded GPS traces.
//!
//! This library provides:
//! - Geometry helpers: validation, densification and near-duplicate collapsing
//! - Whole-trace map-matching against a Mapbox-compatible matching API
//! - Per-point nearest-road snapping against an OSRM-compatible API
//! - An orchestrator that prefers map-matching and falls back to nearest-road
//!
//! Point order is preserved end to end: the output is the same path as the
//! input, adjusted onto routable roads.
//!
//! ## Features
//!
//! - **`http`** - Enable the reqwest-backed [`Transport`]
//! - **`parallel`** - Densify very long traces with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "http")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use trace_snapper::{LatLngPoint, ReqwestTransport, SnapConfig, TraceSnapper};
//!
//! let config = SnapConfig::from_env();
//! let transport = ReqwestTransport::new(&config)?;
//! let snapper = TraceSnapper::new(transport, config);
//!
//! let trace = vec![
//!     LatLngPoint::new(51.5074, -0.1278),
//!     LatLngPoint::new(51.5080, -0.1290),
//! ];
//!
//! let result = snapper.snap_trace(&trace).await?;
//! println!("{} points via {}", result.points.len(), result.strategy.mode());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{MatchError, NearestError, RequestError, TransportError, ValidationError};

pub mod geo_utils;

pub mod transport;
#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
pub use transport::{Transport, TransportResponse};

pub mod nearest;
pub use nearest::snap_point_to_nearest_road;

pub mod matching;
pub use matching::match_trace;

pub mod snapper;
pub use snapper::{SnapResult, SnapStrategy, TraceSnapper};

pub mod request;
pub use request::{handle_snap_request, SnapRequest, SnapResponse};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TraceSnapperRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate. Serializes as `{"lat": .., "lng": ..}`.
///
/// # Example
/// ```
/// use trace_snapper::LatLngPoint;
/// let point = LatLngPoint::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LatLngPoint {
    pub lat: f64,
    pub lng: f64,
}

impl LatLngPoint {
    /// Create a new point.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has finite, in-range coordinates.
    pub fn is_valid(&self) -> bool {
        geo_utils::is_valid_coordinate(self.lat, self.lng)
    }

    /// Build a point from a `[lng, lat]` pair as used on the wire.
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self { lat: pair[1], lng: pair[0] }
    }
}

impl From<LatLngPoint> for geo::Point<f64> {
    fn from(p: LatLngPoint) -> Self {
        geo::Point::new(p.lng, p.lat)
    }
}

impl From<geo::Point<f64>> for LatLngPoint {
    fn from(p: geo::Point<f64>) -> Self {
        Self { lat: p.y(), lng: p.x() }
    }
}

/// Configuration for trace snapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapConfig {
    /// Interpolated points inserted per input segment before matching.
    /// Clamped to 1..=100. Default: 30
    pub steps_per_segment: u32,

    /// Per-axis threshold (degrees) under which consecutive output points are collapsed.
    /// Clamped to 1e-6..=1e-2. Default: 1e-5 (~1 meter)
    pub dedupe_epsilon: f64,

    /// Most coordinates the map-matching service accepts per request.
    /// Default: 100
    pub max_coords_per_request: usize,

    /// Base URL of the OSRM-compatible nearest-road service.
    pub osrm_base_url: String,

    /// Base URL of the Mapbox-compatible map-matching service.
    pub mapbox_base_url: String,

    /// Access token for map-matching. Without it every trace goes to nearest-road.
    pub mapbox_access_token: Option<String>,

    /// Per-request timeout for the HTTP transport, in seconds.
    /// Default: 30
    pub request_timeout_secs: u64,
}

pub const DEFAULT_OSRM_BASE_URL: &str = "https://router.project-osrm.org";
pub const DEFAULT_MAPBOX_BASE_URL: &str = "https://api.mapbox.com";
pub const DEFAULT_MAX_COORDS_PER_REQUEST: usize = 100;

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            steps_per_segment: geo_utils::DEFAULT_STEPS_PER_SEGMENT,
            dedupe_epsilon: geo_utils::DEFAULT_DEDUPE_EPSILON,
            max_coords_per_request: DEFAULT_MAX_COORDS_PER_REQUEST,
            osrm_base_url: DEFAULT_OSRM_BASE_URL.to_string(),
            mapbox_base_url: DEFAULT_MAPBOX_BASE_URL.to_string(),
            mapbox_access_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl SnapConfig {
    /// Defaults overridden by `MAPBOX_ACCESS_TOKEN`, `OSRM_BASE_URL` and
    /// `MAPBOX_BASE_URL`. Blank values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();
        Self {
            mapbox_access_token: read("MAPBOX_ACCESS_TOKEN"),
            osrm_base_url: read("OSRM_BASE_URL").unwrap_or(defaults.osrm_base_url),
            mapbox_base_url: read("MAPBOX_BASE_URL").unwrap_or(defaults.mapbox_base_url),
            ..Self::default()
        }
    }

    /// Copy with the tunables forced into their safe ranges.
    pub fn clamped(&self) -> Self {
        Self {
            steps_per_segment: geo_utils::clamp_steps_per_segment(self.steps_per_segment as f64),
            dedupe_epsilon: geo_utils::clamp_dedupe_epsilon(self.dedupe_epsilon),
            max_coords_per_request: self.max_coords_per_request.max(2),
            ..self.clone()
        }
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{info, warn};

    /// Outcome of a snap call across the FFI boundary.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiSnapResult {
        pub success: bool,
        pub mode: Option<String>,
        pub points: Vec<LatLngPoint>,
        pub error: Option<String>,
    }

    impl FfiSnapResult {
        fn failed(error: String) -> Self {
            Self { success: false, mode: None, points: Vec::new(), error: Some(error) }
        }
    }

    /// Snap a trace to roads. Blocks on an internal tokio runtime.
    ///
    /// Credentials and service URLs come from the environment.
    #[uniffi::export]
    pub fn ffi_snap_trace(
        points: Vec<LatLngPoint>,
        steps_per_segment: f64,
        dedupe_epsilon: f64,
    ) -> FfiSnapResult {
        init_logging();
        info!("[TraceSnapperRust] ffi_snap_trace called with {} points", points.len());

        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Failed to create tokio runtime: {}", e);
                return FfiSnapResult::failed(format!("Runtime error: {}", e));
            }
        };

        let config = SnapConfig::from_env();
        let transport = match ReqwestTransport::new(&config) {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to create transport: {}", e);
                return FfiSnapResult::failed(e.to_string());
            }
        };
        let snapper = TraceSnapper::new(transport, config);

        let steps = geo_utils::clamp_steps_per_segment(steps_per_segment);
        let epsilon = geo_utils::clamp_dedupe_epsilon(dedupe_epsilon);

        match rt.block_on(snapper.snap_trace_to_road(&points, steps, epsilon)) {
            Ok(result) => FfiSnapResult {
                success: true,
                mode: Some(result.strategy.mode().to_string()),
                points: result.points,
                error: None,
            },
            Err(e) => FfiSnapResult::failed(e.code().to_string()),
        }
    }

    /// Get default snapping parameters as `(steps_per_segment, dedupe_epsilon)`.
    #[uniffi::export]
    pub fn default_snap_parameters() -> Vec<f64> {
        let config = SnapConfig::default();
        vec![config.steps_per_segment as f64, config.dedupe_epsilon]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_point_validation() {
        assert!(LatLngPoint::new(51.5074, -0.1278).is_valid());
        assert!(!LatLngPoint::new(95.0, 0.0).is_valid());
        assert!(!LatLngPoint::new(0.0, 181.0).is_valid());
        assert!(!LatLngPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_point_wire_order() {
        let p = LatLngPoint::from_lng_lat([-0.1278, 51.5074]);
        assert_eq!(p, LatLngPoint::new(51.5074, -0.1278));

        let geo_point: geo::Point<f64> = p.into();
        assert_eq!(geo_point.x(), -0.1278);
        assert_eq!(LatLngPoint::from(geo_point), p);
    }

    #[test]
    fn test_point_json_shape() {
        let json = serde_json::to_value(LatLngPoint::new(1.5, 2.5)).unwrap();
        assert_eq!(json, serde_json::json!({ "lat": 1.5, "lng": 2.5 }));
    }

    #[test]
    fn test_config_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("MAPBOX_ACCESS_TOKEN", "  pk.test  "),
            ("OSRM_BASE_URL", "http://localhost:5000"),
            ("MAPBOX_BASE_URL", "   "),
        ]
        .into_iter()
        .collect();

        let config = SnapConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.mapbox_access_token.as_deref(), Some("pk.test"));
        assert_eq!(config.osrm_base_url, "http://localhost:5000");
        assert_eq!(config.mapbox_base_url, DEFAULT_MAPBOX_BASE_URL);
    }

    #[test]
    fn test_config_blank_token_is_absent() {
        let config = SnapConfig::from_lookup(|k| {
            (k == "MAPBOX_ACCESS_TOKEN").then(|| " ".to_string())
        });
        assert!(config.mapbox_access_token.is_none());
    }

    #[test]
    fn test_config_clamped() {
        let config = SnapConfig {
            steps_per_segment: 500,
            dedupe_epsilon: 0.0,
            max_coords_per_request: 0,
            ..SnapConfig::default()
        }
        .clamped();
        assert_eq!(config.steps_per_segment, 100);
        assert_eq!(config.dedupe_epsilon, geo_utils::MIN_DEDUPE_EPSILON);
        assert_eq!(config.max_coords_per_request, 2);
    }
}
