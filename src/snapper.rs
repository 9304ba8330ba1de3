//! # Trace Snapping
//!
//! Top-level policy for snapping a trace onto the road network.
//!
//! ## Algorithm
//! 1. Validate the trace (no request is made for an invalid one)
//! 2. Densify with `steps_per_segment` interpolated points per segment
//! 3. Map-match the dense trace as a whole
//! 4. If map-matching fails for any reason, discard it and snap every dense
//!    point to its nearest road, in order. A point whose lookup fails keeps
//!    its original coordinate
//! 5. Collapse consecutive near-duplicates
//!
//! The two strategies never mix within one trace and neither is retried.

use std::time::Instant;

use log::{debug, info, warn};

use crate::error::{MatchError, ValidationError};
use crate::geo_utils::{
    clamp_dedupe_epsilon, clamp_steps_per_segment, dedupe_near, densify, path_length_meters,
    validate_trace,
};
use crate::matching::match_trace;
use crate::nearest::snap_point_to_nearest_road;
use crate::transport::Transport;
use crate::{LatLngPoint, SnapConfig};

/// Which strategy produced the snapped points.
#[derive(Debug)]
pub enum SnapStrategy {
    MapMatched,
    /// Map-matching failed with `reason`; points come from nearest-road lookups.
    NearestRoad { reason: MatchError },
}

impl SnapStrategy {
    pub fn mode(&self) -> &'static str {
        match self {
            SnapStrategy::MapMatched => "map-matched",
            SnapStrategy::NearestRoad { .. } => "nearest-road",
        }
    }
}

/// A snapped trace.
#[derive(Debug)]
pub struct SnapResult {
    /// Road-aligned points in path order, after dedupe
    pub points: Vec<LatLngPoint>,
    pub strategy: SnapStrategy,
    /// Number of dense points that kept their original coordinate because
    /// the nearest-road lookup failed. Always 0 for `MapMatched`.
    pub degraded_points: usize,
    /// Length of the densified trace before snapping
    pub dense_count: usize,
}

/// Snaps traces using one transport for both routing services.
#[derive(Debug)]
pub struct TraceSnapper<T> {
    transport: T,
    config: SnapConfig,
}

impl<T: Transport> TraceSnapper<T> {
    /// The config is clamped on construction.
    pub fn new(transport: T, config: SnapConfig) -> Self {
        Self { transport, config: config.clamped() }
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Snap using the configured step count and epsilon.
    pub async fn snap_trace(&self, points: &[LatLngPoint]) -> Result<SnapResult, ValidationError> {
        self.snap_trace_to_road(points, self.config.steps_per_segment, self.config.dedupe_epsilon)
            .await
    }

    /// Snap a trace with explicit tuning. Both parameters are clamped.
    ///
    /// The only error is input validation; service failures degrade to the
    /// fallback strategy or to unsnapped points instead.
    pub async fn snap_trace_to_road(
        &self,
        points: &[LatLngPoint],
        steps_per_segment: u32,
        epsilon: f64,
    ) -> Result<SnapResult, ValidationError> {
        validate_trace(points)?;

        let steps = clamp_steps_per_segment(steps_per_segment as f64);
        let epsilon = clamp_dedupe_epsilon(epsilon);
        let start = Instant::now();

        let dense = densify(points, steps);
        info!(
            "[TraceSnapper] Snapping {} points ({} after densify, {} steps/segment)",
            points.len(),
            dense.len(),
            steps
        );

        let (snapped, strategy, degraded_points) =
            match match_trace(&self.transport, &self.config, &dense).await {
                Ok(matched) => (matched, SnapStrategy::MapMatched, 0),
                Err(reason) => {
                    warn!(
                        "[TraceSnapper] Map-matching failed ({}), falling back to nearest-road",
                        reason.code()
                    );
                    let (snapped, degraded) = self.snap_each_point(&dense).await;
                    (snapped, SnapStrategy::NearestRoad { reason }, degraded)
                }
            };

        let points_out = dedupe_near(&snapped, epsilon);

        info!(
            "[TraceSnapper] DONE via {}: {} -> {} points ({} degraded) in {:.2}s, {:.0}m",
            strategy.mode(),
            dense.len(),
            points_out.len(),
            degraded_points,
            start.elapsed().as_secs_f64(),
            path_length_meters(&points_out)
        );

        Ok(SnapResult {
            points: points_out,
            strategy,
            degraded_points,
            dense_count: dense.len(),
        })
    }

    /// Nearest-road snap for every point, sequentially and in order.
    /// Returns the snapped points and how many kept their input coordinate.
    async fn snap_each_point(&self, dense: &[LatLngPoint]) -> (Vec<LatLngPoint>, usize) {
        let mut snapped = Vec::with_capacity(dense.len());
        let mut degraded = 0;

        for (index, &point) in dense.iter().enumerate() {
            let base_url = &self.config.osrm_base_url;
            match snap_point_to_nearest_road(&self.transport, base_url, point).await {
                Ok(p) => snapped.push(p),
                Err(e) => {
                    debug!("[TraceSnapper] Point {} kept unsnapped: {}", index, e.code());
                    degraded += 1;
                    snapped.push(point);
                }
            }
        }

        (snapped, degraded)
    }
}
