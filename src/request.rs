//! JSON boundary for the snap endpoint.
//!
//! Request body:
//!
//! ```json
//! {
//!   "points": [{ "lat": 51.5, "lng": -0.12 }, ...],
//!   "steps_per_segment": 30,
//!   "dedupe_epsilon": 0.00001
//! }
//! ```
//!
//! Both tuning fields are optional; missing or non-numeric values use the
//! defaults, and every value is clamped. Parsing happens before any request
//! to a routing service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;
use crate::geo_utils::{
    clamp_dedupe_epsilon, clamp_steps_per_segment, DEFAULT_DEDUPE_EPSILON,
    DEFAULT_STEPS_PER_SEGMENT,
};
use crate::snapper::TraceSnapper;
use crate::transport::Transport;
use crate::LatLngPoint;

#[derive(Debug, Deserialize)]
struct RawSnapRequest {
    points: Option<Value>,
    steps_per_segment: Option<Value>,
    dedupe_epsilon: Option<Value>,
}

/// A validated snap request.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapRequest {
    pub points: Vec<LatLngPoint>,
    pub steps_per_segment: u32,
    pub dedupe_epsilon: f64,
}

impl SnapRequest {
    /// Parse and validate a request body.
    ///
    /// # Example
    /// ```
    /// use trace_snapper::{RequestError, SnapRequest};
    ///
    /// let body = br#"{"points":[{"lat":0,"lng":0},{"lat":1,"lng":1}],"steps_per_segment":500}"#;
    /// let req = SnapRequest::from_json(body).unwrap();
    /// assert_eq!(req.steps_per_segment, 100);
    ///
    /// let err = SnapRequest::from_json(br#"{"points":[{"lat":0,"lng":0}]}"#).unwrap_err();
    /// assert_eq!(err, RequestError::MinTwoPointsRequired);
    /// ```
    pub fn from_json(body: &[u8]) -> Result<Self, RequestError> {
        // Only a JSON object is a request; serde would also accept the fields as an array.
        let value: Value = serde_json::from_slice(body).map_err(|_| RequestError::InvalidBody)?;
        if !value.is_object() {
            return Err(RequestError::InvalidBody);
        }
        let raw: RawSnapRequest =
            serde_json::from_value(value).map_err(|_| RequestError::InvalidBody)?;
        let items = match raw.points {
            Some(Value::Array(items)) => items,
            _ => return Err(RequestError::InvalidBody),
        };

        let points: Vec<LatLngPoint> = items.iter().filter_map(parse_point).collect();
        if points.len() < 2 {
            return Err(RequestError::MinTwoPointsRequired);
        }
        if points.len() != items.len() {
            return Err(RequestError::InvalidPointsFormat);
        }

        let steps = number_or(raw.steps_per_segment.as_ref(), DEFAULT_STEPS_PER_SEGMENT as f64);
        let epsilon = number_or(raw.dedupe_epsilon.as_ref(), DEFAULT_DEDUPE_EPSILON);

        Ok(Self {
            points,
            steps_per_segment: clamp_steps_per_segment(steps),
            dedupe_epsilon: clamp_dedupe_epsilon(epsilon),
        })
    }
}

/// An object with finite, in-range numeric `lat` and `lng`.
fn parse_point(value: &Value) -> Option<LatLngPoint> {
    let obj = value.as_object()?;
    let lat = obj.get("lat")?.as_f64()?;
    let lng = obj.get("lng")?.as_f64()?;
    let point = LatLngPoint::new(lat, lng);
    point.is_valid().then_some(point)
}

fn number_or(value: Option<&Value>, fallback: f64) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
}

/// Response body of the snap endpoint.
///
/// `mode` names the strategy that produced the points: `"map-matched"` or
/// `"nearest-road"`. It replaces the fixed `"strict-user-order-nearest-snap"`
/// value earlier clients received, which did not say whether map matching
/// ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SnapResponse {
    Snapped {
        ok: bool,
        mode: String,
        input_count: usize,
        output_count: usize,
        points: Vec<LatLngPoint>,
    },
    Rejected {
        ok: bool,
        error: String,
    },
}

impl SnapResponse {
    fn rejected(error: &str) -> Self {
        SnapResponse::Rejected { ok: false, error: error.to_string() }
    }
}

/// Parse, snap and build the response. Returns the HTTP status with the body.
///
/// Malformed requests get 400 without touching the transport; every parsed
/// request gets 200, whichever strategy produced the points.
pub async fn handle_snap_request<T: Transport>(
    snapper: &TraceSnapper<T>,
    body: &[u8],
) -> (u16, SnapResponse) {
    let request = match SnapRequest::from_json(body) {
        Ok(r) => r,
        Err(e) => return (400, SnapResponse::rejected(e.code())),
    };

    match snapper
        .snap_trace_to_road(&request.points, request.steps_per_segment, request.dedupe_epsilon)
        .await
    {
        Ok(result) => (
            200,
            SnapResponse::Snapped {
                ok: true,
                mode: result.strategy.mode().to_string(),
                input_count: request.points.len(),
                output_count: result.points.len(),
                points: result.points,
            },
        ),
        Err(e) => (400, SnapResponse::rejected(e.code())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{json, path_coords, MockTransport};
    use crate::SnapConfig;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    fn two_points() -> Value {
        json!([{ "lat": 10.0, "lng": 20.0 }, { "lat": 10.0, "lng": 21.0 }])
    }

    #[test]
    fn test_defaults_when_tuning_missing() {
        let req = SnapRequest::from_json(&body(json!({ "points": two_points() }))).unwrap();
        assert_eq!(req.steps_per_segment, 30);
        assert_eq!(req.dedupe_epsilon, 0.000_01);
        assert_eq!(req.points[1], LatLngPoint::new(10.0, 21.0));
    }

    #[test]
    fn test_tuning_is_rounded_and_clamped() {
        let req = SnapRequest::from_json(&body(json!({
            "points": two_points(),
            "steps_per_segment": 7.6,
            "dedupe_epsilon": 5
        })))
        .unwrap();
        assert_eq!(req.steps_per_segment, 8);
        assert_eq!(req.dedupe_epsilon, 0.01);

        let req = SnapRequest::from_json(&body(json!({
            "points": two_points(),
            "steps_per_segment": "lots",
            "dedupe_epsilon": null
        })))
        .unwrap();
        assert_eq!(req.steps_per_segment, 30);
        assert_eq!(req.dedupe_epsilon, 0.000_01);
    }

    #[test]
    fn test_invalid_body() {
        for raw in [&b"not json"[..], b"null", b"[]", br#"{"points": {}}"#, br#"{}"#] {
            assert_eq!(SnapRequest::from_json(raw), Err(RequestError::InvalidBody));
        }
    }

    #[test]
    fn test_array_body_is_rejected() {
        // Positional form of the request fields
        let raw = body(json!([two_points(), 30, null]));
        assert_eq!(SnapRequest::from_json(&raw), Err(RequestError::InvalidBody));

        let raw = br#"[[{"lat":0,"lng":0},{"lat":1,"lng":1}],null,null]"#;
        assert_eq!(SnapRequest::from_json(raw), Err(RequestError::InvalidBody));
    }

    #[test]
    fn test_too_few_valid_points() {
        let err = SnapRequest::from_json(&body(json!({
            "points": [{ "lat": 1.0, "lng": 1.0 }, { "lat": 95.0, "lng": 1.0 }]
        })))
        .unwrap_err();
        assert_eq!(err, RequestError::MinTwoPointsRequired);
    }

    #[test]
    fn test_any_invalid_point_rejects() {
        let err = SnapRequest::from_json(&body(json!({
            "points": [
                { "lat": 1.0, "lng": 1.0 },
                { "lat": "2", "lng": 1.0 },
                { "lat": 3.0, "lng": 1.0 }
            ]
        })))
        .unwrap_err();
        assert_eq!(err, RequestError::InvalidPointsFormat);
    }

    #[tokio::test]
    async fn test_rejected_request_makes_no_calls() {
        let snapper = TraceSnapper::new(MockTransport::unreachable(), SnapConfig::default());
        let (status, response) = handle_snap_request(
            &snapper,
            &body(json!({ "points": [
                { "lat": 95.0, "lng": 0.0 },
                { "lat": 0.0, "lng": 0.0 },
                { "lat": 1.0, "lng": 0.0 }
            ] })),
        )
        .await;

        assert_eq!(status, 400);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "ok": false, "error": "INVALID_POINTS_FORMAT" })
        );
        assert!(snapper.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn test_snapped_response_shape() {
        let transport = MockTransport::new(|url, _| {
            let (lng, lat) = path_coords(url, "/driving/")[0];
            json(200, json!({ "waypoints": [{ "location": [lng, lat + 0.5] }] }))
        });
        let snapper = TraceSnapper::new(
            transport,
            SnapConfig { osrm_base_url: "http://osrm.test".to_string(), ..SnapConfig::default() },
        );

        let (status, response) = handle_snap_request(
            &snapper,
            &body(json!({ "points": two_points(), "steps_per_segment": 1 })),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "ok": true,
                "mode": "nearest-road",
                "input_count": 2,
                "output_count": 2,
                "points": [{ "lat": 10.5, "lng": 20.0 }, { "lat": 10.5, "lng": 21.0 }]
            })
        );
    }
}
