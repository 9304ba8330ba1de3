//! Error types for every failure class of the snapping pipeline.
//!
//! Each error carries a stable machine-readable [`code`](MatchError::code)
//! that shows up in log lines and in the boundary response body.

use thiserror::Error;

/// The transport could not complete a request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("body download error: {0}")]
    Body(String),
}

/// Failure of a single nearest-road lookup.
#[derive(Debug, Error)]
pub enum NearestError {
    #[error("invalid nearest-road URL: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("nearest-road service returned HTTP {0}")]
    Http(u16),
    #[error("nearest-road response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("nearest-road response has no usable waypoint location")]
    NoLocation,
}

impl NearestError {
    pub fn code(&self) -> String {
        match self {
            NearestError::Url(_) => "OSRM_NEAREST_URL".to_string(),
            NearestError::Transport(_) => "OSRM_NEAREST_TRANSPORT".to_string(),
            NearestError::Http(status) => format!("OSRM_NEAREST_HTTP_{}", status),
            NearestError::Json(_) => "OSRM_NEAREST_JSON".to_string(),
            NearestError::NoLocation => "OSRM_NEAREST_NO_LOCATION".to_string(),
        }
    }
}

/// Failure of whole-trace map-matching. Any variant sends the trace to the
/// nearest-road fallback.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("map-matching access token is not configured")]
    MissingCredential,
    #[error("invalid map-matching URL: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("map-matching service returned HTTP {0}")]
    Http(u16),
    #[error("map-matching response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("map-matching failed with code {code}")]
    Service { code: String, message: Option<String> },
    #[error("map-matching response has no geometry")]
    NoGeometry,
    #[error("map-matching geometry has fewer than 2 valid coordinates")]
    InvalidGeometry,
    #[error("stitched map-matching output has fewer than 2 points")]
    OutputTooShort,
}

impl MatchError {
    pub fn code(&self) -> String {
        match self {
            MatchError::MissingCredential => "MAPBOX_ACCESS_TOKEN_MISSING".to_string(),
            MatchError::Url(_) => "MAPBOX_MATCH_URL".to_string(),
            MatchError::Transport(_) => "MAPBOX_MATCH_TRANSPORT".to_string(),
            MatchError::Http(status) => format!("MAPBOX_MATCH_HTTP_{}", status),
            MatchError::Json(_) => "MAPBOX_MATCH_JSON".to_string(),
            MatchError::Service { code, message } => match message {
                Some(message) => format!("MAPBOX_MATCH_{}: {}", code, message),
                None => format!("MAPBOX_MATCH_{}", code),
            },
            MatchError::NoGeometry => "MAPBOX_MATCH_NO_GEOMETRY".to_string(),
            MatchError::InvalidGeometry => "MAPBOX_MATCH_INVALID_GEOMETRY".to_string(),
            MatchError::OutputTooShort => "MAPBOX_MATCH_OUTPUT_TOO_SHORT".to_string(),
        }
    }
}

/// A trace rejected before any external call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("at least 2 points are required, got {count}")]
    TooFewPoints { count: usize },
    #[error("point {index} is not a finite in-range coordinate")]
    InvalidPoint { index: usize },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::TooFewPoints { .. } => "MIN_2_POINTS_REQUIRED",
            ValidationError::InvalidPoint { .. } => "INVALID_POINTS_FORMAT",
        }
    }
}

/// A snap request body that could not be turned into a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request body is not an object with a points array")]
    InvalidBody,
    #[error("at least 2 valid points are required")]
    MinTwoPointsRequired,
    #[error("one or more points are malformed")]
    InvalidPointsFormat,
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::InvalidBody => "INVALID_BODY",
            RequestError::MinTwoPointsRequired => "MIN_2_POINTS_REQUIRED",
            RequestError::InvalidPointsFormat => "INVALID_POINTS_FORMAT",
        }
    }
}

impl From<ValidationError> for RequestError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TooFewPoints { .. } => RequestError::MinTwoPointsRequired,
            ValidationError::InvalidPoint { .. } => RequestError::InvalidPointsFormat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(MatchError::Http(429).code(), "MAPBOX_MATCH_HTTP_429");
        assert_eq!(NearestError::Http(503).code(), "OSRM_NEAREST_HTTP_503");
        assert_eq!(NearestError::NoLocation.code(), "OSRM_NEAREST_NO_LOCATION");
        assert_eq!(MatchError::MissingCredential.code(), "MAPBOX_ACCESS_TOKEN_MISSING");
    }

    #[test]
    fn test_service_code_includes_message() {
        let err = MatchError::Service {
            code: "NoMatch".to_string(),
            message: Some("Could not match the trace.".to_string()),
        };
        assert_eq!(err.code(), "MAPBOX_MATCH_NoMatch: Could not match the trace.");

        let bare = MatchError::Service { code: "FAILED".to_string(), message: None };
        assert_eq!(bare.code(), "MAPBOX_MATCH_FAILED");
    }

    #[test]
    fn test_validation_maps_to_request_error() {
        let err: RequestError = ValidationError::InvalidPoint { index: 2 }.into();
        assert_eq!(err, RequestError::InvalidPointsFormat);
        assert_eq!(err.code(), ValidationError::InvalidPoint { index: 2 }.code());
    }
}
