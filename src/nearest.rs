//! Nearest-road snapping against an OSRM-compatible `/nearest` endpoint.
//!
//! One request per point, one candidate per request. The caller decides what
//! to do with a failure; nothing here substitutes the input point.

use log::debug;
use serde::Deserialize;
use url::Url;

use crate::error::NearestError;
use crate::transport::Transport;
use crate::LatLngPoint;

#[derive(Debug, Deserialize)]
struct NearestApiResponse {
    waypoints: Option<Vec<Waypoint>>,
}

#[derive(Debug, Deserialize)]
struct Waypoint {
    /// `[lng, lat]`
    location: Option<Vec<f64>>,
}

/// Build `{base}/nearest/v1/driving/{lng},{lat}?number=1`.
pub fn nearest_url(base_url: &str, point: LatLngPoint) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!(
        "{}/nearest/v1/driving/{},{}",
        base_url.trim_end_matches('/'),
        point.lng,
        point.lat
    ))?;
    url.query_pairs_mut().append_pair("number", "1");
    Ok(url)
}

/// Snap a single point to the closest road position.
///
/// Fails on transport errors, non-2xx statuses, unparseable bodies and
/// responses whose first waypoint has no `[lng, lat]` location.
pub async fn snap_point_to_nearest_road<T: Transport + ?Sized>(
    transport: &T,
    base_url: &str,
    point: LatLngPoint,
) -> Result<LatLngPoint, NearestError> {
    let url = nearest_url(base_url, point)?;
    let resp = transport.get(url.as_str()).await?;

    if !resp.is_success() {
        return Err(NearestError::Http(resp.status));
    }

    let data: NearestApiResponse = serde_json::from_slice(&resp.body)?;
    let location = data
        .waypoints
        .and_then(|w| w.into_iter().next())
        .and_then(|w| w.location)
        .filter(|loc| loc.len() >= 2)
        .ok_or(NearestError::NoLocation)?;

    let snapped = LatLngPoint::from_lng_lat([location[0], location[1]]);
    debug!(
        "[Nearest] ({:.6}, {:.6}) -> ({:.6}, {:.6})",
        point.lat, point.lng, snapped.lat, snapped.lng
    );
    Ok(snapped)
}
