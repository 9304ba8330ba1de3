//! Whole-trace map-matching against a Mapbox-compatible matching API.
//!
//! ## Algorithm
//! 1. Require an access token, otherwise fail before any request
//! 2. Split the trace into consecutive chunks of at most `max_coords_per_request`
//! 3. Match each chunk in order; a chunk shorter than 2 points is appended as-is
//! 4. Stitch: every chunk after the first loses its first matched point,
//!    which repeats the boundary coordinate of the previous chunk
//!
//! Any failing chunk fails the whole trace. Partial output is never returned,
//! so the caller can fall back for the entire trace.

use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::MatchError;
use crate::transport::Transport;
use crate::{LatLngPoint, SnapConfig};

#[derive(Debug, Deserialize)]
struct MatchApiResponse {
    code: Option<String>,
    message: Option<String>,
    matchings: Option<Vec<Matching>>,
}

#[derive(Debug, Deserialize)]
struct Matching {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[lng, lat]` pairs, kept loose so malformed entries can be skipped
    coordinates: Option<Vec<Value>>,
}

/// `lng,lat` pairs joined by `;`.
fn coords_param(points: &[LatLngPoint]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.lng, p.lat))
        .collect::<Vec<_>>()
        .join(";")
}

/// Build the matching URL for one chunk.
pub fn matching_url(
    base_url: &str,
    points: &[LatLngPoint],
    token: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!(
        "{}/matching/v5/mapbox/driving/{}",
        base_url.trim_end_matches('/'),
        coords_param(points)
    ))?;
    url.query_pairs_mut()
        .append_pair("geometries", "geojson")
        .append_pair("overview", "full")
        .append_pair("tidy", "true")
        .append_pair("access_token", token);
    Ok(url)
}

/// A `[lng, lat]` entry with two finite numbers.
fn parse_coordinate(pair: &Value) -> Option<LatLngPoint> {
    let pair = pair.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let lng = pair[0].as_f64().filter(|v| v.is_finite())?;
    let lat = pair[1].as_f64().filter(|v| v.is_finite())?;
    Some(LatLngPoint::new(lat, lng))
}

/// Match one chunk of at least two points.
async fn match_chunk<T: Transport + ?Sized>(
    transport: &T,
    base_url: &str,
    token: &str,
    chunk: &[LatLngPoint],
) -> Result<Vec<LatLngPoint>, MatchError> {
    let url = matching_url(base_url, chunk, token)?;
    let resp = transport.get(url.as_str()).await?;

    if !resp.is_success() {
        return Err(MatchError::Http(resp.status));
    }

    let data: MatchApiResponse = serde_json::from_slice(&resp.body)?;
    if data.code.as_deref() != Some("Ok") {
        return Err(MatchError::Service {
            code: data.code.unwrap_or_else(|| "FAILED".to_string()),
            message: data.message.filter(|m| !m.is_empty()),
        });
    }

    let geometry = data
        .matchings
        .and_then(|m| m.into_iter().next())
        .and_then(|m| m.geometry)
        .and_then(|g| g.coordinates)
        .filter(|c| c.len() >= 2)
        .ok_or(MatchError::NoGeometry)?;

    let matched: Vec<LatLngPoint> = geometry.iter().filter_map(parse_coordinate).collect();
    if matched.len() < 2 {
        return Err(MatchError::InvalidGeometry);
    }

    Ok(matched)
}

/// Map-match a whole trace, chunking it to respect the per-request cap.
///
/// Returns the stitched matched geometry, or the first error encountered.
/// Chunks are requested sequentially since stitching depends on the
/// accumulated output.
pub async fn match_trace<T: Transport + ?Sized>(
    transport: &T,
    config: &SnapConfig,
    points: &[LatLngPoint],
) -> Result<Vec<LatLngPoint>, MatchError> {
    let token = config
        .mapbox_access_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(MatchError::MissingCredential)?;

    let chunk_size = config.max_coords_per_request.max(2);
    let chunk_count = points.len().div_ceil(chunk_size);
    info!(
        "[MapMatch] Matching {} points in {} chunk(s) of up to {}",
        points.len(),
        chunk_count,
        chunk_size
    );

    let mut snapped: Vec<LatLngPoint> = Vec::with_capacity(points.len());

    for (index, chunk) in points.chunks(chunk_size).enumerate() {
        if chunk.len() < 2 {
            snapped.extend_from_slice(chunk);
            continue;
        }

        let matched = match_chunk(transport, &config.mapbox_base_url, token, chunk).await?;
        debug!(
            "[MapMatch] Chunk {}/{}: {} points -> {} matched",
            index + 1,
            chunk_count,
            chunk.len(),
            matched.len()
        );

        // First matched point repeats the previous chunk's boundary
        let skip = if snapped.is_empty() { 0 } else { 1 };
        snapped.extend(matched.into_iter().skip(skip));
    }

    if snapped.len() < 2 {
        return Err(MatchError::OutputTooShort);
    }

    Ok(snapped)
}
