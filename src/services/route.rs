// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route construction, simplification and metric derivation.
//!
//! The pipeline runs at completion time:
//! 1. Build an ordered polyline from the run's stored points
//! 2. Douglas-Peucker simplification (tolerance in degrees)
//! 3. Project into a local planar frame and sum segment lengths
//! 4. Derive pace and elevation gain
//!
//! All functions are pure; storage stays out of this module.

use crate::models::RunPoint;
use geo::{algorithm::simplify::Simplify, Coord, LineString};

/// Simplification tolerance in degrees. 1e-4 degree is roughly 10 m of
/// perpendicular deviation at the equator.
pub const SIMPLIFY_TOLERANCE_DEG: f64 = 1e-4;

/// Mean Earth radius in meters, for the local projection.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors from route operations.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Failed to encode polyline: {0}")]
    PolylineEncode(String),
}

/// Build an ordered polyline from run points.
///
/// Points must already be sorted by ascending sequence number; gaps in the
/// sequence are fine (a gap is a sample that never arrived, not an error).
pub fn build_polyline(points: &[RunPoint]) -> LineString<f64> {
    LineString::new(
        points
            .iter()
            .map(|p| Coord { x: p.lng, y: p.lat })
            .collect(),
    )
}

/// Shape-preserving simplification of a route.
///
/// Routes with fewer than three points cannot be simplified and pass
/// through unchanged.
pub fn simplify_route(line: &LineString<f64>, tolerance_deg: f64) -> LineString<f64> {
    if line.0.len() < 3 {
        return line.clone();
    }
    line.simplify(&tolerance_deg)
}

/// Length of a route in meters using a local planar projection.
///
/// Coordinates are projected onto an equirectangular plane about the
/// route's mean latitude, which is accurate at run scale and avoids the
/// latitude-dependent stretch of a global Mercator length. Fewer than two
/// points means zero length.
pub fn planar_length_m(line: &LineString<f64>) -> f64 {
    if line.0.len() < 2 {
        return 0.0;
    }

    let mean_lat_deg = line.0.iter().map(|c| c.y).sum::<f64>() / line.0.len() as f64;
    let lat_scale = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
    let lng_scale = lat_scale * mean_lat_deg.to_radians().cos();

    line.0
        .windows(2)
        .map(|w| {
            let dx = (w[1].x - w[0].x) * lng_scale;
            let dy = (w[1].y - w[0].y) * lat_scale;
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

/// Average pace in seconds per kilometer: floor(duration / distance_km).
///
/// Undefined (None) for a zero-distance run; a stationary run has no pace
/// rather than an infinite or zero one.
pub fn avg_pace_s_per_km(duration_s: i64, distance_m: i64) -> Option<i64> {
    if distance_m <= 0 {
        return None;
    }
    Some((duration_s as f64 * 1000.0 / distance_m as f64).floor() as i64)
}

/// Total positive elevation gain over the raw (unsimplified) points.
///
/// Deltas are taken between consecutive points that both carry an elevation
/// sample; descents contribute nothing. Returns None when no point has
/// elevation data, so a sensor-less run reports "unknown" instead of a
/// false zero.
pub fn elevation_gain_m(points: &[RunPoint]) -> Option<f64> {
    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation_m).collect();
    if elevations.is_empty() {
        return None;
    }

    let gain = elevations
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .sum::<f64>();
    Some(gain)
}

/// Encode a route as a polyline string (precision 5).
pub fn encode_route(line: &LineString<f64>) -> Result<String, RouteError> {
    polyline::encode_coordinates(line.coords().copied(), 5)
        .map_err(|e| RouteError::PolylineEncode(e.to_string()))
}

/// GeoJSON LineString summary of a route.
pub fn geojson_summary(line: &LineString<f64>) -> serde_json::Value {
    let geometry = geojson::Geometry::new(geojson::Value::from(line));
    serde_json::to_value(&geometry).unwrap_or(serde_json::Value::Null)
}
