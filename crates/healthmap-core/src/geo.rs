//! Geodesic helpers on a spherical Earth model.
//!
//! Radius filtering must happen on the Earth's surface, not over raw degree
//! differences: one degree of longitude spans ~111 km at the equator but only
//! ~78 km at 45° latitude.

use std::f64::consts::PI;

use crate::facility::GeoPoint;

/// IUGG mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in metres between two points (haversine).
pub fn distance_m(from: GeoPoint, to: GeoPoint) -> f64 {
  haversine_m(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Haversine distance in metres over raw decimal degrees.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let dlat = (lat2 - lat1).to_radians();
  let dlon = (lon2 - lon1).to_radians();
  let a = (dlat / 2.0).sin().powi(2)
    + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
  // Rounding can push `a` a hair above 1 for antipodal points.
  let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();
  EARTH_RADIUS_M * c
}

// ─── Bounding box ────────────────────────────────────────────────────────────

/// A lat/lon rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub min_lon: f64,
  pub max_lon: f64,
  pub min_lat: f64,
  pub max_lat: f64,
}

impl BoundingBox {
  pub const WORLD: Self =
    Self { min_lon: -180.0, max_lon: 180.0, min_lat: -90.0, max_lat: 90.0 };
}

/// Smallest lat/lon rectangle guaranteed to contain every point within
/// `radius_m` of `center`.
///
/// Falls back to the full longitude range when the circle reaches a pole or
/// crosses the antimeridian, so the box may over-select but never
/// under-selects.
pub fn bounding_box(center: GeoPoint, radius_m: f64) -> BoundingBox {
  let angular = radius_m / EARTH_RADIUS_M;
  if angular >= PI {
    return BoundingBox::WORLD;
  }

  let dlat = angular.to_degrees();
  let min_lat = (center.latitude - dlat).clamp(-90.0, 90.0);
  let max_lat = (center.latitude + dlat).clamp(-90.0, 90.0);

  let touches_pole = center.latitude - dlat <= -90.0 || center.latitude + dlat >= 90.0;
  let ratio = angular.sin() / center.latitude.to_radians().cos().abs();
  if touches_pole || !(ratio < 1.0) {
    return BoundingBox { min_lon: -180.0, max_lon: 180.0, min_lat, max_lat };
  }

  let dlon = ratio.asin().to_degrees();
  let min_lon = center.longitude - dlon;
  let max_lon = center.longitude + dlon;
  if min_lon < -180.0 || max_lon > 180.0 {
    return BoundingBox { min_lon: -180.0, max_lon: 180.0, min_lat, max_lat };
  }

  BoundingBox { min_lon, max_lon, min_lat, max_lat }
}
