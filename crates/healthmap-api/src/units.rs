//! Handlers for `/units` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/units/nearby` | `?lat&lon` required; optional `radius` in metres (default 5000) |
//! | `GET`  | `/units/:cnes_id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use healthmap_core::{facility::Facility, proximity::ProximityService, store::FacilityStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── Response body ────────────────────────────────────────────────────────────

/// Wire shape of a facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityResponse {
  pub id:        i64,
  pub cnes_id:   String,
  pub name:      String,
  pub state:     String,
  pub city:      String,
  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,
}

impl From<Facility> for FacilityResponse {
  fn from(f: Facility) -> Self {
    Self {
      id:        f.id,
      latitude:  f.latitude(),
      longitude: f.longitude(),
      cnes_id:   f.natural_id,
      name:      f.name,
      state:     f.region,
      city:      f.locality,
    }
  }
}

// ─── Nearby ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
  /// Latitude of the centre point, decimal degrees.
  pub lat:    f64,
  /// Longitude of the centre point, decimal degrees.
  pub lon:    f64,
  /// Search radius in metres.
  pub radius: Option<f64>,
}

/// `GET /units/nearby?lat=<lat>&lon=<lon>[&radius=<m>]`
pub async fn nearby<S>(
  State(service): State<ProximityService<S>>,
  Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<FacilityResponse>>, ApiError>
where
  S: FacilityStore,
{
  let found = service
    .find_within_radius(params.lat, params.lon, params.radius)
    .await?;
  Ok(Json(found.into_iter().map(FacilityResponse::from).collect()))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /units/:cnes_id`
pub async fn get_one<S>(
  State(service): State<ProximityService<S>>,
  Path(cnes_id): Path<String>,
) -> Result<Json<FacilityResponse>, ApiError>
where
  S: FacilityStore,
{
  let facility = service
    .find_by_natural_id(&cnes_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("healthcare unit {cnes_id} not found")))?;
  Ok(Json(facility.into()))
}
