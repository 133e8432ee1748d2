//! Facility records, the canonical entity of the directory.
//!
//! A facility is created once, during ingestion, and never updated. Its
//! position is stored as a single optional [`GeoPoint`] so that a record can
//! never carry one coordinate without the other.

use chrono::{DateTime, Utc};

/// Name used when the source row has no usable establishment name.
pub const UNKNOWN_NAME: &str = "Unknown Unit";
/// Region code used when the source row has no usable region.
pub const UNKNOWN_REGION: &str = "UNK";
/// Locality used when the source row has no usable locality.
pub const UNKNOWN_LOCALITY: &str = "Unknown";

// ─── Geometry ────────────────────────────────────────────────────────────────

/// A geodetic point in the WGS84 reference frame.
///
/// Field order mirrors the `POINT(lon lat)` convention of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
  pub longitude: f64,
  pub latitude:  f64,
}

impl GeoPoint {
  pub fn new(longitude: f64, latitude: f64) -> Self { Self { longitude, latitude } }

  /// Build a point from independently normalised coordinates. Returns `None`
  /// unless both are present.
  pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
    match (latitude, longitude) {
      (Some(lat), Some(lon)) => Some(Self::new(lon, lat)),
      _ => None,
    }
  }
}

// ─── Facility ────────────────────────────────────────────────────────────────

/// A persisted facility record.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
  /// Store-assigned surrogate identity; carries no external meaning.
  pub id:          i64,
  /// The dataset's establishment identifier. Unique and never empty.
  pub natural_id:  String,
  pub name:        String,
  pub region:      String,
  pub locality:    String,
  pub location:    Option<GeoPoint>,
  /// Server-assigned timestamp; never changes after creation.
  pub ingested_at: DateTime<Utc>,
}

impl Facility {
  pub fn latitude(&self) -> Option<f64> { self.location.map(|p| p.latitude) }

  pub fn longitude(&self) -> Option<f64> { self.location.map(|p| p.longitude) }
}

// ─── NewFacility ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::FacilityStore::insert`] and
/// [`crate::store::FacilityStore::commit_batch`]. `id` and `ingested_at` are
/// always set by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFacility {
  pub natural_id: String,
  pub name:       String,
  pub region:     String,
  pub locality:   String,
  pub location:   Option<GeoPoint>,
}

impl NewFacility {
  /// Convenience constructor with sentinel descriptive fields and no location.
  pub fn new(natural_id: impl Into<String>) -> Self {
    Self {
      natural_id: natural_id.into(),
      name:       UNKNOWN_NAME.to_owned(),
      region:     UNKNOWN_REGION.to_owned(),
      locality:   UNKNOWN_LOCALITY.to_owned(),
      location:   None,
    }
  }

  pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
    self.location = Some(GeoPoint::new(longitude, latitude));
    self
  }

  pub fn latitude(&self) -> Option<f64> { self.location.map(|p| p.latitude) }

  pub fn longitude(&self) -> Option<f64> { self.location.map(|p| p.longitude) }
}
