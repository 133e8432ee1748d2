//! The proximity query service: "which facilities lie within R metres of P".
//!
//! Validates caller input and delegates to the store's geodesic radius query,
//! capping the result size regardless of dataset density.

use std::sync::Arc;

use serde::Deserialize;

use crate::{
  Error, Result,
  facility::{Facility, GeoPoint},
  store::{FacilityStore, RadiusQuery},
};

/// Radius used when the caller does not supply one.
pub const DEFAULT_RADIUS_M: f64 = 5000.0;
/// Maximum number of facilities returned by one query.
pub const DEFAULT_RESULT_LIMIT: usize = 50;

/// Tunables for [`ProximityService`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
  pub default_radius_m: f64,
  pub result_limit:     usize,
}

impl Default for QuerySettings {
  fn default() -> Self {
    Self { default_radius_m: DEFAULT_RADIUS_M, result_limit: DEFAULT_RESULT_LIMIT }
  }
}

impl QuerySettings {
  pub fn validate(&self) -> Result<()> {
    if !(self.default_radius_m.is_finite() && self.default_radius_m > 0.0) {
      return Err(Error::InvalidArgument(format!(
        "default radius must be positive, got {}",
        self.default_radius_m
      )));
    }
    if self.result_limit == 0 {
      return Err(Error::InvalidArgument("result limit must be at least 1".into()));
    }
    Ok(())
  }
}

/// Answers radius queries against a shared store.
///
/// Cloning is cheap; the store is reference-counted.
pub struct ProximityService<S> {
  store:    Arc<S>,
  settings: QuerySettings,
}

impl<S> Clone for ProximityService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store), settings: self.settings } }
}

impl<S: FacilityStore> ProximityService<S> {
  pub fn new(store: Arc<S>, settings: QuerySettings) -> Result<Self> {
    settings.validate()?;
    Ok(Self { store, settings })
  }

  /// Facilities within `radius` metres (default 5000) of `(lat, lon)`.
  ///
  /// `lat`/`lon` must be finite; out-of-range values are passed through and
  /// yield an empty or meaningless result rather than an error. `radius`
  /// must be finite and positive.
  pub async fn find_within_radius(
    &self,
    lat:    f64,
    lon:    f64,
    radius: Option<f64>,
  ) -> Result<Vec<Facility>> {
    if !lat.is_finite() || !lon.is_finite() {
      return Err(Error::InvalidArgument(format!(
        "coordinates must be finite, got lat={lat} lon={lon}"
      )));
    }
    let radius_m = radius.unwrap_or(self.settings.default_radius_m);
    if !(radius_m.is_finite() && radius_m > 0.0) {
      return Err(Error::InvalidArgument(format!("radius must be positive, got {radius_m}")));
    }

    let query = RadiusQuery {
      center: GeoPoint::new(lon, lat),
      radius_m,
      limit: self.settings.result_limit,
    };
    self.store.find_within_radius(query).await.map_err(|e| Error::Store(Box::new(e)))
  }

  /// Pass-through lookup by natural id.
  pub async fn find_by_natural_id(&self, natural_id: &str) -> Result<Option<Facility>> {
    self.store.find_by_natural_id(natural_id).await.map_err(|e| Error::Store(Box::new(e)))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use chrono::Utc;

  use super::*;
  use crate::{
    facility::NewFacility,
    geo::distance_m,
    store::{BatchReport, Rejection},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("duplicate natural id {0}")]
  struct Duplicate(String);

  /// Linear-scan store; good enough to exercise the service contract.
  #[derive(Default)]
  struct VecStore {
    rows: Mutex<Vec<Facility>>,
  }

  impl VecStore {
    fn push(&self, record: NewFacility) -> Result<Facility, Duplicate> {
      let mut rows = self.rows.lock().unwrap();
      if rows.iter().any(|f| f.natural_id == record.natural_id) {
        return Err(Duplicate(record.natural_id));
      }
      let facility = Facility {
        id:          rows.len() as i64 + 1,
        natural_id:  record.natural_id,
        name:        record.name,
        region:      record.region,
        locality:    record.locality,
        location:    record.location,
        ingested_at: Utc::now(),
      };
      rows.push(facility.clone());
      Ok(facility)
    }
  }

  impl FacilityStore for VecStore {
    type Error = Duplicate;

    async fn exists(&self, natural_id: &str) -> Result<bool, Duplicate> {
      Ok(self.rows.lock().unwrap().iter().any(|f| f.natural_id == natural_id))
    }

    async fn insert(&self, record: NewFacility) -> Result<Facility, Duplicate> { self.push(record) }

    async fn commit_batch(&self, records: Vec<NewFacility>) -> Result<BatchReport, Duplicate> {
      let mut report = BatchReport::default();
      for record in records {
        match self.push(record) {
          Ok(_) => report.saved += 1,
          Err(e) => report.rejected.push(Rejection { natural_id: e.0.clone(), reason: e.to_string() }),
        }
      }
      Ok(report)
    }

    async fn find_by_natural_id(&self, natural_id: &str) -> Result<Option<Facility>, Duplicate> {
      Ok(self.rows.lock().unwrap().iter().find(|f| f.natural_id == natural_id).cloned())
    }

    async fn find_within_radius(&self, query: RadiusQuery) -> Result<Vec<Facility>, Duplicate> {
      Ok(
        self
          .rows
          .lock()
          .unwrap()
          .iter()
          .filter(|f| f.location.is_some_and(|p| distance_m(p, query.center) <= query.radius_m))
          .take(query.limit)
          .cloned()
          .collect(),
      )
    }

    async fn count(&self) -> Result<u64, Duplicate> { Ok(self.rows.lock().unwrap().len() as u64) }
  }

  fn service(settings: QuerySettings) -> ProximityService<VecStore> {
    let store = VecStore::default();
    store.push(NewFacility::new("sp").at(-23.5, -46.6)).unwrap();
    store.push(NewFacility::new("ny").at(40.7, -74.0)).unwrap();
    store.push(NewFacility::new("nowhere")).unwrap();
    ProximityService::new(Arc::new(store), settings).unwrap()
  }

  #[tokio::test]
  async fn negative_radius_is_invalid() {
    let svc = service(QuerySettings::default());
    let err = svc.find_within_radius(0.0, 0.0, Some(-1.0)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
  }

  #[tokio::test]
  async fn zero_and_nan_radius_are_invalid() {
    let svc = service(QuerySettings::default());
    for r in [0.0, f64::NAN, f64::INFINITY] {
      let err = svc.find_within_radius(-23.5, -46.6, Some(r)).await.unwrap_err();
      assert!(matches!(err, Error::InvalidArgument(_)), "{r}");
    }
  }

  #[tokio::test]
  async fn non_finite_center_is_invalid() {
    let svc = service(QuerySettings::default());
    let err = svc.find_within_radius(f64::NAN, -46.6, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
  }

  #[tokio::test]
  async fn finds_only_nearby_facility() {
    let svc = service(QuerySettings::default());
    let found = svc.find_within_radius(-23.5, -46.6, Some(1000.0)).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].natural_id, "sp");
  }

  #[tokio::test]
  async fn out_of_range_center_is_not_an_error() {
    let svc = service(QuerySettings::default());
    let found = svc.find_within_radius(123.0, 500.0, None).await.unwrap();
    assert!(found.is_empty());
  }

  #[tokio::test]
  async fn result_limit_caps_response() {
    let svc = service(QuerySettings { result_limit: 1, ..QuerySettings::default() });
    let found = svc.find_within_radius(0.0, 0.0, Some(2.0e7)).await.unwrap();
    assert_eq!(found.len(), 1);
  }

  #[test]
  fn settings_are_validated() {
    let bad = QuerySettings { default_radius_m: 0.0, ..QuerySettings::default() };
    assert!(bad.validate().is_err());
    let bad = QuerySettings { result_limit: 0, ..QuerySettings::default() };
    assert!(bad.validate().is_err());
    assert!(QuerySettings::default().validate().is_ok());
  }
}
