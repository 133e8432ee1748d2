//! The `FacilityStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `healthmap-store-sqlite`). The ingestion driver and the proximity service
//! receive a store explicitly; neither reaches for a global handle.

use std::future::Future;

use crate::facility::{Facility, GeoPoint, NewFacility};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`FacilityStore::find_within_radius`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusQuery {
  pub center:   GeoPoint,
  /// Geodesic radius in metres.
  pub radius_m: f64,
  pub limit:    usize,
}

// ─── Batch commit ────────────────────────────────────────────────────────────

/// A record that could not be inserted during a batch commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
  pub natural_id: String,
  pub reason:     String,
}

/// Outcome of [`FacilityStore::commit_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
  /// Number of records durably committed.
  pub saved:    usize,
  /// Records rolled back individually; the rest of the batch is unaffected.
  pub rejected: Vec<Rejection>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a facility store backend.
///
/// Records are append-only: nothing in this trait updates or deletes a
/// facility. `natural_id` is unique across the store.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait FacilityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether a record with this natural id is already persisted.
  fn exists<'a>(
    &'a self,
    natural_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Insert a single record and commit it. Fails with a constraint violation
  /// if the natural id is already present.
  fn insert(
    &self,
    record: NewFacility,
  ) -> impl Future<Output = Result<Facility, Self::Error>> + Send + '_;

  /// Insert `records` in one durable commit.
  ///
  /// Each record is isolated: a record whose insert faults is rolled back on
  /// its own and listed in [`BatchReport::rejected`]; every other record is
  /// committed. An `Err` means the commit itself failed and nothing from the
  /// batch was persisted.
  fn commit_batch(
    &self,
    records: Vec<NewFacility>,
  ) -> impl Future<Output = Result<BatchReport, Self::Error>> + Send + '_;

  /// Retrieve a record by its natural id. Returns `None` if not found.
  fn find_by_natural_id<'a>(
    &'a self,
    natural_id: &'a str,
  ) -> impl Future<Output = Result<Option<Facility>, Self::Error>> + Send + 'a;

  /// Records whose location lies within `query.radius_m` metres (geodesic)
  /// of `query.center`, in the store's natural retrieval order, at most
  /// `query.limit` of them. Records without a location never match.
  ///
  /// The order among matches is store-defined; callers must not rely on it.
  fn find_within_radius(
    &self,
    query: RadiusQuery,
  ) -> impl Future<Output = Result<Vec<Facility>, Self::Error>> + Send + '_;

  /// Number of persisted records.
  fn count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
