//! [`SqliteStore`]: the SQLite implementation of [`FacilityStore`].

use std::path::Path;

use chrono::Utc;
use healthmap_core::{
  facility::{Facility, NewFacility},
  geo::{bounding_box, haversine_m},
  store::{BatchReport, FacilityStore, RadiusQuery, Rejection},
};
use rusqlite::{OptionalExtension as _, functions::FunctionFlags};

use crate::{
  Error, Result,
  encode::{FACILITY_COLUMNS, RawFacility, encode_dt},
  schema::{GEODESIC_DISTANCE_FN, SCHEMA, SCHEMA_VERSION},
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Whether `e` is the unique constraint on `natural_id` firing.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

fn classify(e: tokio_rusqlite::Error, natural_id: String) -> Error {
  match e {
    tokio_rusqlite::Error::Rusqlite(ref inner) if is_unique_violation(inner) => {
      Error::ConstraintViolation { natural_id }
    }
    other => Error::Database(other),
  }
}

/// Register `geodesic_distance(lat1, lon1, lat2, lon2)` on `conn`. Returns
/// NULL when any argument is NULL.
fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    GEODESIC_DISTANCE_FN,
    4,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let lat1: Option<f64> = ctx.get(0)?;
      let lon1: Option<f64> = ctx.get(1)?;
      let lat2: Option<f64> = ctx.get(2)?;
      let lon2: Option<f64> = ctx.get(3)?;
      Ok(match (lat1, lon1, lat2, lon2) {
        (Some(a), Some(b), Some(c), Some(d)) => Some(haversine_m(a, b, c, d)),
        _ => None,
      })
    },
  )
}

/// Insert one record (and its spatial index entry) on `conn`, returning the
/// surrogate id. The caller owns the surrounding transaction.
fn insert_row(
  conn:        &rusqlite::Connection,
  record:      &NewFacility,
  ingested_at: &str,
) -> rusqlite::Result<i64> {
  conn.execute(
    "INSERT INTO facilities (
       natural_id, name, region, locality, latitude, longitude, ingested_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      record.natural_id,
      record.name,
      record.region,
      record.locality,
      record.latitude(),
      record.longitude(),
      ingested_at,
    ],
  )?;
  let id = conn.last_insert_rowid();

  if let Some(point) = record.location {
    conn.execute(
      "INSERT INTO facility_locations (id, min_lon, max_lon, min_lat, max_lat)
       VALUES (?1, ?2, ?2, ?3, ?3)",
      rusqlite::params![id, point.longitude, point.latitude],
    )?;
  }
  Ok(id)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A facility store backed by a single SQLite file.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if version == 0 {
          conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        register_functions(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FacilityStore impl ──────────────────────────────────────────────────────

impl FacilityStore for SqliteStore {
  type Error = Error;

  async fn exists(&self, natural_id: &str) -> Result<bool> {
    let id = natural_id.to_owned();
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM facilities WHERE natural_id = ?1",
              rusqlite::params![id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn insert(&self, record: NewFacility) -> Result<Facility> {
    let ingested_at = Utc::now();
    let at_str = encode_dt(ingested_at);
    let natural_id = record.natural_id.clone();

    let (id, record) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id = insert_row(&tx, &record, &at_str)?;
        tx.commit()?;
        Ok((id, record))
      })
      .await
      .map_err(|e| classify(e, natural_id))?;

    Ok(Facility {
      id,
      natural_id: record.natural_id,
      name: record.name,
      region: record.region,
      locality: record.locality,
      location: record.location,
      ingested_at,
    })
  }

  async fn commit_batch(&self, records: Vec<NewFacility>) -> Result<BatchReport> {
    if records.is_empty() {
      return Ok(BatchReport::default());
    }
    let at_str = encode_dt(Utc::now());

    let report = self
      .conn
      .call(move |conn| {
        let mut tx = conn.transaction()?;
        let mut report = BatchReport::default();

        for record in &records {
          let sp = tx.savepoint()?;
          match insert_row(&sp, record, &at_str) {
            Ok(_) => {
              sp.commit()?;
              report.saved += 1;
            }
            Err(e) => {
              // Dropping the savepoint rolls back this record only.
              drop(sp);
              let reason = if is_unique_violation(&e) {
                "natural id already stored".to_owned()
              } else {
                e.to_string()
              };
              report.rejected.push(Rejection { natural_id: record.natural_id.clone(), reason });
            }
          }
        }

        tx.commit()?;
        Ok(report)
      })
      .await?;

    tracing::debug!(saved = report.saved, rejected = report.rejected.len(), "batch committed");
    Ok(report)
  }

  async fn find_by_natural_id(&self, natural_id: &str) -> Result<Option<Facility>> {
    let id = natural_id.to_owned();
    let raw: Option<RawFacility> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FACILITY_COLUMNS} FROM facilities f WHERE f.natural_id = ?1"),
              rusqlite::params![id],
              RawFacility::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFacility::into_facility).transpose()
  }

  async fn find_within_radius(&self, query: RadiusQuery) -> Result<Vec<Facility>> {
    let bbox = bounding_box(query.center, query.radius_m);
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

    let raws: Vec<RawFacility> = self
      .conn
      .call(move |conn| {
        // R*Tree prefilter on the bounding box, exact geodesic filter after.
        let sql = format!(
          "SELECT {FACILITY_COLUMNS}
           FROM facility_locations l
           JOIN facilities f ON f.id = l.id
           WHERE l.min_lon <= ?1 AND l.max_lon >= ?2
             AND l.min_lat <= ?3 AND l.max_lat >= ?4
             AND {GEODESIC_DISTANCE_FN}(f.latitude, f.longitude, ?5, ?6) <= ?7
           ORDER BY f.id
           LIMIT ?8"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              bbox.max_lon,
              bbox.min_lon,
              bbox.max_lat,
              bbox.min_lat,
              query.center.latitude,
              query.center.longitude,
              query.radius_m,
              limit,
            ],
            RawFacility::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFacility::into_facility).collect()
  }

  async fn count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM facilities", [], |r| r.get(0))?))
      .await?;
    Ok(n.max(0) as u64)
  }
}
