//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. A location is stored as two
//! nullable REAL columns that are either both set or both NULL.

use chrono::{DateTime, Utc};
use healthmap_core::facility::{Facility, GeoPoint};

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Column list matching [`RawFacility::from_row`].
pub const FACILITY_COLUMNS: &str =
  "f.id, f.natural_id, f.name, f.region, f.locality, f.latitude, f.longitude, f.ingested_at";

/// A `facilities` row as read from SQLite, before timestamp decoding.
#[derive(Debug)]
pub struct RawFacility {
  pub id:          i64,
  pub natural_id:  String,
  pub name:        String,
  pub region:      String,
  pub locality:    String,
  pub latitude:    Option<f64>,
  pub longitude:   Option<f64>,
  pub ingested_at: String,
}

impl RawFacility {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      natural_id:  row.get(1)?,
      name:        row.get(2)?,
      region:      row.get(3)?,
      locality:    row.get(4)?,
      latitude:    row.get(5)?,
      longitude:   row.get(6)?,
      ingested_at: row.get(7)?,
    })
  }

  pub fn into_facility(self) -> Result<Facility> {
    Ok(Facility {
      id:          self.id,
      natural_id:  self.natural_id,
      name:        self.name,
      region:      self.region,
      locality:    self.locality,
      location:    GeoPoint::from_parts(self.latitude, self.longitude),
      ingested_at: decode_dt(&self.ingested_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn dt_roundtrip() {
    let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    assert_eq!(decode_dt(&encode_dt(dt)).unwrap(), dt);
  }

  #[test]
  fn bad_dt_is_reported() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
