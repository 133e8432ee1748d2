//! Mapping one raw dataset row to a [`NewFacility`] candidate.
//!
//! The mapper is pure: it never consults the store. Deduplication belongs to
//! the ingestion driver.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{
  coords::normalize_coordinate,
  facility::{GeoPoint, NewFacility, UNKNOWN_LOCALITY, UNKNOWN_NAME, UNKNOWN_REGION},
};

/// Tokens the source uses for a missing textual value (compared
/// case-insensitively after trimming).
pub const MISSING_TOKENS: &[&str] = &["nan", "none", "null"];

/// Whether a raw textual value should be treated as absent.
pub fn is_missing(raw: &str) -> bool {
  let trimmed = raw.trim();
  trimmed.is_empty() || MISSING_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

// ─── Column set ──────────────────────────────────────────────────────────────

/// Candidate header names for each logical column, in priority order.
///
/// The establishment table has shipped under several header conventions; the
/// first alias present in a file's header wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnSet {
  pub natural_id: Vec<String>,
  pub name:       Vec<String>,
  pub region:     Vec<String>,
  pub locality:   Vec<String>,
  pub latitude:   Vec<String>,
  pub longitude:  Vec<String>,
}

fn aliases(names: &[&str]) -> Vec<String> { names.iter().map(|s| (*s).to_owned()).collect() }

impl Default for ColumnSet {
  fn default() -> Self {
    Self {
      natural_id: aliases(&["CO_CNES", "CNES"]),
      name:       aliases(&["NO_FANTASIA", "FANTASIA", "NO_RAZAO_SOCIAL", "NOME"]),
      region:     aliases(&["CO_UF", "UF", "SG_UF", "CO_ESTADO_GESTOR"]),
      locality:   aliases(&["CO_IBGE", "CO_MUNICIPIO_GESTOR", "CO_MUNICIP"]),
      latitude:   aliases(&["NU_LATITUDE", "LATITUDE"]),
      longitude:  aliases(&["NU_LONGITUDE", "NU_LONGITUD", "LONGITUDE"]),
    }
  }
}

impl ColumnSet {
  /// Every alias of every logical column, paired with the column it feeds.
  pub fn all_aliases(&self) -> impl Iterator<Item = (Column, &str)> {
    [
      (Column::NaturalId, &self.natural_id),
      (Column::Name, &self.name),
      (Column::Region, &self.region),
      (Column::Locality, &self.locality),
      (Column::Latitude, &self.latitude),
      (Column::Longitude, &self.longitude),
    ]
    .into_iter()
    .flat_map(|(col, names)| names.iter().map(move |n| (col, n.as_str())))
  }

  /// Resolve each logical column to the first of its aliases present in
  /// `header`, returning `(column, header index)` pairs.
  pub fn resolve<S: AsRef<str>>(&self, header: &[S]) -> Vec<(Column, usize)> {
    let mut resolved: Vec<(Column, usize)> = Vec::new();
    for (col, alias) in self.all_aliases() {
      if resolved.iter().any(|(c, _)| *c == col) {
        continue;
      }
      if let Some(idx) = header.iter().position(|h| h.as_ref().trim() == alias) {
        resolved.push((col, idx));
      }
    }
    resolved
  }
}

/// The logical columns the mapper reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
  NaturalId,
  Name,
  Region,
  Locality,
  Latitude,
  Longitude,
}

// ─── Raw row ─────────────────────────────────────────────────────────────────

/// One row of the establishment table, projected onto the logical columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
  fields: HashMap<Column, String>,
}

impl RawRow {
  pub fn new() -> Self { Self::default() }

  pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
    self.set(column, value);
    self
  }

  pub fn set(&mut self, column: Column, value: impl Into<String>) {
    self.fields.insert(column, value.into());
  }

  pub fn get(&self, column: Column) -> Option<&str> { self.fields.get(&column).map(String::as_str) }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Why a row was not mapped to a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// The natural-id column is absent, blank or a missing-value token.
  MissingNaturalId,
}

/// Result of mapping a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
  Mapped(NewFacility),
  Skip(SkipReason),
}

/// Map one raw row to a facility candidate.
pub fn map_row(row: &RawRow) -> MapOutcome {
  let natural_id = match row.get(Column::NaturalId) {
    Some(raw) if !is_missing(raw) => raw.trim().to_owned(),
    _ => return MapOutcome::Skip(SkipReason::MissingNaturalId),
  };

  let text = |column: Column, fallback: &str| -> String {
    match row.get(column) {
      Some(raw) if !is_missing(raw) => raw.trim().to_owned(),
      _ => fallback.to_owned(),
    }
  };

  let latitude = row.get(Column::Latitude).and_then(normalize_coordinate);
  let longitude = row.get(Column::Longitude).and_then(normalize_coordinate);

  MapOutcome::Mapped(NewFacility {
    natural_id,
    name: text(Column::Name, UNKNOWN_NAME),
    region: text(Column::Region, UNKNOWN_REGION),
    locality: text(Column::Locality, UNKNOWN_LOCALITY),
    location: GeoPoint::from_parts(latitude, longitude),
  })
}
