//! Ingestion tunables, deserialised from the `[ingest]` config section.

use std::path::PathBuf;

use healthmap_core::mapper::ColumnSet;
use serde::Deserialize;

use crate::{Error, Result};

/// Nationwide CNES establishment archive published by the Ministry of Health.
pub const DEFAULT_SOURCE_URL: &str =
  "https://s3.sa-east-1.amazonaws.com/ckan.saude.gov.br/CNES/cnes_estabelecimentos.zip";
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;
pub const DEFAULT_COMMIT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_ENCODING: &str = "windows-1252";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
  pub source_url:        String,
  /// Where the archive and the extracted table are staged.
  pub staging_dir:       PathBuf,
  /// Rows materialised in memory at once.
  pub chunk_size:        usize,
  /// Newly staged records per durable commit.
  pub commit_batch_size: usize,
  /// WHATWG label of the table's text encoding.
  pub encoding:          String,
  pub delimiter:         char,
  pub columns:           ColumnSet,
}

impl Default for IngestSettings {
  fn default() -> Self {
    Self {
      source_url:        DEFAULT_SOURCE_URL.to_owned(),
      staging_dir:       std::env::temp_dir(),
      chunk_size:        DEFAULT_CHUNK_SIZE,
      commit_batch_size: DEFAULT_COMMIT_BATCH_SIZE,
      encoding:          DEFAULT_ENCODING.to_owned(),
      delimiter:         ';',
      columns:           ColumnSet::default(),
    }
  }
}

impl IngestSettings {
  pub fn validate(&self) -> Result<()> {
    if self.chunk_size == 0 {
      return Err(Error::InvalidSettings("chunk_size must be at least 1".into()));
    }
    if self.commit_batch_size == 0 {
      return Err(Error::InvalidSettings("commit_batch_size must be at least 1".into()));
    }
    if !self.delimiter.is_ascii() {
      return Err(Error::InvalidSettings(format!(
        "delimiter must be a single ASCII character, got {:?}",
        self.delimiter
      )));
    }
    if self.columns.natural_id.is_empty() {
      return Err(Error::InvalidSettings("columns.natural_id must list at least one header".into()));
    }
    resolve_encoding(&self.encoding)?;
    Ok(())
  }

  /// The delimiter as the byte the CSV reader expects.
  pub fn delimiter_byte(&self) -> u8 {
    u8::try_from(self.delimiter).unwrap_or(b';')
  }
}

pub fn resolve_encoding(label: &str) -> Result<&'static encoding_rs::Encoding> {
  encoding_rs::Encoding::for_label(label.trim().as_bytes())
    .ok_or_else(|| Error::UnknownEncoding(label.to_owned()))
}
