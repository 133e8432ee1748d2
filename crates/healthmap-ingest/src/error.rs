//! Error type for `healthmap-ingest`.
//!
//! Every variant is fatal for the run that raised it. Row-level faults never
//! become an `Error`; they are counted in the summary instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("archive {} contains no .csv entry", archive.display())]
  NoTabularEntry { archive: PathBuf },

  #[error("dataset header has none of the {column} columns {candidates:?}")]
  MissingColumn { column: &'static str, candidates: Vec<String> },

  #[error("unknown text encoding label: {0:?}")]
  UnknownEncoding(String),

  #[error("invalid ingest settings: {0}")]
  InvalidSettings(String),

  #[error("blocking task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
