//! Error types for `healthmap-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A caller-supplied query argument violates the query contract.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
