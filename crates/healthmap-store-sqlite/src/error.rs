//! Error type for `healthmap-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The unique constraint on `natural_id` rejected an insert.
  #[error("natural id {natural_id:?} is already stored")]
  ConstraintViolation { natural_id: String },

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
