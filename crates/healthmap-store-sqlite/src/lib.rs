//! SQLite backend for the healthmap facility store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Locations are indexed with an SQLite
//! R*Tree and filtered with an exact geodesic distance function.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
