//! Core types and trait definitions for the healthmap facility directory.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Everything here is either a pure function over raw dataset values or an
//! abstraction that storage backends implement.

pub mod coords;
pub mod error;
pub mod facility;
pub mod geo;
pub mod mapper;
pub mod proximity;
pub mod store;

pub use error::{Error, Result};
