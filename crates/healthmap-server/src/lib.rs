//! Process bootstrapping for the `healthmap` binary: configuration loading
//! and path handling shared by the `serve` and `ingest` subcommands.

pub mod config;

pub use config::{ServerConfig, expand_tilde};
