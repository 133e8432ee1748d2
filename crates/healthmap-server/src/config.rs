//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `HEALTHMAP_*` environment variables.
//!
//! Nested keys use a double underscore, e.g. `HEALTHMAP_INGEST__CHUNK_SIZE`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use healthmap_core::proximity::QuerySettings;
use healthmap_ingest::IngestSettings;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "HEALTHMAP";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path: PathBuf,
  pub ingest:     IngestSettings,
  pub query:      QuerySettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_owned(),
      port:       8080,
      store_path: PathBuf::from("healthmap.db"),
      ingest:     IngestSettings::default(),
      query:      QuerySettings::default(),
    }
  }
}

impl ServerConfig {
  /// Load from `path` (skipped when absent) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(Config::builder().add_source(File::from(path).required(false)))
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    let cfg: Self = builder
      .add_source(
        Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    self.ingest.validate().context("invalid [ingest] settings")?;
    self.query.validate().context("invalid [query] settings")?;
    Ok(())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  fn from_toml(toml: &str) -> anyhow::Result<ServerConfig> {
    ServerConfig::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
  }

  #[test]
  fn empty_file_yields_defaults() {
    let cfg = from_toml("").unwrap();
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.store_path, PathBuf::from("healthmap.db"));
    assert_eq!(cfg.ingest.chunk_size, 50_000);
    assert_eq!(cfg.ingest.commit_batch_size, 1_000);
    assert_eq!(cfg.ingest.encoding, "windows-1252");
    assert_eq!(cfg.ingest.delimiter, ';');
    assert_eq!(cfg.query, QuerySettings::default());
  }

  #[test]
  fn nested_sections_override_defaults() {
    let cfg = from_toml(
      r#"
        port = 9000

        [ingest]
        chunk_size = 10
        delimiter = ","

        [ingest.columns]
        natural_id = ["ID"]

        [query]
        result_limit = 5
      "#,
    )
    .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.ingest.chunk_size, 10);
    assert_eq!(cfg.ingest.commit_batch_size, 1_000);
    assert_eq!(cfg.ingest.delimiter, ',');
    assert_eq!(cfg.ingest.columns.natural_id, vec!["ID".to_owned()]);
    assert!(!cfg.ingest.columns.latitude.is_empty(), "other aliases keep defaults");
    assert_eq!(cfg.query.result_limit, 5);
    assert_eq!(cfg.query.default_radius_m, 5000.0);
  }

  #[test]
  fn zero_sizes_are_rejected() {
    assert!(from_toml("[ingest]\ncommit_batch_size = 0\n").is_err());
    assert!(from_toml("[query]\nresult_limit = 0\n").is_err());
    assert!(from_toml("[query]\ndefault_radius_m = -1.0\n").is_err());
  }

  #[test]
  fn missing_file_is_not_an_error() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/healthmap.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
  }

  #[test]
  fn tilde_expansion() {
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    }
  }
}
