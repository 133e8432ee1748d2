//! `healthmap` binary.
//!
//! ```text
//! healthmap [--config healthmap.toml] serve
//! healthmap [--config healthmap.toml] ingest [--region SP] [--archive ./cnes.zip]
//! ```
//!
//! Both subcommands open the same SQLite file; WAL mode lets a running
//! server keep answering queries while an ingest process writes.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use healthmap_core::{proximity::ProximityService, store::FacilityStore as _};
use healthmap_ingest::{ArchiveSource, RegionFilter};
use healthmap_server::ServerConfig;
use healthmap_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Brazilian healthcare facility directory")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "healthmap.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the proximity API over HTTP.
  Serve,
  /// Fetch the establishment archive and load it into the store.
  Ingest {
    /// Region (UF) to restrict the load to. Recorded but not yet applied.
    #[arg(long)]
    region:  Option<String>,
    /// Use a local archive instead of downloading the configured URL.
    #[arg(long)]
    archive: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store_path = cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match cli.command {
    Command::Serve => serve(store, &cfg).await,
    Command::Ingest { region, archive } => ingest(store, &cfg, region, archive).await,
  }
}

async fn serve(store: Arc<SqliteStore>, cfg: &ServerConfig) -> anyhow::Result<()> {
  let service = ProximityService::new(store, cfg.query).context("invalid query settings")?;
  let app = healthmap_api::api_router(service);
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn ingest(
  store:   Arc<SqliteStore>,
  cfg:     &ServerConfig,
  region:  Option<String>,
  archive: Option<PathBuf>,
) -> anyhow::Result<()> {
  let source = match archive {
    Some(path) => ArchiveSource::Local(path),
    None => ArchiveSource::parse(&cfg.ingest.source_url),
  };
  let region = RegionFilter::from_arg(region);

  let summary =
    match healthmap_ingest::ingest(Arc::clone(&store), &cfg.ingest, &source, region).await {
      Ok(summary) => summary,
      Err(e) => {
        tracing::error!(error = %e, "ingestion aborted");
        return Err(e).context("ingestion failed");
      }
    };

  println!("{summary}");
  let total = store.count().await.context("failed to count stored facilities")?;
  println!("{total} facilities in store");
  Ok(())
}
