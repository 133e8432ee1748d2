//! Bulk ingestion of the national establishment dataset.
//!
//! The pipeline is a single sequential pass:
//!
//! ```text
//! remote archive ─▶ ArchiveFetcher ─▶ StagedDataset ─▶ ChunkedRows
//!                                                          │
//!                          FacilityStore ◀─ IngestDriver ◀─┘
//! ```
//!
//! Only fetch and header-parse failures abort a run; every row-level fault is
//! counted in the returned [`IngestSummary`].

pub mod driver;
pub mod error;
pub mod fetch;
pub mod reader;
pub mod settings;

use std::sync::Arc;

use healthmap_core::store::FacilityStore;

pub use driver::{IngestDriver, IngestSummary, RegionFilter};
pub use error::{Error, Result};
pub use fetch::{ArchiveFetcher, ArchiveSource, StagedDataset};
pub use settings::IngestSettings;

/// Fetch the archive from `source`, stream it through the driver into
/// `store`, and clean up every staged file before returning.
pub async fn ingest<S>(
  store:    Arc<S>,
  settings: &IngestSettings,
  source:   &ArchiveSource,
  region:   RegionFilter,
) -> Result<IngestSummary>
where
  S: FacilityStore + 'static,
{
  settings.validate()?;
  let driver = IngestDriver::new(store, settings.clone())?;
  let fetcher = ArchiveFetcher::new(&settings.staging_dir, &settings.encoding)?;

  let dataset = fetcher.fetch(source).await?;
  tracing::info!(entry = dataset.entry_name(), "streaming dataset");
  let reader = dataset.open()?;
  let summary = driver.run(reader, region).await;
  drop(dataset);
  summary
}
