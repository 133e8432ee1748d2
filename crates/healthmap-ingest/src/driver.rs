//! The chunked ingestion driver.
//!
//! Streams rows chunk by chunk, maps each one, deduplicates against the store
//! and the not-yet-flushed batch, and commits in bounded batches. Only header
//! and stream failures abort a run; every per-row outcome lands in the
//! [`IngestSummary`].

use std::{collections::HashSet, fmt, io::Read, sync::Arc};

use healthmap_core::{
  facility::NewFacility,
  mapper::{MapOutcome, map_row},
  store::FacilityStore,
};

use crate::{Result, reader::ChunkedRows, settings::IngestSettings};

// ─── Region filter ───────────────────────────────────────────────────────────

/// The region a run was asked to restrict itself to.
///
/// The dataset ships nationwide and rows are not filtered by region yet; a
/// requested region is carried through as `Unapplied` so the gap is visible
/// in logs and in the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegionFilter {
  #[default]
  Nationwide,
  Unapplied(String),
}

impl RegionFilter {
  pub fn from_arg(region: Option<String>) -> Self {
    match region.map(|r| r.trim().to_owned()) {
      Some(r) if !r.is_empty() => Self::Unapplied(r),
      _ => Self::Nationwide,
    }
  }
}

impl fmt::Display for RegionFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Nationwide => f.write_str("nationwide"),
      Self::Unapplied(r) => write!(f, "nationwide ({r} requested, not applied)"),
    }
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
  /// Records durably committed.
  pub saved:         usize,
  /// Rows whose natural id was already stored or already pending.
  pub duplicates:    usize,
  /// Rows without a usable natural id, plus undecodable records.
  pub malformed:     usize,
  /// Rows abandoned after a persistence fault.
  pub failed:        usize,
  pub chunks:        usize,
  /// Non-empty commits issued.
  pub flushes:       usize,
  pub region_filter: RegionFilter,
}

impl fmt::Display for IngestSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "saved {}, skipped {} existing, {} malformed, {} failed ({} chunks, {} commits, {})",
      self.saved,
      self.duplicates,
      self.malformed,
      self.failed,
      self.chunks,
      self.flushes,
      self.region_filter,
    )
  }
}

// ─── Pending batch ───────────────────────────────────────────────────────────

/// Records staged since the last flush, with their ids for O(1) dedup.
#[derive(Default)]
struct Pending {
  records: Vec<NewFacility>,
  ids:     HashSet<String>,
}

impl Pending {
  fn contains(&self, natural_id: &str) -> bool { self.ids.contains(natural_id) }

  fn push(&mut self, record: NewFacility) {
    self.ids.insert(record.natural_id.clone());
    self.records.push(record);
  }

  fn len(&self) -> usize { self.records.len() }

  fn is_empty(&self) -> bool { self.records.is_empty() }

  fn take(&mut self) -> Vec<NewFacility> {
    self.ids.clear();
    std::mem::take(&mut self.records)
  }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

/// Runs the chunked ingestion pipeline against a store.
pub struct IngestDriver<S> {
  store:    Arc<S>,
  settings: IngestSettings,
}

impl<S: FacilityStore> IngestDriver<S> {
  pub fn new(store: Arc<S>, settings: IngestSettings) -> Result<Self> {
    settings.validate()?;
    Ok(Self { store, settings })
  }

  /// Stream `source` (UTF-8, header row first) into the store.
  ///
  /// Parsing runs on the blocking pool one chunk at a time, so at most one
  /// chunk of rows is resident while the store is being written.
  pub async fn run<R>(&self, source: R, region: RegionFilter) -> Result<IngestSummary>
  where
    R: Read + Send + 'static,
  {
    if let RegionFilter::Unapplied(r) = &region {
      tracing::warn!(region = %r, "region filter is not applied; ingesting the full dataset");
    }

    let delimiter = self.settings.delimiter_byte();
    let columns = self.settings.columns.clone();
    let chunk_size = self.settings.chunk_size;
    let mut rows = tokio::task::spawn_blocking(move || {
      ChunkedRows::new(source, delimiter, &columns, chunk_size)
    })
    .await??;

    let mut summary = IngestSummary { region_filter: region, ..IngestSummary::default() };
    let mut pending = Pending::default();

    loop {
      let (returned, next) = tokio::task::spawn_blocking(move || {
        let next = rows.next_chunk();
        (rows, next)
      })
      .await?;
      rows = returned;
      let Some(chunk) = next? else { break };

      summary.chunks += 1;
      summary.malformed += chunk.unreadable;

      for row in &chunk.rows {
        match map_row(row) {
          MapOutcome::Skip(reason) => {
            tracing::debug!(?reason, "row skipped");
            summary.malformed += 1;
          }
          MapOutcome::Mapped(record) => self.stage(record, &mut pending, &mut summary).await,
        }
        if pending.len() >= self.settings.commit_batch_size {
          self.flush(&mut pending, &mut summary).await;
        }
      }

      // No chunk boundary leaves work uncommitted.
      self.flush(&mut pending, &mut summary).await;
      tracing::info!(
        chunk = summary.chunks,
        rows = chunk.len(),
        saved = summary.saved,
        duplicates = summary.duplicates,
        malformed = summary.malformed,
        failed = summary.failed,
        "chunk processed"
      );
    }

    self.flush(&mut pending, &mut summary).await;
    tracing::info!(%summary, "ingestion complete");
    Ok(summary)
  }

  /// Dedup `record` against the pending batch and the store, staging it if
  /// it is new.
  async fn stage(&self, record: NewFacility, pending: &mut Pending, summary: &mut IngestSummary) {
    if pending.contains(&record.natural_id) {
      summary.duplicates += 1;
      return;
    }
    match self.store.exists(&record.natural_id).await {
      Ok(true) => summary.duplicates += 1,
      Ok(false) => pending.push(record),
      Err(e) => {
        tracing::warn!(natural_id = %record.natural_id, error = %e, "existence check failed; row abandoned");
        summary.failed += 1;
      }
    }
  }

  /// Commit everything staged since the last flush.
  ///
  /// A record the store rejects is rolled back on its own and counted as
  /// failed. If the commit as a whole fails, every staged record is counted
  /// as failed and the run continues.
  async fn flush(&self, pending: &mut Pending, summary: &mut IngestSummary) {
    if pending.is_empty() {
      return;
    }
    let records = pending.take();
    let staged = records.len();

    match self.store.commit_batch(records).await {
      Ok(report) => {
        summary.flushes += 1;
        summary.saved += report.saved;
        summary.failed += report.rejected.len();
        for rejection in &report.rejected {
          tracing::warn!(
            natural_id = %rejection.natural_id,
            reason = %rejection.reason,
            "persistence fault; record rolled back"
          );
        }
        tracing::debug!(staged, saved = report.saved, total_saved = summary.saved, "flushed");
      }
      Err(e) => {
        tracing::error!(staged, error = %e, "commit failed; batch rolled back");
        summary.failed += staged;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn region_filter_from_arg() {
    assert_eq!(RegionFilter::from_arg(None), RegionFilter::Nationwide);
    assert_eq!(RegionFilter::from_arg(Some("  ".into())), RegionFilter::Nationwide);
    assert_eq!(RegionFilter::from_arg(Some(" PR ".into())), RegionFilter::Unapplied("PR".into()));
  }

  #[test]
  fn summary_display() {
    let summary = IngestSummary {
      saved: 10,
      duplicates: 2,
      malformed: 1,
      failed: 0,
      chunks: 1,
      flushes: 1,
      region_filter: RegionFilter::Unapplied("PR".into()),
    };
    assert_eq!(
      summary.to_string(),
      "saved 10, skipped 2 existing, 1 malformed, 0 failed \
       (1 chunks, 1 commits, nationwide (PR requested, not applied))"
    );
  }
}
