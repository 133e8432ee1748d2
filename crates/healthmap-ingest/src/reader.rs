//! Bounded-memory row streaming over the extracted table.
//!
//! [`ChunkedRows`] parses the delimited stream incrementally and hands out at
//! most `chunk_size` rows at a time, projected onto the logical columns the
//! mapper reads. Nothing beyond the current chunk is ever held in memory.

use std::io::Read;

use healthmap_core::mapper::{Column, ColumnSet, RawRow};

use crate::{Error, Result};

/// One bounded slice of the dataset.
#[derive(Debug, Default)]
pub struct Chunk {
  pub rows:       Vec<RawRow>,
  /// Records the parser could not decode (e.g. invalid UTF-8).
  pub unreadable: usize,
}

impl Chunk {
  /// Number of source records consumed by this chunk.
  pub fn len(&self) -> usize { self.rows.len() + self.unreadable }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Incremental chunked reader over a delimited table with a header row.
pub struct ChunkedRows<R> {
  reader:     csv::Reader<R>,
  projection: Vec<(Column, usize)>,
  chunk_size: usize,
  record:     csv::StringRecord,
  exhausted:  bool,
}

impl<R: Read> ChunkedRows<R> {
  /// Read the header from `source` and resolve `columns` against it.
  ///
  /// Fails if the header cannot be parsed or if no natural-id column is
  /// present, since every row would be malformed.
  pub fn new(source: R, delimiter: u8, columns: &ColumnSet, chunk_size: usize) -> Result<Self> {
    let mut reader = csv::ReaderBuilder::new()
      .delimiter(delimiter)
      .has_headers(true)
      .flexible(true)
      .from_reader(source);

    let header: Vec<String> = reader
      .headers()?
      .iter()
      .map(|h| h.trim_start_matches('\u{feff}').trim().to_owned())
      .collect();
    let projection = columns.resolve(&header);

    if !projection.iter().any(|(c, _)| *c == Column::NaturalId) {
      return Err(Error::MissingColumn {
        column:     "natural id",
        candidates: columns.natural_id.clone(),
      });
    }
    for column in [Column::Name, Column::Region, Column::Locality, Column::Latitude, Column::Longitude]
    {
      if !projection.iter().any(|(c, _)| *c == column) {
        tracing::warn!(?column, "column not found in header; every row will use its fallback");
      }
    }
    tracing::debug!(?projection, "header resolved");

    Ok(Self {
      reader,
      projection,
      chunk_size: chunk_size.max(1),
      record: csv::StringRecord::new(),
      exhausted: false,
    })
  }

  /// The next chunk, or `None` once the stream is exhausted.
  ///
  /// Record-level decode errors are counted in [`Chunk::unreadable`]; an I/O
  /// error on the underlying stream is returned as fatal.
  pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
    if self.exhausted {
      return Ok(None);
    }

    let mut chunk = Chunk { rows: Vec::with_capacity(self.chunk_size.min(8192)), unreadable: 0 };
    while chunk.len() < self.chunk_size {
      match self.reader.read_record(&mut self.record) {
        Ok(true) => chunk.rows.push(self.project()),
        Ok(false) => {
          self.exhausted = true;
          break;
        }
        Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
        Err(e) => {
          tracing::debug!(error = %e, "unreadable record");
          chunk.unreadable += 1;
        }
      }
    }

    Ok((!chunk.is_empty()).then_some(chunk))
  }

  fn project(&self) -> RawRow {
    let mut row = RawRow::new();
    for (column, index) in &self.projection {
      if let Some(value) = self.record.get(*index) {
        row.set(*column, value);
      }
    }
    row
  }
}
