//! Archive retrieval and staging.
//!
//! The dataset ships as a zip archive holding one semicolon-delimited table
//! in a legacy single-byte encoding. The fetcher stages the archive locally,
//! extracts the table next to it and exposes it as a UTF-8 byte stream.
//! Every file the fetcher creates is owned by a [`StagedFile`] guard and is
//! removed when the guard drops, on success and failure alike.

use std::{
  fs::File,
  io::{self, BufReader, Read},
  path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use tokio::io::AsyncWriteExt as _;
use uuid::Uuid;

use crate::{Error, Result, settings::resolve_encoding};

// ─── Source ──────────────────────────────────────────────────────────────────

/// Where the archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
  /// Downloaded over HTTP(S) into the staging directory.
  Remote(String),
  /// An archive already on disk. Read in place and never deleted.
  Local(PathBuf),
}

impl ArchiveSource {
  /// `http://` and `https://` locations are remote; anything else is a path.
  pub fn parse(location: &str) -> Self {
    let lower = location.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
      Self::Remote(location.to_owned())
    } else {
      Self::Local(PathBuf::from(location))
    }
  }
}

// ─── Staged file guard ───────────────────────────────────────────────────────

/// A file this process created in the staging directory. Removed on drop.
#[derive(Debug)]
pub struct StagedFile {
  path: PathBuf,
}

impl StagedFile {
  /// Create a fresh, uniquely named file under `dir`.
  fn create(dir: &Path, extension: &str) -> io::Result<(Self, File)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("healthmap-{}.{extension}", Uuid::new_v4()));
    let file = File::options().write(true).create_new(true).open(&path)?;
    Ok((Self { path }, file))
  }

  pub fn path(&self) -> &Path { &self.path }
}

impl Drop for StagedFile {
  fn drop(&mut self) {
    match std::fs::remove_file(&self.path) {
      Ok(()) => tracing::debug!(path = %self.path.display(), "staged file removed"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => {
        tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staged file")
      }
    }
  }
}

// ─── Staged dataset ──────────────────────────────────────────────────────────

/// The extracted table plus the staged archive it came from.
///
/// Dropping the dataset removes both staged files.
#[derive(Debug)]
pub struct StagedDataset {
  table:      StagedFile,
  entry_name: String,
  encoding:   &'static Encoding,
  // Held only so the downloaded archive lives exactly as long as the table.
  _archive:   Option<StagedFile>,
}

impl StagedDataset {
  /// Path of the extracted table on local storage.
  pub fn path(&self) -> &Path { self.table.path() }

  /// Name of the table entry inside the archive.
  pub fn entry_name(&self) -> &str { &self.entry_name }

  /// Open the table as a UTF-8 byte stream, decoding from the configured
  /// encoding as it is read.
  pub fn open(&self) -> Result<Box<dyn Read + Send>> {
    let file = File::open(self.table.path())?;
    let decoded = DecodeReaderBytesBuilder::new()
      .encoding(Some(self.encoding))
      .strip_bom(true)
      .build(file);
    Ok(Box::new(BufReader::with_capacity(64 * 1024, decoded)))
  }
}

fn is_tabular(entry_name: &str) -> bool {
  Path::new(entry_name)
    .extension()
    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Copy the first `.csv` entry of `archive_path` into a staged file.
fn extract_table(archive_path: &Path, staging_dir: &Path) -> Result<(StagedFile, String)> {
  let file = File::open(archive_path)?;
  let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

  let mut found: Option<(usize, String)> = None;
  for index in 0..archive.len() {
    let entry = archive.by_index(index)?;
    if entry.is_dir() || !is_tabular(entry.name()) {
      continue;
    }
    if let Some((_, first)) = found.as_ref() {
      tracing::warn!(using = %first, ignored = %entry.name(), "archive has more than one table");
      continue;
    }
    found = Some((index, entry.name().to_owned()));
  }
  let (index, entry_name) =
    found.ok_or_else(|| Error::NoTabularEntry { archive: archive_path.to_path_buf() })?;

  let mut entry = archive.by_index(index)?;
  let (staged, mut out) = StagedFile::create(staging_dir, "csv")?;
  let bytes = io::copy(&mut entry, &mut out)?;
  out.sync_all()?;
  tracing::info!(entry = %entry_name, bytes, path = %staged.path().display(), "table extracted");
  Ok((staged, entry_name))
}

// ─── Fetcher ─────────────────────────────────────────────────────────────────

/// Retrieves and stages the dataset archive.
pub struct ArchiveFetcher {
  client:      reqwest::Client,
  staging_dir: PathBuf,
  encoding:    &'static Encoding,
}

impl ArchiveFetcher {
  pub fn new(staging_dir: impl Into<PathBuf>, encoding_label: &str) -> Result<Self> {
    Ok(Self {
      client:      reqwest::Client::builder()
        .user_agent(concat!("healthmap/", env!("CARGO_PKG_VERSION")))
        .build()?,
      staging_dir: staging_dir.into(),
      encoding:    resolve_encoding(encoding_label)?,
    })
  }

  /// Stage the archive at `source` and extract its table.
  pub async fn fetch(&self, source: &ArchiveSource) -> Result<StagedDataset> {
    let (archive, archive_path) = match source {
      ArchiveSource::Remote(url) => {
        let staged = self.download(url).await?;
        let path = staged.path().to_path_buf();
        (Some(staged), path)
      }
      ArchiveSource::Local(path) => (None, path.clone()),
    };

    let staging_dir = self.staging_dir.clone();
    let (table, entry_name) =
      tokio::task::spawn_blocking(move || extract_table(&archive_path, &staging_dir)).await??;

    Ok(StagedDataset { table, entry_name, encoding: self.encoding, _archive: archive })
  }

  /// Stream `url` to a staged file without buffering the body in memory.
  async fn download(&self, url: &str) -> Result<StagedFile> {
    tracing::info!(url, "downloading archive");
    let mut response = self.client.get(url).send().await?.error_for_status()?;

    let (staged, file) = StagedFile::create(&self.staging_dir, "zip")?;
    let mut file = tokio::fs::File::from_std(file);
    let mut bytes: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
      file.write_all(&chunk).await?;
      bytes += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;

    tracing::info!(url, bytes, path = %staged.path().display(), "archive downloaded");
    Ok(staged)
  }
}
