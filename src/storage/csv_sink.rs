use crate::models::{Listing, COLUMNS};
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

/// Append-only CSV file of listings
///
/// The header is written only when the file is new or empty, so re-running a
/// scraper keeps adding rows under the existing header.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl CsvSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer
                .write_record(COLUMNS)
                .with_context(|| format!("Failed to write header to {}", path.display()))?;
            writer.flush()?;
            info!("Created {}", path.display());
        } else {
            info!("Appending to {}", path.display());
        }

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Write one row and flush it to disk
    pub fn append(&mut self, listing: &Listing) -> Result<()> {
        self.writer
            .write_record(listing.to_record())
            .with_context(|| format!("Failed to write listing {} to {}", listing.id, self.path.display()))?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written through this handle
    pub fn rows(&self) -> usize {
        self.rows
    }
}
