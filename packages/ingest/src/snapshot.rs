//! JSON-lines mirror of fetched pages.
//!
//! The file is created fresh for each run and receives one JSON object per
//! fetched record. Each page is flushed before the next one is fetched, so
//! a run that fails part-way leaves every earlier page on disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_map_ticket_models::RawPayload;

use crate::IngestError;

/// Append-only snapshot of one ingestion run.
pub struct SnapshotWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: u64,
}

impl SnapshotWriter {
    /// Creates (or truncates) the snapshot file at `path`, creating its
    /// parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Snapshot`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, IngestError> {
        let file = parking_map_database::paths::ensure_parent(path)
            .and_then(|()| File::create(path))
            .map_err(|source| IngestError::Snapshot {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("Writing raw snapshot to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    /// Snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far.
    #[must_use]
    pub const fn lines(&self) -> u64 {
        self.lines
    }

    /// Appends every record of `page` as one line and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if serialization or the write fails.
    pub fn append_page(&mut self, page: &[RawPayload]) -> Result<(), IngestError> {
        for record in page {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n").map_err(|e| self.io_error(e))?;
            self.lines += 1;
        }
        self.writer.flush().map_err(|e| self.io_error(e))
    }

    /// Flushes and closes the file, returning the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Snapshot`] if the final flush fails.
    pub fn finish(mut self) -> Result<u64, IngestError> {
        self.writer.flush().map_err(|e| self.io_error(e))?;
        Ok(self.lines)
    }

    fn io_error(&self, source: std::io::Error) -> IngestError {
        IngestError::Snapshot {
            path: self.path.clone(),
            source,
        }
    }
}
