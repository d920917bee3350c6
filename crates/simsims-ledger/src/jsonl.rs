//! JSONL Ledger
//!
//! Append-only JSON Lines recorder: one row per completed cycle.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use simsims_events::{CycleRecorder, CycleRow, CycleSnapshot, RecordError, RunSummary};
use uuid::Uuid;

/// Recorder appending rows to a file.
///
/// The file is truncated when the ledger is created, so every run starts
/// from a fresh table. Each row is flushed as it is written, which keeps
/// [`CycleRecorder::all_rows`] consistent with what has been recorded.
#[derive(Debug)]
pub struct JsonlLedger {
    path: PathBuf,
    writer: BufWriter<File>,
    run_id: Uuid,
    next_row_id: u64,
}

impl JsonlLedger {
    /// Create a new ledger writing to the specified path
    pub fn create(path: impl AsRef<Path>, run_id: Uuid) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            run_id,
            next_row_id: 1,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> Result<(), RecordError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Reads every row from a ledger file.
    pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<CycleRow>, RecordError> {
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(RecordError::from))
            .collect()
    }
}

impl CycleRecorder for JsonlLedger {
    fn record_cycle(&mut self, snapshot: &CycleSnapshot) -> Result<(), RecordError> {
        let row = CycleRow::from_snapshot(self.next_row_id, self.run_id, snapshot);
        let json = serde_json::to_string(&row)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        self.next_row_id += 1;
        Ok(())
    }

    fn all_rows(&self) -> Result<Vec<CycleRow>, RecordError> {
        Self::read_rows(&self.path)
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), RecordError> {
        tracing::debug!(
            "Closing ledger {:?} after {} cycles",
            self.path,
            summary.cycles_survived
        );
        self.flush()
    }
}

impl Drop for JsonlLedger {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Failed to flush ledger {:?}: {}", self.path, e);
        }
    }
}
