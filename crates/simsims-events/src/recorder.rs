//! Recorder sink interface.
//!
//! The world forwards one snapshot per completed cycle to a recorder and
//! finalizes it once when the run ends. Recorders are append-only from the
//! world's point of view; they never influence scheduling.

use thiserror::Error;

use crate::snapshot::{CycleRow, CycleSnapshot, RunSummary};

/// Errors raised by recorder implementations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// IO failure writing or reading the backing store
    #[error("recorder IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A row could not be encoded or decoded
    #[error("recorder encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only sink for per-cycle snapshots.
pub trait CycleRecorder: Send {
    /// Appends the row for one completed cycle.
    fn record_cycle(&mut self, snapshot: &CycleSnapshot) -> Result<(), RecordError>;

    /// Every row recorded so far, oldest first.
    fn all_rows(&self) -> Result<Vec<CycleRow>, RecordError>;

    /// Called once when the world ends (export and plot hooks).
    fn finalize(&mut self, summary: &RunSummary) -> Result<(), RecordError>;
}

/// Recorder that keeps nothing.
#[derive(Debug, Default)]
pub struct NullRecorder {
    recorded: u64,
}

impl NullRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cycles offered to this recorder.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }
}

impl CycleRecorder for NullRecorder {
    fn record_cycle(&mut self, _snapshot: &CycleSnapshot) -> Result<(), RecordError> {
        self.recorded += 1;
        Ok(())
    }

    fn all_rows(&self) -> Result<Vec<CycleRow>, RecordError> {
        Ok(Vec::new())
    }

    fn finalize(&mut self, _summary: &RunSummary) -> Result<(), RecordError> {
        Ok(())
    }
}
