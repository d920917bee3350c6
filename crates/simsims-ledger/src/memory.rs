//! In-memory recorder.

use simsims_events::{CycleRecorder, CycleRow, CycleSnapshot, RecordError, RunSummary};
use uuid::Uuid;

/// Keeps every row in a vector.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    run_id: Uuid,
    rows: Vec<CycleRow>,
    summary: Option<RunSummary>,
}

impl MemoryLedger {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            rows: Vec::new(),
            summary: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Summary passed at finalization, if the run has ended.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

impl CycleRecorder for MemoryLedger {
    fn record_cycle(&mut self, snapshot: &CycleSnapshot) -> Result<(), RecordError> {
        let row_id = self.rows.len() as u64 + 1;
        self.rows
            .push(CycleRow::from_snapshot(row_id, self.run_id, snapshot));
        Ok(())
    }

    fn all_rows(&self) -> Result<Vec<CycleRow>, RecordError> {
        Ok(self.rows.clone())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), RecordError> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}
