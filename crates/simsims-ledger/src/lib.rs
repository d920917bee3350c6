//! Ledger: the recording side of a simsims run.
//!
//! The world hands one snapshot per completed cycle to a [`CycleRecorder`];
//! this crate provides the recorders and the end-of-run consumers.
//!
//! # Modules
//!
//! - [`memory`]: In-memory recorder, used by tests and embedders
//! - [`jsonl`]: Append-only JSON Lines recorder backed by a file
//! - [`report`]: End-of-run JSON report export
//! - [`chart`]: Text plot of the recorded series

pub mod chart;
pub mod jsonl;
pub mod memory;
pub mod report;

pub use chart::render_chart;
pub use jsonl::JsonlLedger;
pub use memory::MemoryLedger;
pub use report::{read_report, report_file_name, write_report, RunReport};

use std::path::{Path, PathBuf};

use simsims_events::{CycleRecorder, CycleRow, CycleSnapshot, RecordError, RunSummary};
use uuid::Uuid;

/// Where rows are kept.
#[derive(Debug)]
pub enum LedgerStore {
    /// Rows live in memory only
    Memory(MemoryLedger),
    /// Rows are appended to a JSONL file
    Jsonl(JsonlLedger),
}

/// Recorder that stores rows and, on finalization, exports a report.
#[derive(Debug)]
pub struct Ledger {
    store: LedgerStore,
    /// Directory receiving the final report, if any
    export_dir: Option<PathBuf>,
    /// Path of the exported report once written
    exported: Option<PathBuf>,
}

impl Ledger {
    /// Creates a ledger over the given store.
    pub fn new(store: LedgerStore) -> Self {
        Self {
            store,
            export_dir: None,
            exported: None,
        }
    }

    /// In-memory ledger for a fresh run.
    pub fn in_memory() -> Self {
        Self::new(LedgerStore::Memory(MemoryLedger::new(Uuid::new_v4())))
    }

    /// JSONL-backed ledger for a fresh run, truncating `path`.
    pub fn jsonl(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        Ok(Self::new(LedgerStore::Jsonl(JsonlLedger::create(path, Uuid::new_v4())?)))
    }

    /// Sets the export directory for the final report.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    /// Run id stamped on every row.
    pub fn run_id(&self) -> Uuid {
        match &self.store {
            LedgerStore::Memory(m) => m.run_id(),
            LedgerStore::Jsonl(j) => j.run_id(),
        }
    }

    /// Path of the exported report, once the run has been finalized.
    pub fn exported_report(&self) -> Option<&PathBuf> {
        self.exported.as_ref()
    }

    fn recorder(&mut self) -> &mut dyn CycleRecorder {
        match &mut self.store {
            LedgerStore::Memory(m) => m,
            LedgerStore::Jsonl(j) => j,
        }
    }
}

impl CycleRecorder for Ledger {
    fn record_cycle(&mut self, snapshot: &CycleSnapshot) -> Result<(), RecordError> {
        self.recorder().record_cycle(snapshot)
    }

    fn all_rows(&self) -> Result<Vec<CycleRow>, RecordError> {
        match &self.store {
            LedgerStore::Memory(m) => m.all_rows(),
            LedgerStore::Jsonl(j) => j.all_rows(),
        }
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), RecordError> {
        self.recorder().finalize(summary)?;

        if let Some(dir) = self.export_dir.clone() {
            let report = RunReport::new(self.run_id(), self.all_rows()?, summary.clone());
            let path = write_report(&dir, &report)?;
            tracing::info!("Exported run report to {:?}", path);
            self.exported = Some(path);
        }
        Ok(())
    }
}
