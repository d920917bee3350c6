//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // [dev-dependencies]
//! // simsims-events = { path = "../simsims-events", features = ["test-fixtures"] }
//!
//! use simsims_events::fixtures;
//!
//! let history = fixtures::sample_history();
//! ```

use uuid::Uuid;

use crate::{CycleRow, CycleSnapshot, ResourceKind, RunSummary};

/// Run id shared by every fixture row.
pub fn sample_run_id() -> Uuid {
    Uuid::from_u128(0x5153_0000_0000_0000_0000_0000_0000_0001)
}

/// Snapshot with the given totals.
pub fn snapshot(cycle: u64, workers: u64, products: u64, food: u64) -> CycleSnapshot {
    CycleSnapshot::new(cycle)
        .with_count(ResourceKind::Worker, workers)
        .with_count(ResourceKind::Product, products)
        .with_count(ResourceKind::Food, food)
}

/// A short run that grows, starves and dies out over six cycles.
pub fn sample_snapshots() -> Vec<CycleSnapshot> {
    vec![
        snapshot(0, 40, 41, 39),
        snapshot(1, 42, 38, 30),
        snapshot(2, 37, 30, 18),
        snapshot(3, 21, 24, 6),
        snapshot(4, 6, 20, 0),
        snapshot(5, 0, 19, 0),
    ]
}

/// Rows for [`sample_snapshots`], numbered from 1.
pub fn sample_history() -> Vec<CycleRow> {
    sample_snapshots()
        .iter()
        .enumerate()
        .map(|(i, s)| CycleRow {
            row_id: i as u64 + 1,
            run_id: sample_run_id(),
            cycle: s.cycle,
            recorded_at: 1_700_000_000 + i as u64,
            counts: s.values(),
        })
        .collect()
}

/// Summary matching the end of [`sample_snapshots`].
pub fn sample_summary() -> RunSummary {
    RunSummary {
        cycles_survived: 5,
        extinct: true,
        final_snapshot: snapshot(5, 0, 19, 0),
    }
}
