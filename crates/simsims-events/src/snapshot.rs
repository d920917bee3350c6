//! Snapshot Types
//!
//! Serialization structs for end-of-cycle snapshots and recorded rows.
//!
//! A snapshot captures the resource totals of the world after a cycle's
//! completion barrier; a row is the append-only persisted form of one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::kind::{ResourceKind, TRACKED_KINDS};

/// Resource totals and topology of the world at the end of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSnapshot {
    /// Cycle the snapshot closes
    pub cycle: u64,
    /// Totals aligned to [`TRACKED_KINDS`]
    pub counts: [u64; 3],
    /// Storage instance count per storage kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage_instances: BTreeMap<String, usize>,
    /// Activity instance count per activity kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub activity_instances: BTreeMap<String, usize>,
    /// Priority per activity kind when the snapshot was taken
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub priorities: BTreeMap<String, u32>,
}

impl CycleSnapshot {
    /// Creates an empty snapshot for the given cycle.
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Default::default()
        }
    }

    /// Sets the total for one resource kind.
    pub fn with_count(mut self, kind: ResourceKind, count: u64) -> Self {
        self.counts[kind.column()] = count;
        self
    }

    /// Total for one resource kind.
    pub fn count(&self, kind: ResourceKind) -> u64 {
        self.counts[kind.column()]
    }

    /// Totals in the fixed tracked order.
    pub fn values(&self) -> Vec<u64> {
        self.counts.to_vec()
    }

    /// True when no living worker remains anywhere.
    pub fn is_extinct(&self) -> bool {
        self.count(ResourceKind::Worker) == 0
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One persisted row: `{resourceType: count}` for a single cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRow {
    /// Sequential row id within a ledger, starting at 1
    pub row_id: u64,
    /// Run the row belongs to
    pub run_id: Uuid,
    /// Cycle number
    pub cycle: u64,
    /// Wall-clock time of recording, unix seconds
    pub recorded_at: u64,
    /// Counts aligned to [`TRACKED_KINDS`]
    pub counts: Vec<u64>,
}

impl CycleRow {
    /// Builds a row from a snapshot, stamped with the current time.
    pub fn from_snapshot(row_id: u64, run_id: Uuid, snapshot: &CycleSnapshot) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            row_id,
            run_id,
            cycle: snapshot.cycle,
            recorded_at,
            counts: snapshot.values(),
        }
    }

    /// Count for one resource kind, zero when the column is missing.
    pub fn count(&self, kind: ResourceKind) -> u64 {
        self.counts.get(kind.column()).copied().unwrap_or(0)
    }

    /// Column name/value pairs in tracked order.
    pub fn columns(&self) -> Vec<(ResourceKind, u64)> {
        TRACKED_KINDS.iter().map(|&k| (k, self.count(k))).collect()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Completed cycles before the run ended
    pub cycles_survived: u64,
    /// Whether the run ended because the workforce died out
    pub extinct: bool,
    /// The last snapshot taken
    pub final_snapshot: CycleSnapshot,
}
