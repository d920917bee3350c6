//! Integration tests for the ledger.
//!
//! These feed the sample run from the shared fixtures through each
//! recorder and check what ends up on disk.

use simsims_events::{fixtures, CycleRecorder, ResourceKind};
use simsims_ledger::{read_report, render_chart, JsonlLedger, Ledger, LedgerStore};
use std::fs;
use tempfile::tempdir;

/// Records the whole sample run, then finalizes.
fn record_sample(ledger: &mut dyn CycleRecorder) {
    for snapshot in fixtures::sample_snapshots() {
        ledger.record_cycle(&snapshot).unwrap();
    }
    ledger.finalize(&fixtures::sample_summary()).unwrap();
}

#[test]
fn test_full_run_to_jsonl_and_report() {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.jsonl");
    let export_dir = dir.path().join("reports");

    let mut ledger = Ledger::jsonl(&ledger_path).unwrap().with_export_dir(&export_dir);
    record_sample(&mut ledger);

    // One JSON object per line, in cycle order.
    let content = fs::read_to_string(&ledger_path).unwrap();
    assert_eq!(content.lines().count(), 6);

    let rows = JsonlLedger::read_rows(&ledger_path).unwrap();
    let cycles: Vec<u64> = rows.iter().map(|r| r.cycle).collect();
    assert_eq!(cycles, vec![0, 1, 2, 3, 4, 5]);
    let row_ids: Vec<u64> = rows.iter().map(|r| r.row_id).collect();
    assert_eq!(row_ids, vec![1, 2, 3, 4, 5, 6]);

    let report_path = ledger.exported_report().unwrap().clone();
    assert!(report_path.starts_with(&export_dir));
    let report = read_report(&report_path).unwrap();
    assert_eq!(report.run_id, ledger.run_id());
    assert_eq!(report.rows, rows);
    assert_eq!(report.peak_workers, 42);
    assert!(report.summary.extinct);
}

#[test]
fn test_memory_and_jsonl_rows_agree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");

    let mut memory = Ledger::in_memory();
    let mut jsonl = Ledger::jsonl(&path).unwrap();
    record_sample(&mut memory);
    record_sample(&mut jsonl);

    let counts = |ledger: &Ledger| -> Vec<Vec<u64>> {
        ledger.all_rows().unwrap().into_iter().map(|r| r.counts).collect()
    };
    assert_eq!(counts(&memory), counts(&jsonl));
}

#[test]
fn test_reopening_ledger_starts_fresh() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");

    let mut first = Ledger::jsonl(&path).unwrap();
    record_sample(&mut first);
    drop(first);

    let mut second = Ledger::new(LedgerStore::Jsonl(
        JsonlLedger::create(&path, fixtures::sample_run_id()).unwrap(),
    ));
    second.record_cycle(&fixtures::snapshot(0, 2, 1, 1)).unwrap();

    let rows = JsonlLedger::read_rows(&path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].run_id, fixtures::sample_run_id());
    assert_eq!(rows[0].count(ResourceKind::Worker), 2);
}

#[test]
fn test_chart_from_persisted_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let mut ledger = Ledger::jsonl(&path).unwrap();
    record_sample(&mut ledger);

    let rows = JsonlLedger::read_rows(&path).unwrap();
    let chart = render_chart(&rows, 72, 16);
    let lines: Vec<&str> = chart.lines().collect();

    // Fewer rows than columns: one column per cycle.
    assert_eq!(lines.len(), 18);
    assert_eq!(lines[16].matches('-').count(), 6);
    assert!(lines[0].starts_with("42 |"));
}
