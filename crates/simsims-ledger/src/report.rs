//! Run report export.
//!
//! Written once, when the world ends: the full recorded history plus the
//! run summary, as a single pretty-printed JSON document.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use simsims_events::{CycleRow, RecordError, ResourceKind, RunSummary, TRACKED_KINDS};
use uuid::Uuid;

/// The exported document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Column names of `rows[].counts`
    pub columns: Vec<String>,
    pub rows: Vec<CycleRow>,
    pub summary: RunSummary,
    /// Highest worker count seen in any row
    pub peak_workers: u64,
}

impl RunReport {
    pub fn new(run_id: Uuid, rows: Vec<CycleRow>, summary: RunSummary) -> Self {
        let peak_workers = rows
            .iter()
            .map(|r| r.count(ResourceKind::Worker))
            .max()
            .unwrap_or(0);
        Self {
            run_id,
            columns: TRACKED_KINDS.iter().map(|k| k.label().to_string()).collect(),
            rows,
            summary,
            peak_workers,
        }
    }
}

/// File name of the report for a run.
pub fn report_file_name(run_id: Uuid) -> String {
    format!("simsims_report_{}.json", run_id)
}

/// Writes the report into `dir`, creating it if needed.
pub fn write_report(dir: &Path, report: &RunReport) -> Result<PathBuf, RecordError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(report.run_id));
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(path)
}

/// Reads a previously exported report.
pub fn read_report(path: &Path) -> Result<RunReport, RecordError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simsims_events::fixtures;

    #[test]
    fn test_report_peak_workers() {
        let report = RunReport::new(
            fixtures::sample_run_id(),
            fixtures::sample_history(),
            fixtures::sample_summary(),
        );
        assert_eq!(report.peak_workers, 42);
        assert_eq!(report.columns.len(), 3);
    }

    #[test]
    fn test_report_file_name() {
        let name = report_file_name(fixtures::sample_run_id());
        assert!(name.starts_with("simsims_report_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_write_and_read_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::new(
            fixtures::sample_run_id(),
            fixtures::sample_history(),
            fixtures::sample_summary(),
        );

        let path = write_report(&dir.path().join("exports"), &report).unwrap();
        let parsed = read_report(&path).unwrap();

        assert_eq!(parsed.rows, report.rows);
        assert!(parsed.summary.extinct);
    }
}
