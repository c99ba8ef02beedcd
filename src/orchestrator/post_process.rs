//! Post-run processing utilities.
//!
//! Handles report exports after a run completes.

use crate::model::RunReport;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub export_messages: Vec<String>,
    pub exported_path: Option<PathBuf>,
}

/// Process a completed run: write the JSON export when one was requested.
pub(crate) fn process_run_completion(export_json: Option<&Path>, report: &RunReport) -> ProcessedRun {
    let mut export_messages = Vec::new();
    let mut exported_path = None;
    if let Some(export_path) = export_json {
        match export_report_json(export_path, report) {
            Ok(()) => {
                export_messages.push(format!("Exported JSON: {}", export_path.display()));
                exported_path = Some(export_path.to_path_buf());
            }
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedRun {
        export_messages,
        exported_path,
    }
}

pub(crate) fn export_report_json(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("serialize run report")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), "run report exported");
    Ok(())
}

/// File name for an export made without an explicit path.
pub(crate) fn default_export_name(report: &RunReport) -> String {
    let stamp: String = report
        .timestamp_utc
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("skill-analysis-{}-{}.json", report.student.student_id, stamp)
}
