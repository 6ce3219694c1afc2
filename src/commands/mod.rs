pub mod build;
pub mod build_all;
pub mod status;

use crate::station::builder::{BuildReport, DateStatus};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Per-station summary lines shared by `build` and `build-all`.
pub fn describe_build(report: &mut CommandReport, build: &BuildReport) {
    let prefix = build.station.as_str();
    report.detail(format!("{prefix}: output={}", build.output_path.display()));
    report.detail(format!("{prefix}: neighbors={}", build.neighbors));
    report.detail(format!("{prefix}: dates={}", build.dates.len()));
    report.detail(format!("{prefix}: ingested={}", build.ingested_count()));
    report.detail(format!("{prefix}: skipped={}", build.skipped.len()));
    report.detail(format!("{prefix}: auxiliary_records={}", build.aux_records));
    report.detail(format!("{prefix}: archive_bytes={}", build.archive_bytes));
    if build.ingested.is_empty() {
        report.detail(format!("{prefix}: no recordings ingested"));
    }
    for outcome in &build.dates {
        let day = outcome.day_token.as_deref().unwrap_or("-");
        let status = match outcome.status {
            DateStatus::Matched { files } => format!("matched({files})"),
            DateStatus::NoRecordings => "no_recordings".to_string(),
            DateStatus::StationDirMissing => "station_dir_missing".to_string(),
            DateStatus::SearchFailed => "search_failed".to_string(),
            DateStatus::InvalidDate => "invalid_date".to_string(),
            DateStatus::DuplicateDay => "duplicate_day".to_string(),
        };
        report.detail(format!(
            "{prefix}: date={} day={day} status={status}",
            outcome.date
        ));
    }
    for unit in &build.skipped {
        report.detail(format!(
            "{prefix}: skipped_file={} reason={}",
            unit.path.display(),
            unit.reason
        ));
    }
    for key in &build.aux_collisions {
        report.detail(format!("{prefix}: aux_key_collision={key}"));
    }
}
