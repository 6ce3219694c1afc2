use crate::station::paths::StationPaths;
use crate::station::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;

#[derive(Debug, Clone, Serialize)]
pub struct BuildAuditEvent {
    pub at_epoch_secs: u64,
    pub station: String,
    pub output_path: String,
    pub status: String,
    pub ingested: usize,
    pub skipped: usize,
    pub message: String,
}

impl BuildAuditEvent {
    pub fn new(station: &str, output_path: &str, status: &str) -> Self {
        Self {
            at_epoch_secs: 0,
            station: station.to_string(),
            output_path: output_path.to_string(),
            status: status.to_string(),
            ingested: 0,
            skipped: 0,
            message: String::new(),
        }
    }
}

pub fn append_event(paths: &StationPaths, mut event: BuildAuditEvent) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    event.at_epoch_secs = now_epoch_secs()?;

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let path = paths.logs_dir.join("audit.log");
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}
