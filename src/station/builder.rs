use crate::container::{
    ArchiveReader, ArchiveSummary, ArchiveWriter, Attributes, EntryKind, WAVEFORMS_GROUP,
};
use crate::error::{StationError, WarnCode};
use crate::station::aux_meta::write_connections;
use crate::station::dates::{connected_dates, day_token, unique_dates};
use crate::station::resolve::{SearchStatus, find_recordings};
use crate::station::sac::RecordingReader;
use crate::station::sanitize::waveform_tag;
use crate::station::topology::Topology;
use crate::station::warn::{self, WarnEvent};
use anyhow::{Context, Result, bail};
use fs2::FileExt;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything a build reads from; shared read-only across workers.
#[derive(Clone, Copy)]
pub struct BuildSources<'a> {
    pub topology: &'a dyn Topology,
    pub sac_root: &'a Path,
    pub reader: &'a dyn RecordingReader,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub station: &'a str,
    pub output_path: &'a Path,
    pub overwrite: bool,
    pub verbose: bool,
}

impl<'a> BuildRequest<'a> {
    pub fn new(station: &'a str, output_path: &'a Path) -> Self {
        Self {
            station,
            output_path,
            overwrite: false,
            verbose: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedUnit {
    pub path: PathBuf,
    pub tag: String,
    pub entry_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested(IngestedUnit),
    Skipped(SkippedUnit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStatus {
    Matched { files: usize },
    NoRecordings,
    StationDirMissing,
    SearchFailed,
    InvalidDate,
    /// Another spelling of a day that was already searched.
    DuplicateDay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateOutcome {
    pub date: String,
    pub day_token: Option<String>,
    pub status: DateStatus,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub station: String,
    pub output_path: PathBuf,
    pub neighbors: usize,
    pub dates: Vec<DateOutcome>,
    pub ingested: Vec<IngestedUnit>,
    pub skipped: Vec<SkippedUnit>,
    pub aux_records: usize,
    pub aux_collisions: Vec<String>,
    pub archive_bytes: u64,
}

impl BuildReport {
    pub fn ingested_count(&self) -> usize {
        self.ingested.len()
    }
}

/// Exclusive advisory lock on `<output>.lock` held for the whole build.
///
/// The lock file is left in place after release; unlinking it would let a
/// waiter holding the old inode and a newcomer on a fresh inode both lock.
pub struct OutputLock {
    file: File,
}

impl OutputLock {
    pub fn path_for(output: &Path) -> PathBuf {
        let mut name = output
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("archive"));
        name.push(".lock");
        output.with_file_name(name)
    }

    pub fn acquire(output: &Path) -> Result<Self> {
        let path = Self::path_for(output);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(StationError::OutputBusy(output.to_path_buf()).into());
        }
        Ok(Self { file })
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

fn output_exists(req: &BuildRequest<'_>) -> Result<()> {
    if req.output_path.exists() && !req.overwrite {
        return Err(StationError::OutputExists(req.output_path.to_path_buf()).into());
    }
    Ok(())
}

fn unique_entry_path(writer: &ArchiveWriter, base: &str) -> String {
    if !writer.contains(base) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}__{n}");
        if !writer.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn skipped(station: &str, path: &Path, reason: String) -> IngestOutcome {
    let err = StationError::FileIngestion {
        path: path.to_path_buf(),
        reason: reason.clone(),
    };
    warn::emit(WarnEvent {
        code: WarnCode::FileIngestion,
        stage: "ingest",
        station,
        subject: &path.display().to_string(),
        reason: "recording-skipped",
        err: &err.to_string(),
    });
    IngestOutcome::Skipped(SkippedUnit {
        path: path.to_path_buf(),
        reason,
    })
}

fn ingest_unit(
    writer: &mut ArchiveWriter,
    reader: &dyn RecordingReader,
    station: &str,
    path: &Path,
    token: &str,
) -> IngestOutcome {
    let recording = match reader.read(path) {
        Ok(recording) => recording,
        Err(err) => return skipped(station, path, format!("{err:#}")),
    };

    let tag = waveform_tag(&recording.station, token);
    let trace = recording.trace_id().replace('/', "_");
    let start = recording.start.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
    let entry_path = unique_entry_path(writer, &format!("{WAVEFORMS_GROUP}/{tag}/{trace}__{start}"));

    let mut attrs = Attributes::new();
    attrs.insert("source_path".to_string(), path.display().to_string());
    attrs.insert("network".to_string(), recording.network.clone());
    attrs.insert("station".to_string(), recording.station.clone());
    attrs.insert("location".to_string(), recording.location.clone());
    attrs.insert("channel".to_string(), recording.channel.clone());
    attrs.insert("starttime".to_string(), start);
    attrs.insert(
        "sampling_interval".to_string(),
        recording.sampling_interval.to_string(),
    );
    attrs.insert("day".to_string(), token.to_string());
    attrs.insert("sha256".to_string(), recording.content_hash.clone());

    match writer.add_waveform(&entry_path, &attrs, &recording.samples) {
        Ok(()) => IngestOutcome::Ingested(IngestedUnit {
            path: path.to_path_buf(),
            tag,
            entry_path,
        }),
        Err(err) => skipped(station, path, format!("{err:#}")),
    }
}

fn verify_written(summary: &ArchiveSummary, report: &BuildReport) -> Result<()> {
    let archive = ArchiveReader::open(&summary.path)
        .with_context(|| format!("failed to reopen {}", summary.path.display()))?;
    let waveforms = archive.count_kind(EntryKind::Waveform);
    let aux_entries = archive.count_kind(EntryKind::FixedStrings);
    if waveforms != report.ingested.len() || aux_entries != report.aux_records {
        bail!(
            "archive {} holds {waveforms} waveforms and {aux_entries} auxiliary records, expected {} and {}",
            summary.path.display(),
            report.ingested.len(),
            report.aux_records
        );
    }
    let expected_tags: BTreeSet<String> = report.ingested.iter().map(|u| u.tag.clone()).collect();
    if archive.waveform_tags() != expected_tags || archive.size_bytes() != summary.bytes {
        bail!(
            "archive {} does not match what was written",
            summary.path.display()
        );
    }
    Ok(())
}

/// Reopens the finished archive and checks it against the report. An archive
/// that fails the check is removed from the output path.
fn verify_or_discard(summary: &ArchiveSummary, report: &BuildReport) -> Result<()> {
    if let Err(err) = verify_written(summary, report) {
        if let Err(remove_err) = fs::remove_file(&summary.path) {
            tracing::error!(
                output = %summary.path.display(),
                err = %remove_err,
                "failed to remove unverified archive"
            );
        }
        return Err(err);
    }
    Ok(())
}

/// Builds the archive for one station.
///
/// Fails only on preconditions (existing output without `overwrite`, a busy
/// output, topology errors) or when the archive itself cannot be written.
/// Bad dates, missing directories and unreadable recordings are logged and
/// recorded in the report; an archive with zero recordings is still a success.
pub fn build_archive(sources: &BuildSources<'_>, req: &BuildRequest<'_>) -> Result<BuildReport> {
    let station = req.station;
    output_exists(req)?;

    let connected = connected_dates(sources.topology, station)?;
    let dates = unique_dates(&connected);

    ensure_parent_dir(req.output_path)?;
    let _lock = OutputLock::acquire(req.output_path)?;
    output_exists(req)?;
    if req.output_path.exists() {
        fs::remove_file(req.output_path)
            .with_context(|| format!("failed to remove {}", req.output_path.display()))?;
        info!(station, output = %req.output_path.display(), "removed existing archive");
    }

    let mut writer = ArchiveWriter::create(req.output_path)?;
    let mut report = BuildReport {
        station: station.to_string(),
        output_path: req.output_path.to_path_buf(),
        neighbors: connected.len(),
        dates: Vec::with_capacity(dates.len()),
        ingested: Vec::new(),
        skipped: Vec::new(),
        aux_records: 0,
        aux_collisions: Vec::new(),
        archive_bytes: 0,
    };
    info!(
        station,
        neighbors = connected.len(),
        dates = dates.len(),
        "resolved topology"
    );

    let mut searched_days = BTreeSet::new();
    for date in dates {
        let token = match day_token(&date) {
            Ok(token) => token,
            Err(err) => {
                warn::emit(WarnEvent {
                    code: WarnCode::DateFormat,
                    stage: "resolve",
                    station,
                    subject: &date,
                    reason: "date-skipped",
                    err: &err.to_string(),
                });
                report.dates.push(DateOutcome {
                    date,
                    day_token: None,
                    status: DateStatus::InvalidDate,
                });
                continue;
            }
        };

        if !searched_days.insert(token.clone()) {
            debug!(station, date = %date, day = %token, "day already searched");
            report.dates.push(DateOutcome {
                date,
                day_token: Some(token),
                status: DateStatus::DuplicateDay,
            });
            continue;
        }

        let search = match find_recordings(sources.sac_root, station, &token) {
            Ok(search) => search,
            Err(err) => {
                warn::emit(WarnEvent {
                    code: WarnCode::SearchFailed,
                    stage: "search",
                    station,
                    subject: &token,
                    reason: "search-failed",
                    err: &format!("{err:#}"),
                });
                report.dates.push(DateOutcome {
                    date,
                    day_token: Some(token),
                    status: DateStatus::SearchFailed,
                });
                continue;
            }
        };

        let status = match search.status {
            SearchStatus::Found => DateStatus::Matched {
                files: search.matches.len(),
            },
            SearchStatus::NoMatch => {
                warn::emit(WarnEvent {
                    code: WarnCode::NoRecordings,
                    stage: "search",
                    station,
                    subject: &token,
                    reason: "no-file-name-contains-day",
                    err: &search.station_dir.display().to_string(),
                });
                DateStatus::NoRecordings
            }
            SearchStatus::StationDirMissing => {
                warn::emit(WarnEvent {
                    code: WarnCode::StationDirMissing,
                    stage: "search",
                    station,
                    subject: &token,
                    reason: "station-directory-missing",
                    err: &search.station_dir.display().to_string(),
                });
                DateStatus::StationDirMissing
            }
        };

        for path in &search.matches {
            match ingest_unit(&mut writer, sources.reader, station, path, &token) {
                IngestOutcome::Ingested(unit) => {
                    if req.verbose {
                        info!(station, file = %unit.path.display(), entry = %unit.entry_path, "ingested recording");
                    } else {
                        debug!(station, file = %unit.path.display(), entry = %unit.entry_path, "ingested recording");
                    }
                    report.ingested.push(unit);
                }
                IngestOutcome::Skipped(unit) => report.skipped.push(unit),
            }
            if writer.is_poisoned() {
                bail!(
                    "archive {} could not recover from a failed write",
                    req.output_path.display()
                );
            }
        }

        report.dates.push(DateOutcome {
            date,
            day_token: Some(token),
            status,
        });
    }

    let aux = write_connections(&mut writer, station, &connected)?;
    report.aux_records = aux.written.len();
    report.aux_collisions = aux.collisions;

    let summary = writer.finish()?;
    verify_or_discard(&summary, &report)?;
    report.archive_bytes = summary.bytes;

    info!(
        station,
        output = %summary.path.display(),
        ingested = report.ingested.len(),
        skipped = report.skipped.len(),
        entries = summary.entries,
        bytes = report.archive_bytes,
        "archive closed"
    );
    Ok(report)
}
