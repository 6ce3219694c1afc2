use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("output archive already exists: {} (pass --overwrite to replace it)", .0.display())]
    OutputExists(PathBuf),
    #[error("output archive is locked by another build: {}", .0.display())]
    OutputBusy(PathBuf),
    #[error("{station} and {other} would both write {}", output.display())]
    OutputCollision {
        station: String,
        other: String,
        output: PathBuf,
    },
    #[error("station not present in topology graph: {0}")]
    UnknownStation(String),
    #[error("no topology edge between {station} and {neighbor}")]
    MissingEdge { station: String, neighbor: String },
    #[error("invalid date `{date}`: expected YYYY_MM_DD")]
    DateFormat { date: String },
    #[error("failed to ingest {}: {reason}", path.display())]
    FileIngestion { path: PathBuf, reason: String },
    #[error("malformed recording {}: {reason}", path.display())]
    MalformedRecording { path: PathBuf, reason: String },
    #[error("invalid archive {}: {reason}", path.display())]
    InvalidArchive { path: PathBuf, reason: String },
    #[error("config invalid or unreadable: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnCode {
    MissingEdgeAttribute,
    DateFormat,
    NoRecordings,
    SearchFailed,
    StationDirMissing,
    FileIngestion,
    AuxKeyCollision,
}

impl WarnCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingEdgeAttribute => "MISSING_EDGE_ATTRIBUTE",
            Self::DateFormat => "DATE_FORMAT",
            Self::NoRecordings => "NO_RECORDINGS",
            Self::SearchFailed => "SEARCH_FAILED",
            Self::StationDirMissing => "STATION_DIR_MISSING",
            Self::FileIngestion => "FILE_INGESTION",
            Self::AuxKeyCollision => "AUX_KEY_COLLISION",
        }
    }
}
