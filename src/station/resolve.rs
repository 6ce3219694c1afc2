use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Found,
    NoMatch,
    StationDirMissing,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub station_dir: PathBuf,
    pub status: SearchStatus,
    pub matches: Vec<PathBuf>,
}

/// `"<collection>/<code>"` -> `"<code>"`; plain codes pass through.
pub fn station_code(station: &str) -> &str {
    let trimmed = station.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn station_dir(sac_root: &Path, station: &str) -> PathBuf {
    sac_root.join(station_code(station))
}

/// Files in the station directory whose name contains `day_token`, sorted.
pub fn find_recordings(sac_root: &Path, station: &str, day_token: &str) -> Result<SearchOutcome> {
    let dir = station_dir(sac_root, station);
    if !dir.is_dir() {
        return Ok(SearchOutcome {
            station_dir: dir,
            status: SearchStatus::StationDirMissing,
            matches: Vec::new(),
        });
    }

    let mut matches = Vec::new();
    let read_dir = fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in read_dir {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.contains(day_token) {
            matches.push(path);
        }
    }
    matches.sort();

    let status = if matches.is_empty() {
        SearchStatus::NoMatch
    } else {
        SearchStatus::Found
    };
    Ok(SearchOutcome {
        station_dir: dir,
        status,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn station_code_takes_last_component() {
        assert_eq!(station_code("XX/STA1"), "STA1");
        assert_eq!(station_code("STA1"), "STA1");
        assert_eq!(station_code("a/b/STA1/"), "STA1");
    }

    #[test]
    fn finds_every_file_containing_token_sorted() {
        let tmp = tempdir().expect("tempdir");
        let dir = tmp.path().join("STA1");
        fs::create_dir_all(&dir).expect("mkdir");
        for name in [
            "XX.STA1..HHZ.2021.001.sac",
            "XX.STA1..HHE.2021.001.sac",
            "XX.STA1..HHZ.2021.002.sac",
        ] {
            fs::write(dir.join(name), b"x").expect("write");
        }
        fs::create_dir_all(dir.join("nested.2021.001")).expect("mkdir nested");

        let out = find_recordings(tmp.path(), "XX/STA1", "2021.001").expect("search");
        assert_eq!(out.status, SearchStatus::Found);
        let names: Vec<String> = out
            .matches
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["XX.STA1..HHE.2021.001.sac", "XX.STA1..HHZ.2021.001.sac"]
        );
    }

    #[test]
    fn distinguishes_missing_dir_from_no_match() {
        let tmp = tempdir().expect("tempdir");
        let missing = find_recordings(tmp.path(), "STA9", "2021.001").expect("search");
        assert_eq!(missing.status, SearchStatus::StationDirMissing);

        fs::create_dir_all(tmp.path().join("STA9")).expect("mkdir");
        let empty = find_recordings(tmp.path(), "STA9", "2021.001").expect("search");
        assert_eq!(empty.status, SearchStatus::NoMatch);
        assert!(empty.matches.is_empty());
    }
}
