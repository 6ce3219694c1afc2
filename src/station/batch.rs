use crate::error::StationError;
use crate::station::builder::{BuildReport, BuildRequest, BuildSources, build_archive};
use crate::station::sanitize::storage_key;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub extension: String,
    pub overwrite: bool,
    pub verbose: bool,
    /// Worker threads; 0 lets rayon pick one per CPU.
    pub workers: usize,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub station: String,
    pub output_path: PathBuf,
    pub result: Result<BuildReport>,
}

pub fn output_path_for(output_dir: &Path, station: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.{extension}", storage_key(station)))
}

struct PlannedBuild<'a> {
    station: &'a String,
    output_path: PathBuf,
    claimed_by: Option<&'a String>,
}

/// Assigns output paths in input order. A station whose path was already
/// taken by an earlier one records that station instead of building.
fn plan_outputs<'a>(stations: &'a [String], opts: &BatchOptions) -> Vec<PlannedBuild<'a>> {
    let mut owners: HashMap<PathBuf, &'a String> = HashMap::new();
    stations
        .iter()
        .map(|station| {
            let output_path = output_path_for(&opts.output_dir, station, &opts.extension);
            let claimed_by = match owners.get(&output_path) {
                Some(owner) => Some(*owner),
                None => {
                    owners.insert(output_path.clone(), station);
                    None
                }
            };
            PlannedBuild {
                station,
                output_path,
                claimed_by,
            }
        })
        .collect()
}

/// Runs one independent build per station. A failing station never stops
/// the others; outcomes come back in input order. Stations whose names map
/// to an output file already claimed by an earlier station fail with
/// `OutputCollision` and are not built.
pub fn build_many(
    sources: &BuildSources<'_>,
    stations: &[String],
    opts: &BatchOptions,
) -> Result<Vec<BatchOutcome>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.workers)
        .build()
        .context("failed to start build worker pool")?;
    info!(
        stations = stations.len(),
        workers = pool.current_num_threads(),
        output_dir = %opts.output_dir.display(),
        "starting batch build"
    );

    let plan = plan_outputs(stations, opts);
    let outcomes = pool.install(|| {
        plan.into_par_iter()
            .map(|planned| {
                let PlannedBuild {
                    station,
                    output_path,
                    claimed_by,
                } = planned;
                let result: Result<BuildReport> = match claimed_by {
                    Some(other) => Err(StationError::OutputCollision {
                        station: station.clone(),
                        other: other.clone(),
                        output: output_path.clone(),
                    }
                    .into()),
                    None => {
                        let req = BuildRequest {
                            overwrite: opts.overwrite,
                            verbose: opts.verbose,
                            ..BuildRequest::new(station, &output_path)
                        };
                        build_archive(sources, &req)
                    }
                };
                if let Err(err) = &result {
                    error!(station = %station, err = %format!("{err:#}"), "station build failed");
                }
                BatchOutcome {
                    station: station.clone(),
                    output_path,
                    result,
                }
            })
            .collect::<Vec<_>>()
    });
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ArchiveReader;
    use crate::station::sac::SacReader;
    use crate::station::sac::fixtures::{SacFixture, encode_le};
    use crate::station::topology::TopologyGraph;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builds_each_station_independently() -> Result<()> {
        let tmp = tempdir()?;
        let sac_root = tmp.path().join("sac");
        fs::create_dir_all(sac_root.join("STA1"))?;
        fs::write(
            sac_root.join("STA1").join("XX.STA1..HHZ.2021.001.sac"),
            encode_le(&SacFixture::new("STA1", 2021, 1)),
        )?;

        let mut graph = TopologyGraph::new();
        graph.add_edge("XX/STA1", "XX/STA2", Some(vec!["2021_01_01".to_string()]))?;
        graph.add_station("XX/LONER");

        let sources = BuildSources {
            topology: &graph,
            sac_root: &sac_root,
            reader: &SacReader,
        };
        let opts = BatchOptions {
            output_dir: tmp.path().join("archives"),
            extension: "spk".to_string(),
            overwrite: false,
            verbose: false,
            workers: 2,
        };
        let stations = vec![
            "XX/STA1".to_string(),
            "XX/STA2".to_string(),
            "XX/MISSING".to_string(),
        ];
        let outcomes = build_many(&sources, &stations, &opts)?;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].station, "XX/STA1");
        let first = outcomes[0].result.as_ref().expect("sta1 build");
        assert_eq!(first.ingested_count(), 1);
        assert_eq!(
            outcomes[0].output_path,
            tmp.path().join("archives").join("XX_STA1.spk")
        );
        let second = outcomes[1].result.as_ref().expect("sta2 build");
        assert_eq!(second.ingested_count(), 0);
        let missing = outcomes[2].result.as_ref().expect_err("unknown station");
        assert!(matches!(
            missing.downcast_ref::<StationError>(),
            Some(StationError::UnknownStation(_))
        ));

        let archive = ArchiveReader::open(&outcomes[1].output_path)?;
        let nodes = archive.read_fixed_strings("AuxiliaryData/connections/XX_STA2_nodes")?;
        assert_eq!(nodes.values, vec!["XX/STA1"]);
        Ok(())
    }

    #[test]
    fn stations_sharing_an_output_file_do_not_replace_each_other() -> Result<()> {
        let tmp = tempdir()?;
        let mut graph = TopologyGraph::new();
        graph.add_edge("A.B", "Y", Some(vec!["2021_01_01".to_string()]))?;
        graph.add_edge("A_B", "Z", Some(vec!["2021_01_02".to_string()]))?;

        let sac_root = tmp.path().join("sac");
        let sources = BuildSources {
            topology: &graph,
            sac_root: &sac_root,
            reader: &SacReader,
        };
        let opts = BatchOptions {
            output_dir: tmp.path().join("o"),
            extension: "spk".to_string(),
            overwrite: true,
            verbose: false,
            workers: 2,
        };
        let stations = vec!["A.B".to_string(), "A_B".to_string()];
        let outcomes = build_many(&sources, &stations, &opts)?;

        assert_eq!(outcomes[0].output_path, outcomes[1].output_path);
        assert!(outcomes[0].result.is_ok());
        let err = outcomes[1].result.as_ref().expect_err("collision");
        assert!(matches!(
            err.downcast_ref::<StationError>(),
            Some(StationError::OutputCollision { other, .. }) if other == "A.B"
        ));

        let archive = ArchiveReader::open(&outcomes[0].output_path)?;
        let nodes = archive.read_fixed_strings("AuxiliaryData/connections/A_B_nodes")?;
        assert_eq!(nodes.values, vec!["Y"]);
        Ok(())
    }

    #[test]
    fn station_keys_name_output_files() {
        assert_eq!(
            output_path_for(Path::new("/out"), "NET/STA.00", "spk"),
            PathBuf::from("/out/NET_STA_00.spk")
        );
    }
}
