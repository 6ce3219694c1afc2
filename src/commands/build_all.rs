use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, describe_build};
use crate::station::audit::{self, BuildAuditEvent};
use crate::station::batch::{BatchOptions, build_many};
use crate::station::builder::BuildSources;
use crate::station::config::load_config;
use crate::station::paths::resolve_paths;
use crate::station::sac::SacReader;
use crate::station::topology::{Topology, TopologyGraph};

#[derive(Debug, Clone, Default)]
pub struct BuildAllOptions {
    pub overwrite: bool,
    pub quiet: bool,
    pub workers: Option<usize>,
    pub graph: Option<PathBuf>,
    pub sac_root: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

pub fn run(opts: &BuildAllOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("build-all");

    let graph_file = opts.graph.clone().unwrap_or_else(|| paths.graph_file.clone());
    let sac_root = opts.sac_root.clone().unwrap_or_else(|| paths.sac_root.clone());
    let output_dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| paths.output_dir.clone());

    let topology = TopologyGraph::load(&graph_file)?;
    let stations = topology.stations();
    report.detail(format!("graph={}", graph_file.display()));
    report.detail(format!("stations={}", stations.len()));
    report.detail(format!("output_dir={}", output_dir.display()));

    let sources = BuildSources {
        topology: &topology,
        sac_root: &sac_root,
        reader: &SacReader,
    };
    let batch = BatchOptions {
        output_dir,
        extension: cfg.build.archive_extension.clone(),
        overwrite: opts.overwrite || cfg.build.overwrite,
        verbose: !opts.quiet && cfg.build.verbose,
        workers: opts.workers.unwrap_or(cfg.build.workers),
    };

    let outcomes = build_many(&sources, &stations, &batch)?;
    let mut total_ingested = 0usize;
    let mut failed = 0usize;
    for outcome in outcomes {
        let output_str = outcome.output_path.display().to_string();
        let event = match &outcome.result {
            Ok(build) => {
                describe_build(&mut report, build);
                total_ingested += build.ingested_count();
                let mut event = BuildAuditEvent::new(&outcome.station, &output_str, "closed");
                event.ingested = build.ingested_count();
                event.skipped = build.skipped.len();
                event
            }
            Err(err) => {
                failed += 1;
                report.issue(format!("{}: build failed: {err:#}", outcome.station));
                let mut event = BuildAuditEvent::new(&outcome.station, &output_str, "failed");
                event.message = format!("{err:#}");
                event
            }
        };
        if let Err(err) = audit::append_event(&paths, event) {
            report.detail(format!("audit append failed: {err:#}"));
        }
    }

    report.detail(format!("total_ingested={total_ingested}"));
    report.detail(format!("failed_stations={failed}"));
    Ok(report)
}
