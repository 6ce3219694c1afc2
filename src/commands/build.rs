use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, describe_build};
use crate::station::audit::{self, BuildAuditEvent};
use crate::station::batch::output_path_for;
use crate::station::builder::{BuildRequest, BuildSources, build_archive};
use crate::station::config::load_config;
use crate::station::paths::resolve_paths;
use crate::station::sac::SacReader;
use crate::station::topology::TopologyGraph;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub station: String,
    pub output: Option<PathBuf>,
    pub overwrite: bool,
    pub quiet: bool,
    pub graph: Option<PathBuf>,
    pub sac_root: Option<PathBuf>,
}

pub fn run(opts: &BuildOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("build");

    let graph_file = opts.graph.clone().unwrap_or_else(|| paths.graph_file.clone());
    let sac_root = opts.sac_root.clone().unwrap_or_else(|| paths.sac_root.clone());
    let output = opts.output.clone().unwrap_or_else(|| {
        output_path_for(&paths.output_dir, &opts.station, &cfg.build.archive_extension)
    });
    report.detail(format!("graph={}", graph_file.display()));
    report.detail(format!("sac_root={}", sac_root.display()));

    let topology = TopologyGraph::load(&graph_file)?;
    let sources = BuildSources {
        topology: &topology,
        sac_root: &sac_root,
        reader: &SacReader,
    };
    let req = BuildRequest {
        overwrite: opts.overwrite || cfg.build.overwrite,
        verbose: !opts.quiet && cfg.build.verbose,
        ..BuildRequest::new(&opts.station, &output)
    };

    let output_str = output.display().to_string();
    match build_archive(&sources, &req) {
        Ok(build) => {
            describe_build(&mut report, &build);
            let mut event = BuildAuditEvent::new(&opts.station, &output_str, "closed");
            event.ingested = build.ingested_count();
            event.skipped = build.skipped.len();
            if let Err(err) = audit::append_event(&paths, event) {
                report.detail(format!("audit append failed: {err:#}"));
            }
            Ok(report)
        }
        Err(err) => {
            let mut event = BuildAuditEvent::new(&opts.station, &output_str, "failed");
            event.message = format!("{err:#}");
            let _ = audit::append_event(&paths, event);
            Err(err)
        }
    }
}
