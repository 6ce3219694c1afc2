use anyhow::Result;

use crate::commands::CommandReport;
use crate::station::config::load_config;
use crate::station::paths::resolve_paths;
use crate::station::topology::TopologyGraph;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("sac_root={}", paths.sac_root.display()));
    report.detail(format!("graph_file={}", paths.graph_file.display()));
    report.detail(format!("output_dir={}", paths.output_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    match load_config() {
        Ok(cfg) => {
            report.detail(format!("build.overwrite={}", cfg.build.overwrite));
            report.detail(format!("build.verbose={}", cfg.build.verbose));
            report.detail(format!("build.workers={}", cfg.build.workers));
            report.detail(format!(
                "build.archive_extension={}",
                cfg.build.archive_extension
            ));
        }
        Err(err) => report.issue(format!("config: {err:#}")),
    }

    if !paths.sac_root.is_dir() {
        report.issue("missing recordings dir (STATIONPACK_SAC_ROOT)");
    }
    if !paths.graph_file.is_file() {
        report.issue("missing topology graph file (STATIONPACK_GRAPH)");
    } else {
        match TopologyGraph::load(&paths.graph_file) {
            Ok(graph) => {
                report.detail(format!("graph.stations={}", graph.station_count()));
                report.detail(format!("graph.edges={}", graph.edge_count()));
            }
            Err(err) => report.issue(format!("topology: {err:#}")),
        }
    }

    Ok(report)
}
