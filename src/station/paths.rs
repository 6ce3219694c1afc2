use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StationPaths {
    pub home: PathBuf,
    pub sac_root: PathBuf,
    pub graph_file: PathBuf,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<StationPaths> {
    let home = match env::var("STATIONPACK_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("stationpack"),
    };

    let sac_root = env_or_default_path("STATIONPACK_SAC_ROOT", home.join("sac"));
    let graph_file = env_or_default_path("STATIONPACK_GRAPH", home.join("topology.json"));
    let output_dir = env_or_default_path("STATIONPACK_OUTPUT_DIR", home.join("archives"));
    let logs_dir = env_or_default_path("STATIONPACK_LOGS_DIR", home.join("logs"));

    Ok(StationPaths {
        home,
        sac_root,
        graph_file,
        output_dir,
        logs_dir,
    })
}
