use crate::error::StationError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub overwrite: bool,
    pub verbose: bool,
    pub workers: usize,
    pub archive_extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            verbose: true,
            workers: 0,
            archive_extension: "spk".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StationConfig {
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialStationConfig {
    build: Option<BuildConfig>,
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &StationConfig) -> Result<()> {
    let ext = cfg.build.archive_extension.as_str();
    if ext.is_empty() {
        return Err(StationError::InvalidConfig("archive extension cannot be empty".to_string()).into());
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StationError::InvalidConfig(format!(
            "archive extension `{ext}` must be ascii alphanumeric"
        ))
        .into());
    }
    if ext.eq_ignore_ascii_case("lock") || ext.eq_ignore_ascii_case("tmp") {
        return Err(StationError::InvalidConfig(format!(
            "archive extension `{ext}` is reserved"
        ))
        .into());
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("STATIONPACK_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".stationpack").join("config.toml"))
}

fn merge_toml(base: &mut StationConfig, raw: &str) -> Result<()> {
    let parsed: PartialStationConfig =
        toml::from_str(raw).map_err(|err| StationError::InvalidConfig(err.to_string()))?;
    if let Some(build) = parsed.build {
        base.build = build;
    }
    Ok(())
}

fn merge_file_config(base: &mut StationConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw).map_err(|err| {
        StationError::InvalidConfig(format!("{}: {err}", path.display())).into()
    })
}

pub fn load_config() -> Result<StationConfig> {
    let mut cfg = StationConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.build.overwrite = env_or_bool("STATIONPACK_OVERWRITE", cfg.build.overwrite);
    cfg.build.verbose = env_or_bool("STATIONPACK_VERBOSE", cfg.build.verbose);
    cfg.build.workers = env_or_usize("STATIONPACK_WORKERS", cfg.build.workers);
    cfg.build.archive_extension = env_or_string(
        "STATIONPACK_ARCHIVE_EXTENSION",
        &cfg.build.archive_extension,
    );

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_build_table_keeps_defaults() {
        let mut cfg = StationConfig::default();
        merge_toml(&mut cfg, "[build]\nworkers = 4\n").expect("merge");
        assert_eq!(cfg.build.workers, 4);
        assert!(cfg.build.verbose);
        assert_eq!(cfg.build.archive_extension, "spk");
        validate(&cfg).expect("valid");
    }

    #[test]
    fn malformed_toml_is_invalid_config() {
        let mut cfg = StationConfig::default();
        let err = merge_toml(&mut cfg, "[build\n").expect_err("bad toml");
        assert!(matches!(
            err.downcast_ref::<StationError>(),
            Some(StationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unusable_extensions() {
        for ext in ["", "s.pk", "lock", "TMP"] {
            let mut cfg = StationConfig::default();
            cfg.build.archive_extension = ext.to_string();
            assert!(validate(&cfg).is_err(), "{ext}");
        }
    }
}
