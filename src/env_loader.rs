use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(station_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(base) = station_home {
        return Some(base.join(".env"));
    }
    Some(home_dir?.join("stationpack").join(".env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("STATIONPACK_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_dotenv_path;
    use std::path::PathBuf;

    #[test]
    fn fallback_uses_station_home_when_set() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/data/stationpack")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(got, Some(PathBuf::from("/data/stationpack/.env")));
    }

    #[test]
    fn fallback_uses_default_home_layout() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        assert_eq!(got, Some(PathBuf::from("/home/alice/stationpack/.env")));
    }

    #[test]
    fn no_home_means_no_fallback() {
        assert_eq!(fallback_dotenv_path(None, None), None);
    }
}
