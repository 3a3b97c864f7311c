//! Data directory layout.
//!
//! Everything flowrun writes lives under one directory: the run database and
//! `config.toml`.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "FLOWRUN_DATA_DIR";

/// Resolve the data directory.
///
/// Priority: `FLOWRUN_DATA_DIR`, then `~/.flowrun`, then `./.flowrun` when
/// no home directory can be determined.
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from), dirs::home_dir())
}

fn data_dir_from(env_override: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env_override.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    home.unwrap_or_else(|| PathBuf::from(".")).join(".flowrun")
}

/// Create the data directory if it does not exist yet.
pub async fn ensure_data_dir(data_dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(data_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_wins() {
        let dir = data_dir_from(Some(PathBuf::from("/srv/flows")), Some(PathBuf::from("/home/a")));
        assert_eq!(dir, PathBuf::from("/srv/flows"));
    }

    #[test]
    fn test_home_fallback() {
        let dir = data_dir_from(None, Some(PathBuf::from("/home/a")));
        assert_eq!(dir, PathBuf::from("/home/a/.flowrun"));

        let empty = data_dir_from(Some(PathBuf::new()), Some(PathBuf::from("/home/a")));
        assert_eq!(empty, PathBuf::from("/home/a/.flowrun"));
    }

    #[test]
    fn test_no_home_uses_working_directory() {
        assert_eq!(data_dir_from(None, None), PathBuf::from("./.flowrun"));
    }

    #[tokio::test]
    async fn test_ensure_data_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_data_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_data_dir(&nested).await.unwrap();
    }
}
