//! Configuration and data file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/schouwen-toetsen/`, `~/.local/share/schouwen-toetsen/`
//! - macOS: `~/Library/Application Support/schouwen-toetsen/`
//! - Windows: `%APPDATA%\schouwen-toetsen\`

use std::io;
use std::path::PathBuf;

/// Name used for the configuration and data directories
const APP_NAME: &str = "schouwen-toetsen";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the data directory, where the run ledger lives
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the default path of the run ledger
pub fn ledger_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("ledger.json"))
}

/// Ensure the parent directory of `path` exists
pub fn ensure_parent_dir(path: &std::path::Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_valid() {
        let dir = config_dir();
        assert!(dir.is_some());
    }

    #[test]
    fn test_ledger_path_ends_with_file_name() {
        let path = ledger_path().unwrap();
        assert!(path.ends_with("ledger.json"));
    }

    #[test]
    fn test_ensure_parent_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a").join("b").join("ledger.json");
        ensure_parent_dir(&target).unwrap();
        assert!(target.parent().unwrap().is_dir());
    }
}
