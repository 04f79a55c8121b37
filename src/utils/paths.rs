//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Directory name used under the platform config and data directories
const APP_DIR_NAME: &str = "idea-impact";

/// Get the application config directory (e.g. ~/.config/idea-impact/)
pub fn app_config_dir() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or_else(|| AppError::config("Could not determine config directory"))
}

/// Get the application data directory (e.g. ~/.local/share/idea-impact/)
pub fn app_data_dir() -> AppResult<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or_else(|| AppError::config("Could not determine data directory"))
}

/// Get the config file path (<config dir>/idea-impact/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(app_config_dir()?.join("config.json"))
}

/// Get the default database file path (<data dir>/idea-impact/usage.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(app_data_dir()?.join("usage.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensure the parent directory of a file path exists
pub fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        if let Ok(path) = config_path() {
            assert!(path.ends_with("idea-impact/config.json"));
        }
    }

    #[test]
    fn test_ensure_parent_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a").join("b").join("usage.db");
        ensure_parent_dir(&file).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
        // Bare file names have no parent to create
        ensure_parent_dir(Path::new("usage.db")).unwrap();
    }
}
