//! Cross-Platform Path Utilities
//!
//! Resolves the application data directory (~/.fidus-memory/) and the files
//! kept in it.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Fidus Memory directory (~/.fidus-memory/)
pub fn fidus_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".fidus-memory"))
}

/// Get the config file path (~/.fidus-memory/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(fidus_dir()?.join("config.json"))
}

/// Get the identity store path (~/.fidus-memory/identity.json)
pub fn identity_path() -> AppResult<PathBuf> {
    Ok(fidus_dir()?.join("identity.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Fidus Memory directory, creating if it doesn't exist
pub fn ensure_fidus_dir() -> AppResult<PathBuf> {
    let path = fidus_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
