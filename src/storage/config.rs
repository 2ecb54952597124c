//! JSON Configuration Management
//!
//! Handles reading and writing the application configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_dir, ensure_fidus_dir};

/// Environment variable overriding `backend_url` for this process only
pub const BACKEND_URL_ENV: &str = "FIDUS_BACKEND_URL";

/// Configuration service for managing app settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AppConfig,
    /// Never written back to disk
    backend_override: Option<String>,
}

impl ConfigService {
    /// Load ~/.fidus-memory/config.json, creating defaults if missing
    pub fn new() -> AppResult<Self> {
        ensure_fidus_dir()?;
        Self::open(config_path()?)
    }

    /// Load config from an explicit path, creating defaults if missing
    pub fn open(config_path: impl Into<PathBuf>) -> AppResult<Self> {
        let config_path = config_path.into();
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            tracing::info!(
                "[ConfigService] Created default config at {}",
                config_path.display()
            );
            default_config
        };

        Ok(Self {
            config_path,
            config,
            backend_override: None,
        })
    }

    /// Apply `FIDUS_BACKEND_URL` if set
    pub fn with_env_overrides(self) -> AppResult<Self> {
        let value = std::env::var(BACKEND_URL_ENV).ok();
        self.with_backend_override(value)
    }

    /// Override the backend URL for this process without persisting it
    pub fn with_backend_override(mut self, url: Option<String>) -> AppResult<Self> {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            return Ok(self);
        };
        let mut candidate = self.config.clone();
        candidate.backend_url = url.clone();
        candidate.validate().map_err(AppError::validation)?;
        tracing::debug!("[ConfigService] Backend URL overridden: {}", url);
        self.backend_override = Some(url);
        Ok(self)
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AppConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Effective configuration, overrides included
    pub fn get_config(&self) -> AppConfig {
        let mut config = self.config.clone();
        if let Some(url) = &self.backend_override {
            config.backend_url = url.clone();
        }
        config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Update the configuration with a partial update
    pub fn update_config(&mut self, update: SettingsUpdate) -> AppResult<AppConfig> {
        let mut next = self.config.clone();
        next.apply_update(update);
        next.validate().map_err(AppError::validation)?;
        self.config = next;
        self.save()?;
        Ok(self.get_config())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) -> AppResult<AppConfig> {
        self.config = AppConfig::default();
        self.save()?;
        Ok(self.get_config())
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.get_config().validate().is_ok()
    }
}
