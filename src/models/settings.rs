//! Settings Models
//!
//! Application configuration stored in config.json.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use fidus_core::proxy::ProxyConfig;
use fidus_transport::TransportConfig;

/// Default memory API base URL (local development backend)
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000/memory";

/// Application configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Base URL of the memory API; `/chat`, `/preferences`, ... are appended
    pub backend_url: String,
    /// Identity sent in the request body when none has been assigned yet
    #[serde(default = "default_fallback_user_id")]
    pub fallback_user_id: String,
    /// Connect timeout for HTTP requests in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Optional outbound proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    /// Default log filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_fallback_user_id() -> String {
    fidus_transport::DEFAULT_FALLBACK_USER_ID.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            fallback_user_id: default_fallback_user_id(),
            connect_timeout_secs: default_connect_timeout_secs(),
            proxy: None,
            log_level: default_log_level(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub backend_url: Option<String>,
    pub fallback_user_id: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub proxy: Option<ProxyConfig>,
    /// Remove the configured proxy; wins over `proxy`
    #[serde(default)]
    pub clear_proxy: bool,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(url) = update.backend_url {
            self.backend_url = url;
        }
        if let Some(user_id) = update.fallback_user_id {
            self.fallback_user_id = user_id;
        }
        if let Some(secs) = update.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(proxy) = update.proxy {
            self.proxy = Some(proxy);
        }
        if update.clear_proxy {
            self.proxy = None;
        }
        if let Some(level) = update.log_level {
            self.log_level = level;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let base = self.to_transport_config();
        base.base().map_err(|e| e.to_string())?;

        if self.fallback_user_id.trim().is_empty() {
            return Err("fallback_user_id must not be empty".to_string());
        }

        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 300 {
            return Err("connect_timeout_secs must be between 1 and 300".to_string());
        }

        if let Some(proxy) = &self.proxy {
            proxy.validate().map_err(|e| e.to_string())?;
        }

        if !["error", "warn", "info", "debug", "trace"].contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level: {}. Must be one of error, warn, info, debug, trace",
                self.log_level
            ));
        }

        Ok(())
    }

    /// Settings for the HTTP clients
    pub fn to_transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.backend_url.clone(),
            fallback_user_id: self.fallback_user_id.clone(),
            proxy: self.proxy.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}
