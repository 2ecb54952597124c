//! Transport Configuration

use std::time::Duration;

use fidus_core::proxy::ProxyConfig;
use url::Url;

use crate::error::{TransportError, TransportResult};

/// Identity used in the request body when none is stored.
pub const DEFAULT_FALLBACK_USER_ID: &str = "user-1";

/// Settings shared by every client in this crate.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL of the memory API, e.g. `http://127.0.0.1:8000/memory`
    pub base_url: String,
    pub fallback_user_id: String,
    pub proxy: Option<ProxyConfig>,
    pub connect_timeout: Duration,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            fallback_user_id: DEFAULT_FALLBACK_USER_ID.to_string(),
            proxy: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Validated base URL with any trailing slash removed.
    pub fn base(&self) -> TransportResult<String> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| TransportError::config(format!("invalid base URL {:?}: {}", self.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::config(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(self.base_url.trim_end_matches('/').to_string())
    }
}
