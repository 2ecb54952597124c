//! Proxy Configuration Types
//!
//! Proxy settings for the chat and preference HTTP clients. The client
//! factory that applies them lives in the `fidus-transport` crate.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Proxy protocol type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks5,
}

impl ProxyProtocol {
    /// Return the URL scheme string for this protocol.
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks5 => "socks5",
        }
    }
}

/// Proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    pub protocol: ProxyProtocol,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Read from config but never written back out.
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Build the proxy URL string (without auth).
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.host.trim().is_empty() {
            return Err(CoreError::config("proxy host must not be empty"));
        }
        if self.port == 0 {
            return Err(CoreError::config("proxy port must be non-zero"));
        }
        Ok(())
    }
}
