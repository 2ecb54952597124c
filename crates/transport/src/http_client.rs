//! HTTP Client Factory
//!
//! Builds the `reqwest::Client` shared by the chat transport and the
//! preference client.

use std::time::Duration;

use fidus_core::proxy::ProxyConfig;

use crate::error::{TransportError, TransportResult};

/// Build a `reqwest::Client` with the resolved proxy configuration.
///
/// - `Some(proxy)` -> configure proxy on the client
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
///
/// Only the connect phase is bounded; a streaming chat body may stay open
/// for as long as the server keeps it open.
pub fn build_http_client(
    proxy: Option<&ProxyConfig>,
    connect_timeout: Duration,
) -> TransportResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
    match proxy {
        Some(cfg) => {
            cfg.validate()
                .map_err(|e| TransportError::config(e.to_string()))?;
            let mut p = reqwest::Proxy::all(cfg.url())
                .map_err(|e| TransportError::config(format!("invalid proxy URL: {}", e)))?;
            if let (Some(u), Some(pw)) = (&cfg.username, &cfg.password) {
                p = p.basic_auth(u, pw);
            }
            builder = builder.proxy(p);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    builder
        .build()
        .map_err(|e| TransportError::config(format!("failed to build HTTP client: {}", e)))
}
