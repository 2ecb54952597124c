//! Identity Header Handling
//!
//! Attaches the stored guest identity to outbound requests and adopts the
//! identity a response assigns.

use fidus_core::identity::{is_valid_identity, SessionIdentity, USER_ID_HEADER};
use reqwest::header::HeaderMap;
use reqwest::RequestBuilder;

/// The stored identity if it is usable as a header value.
pub(crate) fn outbound_identity(identity: &dyn SessionIdentity) -> Option<String> {
    let id = identity.get()?;
    if is_valid_identity(&id) {
        Some(id)
    } else {
        tracing::warn!("[Identity] Stored identity is malformed, sending without it");
        None
    }
}

pub(crate) fn attach_identity(builder: RequestBuilder, id: Option<&str>) -> RequestBuilder {
    match id {
        Some(id) => builder.header(USER_ID_HEADER, id),
        None => builder,
    }
}

/// Persist a response-assigned identity. Returns the adopted value.
pub(crate) fn adopt_identity(headers: &HeaderMap, identity: &dyn SessionIdentity) -> Option<String> {
    let value = headers.get(USER_ID_HEADER)?;
    let Ok(id) = value.to_str() else {
        tracing::warn!("[Identity] Ignoring non-ASCII {} header", USER_ID_HEADER);
        return None;
    };
    if !is_valid_identity(id) {
        tracing::warn!("[Identity] Ignoring malformed {} header", USER_ID_HEADER);
        return None;
    }
    if identity.get().as_deref() != Some(id) {
        tracing::info!("[Identity] Adopted server-assigned identity {}", id);
    }
    identity.set(id);
    Some(id.to_string())
}
