//! Chat Message Model
//!
//! Messages shown in the conversation and the user-message delivery
//! lifecycle (`sending -> sent | error`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Delivery status of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Error,
}

impl DeliveryStatus {
    /// Server acknowledged the message. Only valid while sending.
    pub fn acknowledge(self) -> CoreResult<Self> {
        match self {
            DeliveryStatus::Sending => Ok(DeliveryStatus::Sent),
            other => Err(CoreError::invalid_transition(format!(
                "cannot acknowledge a message in state {:?}",
                other
            ))),
        }
    }

    /// Delivery failed. An error after the acknowledgment still fails the
    /// message; failing twice is rejected.
    pub fn fail(self) -> CoreResult<Self> {
        match self {
            DeliveryStatus::Sending | DeliveryStatus::Sent => Ok(DeliveryStatus::Error),
            DeliveryStatus::Error => Err(CoreError::invalid_transition(
                "message already failed",
            )),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Error)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<DeliveryStatus>,
}

impl ChatMessage {
    /// A freshly submitted user message, awaiting acknowledgment.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            status: Some(DeliveryStatus::Sending),
        }
    }

    /// Assistant message created from the first streamed token.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            status: None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> Option<DeliveryStatus> {
        self.status
    }

    /// Append a streamed chunk. Only assistant messages grow.
    pub fn append_content(&mut self, chunk: &str) -> CoreResult<()> {
        if self.role != MessageRole::Assistant {
            return Err(CoreError::invalid_transition(
                "only assistant messages accept streamed content",
            ));
        }
        self.content.push_str(chunk);
        Ok(())
    }

    pub fn mark_sent(&mut self) -> CoreResult<()> {
        let current = self.delivery_status()?;
        self.status = Some(current.acknowledge()?);
        Ok(())
    }

    pub fn mark_failed(&mut self) -> CoreResult<()> {
        let current = self.delivery_status()?;
        self.status = Some(current.fail()?);
        Ok(())
    }

    fn delivery_status(&self) -> CoreResult<DeliveryStatus> {
        self.status.ok_or_else(|| {
            CoreError::invalid_transition("assistant messages have no delivery status")
        })
    }
}
