//! Preference Data Model
//!
//! Wire types for stored preferences, situations, conflicts surfaced by the
//! chat stream, and the bodies sent back to the preference store.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentiment attached to a preference.
///
/// The backend emits `positive`, `negative` or `neutral`, but anything else
/// is kept verbatim in `Other` so echoing a preference back is lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Other(String),
}

impl Sentiment {
    pub fn as_str(&self) -> &str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Other(raw) => raw.as_str(),
        }
    }

    /// Textual value written to a related preference when a general
    /// preference with this sentiment is accepted over it.
    pub fn cascade_value(&self) -> &'static str {
        match self {
            Sentiment::Positive => "likes it",
            Sentiment::Negative => "dislikes it",
            _ => "neutral about it",
        }
    }
}

impl From<String> for Sentiment {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "neutral" => Sentiment::Neutral,
            _ => Sentiment::Other(raw),
        }
    }
}

impl From<&str> for Sentiment {
    fn from(raw: &str) -> Self {
        Sentiment::from(raw.to_string())
    }
}

impl From<Sentiment> for String {
    fn from(sentiment: Sentiment) -> String {
        match sentiment {
            Sentiment::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specific preference that contradicts a more general one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedPreference {
    pub key: String,
    pub value: String,
    pub sentiment: Sentiment,
    pub confidence: f64,
}

/// A contradiction between a newly inferred preference and a stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceConflict {
    pub key: String,
    pub old_value: String,
    pub old_sentiment: Sentiment,
    pub old_confidence: f64,
    pub new_value: String,
    pub new_sentiment: Sentiment,
    pub new_confidence: f64,
    /// Present only when specific sub-keys contradict this general key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_preferences: Option<Vec<RelatedPreference>>,
}

impl PreferenceConflict {
    /// Related preferences, empty when the server sent none.
    pub fn related(&self) -> &[RelatedPreference] {
        self.related_preferences.as_deref().unwrap_or(&[])
    }

    pub fn has_related(&self) -> bool {
        !self.related().is_empty()
    }
}

/// Body of `PUT /preferences/{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub key: String,
    pub value: String,
    pub sentiment: Sentiment,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_exception: Option<bool>,
}

/// A stored preference as listed by `GET /preferences`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    /// Absent when the backend runs without persistent storage.
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    pub value: String,
    pub sentiment: Sentiment,
    pub confidence: f64,
    #[serde(default)]
    pub is_exception: bool,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub reinforcement_count: u32,
    #[serde(default)]
    pub rejection_count: u32,
}

impl Preference {
    /// Domain of the preference, derived from the key prefix when the
    /// backend did not send one (`food.pizza` -> `food`).
    pub fn domain(&self) -> &str {
        match &self.domain {
            Some(domain) => domain.as_str(),
            None => self.key.split('.').next().unwrap_or(&self.key),
        }
    }
}

/// Contextual factors recorded when preferences were expressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Situation {
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub factors: HashMap<String, String>,
    #[serde(default)]
    pub preference_ids: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Model configuration reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    pub model: String,
    pub provider: String,
    pub is_local: bool,
}
