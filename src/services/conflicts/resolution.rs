//! Conflict Resolution
//!
//! Turns a user's decision on a conflict into preference writes.
//!
//! - Accept new: the general key takes the new value; every related specific
//!   preference is rewritten to follow the new sentiment.
//! - Keep old: the general key is left alone; related specific preferences
//!   are re-saved unchanged but flagged as exceptions.
//!
//! Writes run in order: the primary first, related ones only if it
//! succeeded. Nothing is rolled back. The conflict leaves the registry only
//! when every planned write succeeded.

use std::sync::Arc;

use tokio::sync::RwLock;

use fidus_core::preference::{PreferenceConflict, PreferenceUpdate};
use fidus_transport::PreferenceApi;

use crate::services::chat::reducer::{ChatState, Notice, RefreshHooks};
use crate::utils::error::{AppError, AppResult};

const RESOLUTION_FAILED_NOTICE: &str =
    "We couldn't save your choice. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    AcceptNew,
    KeepOld,
}

/// Writes needed to apply a decision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionPlan {
    /// Write to the conflicting key itself
    pub primary: Option<PreferenceUpdate>,
    /// Writes to related specific keys, in server order
    pub related: Vec<PreferenceUpdate>,
}

impl ResolutionPlan {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.related.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.primary.is_some()) + self.related.len()
    }
}

/// Plan the writes for `decision` on `conflict`. Performs no I/O.
pub fn compute_cascade_requests(
    conflict: &PreferenceConflict,
    decision: ConflictDecision,
) -> ResolutionPlan {
    match decision {
        ConflictDecision::AcceptNew => {
            let primary = PreferenceUpdate {
                key: conflict.key.clone(),
                value: conflict.new_value.clone(),
                sentiment: conflict.new_sentiment.clone(),
                confidence: conflict.new_confidence,
                is_exception: None,
            };
            let related = conflict
                .related()
                .iter()
                .map(|r| PreferenceUpdate {
                    key: r.key.clone(),
                    value: conflict.new_sentiment.cascade_value().to_string(),
                    sentiment: conflict.new_sentiment.clone(),
                    confidence: r.confidence,
                    is_exception: None,
                })
                .collect();
            ResolutionPlan {
                primary: Some(primary),
                related,
            }
        }
        ConflictDecision::KeepOld => ResolutionPlan {
            primary: None,
            related: conflict
                .related()
                .iter()
                .map(|r| PreferenceUpdate {
                    key: r.key.clone(),
                    value: r.value.clone(),
                    sentiment: r.sentiment.clone(),
                    confidence: r.confidence,
                    is_exception: Some(true),
                })
                .collect(),
        },
    }
}

/// Outcome of one resolution attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    /// Keys written successfully, in order
    pub applied: Vec<String>,
    /// Keys whose write failed, with the error (for logs, not for display)
    pub failed: Vec<(String, String)>,
    /// Whether the conflict was removed from the registry
    pub removed: bool,
}

impl ResolutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.removed
    }
}

/// Executes resolution plans against the preference store and keeps the
/// registry and notice in sync.
pub struct ConflictResolver {
    state: Arc<RwLock<ChatState>>,
    api: Arc<dyn PreferenceApi>,
    hooks: Option<Arc<dyn RefreshHooks>>,
}

impl ConflictResolver {
    pub fn new(state: Arc<RwLock<ChatState>>, api: Arc<dyn PreferenceApi>) -> Self {
        Self {
            state,
            api,
            hooks: None,
        }
    }

    /// Refetch preferences after any successful write.
    pub fn with_hooks(mut self, hooks: Arc<dyn RefreshHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Apply `decision` to the conflict at `index`.
    ///
    /// Write failures do not make this return `Err`; they are listed in the
    /// report and surfaced as a notice while the conflict stays pending.
    pub async fn resolve(
        &self,
        index: usize,
        decision: ConflictDecision,
    ) -> AppResult<ResolutionReport> {
        let conflict = self
            .state
            .read()
            .await
            .conflicts
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("No conflict at position {}", index)))?;

        let plan = compute_cascade_requests(&conflict, decision);
        tracing::info!(
            "[ConflictResolver] Resolving {} with {:?}: {} write(s)",
            conflict.key,
            decision,
            plan.len()
        );

        let mut report = ResolutionReport::default();

        let primary_ok = match &plan.primary {
            Some(update) => self.write(update, &mut report).await,
            None => true,
        };

        if primary_ok {
            for update in &plan.related {
                self.write(update, &mut report).await;
            }
        } else if !plan.related.is_empty() {
            tracing::warn!(
                "[ConflictResolver] Skipping {} related write(s) for {} after primary failure",
                plan.related.len(),
                conflict.key
            );
        }

        let complete = report.failed.is_empty() && report.applied.len() == plan.len();
        {
            let mut state = self.state.write().await;
            if complete {
                report.removed = state.conflicts.remove_matching(index, &conflict).is_some();
            } else {
                state.notice = Some(Notice::resolution(RESOLUTION_FAILED_NOTICE));
            }
        }

        if !report.applied.is_empty() {
            if let Some(hooks) = &self.hooks {
                hooks.refresh_preferences();
            }
        }

        Ok(report)
    }

    /// Drop the conflict at `index` without writing anything.
    pub async fn dismiss(&self, index: usize) -> AppResult<PreferenceConflict> {
        let removed = self.state.write().await.conflicts.remove_at(index);
        let conflict =
            removed.ok_or_else(|| AppError::not_found(format!("No conflict at position {}", index)))?;
        tracing::info!("[ConflictResolver] Dismissed conflict on {}", conflict.key);
        Ok(conflict)
    }

    async fn write(&self, update: &PreferenceUpdate, report: &mut ResolutionReport) -> bool {
        match self.api.update_preference(&update.key, update).await {
            Ok(()) => {
                report.applied.push(update.key.clone());
                true
            }
            Err(e) => {
                tracing::warn!("[ConflictResolver] Failed to update {}: {}", update.key, e);
                report.failed.push((update.key.clone(), e.to_string()));
                false
            }
        }
    }
}
