//! Escalation controller
//!
//! Sends every below-threshold field of a session to the AI classifier in a
//! single batched call, bounded by a hard deadline.
//!
//! ```text
//! fields ─► [spawned AI task] ──┐
//!                               ├─ select! ─► results ─► store
//!           [deadline timer] ───┘     │
//!                                     └─ timeout ─► abort task ─► recovery read
//! ```
//!
//! Timeouts and failures are never surfaced as errors: they become session
//! flags and the affected fields keep their LOCAL candidate.

use crate::classification::ai::{parse_envelope, AiBatchRequest, AiClassifier, AiFieldRequest};
use crate::classification::types::{FieldDescriptor, Source};
use crate::error::{Error, Result};
use crate::session::manager::ClassificationSession;
use crate::session::store::{AiResults, SessionResultStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Outcome of racing the AI task against the deadline.
enum Race {
    Finished(std::result::Result<Result<AiResults>, JoinError>),
    DeadlineElapsed,
}

/// Issues the bounded AI call for a session.
pub struct EscalationController {
    classifier: Option<Arc<dyn AiClassifier>>,
    store: Arc<dyn SessionResultStore>,
}

impl EscalationController {
    pub fn new(classifier: Option<Arc<dyn AiClassifier>>, store: Arc<dyn SessionResultStore>) -> Self {
        Self { classifier, store }
    }

    /// Whether a classifier is configured at all.
    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Drop any AI results persisted for a session.
    pub async fn discard_results(&self, session_id: &str) -> Result<()> {
        self.store.remove_ai_results(session_id).await
    }

    /// Escalate `fields` and return AI candidates for the ones that resolved.
    ///
    /// Sets `ai_timeout`, `use_local_only` and `ai_error` on the session as
    /// appropriate. Never returns a candidate for a field it was not asked about.
    pub async fn escalate(
        &self,
        session: &mut ClassificationSession,
        fields: &[FieldDescriptor],
        deadline: Duration,
    ) -> AiResults {
        if fields.is_empty() {
            return AiResults::new();
        }

        let classifier = match (&self.classifier, session.settings.ai_enabled) {
            (Some(classifier), true) => classifier.clone(),
            _ => {
                tracing::debug!(
                    session = %session.id,
                    fields = fields.len(),
                    "AI disabled, escalated fields stay LOCAL-only"
                );
                session.use_local_only = true;
                return AiResults::new();
            }
        };

        let request = AiBatchRequest {
            session_id: session.id.clone(),
            fields: fields.iter().map(AiFieldRequest::from).collect(),
            regulations: session.settings.scope.hint(),
        };
        let requested = request.field_keys();
        session.ai_attempted = true;

        tracing::info!(
            session = %session.id,
            classifier = classifier.name(),
            fields = request.fields.len(),
            deadline_ms = deadline.as_millis() as u64,
            "Escalating fields to AI classifier"
        );

        let mut task = {
            let store = self.store.clone();
            let requested = requested.clone();
            tokio::spawn(async move {
                let value = classifier.classify_batch(&request).await?;
                let results = parse_envelope(value, &requested)?;
                if let Err(e) = store.save_ai_results(&request.session_id, &results).await {
                    tracing::warn!(
                        session = %request.session_id,
                        store = store.name(),
                        "Failed to persist AI results: {}",
                        e
                    );
                }
                Ok::<_, Error>(results)
            })
        };

        let race = tokio::select! {
            joined = &mut task => Race::Finished(joined),
            _ = tokio::time::sleep(deadline) => Race::DeadlineElapsed,
        };

        let results = match race {
            Race::Finished(Ok(Ok(results))) => results,
            Race::Finished(Ok(Err(e))) => {
                tracing::warn!(session = %session.id, "AI classification failed, using LOCAL results: {}", e);
                session.ai_error = Some(e.to_string());
                AiResults::new()
            }
            Race::Finished(Err(e)) => {
                tracing::warn!(session = %session.id, "AI classification task failed: {}", e);
                session.ai_error = Some(format!("AI task failed: {}", e));
                AiResults::new()
            }
            Race::DeadlineElapsed => {
                task.abort();
                session.ai_timeout = true;
                session.use_local_only = true;
                tracing::warn!(
                    session = %session.id,
                    deadline_ms = deadline.as_millis() as u64,
                    "AI classification deadline elapsed, attempting recovery read"
                );
                self.recover(&session.id, &requested).await
            }
        };

        if results.len() < requested.len() {
            session.use_local_only = true;
        }
        tracing::info!(
            session = %session.id,
            requested = requested.len(),
            resolved = results.len(),
            timeout = session.ai_timeout,
            "Escalation finished"
        );
        results
    }

    /// One best-effort read of results that reached the store anyway.
    async fn recover(&self, session_id: &str, requested: &HashSet<String>) -> AiResults {
        match self.store.load_ai_results(session_id).await {
            Ok(stored) => {
                let recovered: AiResults = stored
                    .into_iter()
                    .filter(|(key, candidate)| {
                        requested.contains(key)
                            && candidate.source == Source::Ai
                            && (0.0..=1.0).contains(&candidate.confidence)
                    })
                    .collect();
                if !recovered.is_empty() {
                    tracing::info!(session = session_id, count = recovered.len(), "Recovered AI results from store");
                }
                recovered
            }
            Err(e) => {
                tracing::warn!(session = session_id, "Recovery read failed: {}", e);
                AiResults::new()
            }
        }
    }
}
