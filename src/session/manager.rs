//! Classification sessions
//!
//! A session carries everything one classification run produces: the input
//! fields, both candidate maps, the escalation flags, the consolidated
//! verdicts and the review log. Each session sits behind its own mutex so
//! review changes on one session are serialized while other sessions proceed.

use crate::classification::regulation::RegulationMapper;
use crate::classification::types::{
    ClassificationCandidate, ConsolidatedClassification, FieldDescriptor, Label, Provenance,
    RegulationScope, ReviewChange, ReviewReason, Subtype,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Per-session knobs, resolved from the request and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub scope: RegulationScope,
    pub ai_enabled: bool,
    pub escalation_threshold: f64,
    pub review_threshold: f64,
    pub deadline: Duration,
}

/// One classification run.
#[derive(Debug, Clone)]
pub struct ClassificationSession {
    pub id: String,
    pub fields: Vec<FieldDescriptor>,
    pub settings: SessionSettings,
    /// The AI deadline elapsed before the batch completed
    pub ai_timeout: bool,
    /// Some escalated fields fell back to their LOCAL candidate
    pub use_local_only: bool,
    /// Failure reported by the AI call, if any
    pub ai_error: Option<String>,
    /// An AI call was issued for this session
    pub ai_attempted: bool,
    /// Fields whose LOCAL confidence was below the escalation threshold
    pub escalated: BTreeSet<String>,
    pub local_candidates: HashMap<String, ClassificationCandidate>,
    pub ai_candidates: HashMap<String, ClassificationCandidate>,
    results: Vec<ConsolidatedClassification>,
    result_index: HashMap<String, usize>,
    review_changes: Vec<ReviewChange>,
    pub created_at: DateTime<Utc>,
}

/// What applying a review did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// A new change was appended to the log
    Applied { change: ReviewChange },
    /// The field already carried this reviewed label; the latest entry's
    /// timestamp was refreshed instead
    Refreshed { change: ReviewChange },
}

impl ReviewOutcome {
    pub fn change(&self) -> &ReviewChange {
        match self {
            ReviewOutcome::Applied { change } | ReviewOutcome::Refreshed { change } => change,
        }
    }
}

/// A verdict awaiting human review, with both opinions when available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueEntry {
    pub field_key: String,
    pub table: String,
    pub column: String,
    pub classification: Label,
    pub subtype: Option<Subtype>,
    pub confidence: f64,
    pub review_reason: Option<ReviewReason>,
    pub local: Option<ClassificationCandidate>,
    pub ai: Option<ClassificationCandidate>,
}

/// Counts over a session's verdicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total: usize,
    pub pii: usize,
    pub phi: usize,
    pub non_sensitive: usize,
    pub needs_review: usize,
    pub reviewed: usize,
    pub escalated: usize,
    pub ai_resolved: usize,
}

/// Session result set as published to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub regulation_scope: RegulationScope,
    pub ai_enabled: bool,
    pub ai_timeout: bool,
    pub use_local_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
    pub summary: SessionSummary,
    pub results: Vec<ConsolidatedClassification>,
}

impl ClassificationSession {
    /// Create a session with a fresh UUID v4 id.
    pub fn new(fields: Vec<FieldDescriptor>, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            fields,
            settings,
            ai_timeout: false,
            use_local_only: false,
            ai_error: None,
            ai_attempted: false,
            escalated: BTreeSet::new(),
            local_candidates: HashMap::new(),
            ai_candidates: HashMap::new(),
            results: Vec::new(),
            result_index: HashMap::new(),
            review_changes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Install the consolidated verdicts, one per input field.
    pub fn set_results(&mut self, results: Vec<ConsolidatedClassification>) -> Result<()> {
        if results.len() != self.fields.len() {
            return Err(Error::Invariant(format!(
                "{} verdicts for {} fields",
                results.len(),
                self.fields.len()
            )));
        }
        let mut index = HashMap::with_capacity(results.len());
        for (i, result) in results.iter().enumerate() {
            if index.insert(result.field_key.clone(), i).is_some() {
                return Err(Error::Invariant(format!(
                    "duplicate verdict for {}",
                    result.field_key
                )));
            }
        }
        if let Some(missing) = self
            .fields
            .iter()
            .map(FieldDescriptor::field_key)
            .find(|key| !index.contains_key(key))
        {
            return Err(Error::Invariant(format!("no verdict for {}", missing)));
        }
        self.results = results;
        self.result_index = index;
        Ok(())
    }

    pub fn results(&self) -> &[ConsolidatedClassification] {
        &self.results
    }

    pub fn result(&self, field_key: &str) -> Option<&ConsolidatedClassification> {
        self.result_index.get(field_key).map(|&i| &self.results[i])
    }

    /// Append-only log of human overrides.
    pub fn review_changes(&self) -> &[ReviewChange] {
        &self.review_changes
    }

    /// Apply a human verdict to one field.
    ///
    /// Re-applying the label a reviewed field already carries does not grow
    /// the log; it refreshes the timestamp of that field's latest entry.
    pub fn apply_review(
        &mut self,
        field_key: &str,
        new_classification: Label,
        mapper: &RegulationMapper,
    ) -> Result<ReviewOutcome> {
        let Some(&idx) = self.result_index.get(field_key) else {
            return Err(Error::UnknownField {
                session_id: self.id.clone(),
                field_key: field_key.to_string(),
            });
        };
        let now = Utc::now();

        let current = &self.results[idx];
        if current.reviewed && current.classification == new_classification {
            if let Some(entry) = self
                .review_changes
                .iter_mut()
                .rev()
                .find(|c| c.field_key == field_key)
            {
                entry.timestamp = now;
                tracing::debug!(session = %self.id, field = field_key, "Review re-applied, timestamp refreshed");
                return Ok(ReviewOutcome::Refreshed {
                    change: entry.clone(),
                });
            }
        }

        let field = self
            .fields
            .iter()
            .find(|f| f.field_key() == field_key)
            .ok_or_else(|| Error::Internal(format!("verdict without field: {}", field_key)))?;

        let old_classification = current.classification;
        let subtype = match new_classification {
            Label::NonSensitive => None,
            _ => current.subtype,
        };
        let regulations = mapper.for_label(new_classification, subtype, field, &self.settings.scope);

        let mut updated = current.clone();
        updated.classification = new_classification;
        updated.subtype = subtype;
        updated.confidence = 1.0;
        updated.regulations = regulations;
        updated.risk_level = new_classification.risk_level();
        updated.risk_score = updated.risk_level.score();
        updated.needs_review = false;
        updated.reviewed = true;
        updated.source = Provenance::HumanReview;
        updated.review_reason = None;
        updated.rationale = format!(
            "human review: {} -> {}",
            old_classification, new_classification
        );
        updated.validate()?;
        self.results[idx] = updated;

        let change = ReviewChange {
            field_key: field_key.to_string(),
            old_classification,
            new_classification,
            timestamp: now,
        };
        self.review_changes.push(change.clone());

        tracing::info!(
            session = %self.id,
            field = field_key,
            old = %old_classification,
            new = %new_classification,
            "Review change applied"
        );
        Ok(ReviewOutcome::Applied { change })
    }

    /// Verdicts still waiting for a human, in input order.
    pub fn review_queue(&self) -> Vec<ReviewQueueEntry> {
        self.results
            .iter()
            .filter(|r| r.needs_review)
            .map(|r| ReviewQueueEntry {
                field_key: r.field_key.clone(),
                table: r.table.clone(),
                column: r.column.clone(),
                classification: r.classification,
                subtype: r.subtype,
                confidence: r.confidence,
                review_reason: r.review_reason,
                local: self.local_candidates.get(&r.field_key).cloned(),
                ai: self.ai_candidates.get(&r.field_key).cloned(),
            })
            .collect()
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            total: self.results.len(),
            escalated: self.escalated.len(),
            ai_resolved: self
                .escalated
                .iter()
                .filter(|k| self.ai_candidates.contains_key(*k))
                .count(),
            ..Default::default()
        };
        for result in &self.results {
            match result.classification {
                Label::Pii => summary.pii += 1,
                Label::Phi => summary.phi += 1,
                Label::NonSensitive => summary.non_sensitive += 1,
            }
            if result.needs_review {
                summary.needs_review += 1;
            }
            if result.reviewed {
                summary.reviewed += 1;
            }
        }
        summary
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            session_id: self.id.clone(),
            created_at: self.created_at,
            regulation_scope: self.settings.scope.clone(),
            ai_enabled: self.settings.ai_enabled,
            ai_timeout: self.ai_timeout,
            use_local_only: self.use_local_only,
            ai_error: self.ai_error.clone(),
            summary: self.summary(),
            results: self.results.clone(),
        }
    }
}

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<ClassificationSession>>;

/// Registry of classification sessions.
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a finished session and return its handle.
    pub async fn insert(&self, session: ClassificationSession) -> SessionHandle {
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id.clone(), handle.clone());
        tracing::info!("Registered classification session {}", id);
        handle
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::Session(format!("Session {} not found", session_id)))
    }

    pub async fn remove(&self, session_id: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| Error::Session(format!("Session {} not found", session_id)))?;
        tracing::info!("Removed classification session {}", session_id);
        Ok(())
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::types::{Regulation, RiskLevel, Source};

    fn settings() -> SessionSettings {
        SessionSettings {
            scope: RegulationScope::Auto,
            ai_enabled: false,
            escalation_threshold: 0.70,
            review_threshold: 0.35,
            deadline: Duration::from_secs(30),
        }
    }

    fn verdict(field: &FieldDescriptor, label: Label, needs_review: bool) -> ConsolidatedClassification {
        let regulations: BTreeSet<Regulation> = match label {
            Label::Pii => [Regulation::Gdpr, Regulation::Ccpa].into_iter().collect(),
            Label::Phi => [Regulation::Hipaa].into_iter().collect(),
            Label::NonSensitive => BTreeSet::new(),
        };
        ConsolidatedClassification {
            field_key: field.field_key(),
            table: field.table.clone(),
            column: field.column.clone(),
            classification: label,
            subtype: None,
            confidence: 0.5,
            regulations,
            risk_level: label.risk_level(),
            risk_score: label.risk_level().score(),
            needs_review,
            reviewed: false,
            source: Provenance::Local,
            rationale: String::new(),
            review_reason: needs_review.then_some(ReviewReason::LowConfidence),
            conflict: None,
        }
    }

    fn session_with(fields: &[(&str, &str, Label, bool)]) -> ClassificationSession {
        let descriptors: Vec<FieldDescriptor> = fields
            .iter()
            .map(|(t, c, _, _)| FieldDescriptor::new(*t, *c, "TEXT"))
            .collect();
        let results = descriptors
            .iter()
            .zip(fields)
            .map(|(f, (_, _, label, review))| verdict(f, *label, *review))
            .collect();
        let mut session = ClassificationSession::new(descriptors, settings());
        session.set_results(results).unwrap();
        session
    }

    #[test]
    fn test_session_ids_are_unique_uuids() {
        let a = ClassificationSession::new(vec![], settings());
        let b = ClassificationSession::new(vec![], settings());
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_set_results_requires_one_per_field() {
        let fields = vec![
            FieldDescriptor::new("t", "a", "TEXT"),
            FieldDescriptor::new("t", "b", "TEXT"),
        ];
        let mut session = ClassificationSession::new(fields.clone(), settings());
        let only_one = vec![verdict(&fields[0], Label::Pii, false)];
        assert!(matches!(session.set_results(only_one), Err(Error::Invariant(_))));

        let duplicated = vec![
            verdict(&fields[0], Label::Pii, false),
            verdict(&fields[0], Label::Pii, false),
        ];
        assert!(session.set_results(duplicated).is_err());
    }

    #[test]
    fn test_apply_review_overrides_and_logs() {
        let mut session = session_with(&[("users", "nickname", Label::NonSensitive, true)]);
        let outcome = session
            .apply_review("users.nickname", Label::Pii, &RegulationMapper::new())
            .unwrap();
        assert!(matches!(outcome, ReviewOutcome::Applied { .. }));

        let result = session.result("users.nickname").unwrap();
        assert_eq!(result.classification, Label::Pii);
        assert!(result.reviewed);
        assert!(!result.needs_review);
        assert_eq!(result.source, Provenance::HumanReview);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(!result.regulations.is_empty());
        assert_eq!(session.review_changes().len(), 1);
        assert_eq!(session.review_changes()[0].old_classification, Label::NonSensitive);
        assert!(session.review_queue().is_empty());
    }

    #[test]
    fn test_reapplying_review_refreshes_timestamp() {
        let mut session = session_with(&[("users", "nickname", Label::NonSensitive, true)]);
        let mapper = RegulationMapper::new();
        let first = session.apply_review("users.nickname", Label::Pii, &mapper).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = session.apply_review("users.nickname", Label::Pii, &mapper).unwrap();

        assert!(matches!(second, ReviewOutcome::Refreshed { .. }));
        assert_eq!(session.review_changes().len(), 1);
        assert!(second.change().timestamp > first.change().timestamp);
        assert_eq!(session.review_changes()[0].timestamp, second.change().timestamp);
    }

    #[test]
    fn test_changing_a_reviewed_label_appends() {
        let mut session = session_with(&[("visits", "notes", Label::Pii, true)]);
        let mapper = RegulationMapper::new();
        session.apply_review("visits.notes", Label::Pii, &mapper).unwrap();
        session.apply_review("visits.notes", Label::Phi, &mapper).unwrap();

        let log = session.review_changes();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].old_classification, Label::Pii);
        assert_eq!(log[1].new_classification, Label::Phi);
        let result = session.result("visits.notes").unwrap();
        assert_eq!(result.regulations, [Regulation::Hipaa].into_iter().collect());
    }

    #[test]
    fn test_review_to_non_sensitive_clears_regulations() {
        let mut session = session_with(&[("users", "email", Label::Pii, false)]);
        session
            .apply_review("users.email", Label::NonSensitive, &RegulationMapper::new())
            .unwrap();
        let result = session.result("users.email").unwrap();
        assert!(result.regulations.is_empty());
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_review_unknown_field_rejected() {
        let mut session = session_with(&[("users", "email", Label::Pii, false)]);
        let err = session
            .apply_review("users.ghost", Label::Pii, &RegulationMapper::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
        assert!(session.review_changes().is_empty());
        assert_eq!(session.results().len(), 1);
    }

    #[test]
    fn test_review_queue_carries_both_candidates() {
        let mut session = session_with(&[
            ("users", "email", Label::Pii, false),
            ("users", "notes", Label::Phi, true),
        ]);
        let candidate = |source: Source, label: Label| ClassificationCandidate {
            field_key: "users.notes".to_string(),
            source,
            label,
            subtype: None,
            confidence: 0.6,
            rationale: format!("{:?} says {}", source, label),
            regulations: BTreeSet::new(),
        };
        session
            .local_candidates
            .insert("users.notes".to_string(), candidate(Source::Local, Label::Pii));
        session
            .ai_candidates
            .insert("users.notes".to_string(), candidate(Source::Ai, Label::Phi));

        let queue = session.review_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].field_key, "users.notes");
        assert_eq!(queue[0].local.as_ref().unwrap().rationale, "Local says PII");
        assert_eq!(queue[0].ai.as_ref().unwrap().rationale, "Ai says PHI");
    }

    #[test]
    fn test_summary_counts() {
        let session = session_with(&[
            ("users", "email", Label::Pii, false),
            ("patients", "dx", Label::Phi, true),
            ("orders", "notes", Label::NonSensitive, false),
        ]);
        let summary = session.summary();
        assert_eq!(summary.total, 3);
        assert_eq!((summary.pii, summary.phi, summary.non_sensitive), (1, 1, 1));
        assert_eq!(summary.needs_review, 1);
        assert_eq!(summary.reviewed, 0);
    }

    #[tokio::test]
    async fn test_manager_register_and_lookup() {
        let manager = SessionManager::new();
        let session = session_with(&[("users", "email", Label::Pii, false)]);
        let id = session.id.clone();
        manager.insert(session).await;

        assert_eq!(manager.session_count().await, 1);
        let handle = manager.get(&id).await.unwrap();
        assert_eq!(handle.lock().await.results().len(), 1);

        assert!(matches!(manager.get("missing").await, Err(Error::Session(_))));
        manager.remove(&id).await.unwrap();
        assert!(manager.remove(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_reviews_are_serialized() {
        let manager = Arc::new(SessionManager::new());
        let session = session_with(&[("users", "nickname", Label::NonSensitive, true)]);
        let id = session.id.clone();
        manager.insert(session).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                let handle = manager.get(&id).await.unwrap();
                let mut session = handle.lock().await;
                session
                    .apply_review("users.nickname", Label::Pii, &RegulationMapper::new())
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let handle = manager.get(&id).await.unwrap();
        assert_eq!(handle.lock().await.review_changes().len(), 1);
    }
}
