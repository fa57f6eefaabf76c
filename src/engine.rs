//! Classification engine
//!
//! Orchestrates one classification session:
//!
//! ```text
//! request ─► validate ─► local match (rayon) ─► below threshold? ─► escalate (one AI batch)
//!                                                        │                    │
//!                                                        └──────► consolidate ◄┘ ─► session registry
//! ```
//!
//! The engine owns the shared alias table, the escalation controller and the
//! session registry. Sessions never share mutable state.

use crate::classification::ai::{AiClassifier, HttpAiClassifier};
use crate::classification::alias::AliasTable;
use crate::classification::consolidate::{ConsolidationPolicy, Consolidator};
use crate::classification::escalation::EscalationController;
use crate::classification::matcher::FieldMatcher;
use crate::classification::regulation::RegulationMapper;
use crate::classification::scorer::needs_escalation;
use crate::classification::types::{FieldDescriptor, Label, RegulationScope, ReviewChange};
use crate::config::{SchemaSenseConfig, StorageBackend};
use crate::error::{Error, Result};
use crate::session::manager::{
    ClassificationSession, ReviewOutcome, ReviewQueueEntry, SessionManager, SessionReport,
    SessionSettings,
};
use crate::session::store::{FileResultStore, MemoryResultStore, SessionResultStore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound accepted for a per-session AI deadline.
const MAX_DEADLINE_SECS: f64 = 600.0;

/// Input of one classification session. Omitted knobs fall back to the
/// engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub fields: Vec<FieldDescriptor>,
    /// Only fields of these tables are classified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation_scope: Option<RegulationScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ai: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<f64>,
}

impl ClassificationRequest {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }
}

/// Hybrid field sensitivity classification engine.
pub struct ClassificationEngine {
    config: SchemaSenseConfig,
    matcher: FieldMatcher,
    mapper: RegulationMapper,
    consolidator: Consolidator,
    escalation: EscalationController,
    sessions: SessionManager,
}

impl ClassificationEngine {
    /// Create an engine with an explicit classifier and result store.
    pub fn new(
        config: SchemaSenseConfig,
        classifier: Option<Arc<dyn AiClassifier>>,
        store: Arc<dyn SessionResultStore>,
    ) -> Result<Self> {
        config.validate()?;
        let aliases = Arc::new(AliasTable::with_custom(&config.aliases)?);
        let mapper = RegulationMapper::new();
        tracing::info!(
            aliases = aliases.alias_count(),
            classifier = classifier.as_ref().map(|c| c.name()).unwrap_or("none"),
            store = store.name(),
            "Classification engine ready"
        );
        Ok(Self {
            matcher: FieldMatcher::new(aliases),
            mapper,
            consolidator: Consolidator::new(mapper),
            escalation: EscalationController::new(classifier, store),
            sessions: SessionManager::new(),
            config,
        })
    }

    /// Build the classifier and store the configuration describes.
    pub async fn from_config(config: SchemaSenseConfig) -> Result<Self> {
        let classifier: Option<Arc<dyn AiClassifier>> = match &config.ai.endpoint {
            Some(endpoint) => {
                let mut http = HttpAiClassifier::new(endpoint.clone())
                    .with_api_key_env(&config.ai.api_key_env)
                    .with_connect_timeout(Duration::from_secs(config.ai.connect_timeout_secs))?;
                if let Some(model) = &config.ai.model {
                    http = http.with_model(model.clone());
                }
                Some(Arc::new(http))
            }
            None => None,
        };

        let store: Arc<dyn SessionResultStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryResultStore::new()),
            StorageBackend::File => {
                Arc::new(FileResultStore::new(config.storage.results_dir.clone()).await?)
            }
        };

        Self::new(config, classifier, store)
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Run one classification session and return its report.
    pub async fn classify(&self, request: ClassificationRequest) -> Result<SessionReport> {
        let (fields, settings) = self.prepare(request)?;
        let mut session = ClassificationSession::new(fields, settings);
        tracing::info!(
            session = %session.id,
            fields = session.fields.len(),
            scope = %session.settings.scope,
            ai_enabled = session.settings.ai_enabled,
            "Classification session started"
        );

        // Local matching
        let local = {
            let matcher = self.matcher.clone();
            let fields = session.fields.clone();
            let scope = session.settings.scope.clone();
            tokio::task::spawn_blocking(move || {
                fields
                    .par_iter()
                    .map(|field| matcher.match_field(field, &scope))
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(|e| Error::Internal(format!("Local matching task failed: {}", e)))?
        };
        session.local_candidates = local
            .into_iter()
            .map(|candidate| (candidate.field_key.clone(), candidate))
            .collect();

        // Escalation of everything below the threshold
        let threshold = session.settings.escalation_threshold;
        let below: Vec<FieldDescriptor> = session
            .fields
            .iter()
            .filter(|f| {
                session
                    .local_candidates
                    .get(&f.field_key())
                    .is_some_and(|c| needs_escalation(c.confidence, threshold))
            })
            .cloned()
            .collect();
        session.escalated = below.iter().map(FieldDescriptor::field_key).collect();

        let deadline = session.settings.deadline;
        let ai = self.escalation.escalate(&mut session, &below, deadline).await;
        session.ai_candidates = ai;

        // Consolidation
        let results = {
            let policy = ConsolidationPolicy {
                scope: &session.settings.scope,
                review_threshold: session.settings.review_threshold,
                ai_attempted: session.ai_attempted,
                escalated: &session.escalated,
            };
            self.consolidator.consolidate(
                &session.fields,
                &session.local_candidates,
                &session.ai_candidates,
                &policy,
            )?
        };
        session.set_results(results)?;

        let report = session.report();
        tracing::info!(
            session = %report.session_id,
            total = report.summary.total,
            escalated = report.summary.escalated,
            needs_review = report.summary.needs_review,
            ai_timeout = report.ai_timeout,
            "Classification session finished"
        );
        self.sessions.insert(session).await;
        Ok(report)
    }

    pub async fn report(&self, session_id: &str) -> Result<SessionReport> {
        let handle = self.sessions.get(session_id).await?;
        let session = handle.lock().await;
        Ok(session.report())
    }

    pub async fn review_queue(&self, session_id: &str) -> Result<Vec<ReviewQueueEntry>> {
        let handle = self.sessions.get(session_id).await?;
        let session = handle.lock().await;
        Ok(session.review_queue())
    }

    /// Apply a human verdict; serialized with other reviews of the same session.
    pub async fn apply_review(
        &self,
        session_id: &str,
        field_key: &str,
        new_classification: Label,
    ) -> Result<ReviewOutcome> {
        let handle = self.sessions.get(session_id).await?;
        let mut session = handle.lock().await;
        session.apply_review(field_key, new_classification, &self.mapper)
    }

    pub async fn changes(&self, session_id: &str) -> Result<Vec<ReviewChange>> {
        let handle = self.sessions.get(session_id).await?;
        let session = handle.lock().await;
        Ok(session.review_changes().to_vec())
    }

    /// Ids of all registered sessions, sorted.
    pub async fn list_sessions(&self) -> Vec<String> {
        let mut ids = self.sessions.session_ids().await;
        ids.sort();
        ids
    }

    /// Forget a session along with any AI results stored for it.
    pub async fn remove_session(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id).await?;
        self.escalation.discard_results(session_id).await
    }

    /// Validate a request and resolve it against the configuration.
    fn prepare(&self, request: ClassificationRequest) -> Result<(Vec<FieldDescriptor>, SessionSettings)> {
        if request.fields.is_empty() {
            return Err(Error::InvalidInput("Field set is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(request.fields.len());
        for field in &request.fields {
            if field.table.trim().is_empty() || field.column.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Field '{}' has a blank table or column name",
                    field.field_key()
                )));
            }
            if !seen.insert(field.field_key()) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate field key '{}'",
                    field.field_key()
                )));
            }
        }

        let defaults = &self.config.classification;
        let escalation_threshold =
            check_threshold("escalationThreshold", request.escalation_threshold, defaults.escalation_threshold)?;
        let review_threshold =
            check_threshold("reviewThreshold", request.review_threshold, defaults.review_threshold)?;

        let deadline = match request.deadline_seconds {
            Some(secs) if secs.is_finite() && secs > 0.0 && secs <= MAX_DEADLINE_SECS => {
                Duration::from_secs_f64(secs)
            }
            Some(secs) => {
                return Err(Error::InvalidInput(format!(
                    "deadlineSeconds must be within (0, {}], got {}",
                    MAX_DEADLINE_SECS, secs
                )))
            }
            None => Duration::from_secs(self.config.ai.deadline_secs),
        };

        let fields = match &request.tables {
            None => request.fields,
            Some(tables) => {
                let selected: Vec<FieldDescriptor> = request
                    .fields
                    .into_iter()
                    .filter(|f| tables.iter().any(|t| t.eq_ignore_ascii_case(&f.table)))
                    .collect();
                if selected.is_empty() {
                    return Err(Error::InvalidInput(
                        "Table selection matches no supplied fields".to_string(),
                    ));
                }
                selected
            }
        };

        let ai_enabled =
            request.enable_ai.unwrap_or(self.config.ai.enabled) && self.escalation.has_classifier();

        Ok((
            fields,
            SessionSettings {
                scope: request
                    .regulation_scope
                    .unwrap_or_else(|| defaults.regulation_scope.clone()),
                ai_enabled,
                escalation_threshold,
                review_threshold,
                deadline,
            },
        ))
    }
}

fn check_threshold(name: &str, value: Option<f64>, default: f64) -> Result<f64> {
    let value = value.unwrap_or(default);
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidInput(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(value)
}
