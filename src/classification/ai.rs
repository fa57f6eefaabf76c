//! External AI classifier boundary
//!
//! The engine only defines the contract it needs from an AI classification
//! service: one batched request per session and a strict response envelope.
//!
//! ```text
//! request:  {"sessionId", "fields": [{fieldKey, table, column, dataType}], "regulations"}
//! response: {"results": {fieldKey: {classification, subtype?, confidence, rationale?, regulations?}}}
//! ```
//!
//! Responses arrive as untyped JSON and are validated here; anything that
//! does not fit the envelope is rejected as a whole.

use crate::classification::types::{
    ClassificationCandidate, FieldDescriptor, Label, Regulation, Source, Subtype,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

/// One field in an AI batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiFieldRequest {
    pub field_key: String,
    pub table: String,
    pub column: String,
    pub data_type: String,
}

impl From<&FieldDescriptor> for AiFieldRequest {
    fn from(field: &FieldDescriptor) -> Self {
        Self {
            field_key: field.field_key(),
            table: field.table.clone(),
            column: field.column.clone(),
            data_type: field.data_type.clone(),
        }
    }
}

/// The single batched request a session sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiBatchRequest {
    pub session_id: String,
    pub fields: Vec<AiFieldRequest>,
    /// Regulation hint; empty for AUTO scope
    pub regulations: Vec<Regulation>,
}

impl AiBatchRequest {
    pub fn field_keys(&self) -> HashSet<String> {
        self.fields.iter().map(|f| f.field_key.clone()).collect()
    }
}

/// External AI classification service.
///
/// Implementations return the raw response body; validation happens in
/// [`parse_envelope`] so every implementation gets the same strictness.
#[async_trait]
pub trait AiClassifier: Send + Sync {
    /// Classify a batch of fields.
    async fn classify_batch(&self, request: &AiBatchRequest) -> Result<serde_json::Value>;

    /// Human-readable name for this classifier (used in logs).
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AiEnvelope {
    results: BTreeMap<String, AiFieldVerdict>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AiFieldVerdict {
    classification: Label,
    #[serde(default)]
    subtype: Option<Subtype>,
    confidence: f64,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    regulations: Vec<Regulation>,
}

/// Validate a response envelope and turn it into AI candidates.
///
/// Keys that were not requested are dropped. A confidence outside [0, 1] or
/// any shape mismatch rejects the whole envelope.
pub fn parse_envelope(
    value: serde_json::Value,
    requested: &HashSet<String>,
) -> Result<HashMap<String, ClassificationCandidate>> {
    let envelope: AiEnvelope = serde_json::from_value(value)
        .map_err(|e| Error::Ai(format!("Response does not match the result envelope: {}", e)))?;

    let mut candidates = HashMap::with_capacity(envelope.results.len());
    for (field_key, verdict) in envelope.results {
        if !verdict.confidence.is_finite() || !(0.0..=1.0).contains(&verdict.confidence) {
            return Err(Error::Ai(format!(
                "Confidence {} for '{}' is outside [0, 1]",
                verdict.confidence, field_key
            )));
        }
        if !requested.contains(&field_key) {
            tracing::warn!(field = %field_key, "Discarding AI result for a field that was not requested");
            continue;
        }
        let subtype = match verdict.classification {
            Label::NonSensitive => None,
            _ => verdict.subtype,
        };
        candidates.insert(
            field_key.clone(),
            ClassificationCandidate {
                field_key,
                source: Source::Ai,
                label: verdict.classification,
                subtype,
                confidence: verdict.confidence,
                rationale: verdict.rationale.unwrap_or_default(),
                regulations: verdict.regulations.into_iter().collect(),
            },
        );
    }
    Ok(candidates)
}

#[derive(Serialize)]
struct HttpRequestBody<'a> {
    #[serde(flatten)]
    batch: &'a AiBatchRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// AI classifier reached over HTTP: POSTs the batch as JSON and returns the
/// JSON response body.
pub struct HttpAiClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl HttpAiClassifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
        }
    }

    /// Bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Bound connection setup; the overall batch deadline is enforced by the
    /// escalation controller.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Ok(self)
    }

    /// Resolve the API key from an environment variable, if set.
    pub fn with_api_key_env(self, var: &str) -> Self {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => self.with_api_key(key),
            _ => self,
        }
    }
}

#[async_trait]
impl AiClassifier for HttpAiClassifier {
    async fn classify_batch(&self, request: &AiBatchRequest) -> Result<serde_json::Value> {
        let body = HttpRequestBody {
            batch: request,
            model: self.model.as_deref(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Ai(format!("Request to {} failed: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Ai(format!(
                "AI service returned status {}",
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Ai(format!("Failed to read AI response body: {}", e)))
    }

    fn name(&self) -> &str {
        "http"
    }
}
