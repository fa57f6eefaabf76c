//! SchemaSense configuration management

use crate::classification::alias::CustomAlias;
use crate::classification::types::RegulationScope;
use crate::error::{Error, Result};
use crate::session::store::FileResultStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main SchemaSense configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSenseConfig {
    /// Classification thresholds and default scope
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// External AI classifier
    #[serde(default)]
    pub ai: AiConfig,

    /// Session-results storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API server
    #[serde(default)]
    pub server: ServerConfig,

    /// Extra column aliases added to the built-in dictionary
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<CustomAlias>,
}

/// Classification defaults, overridable per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Local confidence at or above which a field is final without AI
    pub escalation_threshold: f64,

    /// Confidence below which a verdict goes to the review queue
    pub review_threshold: f64,

    /// Default regulation scope ("auto" or a list)
    pub regulation_scope: RegulationScope,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.70,
            review_threshold: 0.35,
            regulation_scope: RegulationScope::Auto,
        }
    }
}

/// External AI classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Escalate low-confidence fields by default
    pub enabled: bool,

    /// Classifier endpoint; without one, sessions run LOCAL-only
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Model name passed through to the service
    pub model: Option<String>,

    /// Hard deadline for the batched call, in seconds
    pub deadline_secs: u64,

    /// Connection setup timeout, in seconds
    pub connect_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            api_key_env: "SCHEMASENSE_AI_API_KEY".to_string(),
            model: None,
            deadline_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Where AI results are kept for recovery reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Results directory for the file backend
    pub results_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            results_dir: FileResultStore::default_dir(),
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18800,
            cors_origins: Vec::new(),
        }
    }
}

impl SchemaSenseConfig {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<()> {
        let c = &self.classification;
        for (name, value) in [
            ("escalation_threshold", c.escalation_threshold),
            ("review_threshold", c.review_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "classification.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.ai.deadline_secs == 0 {
            return Err(Error::Config("ai.deadline_secs must be positive".to_string()));
        }
        if let Some(endpoint) = &self.ai.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(Error::Config(format!(
                    "ai.endpoint must be an http(s) URL, got {}",
                    endpoint
                )));
            }
        }
        for alias in &self.aliases {
            if !(0.0..=1.0).contains(&alias.confidence) {
                return Err(Error::Config(format!(
                    "alias '{}' confidence must be within [0, 1]",
                    alias.alias
                )));
            }
        }
        Ok(())
    }
}
