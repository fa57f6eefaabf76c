//! Session-results store
//!
//! Holds AI candidates per session so that a recovery read after an AI
//! deadline can pick up results that landed late. Two implementations:
//! an in-memory map and JSON files on disk.
//!
//! Directory layout of the file store:
//! ```text
//! ~/.schemasense/results/
//! ├── <session-id>.json
//! └── ...
//! ```

use crate::classification::types::ClassificationCandidate;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// AI candidates keyed by field key.
pub type AiResults = HashMap<String, ClassificationCandidate>;

/// Persistence contract for AI results.
#[async_trait]
pub trait SessionResultStore: Send + Sync {
    /// Merge AI results into what is stored for the session.
    async fn save_ai_results(&self, session_id: &str, results: &AiResults) -> Result<()>;

    /// All AI results stored for the session (empty if none).
    async fn load_ai_results(&self, session_id: &str) -> Result<AiResults>;

    /// Forget everything stored for the session. Removing an unknown session is not an error.
    async fn remove_ai_results(&self, session_id: &str) -> Result<()>;

    /// Store name for logs
    fn name(&self) -> &str;
}

/// In-memory store, the default when no results directory is configured.
#[derive(Default)]
pub struct MemoryResultStore {
    sessions: Arc<RwLock<HashMap<String, AiResults>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionResultStore for MemoryResultStore {
    async fn save_ai_results(&self, session_id: &str, results: &AiResults) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .extend(results.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn load_ai_results(&self, session_id: &str) -> Result<AiResults> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn remove_ai_results(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Store writing one JSON file per session.
pub struct FileResultStore {
    dir: PathBuf,
    // Serializes read-merge-write cycles
    write_lock: tokio::sync::Mutex<()>,
}

impl FileResultStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Default results directory (~/.schemasense/results/)
    pub fn default_dir() -> PathBuf {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".schemasense")
            .join("results")
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::Store(format!(
                "Invalid session id for file store: {:?}",
                session_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }

    async fn read_file(&self, session_id: &str) -> Result<AiResults> {
        let path = self.path_for(session_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AiResults::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionResultStore for FileResultStore {
    async fn save_ai_results(&self, session_id: &str, results: &AiResults) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_file(session_id).await?;
        stored.extend(results.iter().map(|(k, v)| (k.clone(), v.clone())));

        let path = self.path_for(session_id)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&stored)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(session = session_id, count = stored.len(), "Persisted AI results");
        Ok(())
    }

    async fn load_ai_results(&self, session_id: &str) -> Result<AiResults> {
        self.read_file(session_id).await
    }

    async fn remove_ai_results(&self, session_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(session = session_id, "Removed AI results");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
