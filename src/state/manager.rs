//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use crate::incremental::CursorValue;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State manager for persisting and loading state
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to the state file (empty in memory mode)
    path: PathBuf,
    /// Current state, shared between clones
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(State::new())),
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse(&contents)?
        } else {
            State::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Create an in-memory state manager seeded from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(parse(json)?)),
        })
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// Snapshot of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Saved watermark for an endpoint
    pub async fn watermark(&self, endpoint: &str) -> Option<String> {
        let state = self.state.read().await;
        state.watermark(endpoint).map(ToString::to_string)
    }

    /// Commit a watermark after a successful run and persist.
    ///
    /// A value lower than the stored watermark is ignored. Returns the
    /// watermark now stored.
    pub async fn commit_watermark(&self, endpoint: &str, watermark: &str, rows: u64) -> Result<String> {
        self.update(|state| {
            let entry = state.get_endpoint_mut(endpoint);
            let advances = entry.watermark.as_deref().map_or(true, |current| {
                CursorValue::parse(watermark).compare(&CursorValue::parse(current))
                    == Ordering::Greater
            });
            if advances {
                entry.watermark = Some(watermark.to_string());
            } else {
                debug!(endpoint, watermark, "watermark not advanced");
            }
            entry.mark_success(rows);
            entry.watermark.clone().unwrap_or_default()
        })
        .await
    }

    /// Record a successful run of an endpoint that has no watermark
    pub async fn record_success(&self, endpoint: &str, rows: u64) -> Result<()> {
        self.update(|state| state.get_endpoint_mut(endpoint).mark_success(rows))
            .await
    }

    /// Forget everything about one endpoint. Returns whether it was known.
    pub async fn clear_endpoint(&self, endpoint: &str) -> Result<bool> {
        self.update(|state| state.endpoints.remove(endpoint).is_some())
            .await
    }

    /// Clear all state
    pub async fn clear(&self) -> Result<()> {
        self.update(|state| *state = State::new()).await
    }

    /// Apply a change to a copy of the state, persist the copy, then publish
    /// it.
    ///
    /// The shared state is swapped only after the last await: a failed write
    /// or a dropped future leaves it as it was. The write lock is held
    /// throughout, so only one writer touches the temp file at a time.
    async fn update<T>(&self, change: impl FnOnce(&mut State) -> T) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let output = change(&mut next);

        self.persist(&next).await?;
        *state = next;
        Ok(output)
    }

    /// Write the state to disk: temp file first, then rename.
    async fn persist(&self, state: &State) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::state(format!("Failed to create state directory: {e}")))?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        Ok(())
    }
}

fn parse(contents: &str) -> Result<State> {
    serde_json::from_str(contents).map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}
