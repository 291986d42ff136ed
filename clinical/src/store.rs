//! Durable State Store for maintenance records.
//!
//! Holds the last analysis, the last optimization and the append-only
//! history. All mutation funnels through [`StateStore::save`] under a single
//! async mutex so the in-memory cache and the file on disk never diverge.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::types::{EventKind, HistoryEntry, MaintenanceEvent, SystemState};

/// Error types for State Store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The state could not be written; the in-memory copy is still current
    #[error("Failed to persist state to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state could not be encoded
    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// State Store with a file-backed durable copy.
///
/// Created once at service start and shared behind an `Arc`.
pub struct StateStore {
    /// Backing file, `None` for a memory-only store
    path: Option<PathBuf>,
    /// Cached state, populated on first load
    state: Mutex<Option<SystemState>>,
}

impl StateStore {
    /// Create a store persisted at `path`. Nothing is read until first use.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            state: Mutex::new(None),
        }
    }

    /// Create a store without durable storage (tests, dry runs).
    pub fn memory_only() -> Self {
        Self {
            path: None,
            state: Mutex::new(Some(SystemState::default())),
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current state.
    ///
    /// Served from cache once initialized. On first call the file is read;
    /// a missing or corrupt file yields defaults, which are persisted at once.
    pub async fn load(&self) -> SystemState {
        let mut guard = self.state.lock().await;
        self.ensure_loaded(&mut guard).await.clone()
    }

    /// Replace the whole state. This is the only write path.
    ///
    /// The cache is updated before the write is attempted, so a persistence
    /// failure leaves the new state authoritative for the process lifetime.
    pub async fn save(&self, state: SystemState) -> Result<SystemState, StoreError> {
        let mut guard = self.state.lock().await;
        *guard = Some(state.clone());
        self.persist(&state).await?;
        Ok(state)
    }

    /// Overwrite the last analysis slot and save.
    pub async fn update_last_analysis(
        &self,
        timestamp: impl Into<String>,
        summary: serde_json::Value,
    ) -> Result<SystemState, StoreError> {
        let event = MaintenanceEvent::new(timestamp, summary);
        self.mutate(|state| state.last_analysis = Some(event)).await
    }

    /// Overwrite the last optimization slot and save.
    pub async fn update_last_optimization(
        &self,
        timestamp: impl Into<String>,
        summary: serde_json::Value,
    ) -> Result<SystemState, StoreError> {
        let event = MaintenanceEvent::new(timestamp, summary);
        self.mutate(|state| state.last_optimization = Some(event)).await
    }

    /// Append to the history and save.
    pub async fn append_history(&self, entry: HistoryEntry) -> Result<SystemState, StoreError> {
        self.mutate(|state| state.history.push(entry)).await
    }

    /// Record a completed maintenance event: overwrite its slot and append the
    /// matching history entry in one critical section and one write.
    pub async fn record_event(
        &self,
        kind: EventKind,
        event: MaintenanceEvent,
    ) -> Result<SystemState, StoreError> {
        let entry = HistoryEntry::from_event(kind, &event);
        let state = self
            .mutate(|state| {
                match kind {
                    EventKind::Analyze => state.last_analysis = Some(event),
                    EventKind::Optimize => state.last_optimization = Some(event),
                }
                state.history.push(entry);
            })
            .await?;

        info!(
            kind = %kind,
            history_len = state.history.len(),
            "Recorded maintenance event"
        );
        Ok(state)
    }

    /// Load, modify and save while holding the lock.
    async fn mutate<F>(&self, f: F) -> Result<SystemState, StoreError>
    where
        F: FnOnce(&mut SystemState),
    {
        let mut guard = self.state.lock().await;
        let mut state = self.ensure_loaded(&mut guard).await.clone();
        f(&mut state);
        *guard = Some(state.clone());
        self.persist(&state).await?;
        Ok(state)
    }

    async fn ensure_loaded<'a>(&self, slot: &'a mut Option<SystemState>) -> &'a SystemState {
        if slot.is_none() {
            let state = self.read_or_initialize().await;
            *slot = Some(state);
        }
        slot.get_or_insert_with(SystemState::default)
    }

    async fn read_or_initialize(&self) -> SystemState {
        let Some(path) = &self.path else {
            return SystemState::default();
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<SystemState>(&bytes) {
                Ok(state) => {
                    debug!(
                        path = %path.display(),
                        history_len = state.history.len(),
                        "Loaded state"
                    );
                    return state;
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "State file is corrupt, resetting to defaults"
                    );
                    quarantine(path).await;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No state file yet, initializing defaults");
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read state file, using defaults"
                );
            }
        }

        let state = SystemState::default();
        if let Err(e) = self.persist(&state).await {
            warn!(error = %e, "Failed to persist default state");
        }
        state
    }

    /// Write atomically: temp file in the same directory, then rename.
    async fn persist(&self, state: &SystemState) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp_path = path.with_extension("json.tmp");

        let result = async {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&tmp_path, &bytes).await?;
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        result.map_err(|source| {
            warn!(
                path = %path.display(),
                error = %source,
                "State write failed, keeping in-memory state"
            );
            StoreError::Persist {
                path: path.clone(),
                source,
            }
        })
    }
}

/// Keep a corrupt state file around as `<name>.corrupt` for inspection.
async fn quarantine(path: &Path) {
    let mut target = path.as_os_str().to_owned();
    target.push(".corrupt");
    if let Err(e) = tokio::fs::rename(path, &target).await {
        warn!(path = %path.display(), error = %e, "Failed to quarantine corrupt state file");
    }
}
