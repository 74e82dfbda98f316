//! Persistence port for the session snapshot.
//!
//! A [`SessionStore`] moves one opaque blob in and out of durable storage.
//! Encoding and decoding of the blob are pure functions
//! ([`encode_snapshot`], [`decode_snapshot`]) so any backend can be swapped in
//! and the session can be tested without touching the filesystem.
//!
//! The blob has no version field. Content that does not decode is ignored
//! and the caller falls back to a fresh state.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::models::SessionState;

/// Fixed key the snapshot is stored under.
pub const STORAGE_KEY: &str = "noteorbit_session";

/// Durable storage for one serialized session.
pub trait SessionStore: Send + Sync {
    /// The stored blob, or `None` if nothing has been saved.
    fn load(&self) -> Option<String>;

    /// Replace the stored blob.
    fn save(&self, blob: &str) -> Result<()>;
}

/// Serialize a session for storage.
pub fn encode_snapshot(state: &SessionState) -> Result<String> {
    Ok(serde_json::to_string(state)?)
}

/// Parse a stored blob. Truncated or non-conforming content yields `None`.
pub fn decode_snapshot(blob: &str) -> Option<SessionState> {
    match serde_json::from_str(blob) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable session snapshot");
            None
        }
    }
}

/// Stores the snapshot as `<dir>/noteorbit_session.json`.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.json", STORAGE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    fn save(&self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        // Write beside the target then rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    blob: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `blob`.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.blob.lock().ok().and_then(|b| b.clone())
    }

    fn save(&self, blob: &str) -> Result<()> {
        let mut guard = self
            .blob
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *guard = Some(blob.to_string());
        Ok(())
    }
}
