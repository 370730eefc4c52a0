//! Exported manager state and a file store for it.
//!
//! Hosts that persist sessions across process restarts call
//! [`HistoryManager::get_state`](crate::context::manager::HistoryManager::get_state)
//! when saving and
//! [`HistoryManager::restore_from_session`](crate::context::manager::HistoryManager::restore_from_session)
//! when resuming. Only counters travel; message content is the host's
//! business.
//!
//! [`StateStore`] is a minimal store for hosts without their own: one JSON
//! file per session id.
//!
//! ```text
//! state_dir/
//!   sess-abc123.json
//!   sess-def456.json
//! ```

use crate::HistoryError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Serializable manager state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Manager type that produced this state.
    pub manager: String,
    /// Before-model-call hook invocations so far. Restored verbatim.
    pub call_counter: u64,
    /// Budget at export time. Informational only: never applied on restore.
    pub max_tokens: usize,
    /// Messages deleted by trimming so far.
    pub removed_message_count: u64,
}

// ── StateStore ─────────────────────────────────────────────────────

pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Create a store, ensuring the directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, session_id: &str) -> Result<PathBuf, HistoryError> {
        if session_id.is_empty()
            || session_id.starts_with('.')
            || session_id.contains(['/', '\\'])
        {
            return Err(HistoryError::State(format!(
                "invalid session id '{session_id}'"
            )));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    pub fn save(&self, session_id: &str, state: &SessionState) -> Result<PathBuf, HistoryError> {
        let final_path = self.state_path(session_id)?;
        let tmp_path = self.dir.join(format!(".{session_id}.json.tmp"));

        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &final_path)?;

        Ok(final_path)
    }

    /// Load a session's state. Returns `None` if it was never saved.
    pub fn load(&self, session_id: &str) -> Result<Option<SessionState>, HistoryError> {
        let path = self.state_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Ids of every stored session, sorted. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<String>, HistoryError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable state entry: {e}");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete a session's state. Deleting a missing session is not an error.
    pub fn delete(&self, session_id: &str) -> Result<(), HistoryError> {
        let path = self.state_path(session_id)?;
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_state(call_counter: u64) -> SessionState {
        SessionState {
            manager: "HistoryManager".into(),
            call_counter,
            max_tokens: 8000,
            removed_message_count: 4,
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();

        store.save("sess-a", &make_state(7)).unwrap();
        let loaded = store.load("sess-a").unwrap().unwrap();
        assert_eq!(loaded, make_state(7));
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();

        store.save("sess-a", &make_state(1)).unwrap();
        store.save("sess-a", &make_state(2)).unwrap();
        assert_eq!(store.load("sess-a").unwrap().unwrap().call_counter, 2);
    }

    #[test]
    fn atomic_write_no_temp_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();

        store.save("sess-atomic", &make_state(1)).unwrap();
        assert!(!dir.path().join(".sess-atomic.json.tmp").exists());
    }

    #[test]
    fn missing_session_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();
        assert!(store.load("nonexistent").unwrap().is_none());
    }

    #[test]
    fn list_returns_sorted_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();

        store.save("sess-b", &make_state(1)).unwrap();
        store.save("sess-a", &make_state(1)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap(), vec!["sess-a", "sess-b"]);
    }

    #[test]
    fn delete_removes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();

        store.save("sess-del", &make_state(1)).unwrap();
        store.delete("sess-del").unwrap();
        assert!(store.load("sess-del").unwrap().is_none());
        store.delete("sess-del").unwrap();
    }

    #[test]
    fn path_like_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();
        for bad in ["", "../escape", "a/b", ".hidden"] {
            assert!(
                matches!(store.save(bad, &make_state(1)), Err(HistoryError::State(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        assert!(matches!(store.load("broken"), Err(HistoryError::Json(_))));
    }
}
