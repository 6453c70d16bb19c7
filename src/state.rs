//! Persisted synchronization state: which archives have been processed and
//! where each conversation's note lives.
//!
//! The state is the authority that makes re-imports idempotent. It is loaded
//! before a run, mutated only by the engine, and flushed to disk once at run
//! end. `reset` deletes it entirely.

use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory inside the vault holding sync state.
pub const STATE_DIR: &str = ".chat-archive-sync";
const STATE_FILE: &str = "state.json";

/// A previously processed archive, keyed by content fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub file_name: String,
    pub processed_at: DateTime<Utc>,
}

/// A previously synchronized conversation, keyed by conversation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Vault-relative path of the note backing this conversation.
    pub path: String,
    /// Last-synchronized `update_time` (export epoch seconds).
    pub update_time: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub archives: BTreeMap<String, ArchiveRecord>,
    #[serde(default)]
    pub conversations: BTreeMap<String, ConversationRecord>,
}

impl SyncState {
    pub fn state_path(vault: &Path) -> PathBuf {
        vault.join(STATE_DIR).join(STATE_FILE)
    }

    /// Load state from the vault; a vault that was never synced yields an
    /// empty state.
    pub fn load(vault: &Path) -> Result<Self> {
        let path = Self::state_path(vault);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .wrap_err_with(|| format!("reading sync state: {}", path.display()))?;
        serde_json::from_str(&raw)
            .wrap_err_with(|| format!("decoding sync state: {}", path.display()))
    }

    pub fn save(&self, vault: &Path) -> Result<()> {
        let path = Self::state_path(vault);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("creating state directory: {}", dir.display()))?;
        }
        let raw = serde_json::to_string_pretty(self).wrap_err("encoding sync state")?;
        fs::write(&path, raw).wrap_err_with(|| format!("writing sync state: {}", path.display()))
    }

    /// Delete persisted state, if any. Used by the `reset` action.
    pub fn clear(vault: &Path) -> Result<bool> {
        let path = Self::state_path(vault);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .wrap_err_with(|| format!("removing sync state: {}", path.display()))?;
        Ok(true)
    }

    pub fn archive(&self, fingerprint: &str) -> Option<&ArchiveRecord> {
        self.archives.get(fingerprint)
    }

    pub fn record_archive(&mut self, fingerprint: String, file_name: &str) {
        self.archives.insert(
            fingerprint,
            ArchiveRecord {
                file_name: file_name.to_string(),
                processed_at: Utc::now(),
            },
        );
    }

    pub fn conversation(&self, id: &str) -> Option<&ConversationRecord> {
        self.conversations.get(id)
    }

    pub fn upsert_conversation(&mut self, id: &str, path: String, update_time: f64) {
        self.conversations
            .insert(id.to_string(), ConversationRecord { path, update_time });
    }

    /// Drop records whose backing note no longer exists in the store. This is
    /// the run-start analog of a deletion notification: the conversation will
    /// be treated as unseen and recreated on its next appearance.
    pub fn prune_missing(&mut self, store: &dyn DocumentStore) -> usize {
        let live: HashSet<String> = store.list_all().into_iter().collect();
        let before = self.conversations.len();
        self.conversations.retain(|_, rec| live.contains(&rec.path));
        before - self.conversations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, FsStore};

    #[test]
    fn load_of_unsynced_vault_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = SyncState::load(dir.path()).unwrap();
        assert!(state.archives.is_empty());
        assert!(state.conversations.is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = SyncState::default();
        state.record_archive("abc".into(), "export.zip");
        state.upsert_conversation("c1", "ChatGPT/2024-05/a.md".into(), 42.0);
        state.save(dir.path()).unwrap();

        let loaded = SyncState::load(dir.path()).unwrap();
        assert_eq!(loaded.archive("abc").unwrap().file_name, "export.zip");
        assert_eq!(loaded.conversation("c1").unwrap().update_time, 42.0);
    }

    #[test]
    fn clear_removes_state() {
        let dir = tempfile::tempdir().unwrap();
        SyncState::default().save(dir.path()).unwrap();
        assert!(SyncState::clear(dir.path()).unwrap());
        assert!(!SyncState::clear(dir.path()).unwrap());
    }

    #[test]
    fn prune_drops_records_without_notes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsStore::new(dir.path());
        store.create("kept.md", "x").unwrap();

        let mut state = SyncState::default();
        state.upsert_conversation("a", "kept.md".into(), 1.0);
        state.upsert_conversation("b", "gone.md".into(), 1.0);

        assert_eq!(state.prune_missing(&store), 1);
        assert!(state.conversation("a").is_some());
        assert!(state.conversation("b").is_none());
    }
}
