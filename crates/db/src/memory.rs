//! In-process [`NoteStore`] backed by a `BTreeMap`.
//!
//! Used by the API and pipeline test suites, and handy for local runs
//! without Postgres. Every mutating call bumps a write counter so tests
//! can assert that an operation did not touch the store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use quicknotes_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::models::note::{ChainStatus, CreateNote, Note, UpdateNote};
use crate::store::{resolve_rejected_attach, NoteStore, StoreError};

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    notes: BTreeMap<DbId, Note>,
}

/// Thread-safe in-memory note store.
#[derive(Default)]
pub struct MemoryNoteStore {
    state: RwLock<MemoryState>,
    writes: AtomicU64,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes that actually changed a note.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

/// `updated_at` never moves backwards, even if the wall clock does.
fn touch(note: &mut Note, now: Timestamp) {
    note.updated_at = now.max(note.updated_at);
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, id: DbId) -> Result<Option<Note>, StoreError> {
        Ok(self.state.read().await.notes.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Note>, StoreError> {
        let state = self.state.read().await;
        let mut notes: Vec<Note> = state.notes.values().cloned().collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes)
    }

    async fn create(&self, input: &CreateNote) -> Result<Note, StoreError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let now = Utc::now();
        let note = Note {
            id: state.next_id,
            title: input.title.clone(),
            content: input.content.clone(),
            wallet_address: input.wallet_address.clone(),
            tx_hash: None,
            chain_status: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.notes.insert(note.id, note.clone());
        self.record_write();
        Ok(note)
    }

    async fn update(&self, id: DbId, input: &UpdateNote) -> Result<Option<Note>, StoreError> {
        let mut state = self.state.write().await;
        let Some(note) = state.notes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &input.title {
            note.title = title.clone();
        }
        if let Some(content) = &input.content {
            note.content = content.clone();
        }
        touch(note, Utc::now());
        let updated = note.clone();
        self.record_write();
        Ok(Some(updated))
    }

    async fn delete(&self, id: DbId) -> Result<bool, StoreError> {
        let removed = self.state.write().await.notes.remove(&id).is_some();
        if removed {
            self.record_write();
        }
        Ok(removed)
    }

    async fn list_pending(&self) -> Result<Vec<Note>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .notes
            .values()
            .filter(|n| n.chain_status == Some(ChainStatus::Pending))
            .cloned()
            .collect())
    }

    async fn attach_proof(
        &self,
        id: DbId,
        tx_hash: &str,
        wallet_address: Option<&str>,
    ) -> Result<Option<Note>, StoreError> {
        let mut state = self.state.write().await;
        let Some(note) = state.notes.get_mut(&id) else {
            return Ok(None);
        };
        if note.is_confirmed() {
            let existing = note.clone();
            return resolve_rejected_attach(Some(existing), tx_hash);
        }
        note.tx_hash = Some(tx_hash.to_string());
        note.chain_status = Some(ChainStatus::Pending);
        note.confirmed_at = None;
        if let Some(addr) = wallet_address {
            note.wallet_address = Some(addr.to_string());
        }
        touch(note, Utc::now());
        let updated = note.clone();
        self.record_write();
        Ok(Some(updated))
    }

    async fn mark_confirmed(&self, id: DbId, tx_hash: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(note) = state.notes.get_mut(&id) else {
            return Ok(false);
        };
        if note.chain_status != Some(ChainStatus::Pending)
            || note.tx_hash.as_deref() != Some(tx_hash)
        {
            return Ok(false);
        }
        let now = Utc::now();
        note.chain_status = Some(ChainStatus::Confirmed);
        note.confirmed_at = Some(now);
        touch(note, now);
        self.record_write();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn new_note(title: &str) -> CreateNote {
        CreateNote {
            title: title.to_string(),
            content: "body".to_string(),
            wallet_address: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryNoteStore::new();
        let a = store.create(&new_note("a")).await.unwrap();
        let b = store.create(&new_note("b")).await.unwrap();
        assert_eq!(a.id + 1, b.id);
        assert!(a.chain_status.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryNoteStore::new();
        store.create(&new_note("first")).await.unwrap();
        store.create(&new_note("second")).await.unwrap();
        let titles: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn update_keeps_timestamps_monotonic() {
        let store = MemoryNoteStore::new();
        let note = store.create(&new_note("a")).await.unwrap();
        let updated = store
            .update(
                note.id,
                &UpdateNote {
                    title: Some("b".into()),
                    content: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "b");
        assert_eq!(updated.content, "body");
        assert!(updated.updated_at >= note.updated_at);
    }

    #[tokio::test]
    async fn attach_then_confirm() {
        let store = MemoryNoteStore::new();
        let note = store.create(&new_note("a")).await.unwrap();

        let pending = store.attach_proof(note.id, "deadbeef", Some("addr_test1x")).await.unwrap().unwrap();
        assert_eq!(pending.chain_status, Some(ChainStatus::Pending));
        assert_eq!(pending.wallet_address.as_deref(), Some("addr_test1x"));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);

        assert!(store.mark_confirmed(note.id, "deadbeef").await.unwrap());
        assert!(store.list_pending().await.unwrap().is_empty());
        let confirmed = store.get(note.id).await.unwrap().unwrap();
        assert!(confirmed.is_confirmed());
        assert!(confirmed.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn mark_confirmed_ignores_stale_hash() {
        let store = MemoryNoteStore::new();
        let note = store.create(&new_note("a")).await.unwrap();
        store.attach_proof(note.id, "first", None).await.unwrap();
        store.attach_proof(note.id, "second", None).await.unwrap();
        assert!(!store.mark_confirmed(note.id, "first").await.unwrap());
        assert!(store.mark_confirmed(note.id, "second").await.unwrap());
    }

    #[tokio::test]
    async fn confirmed_hash_is_immutable() {
        let store = MemoryNoteStore::new();
        let note = store.create(&new_note("a")).await.unwrap();
        store.attach_proof(note.id, "abc", None).await.unwrap();
        store.mark_confirmed(note.id, "abc").await.unwrap();
        let writes = store.write_count();

        let same = store.attach_proof(note.id, "abc", None).await.unwrap().unwrap();
        assert!(same.is_confirmed());

        let err = store.attach_proof(note.id, "other", None).await.unwrap_err();
        assert_matches!(err, StoreError::Conflict(_));
        assert!(!store.mark_confirmed(note.id, "abc").await.unwrap());
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn missing_note_returns_none() {
        let store = MemoryNoteStore::new();
        assert!(store.get(99).await.unwrap().is_none());
        assert!(store.attach_proof(99, "abc", None).await.unwrap().is_none());
        assert!(!store.delete(99).await.unwrap());
    }
}
