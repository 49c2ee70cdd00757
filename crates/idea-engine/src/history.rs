/// Bounded, persisted history of generated ideas, newest first.
///
/// The whole sequence is stored as one JSON array under [`HISTORY_KEY`]. Every change
/// builds a new sequence, writes it in a single `set`, and only then replaces the
/// in-memory copy, so a failed write never leaves memory and storage disagreeing.
use std::collections::HashSet;

use tracing::{debug, warn};

use idea_common::kv::KeyValueStore;

use crate::error::EngineError;
use crate::model::Idea;

pub const HISTORY_KEY: &str = "project_history";
pub const HISTORY_LIMIT: usize = 10;

pub struct HistoryStore<S> {
    store: S,
    entries: Vec<Idea>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    /// Create a store and restore whatever was persisted before.
    pub async fn open(store: S) -> Self {
        let mut history = Self {
            store,
            entries: Vec::new(),
        };
        history.load().await;
        history
    }

    /// Restore from storage. Missing, unreadable or corrupt data yields an empty history.
    ///
    /// Restored data is held to the same invariants as recorded data: at most
    /// [`HISTORY_LIMIT`] entries and no repeated ids.
    pub async fn load(&mut self) -> &[Idea] {
        self.entries = match self.store.get(HISTORY_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Idea>>(&raw) {
                Ok(entries) => bounded(entries),
                Err(e) => {
                    warn!(error = %e, key = HISTORY_KEY, "stored history is corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, key = HISTORY_KEY, "history unreadable, starting empty");
                Vec::new()
            }
        };
        debug!(entries = self.entries.len(), "history loaded");
        &self.entries
    }

    /// Put `idea` at the front, drop anything past the limit, and persist.
    ///
    /// An entry already carrying the same id is replaced rather than duplicated.
    pub async fn record(&mut self, idea: Idea) -> Result<(), EngineError> {
        let mut next = Vec::with_capacity(HISTORY_LIMIT);
        next.extend(
            self.entries
                .iter()
                .filter(|e| e.id != idea.id)
                .take(HISTORY_LIMIT - 1)
                .cloned(),
        );
        next.insert(0, idea);
        next.truncate(HISTORY_LIMIT);
        self.persist(next).await
    }

    /// Forget every entry, in storage as well as in memory.
    pub async fn clear(&mut self) -> Result<(), EngineError> {
        self.persist(Vec::new()).await
    }

    pub fn select(&self, id: &str) -> Option<&Idea> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[Idea] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&Idea> {
        self.entries.first()
    }

    /// Up to `n` entries after the latest one.
    pub fn recent(&self, n: usize) -> &[Idea] {
        let start = self.entries.len().min(1);
        let end = self.entries.len().min(start + n);
        &self.entries[start..end]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    async fn persist(&mut self, next: Vec<Idea>) -> Result<(), EngineError> {
        let raw = serde_json::to_string(&next).map_err(idea_common::error::CommonError::from)?;
        self.store.set(HISTORY_KEY, &raw).await?;
        debug!(entries = next.len(), "history persisted");
        self.entries = next;
        Ok(())
    }
}

fn bounded(entries: Vec<Idea>) -> Vec<Idea> {
    let mut seen = HashSet::new();
    let mut out: Vec<Idea> = entries
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect();
    out.truncate(HISTORY_LIMIT);
    out
}

#[cfg(test)]
mod tests {
    use idea_common::error::CommonError;
    use idea_common::kv::{FileStore, MemoryStore};

    use super::*;
    use crate::model::fixtures::idea;

    /// Reads work, writes always fail.
    #[derive(Clone, Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
            self.inner.get(key).await
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), CommonError> {
            Err(CommonError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    #[tokio::test]
    async fn recording_fifteen_keeps_the_ten_newest() {
        let store = MemoryStore::new();
        let mut history = HistoryStore::open(store.clone()).await;
        for i in 0..15 {
            history.record(idea(&format!("idea-{i}"))).await.unwrap();
            assert!(history.len() <= HISTORY_LIMIT);
        }

        let ids: Vec<&str> = history.entries().iter().map(|e| e.id.as_str()).collect();
        let expected: Vec<String> = (5..15).rev().map(|i| format!("idea-{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());

        let persisted: Vec<Idea> =
            serde_json::from_str(&store.get(HISTORY_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.len(), HISTORY_LIMIT);
        assert_eq!(persisted[0].id, "idea-14");
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = HistoryStore::open(FileStore::new(dir.path())).await;
        history.record(idea("first")).await.unwrap();
        history.record(idea("second")).await.unwrap();

        let reopened = HistoryStore::open(FileStore::new(dir.path())).await;
        let ids: Vec<&str> = reopened.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
        assert_eq!(reopened.entries()[0].title, history.entries()[0].title);
    }

    #[tokio::test]
    async fn missing_or_corrupt_history_loads_empty() {
        let store = MemoryStore::new();
        let mut history = HistoryStore::open(store.clone()).await;
        assert!(history.entries().is_empty());

        for garbage in ["{not json", "{\"id\": 1}", "[{\"title\": \"half an idea\"}]", ""] {
            store.set(HISTORY_KEY, garbage).await.unwrap();
            assert!(history.load().await.is_empty(), "{garbage:?}");
        }
    }

    #[tokio::test]
    async fn unreachable_storage_loads_empty() {
        let backend = idea_common::kv::HistoryBackend::Redis(idea_common::redis::RedisCache::new(None));
        let history = HistoryStore::open(backend).await;
        assert!(history.entries().is_empty());
    }

    #[tokio::test]
    async fn oversized_or_duplicated_persisted_history_is_bounded_on_load() {
        let store = MemoryStore::new();
        let mut stored: Vec<Idea> = (0..12).map(|i| idea(&format!("idea-{i}"))).collect();
        stored.insert(1, idea("idea-0"));
        store
            .set(HISTORY_KEY, &serde_json::to_string(&stored).unwrap())
            .await
            .unwrap();

        let history = HistoryStore::open(store).await;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.entries()[0].id, "idea-0");
        assert_eq!(history.entries()[1].id, "idea-1");
    }

    #[tokio::test]
    async fn select_finds_without_reordering() {
        let mut history = HistoryStore::open(MemoryStore::new()).await;
        for id in ["a", "b", "c"] {
            history.record(idea(id)).await.unwrap();
        }
        assert_eq!(history.select("a").map(|e| e.id.as_str()), Some("a"));
        assert!(history.select("zzz").is_none());
        let ids: Vec<&str> = history.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(history.latest().map(|e| e.id.as_str()), Some("c"));
        let recent: Vec<&str> = history.recent(5).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(recent, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn re_recording_an_id_moves_it_to_the_front() {
        let mut history = HistoryStore::open(MemoryStore::new()).await;
        for id in ["a", "b", "a"] {
            history.record(idea(id)).await.unwrap();
        }
        let ids: Vec<&str> = history.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let store = ReadOnlyStore::default();
        let seeded = vec![idea("kept")];
        store
            .inner
            .set(HISTORY_KEY, &serde_json::to_string(&seeded).unwrap())
            .await
            .unwrap();

        let mut history = HistoryStore::open(store).await;
        let err = history.record(idea("new")).await.unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert_eq!(history.len(), 1);
        assert_eq!(history.entries()[0].id, "kept");

        assert!(history.clear().await.is_err());
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_storage_too() {
        let store = MemoryStore::new();
        let mut history = HistoryStore::open(store.clone()).await;
        history.record(idea("a")).await.unwrap();
        history.clear().await.unwrap();
        assert!(history.entries().is_empty());
        assert!(HistoryStore::open(store).await.entries().is_empty());
    }

    #[test]
    fn recent_on_empty_history() {
        let history = HistoryStore {
            store: MemoryStore::new(),
            entries: Vec::new(),
        };
        assert!(history.recent(5).is_empty());
        assert!(history.latest().is_none());
    }
}
