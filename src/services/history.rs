//! Bounded assessment history.
//!
//! The in-memory list is the source of truth for the running process. Every
//! change is written through to the [`HistoryStore`] when one is configured;
//! store failures are logged and otherwise ignored.

use parking_lot::RwLock;
use uuid::Uuid;

use super::history_store::HistoryStore;
use crate::domain::assessment::HistoryEntry;

/// Newest-first list holding at most `max_entries` entries.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    max_entries: usize,
}

impl History {
    #[cfg(test)]
    pub fn new(max_entries: usize) -> Self {
        Self::from_entries(Vec::new(), max_entries)
    }

    /// Adopt a stored list, dropping whatever exceeds the bound.
    pub fn from_entries(mut entries: Vec<HistoryEntry>, max_entries: usize) -> Self {
        entries.truncate(max_entries);
        Self {
            entries,
            max_entries,
        }
    }

    /// Insert as the newest entry, evicting the oldest beyond the bound.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(self.max_entries);
    }

    pub fn find(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Remove every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

/// History shared by request handlers.
pub struct HistoryService {
    history: RwLock<History>,
    store: Option<HistoryStore>,
    // Serializes write-through so snapshots reach the store in order
    write_lock: tokio::sync::Mutex<()>,
}

impl HistoryService {
    /// Load the persisted history, starting empty if it cannot be read.
    pub async fn open(store: Option<HistoryStore>, max_entries: usize) -> Self {
        let entries = match &store {
            Some(store) => match store.load().await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to load history, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        tracing::info!(
            entries = entries.len(),
            persistent = store.is_some(),
            "History ready"
        );

        Self {
            history: RwLock::new(History::from_entries(entries, max_entries)),
            store,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> Option<&HistoryStore> {
        self.store.as_ref()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.history.read().entries().to_vec()
    }

    pub fn find(&self, id: Uuid) -> Option<HistoryEntry> {
        self.history.read().find(id).cloned()
    }

    pub async fn record(&self, entry: HistoryEntry) {
        self.update(|history| history.record(entry)).await
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.update(|history| history.remove(id)).await
    }

    pub async fn clear(&self) -> usize {
        self.update(History::clear).await
    }

    async fn update<R>(&self, change: impl FnOnce(&mut History) -> R) -> R {
        let _guard = self.write_lock.lock().await;

        let (result, snapshot) = {
            let mut history = self.history.write();
            let result = change(&mut *history);
            (result, history.entries().to_vec())
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&snapshot).await {
                tracing::error!(error = ?e, "Failed to save history");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assessment::UploadedImage;

    fn entry(text: &str) -> HistoryEntry {
        HistoryEntry::new(
            vec![UploadedImage::from_bytes("a.png", "image/png", b"png")],
            text.to_string(),
            "prompt".to_string(),
        )
    }

    fn texts(history: &History) -> Vec<&str> {
        history
            .entries()
            .iter()
            .map(|e| e.result.text.as_str())
            .collect()
    }

    #[test]
    fn newest_first_and_bounded() {
        let mut history = History::new(3);
        for text in ["a", "b", "c", "d"] {
            history.record(entry(text));
        }
        assert_eq!(texts(&history), vec!["d", "c", "b"]);
    }

    #[test]
    fn stored_list_is_truncated_to_bound() {
        let history = History::from_entries(vec![entry("x"), entry("y"), entry("z")], 2);
        assert_eq!(texts(&history), vec!["x", "y"]);
    }

    #[test]
    fn find_remove_clear() {
        let mut history = History::new(10);
        let first = entry("first");
        let id = first.id;
        history.record(first);
        history.record(entry("second"));

        assert_eq!(history.find(id).map(|e| e.result.text.as_str()), Some("first"));
        assert!(history.remove(id));
        assert!(!history.remove(id));
        assert!(history.find(id).is_none());
        assert_eq!(history.clear(), 1);
        assert!(history.entries().is_empty());
    }

    #[tokio::test]
    async fn service_without_store_keeps_state_in_memory() {
        let service = HistoryService::open(None, 2).await;
        let kept = entry("kept");
        let kept_id = kept.id;

        service.record(entry("old")).await;
        service.record(kept).await;
        service.record(entry("new")).await;

        let texts: Vec<_> = service
            .entries()
            .into_iter()
            .map(|e| e.result.text)
            .collect();
        assert_eq!(texts, vec!["new", "kept"]);

        assert!(service.remove(kept_id).await);
        assert!(service.find(kept_id).is_none());
        assert_eq!(service.clear().await, 1);
    }
}
