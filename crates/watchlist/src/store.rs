//! Watchlist Store
//!
//! Ordered symbol → entry mapping. Async tasks may finish after a symbol was
//! removed, so every mutating call re-checks that the entry still exists.

use std::sync::Arc;
use tokio::sync::RwLock;
use watch_core::{WatchEntry, WatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// What the alert engine needs to know about one price observation
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub name: String,
    /// Price seen on the previous observation, `None` right after arming or insertion
    pub previous: Option<f64>,
    pub alert_price: Option<f64>,
    pub alert_fired: bool,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<WatchEntry>,
    next_generation: u64,
}

impl Inner {
    fn position(&self, symbol: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.symbol == symbol)
    }

    fn entry_mut(&mut self, symbol: &str) -> Option<&mut WatchEntry> {
        self.entries.iter_mut().find(|e| e.symbol == symbol)
    }
}

/// Shared watchlist handle; clones point at the same list
#[derive(Debug, Clone, Default)]
pub struct WatchlistStore {
    inner: Arc<RwLock<Inner>>,
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = WatchEntry>) -> Self {
        let mut inner = Inner::default();
        for mut entry in entries {
            match inner.position(&entry.symbol) {
                Some(idx) => {
                    entry.generation = inner.entries[idx].generation;
                    inner.entries[idx] = entry;
                }
                None => {
                    inner.next_generation += 1;
                    entry.generation = inner.next_generation;
                    inner.entries.push(entry);
                }
            }
        }
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Entries in insertion order
    pub async fn list(&self) -> Vec<WatchEntry> {
        self.inner.read().await.entries.clone()
    }

    /// Held entries first, otherwise insertion order
    pub async fn list_for_display(&self) -> Vec<WatchEntry> {
        let mut entries = self.list().await;
        entries.sort_by_key(|e| !e.held);
        entries
    }

    pub async fn symbols(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .entries
            .iter()
            .map(|e| e.symbol.clone())
            .collect()
    }

    pub async fn get(&self, symbol: &str) -> Option<WatchEntry> {
        let inner = self.inner.read().await;
        inner.entries.iter().find(|e| e.symbol == symbol).cloned()
    }

    /// Resolve a user-typed key, which may be a symbol or a display name
    pub async fn resolve(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .find(|e| e.symbol.eq_ignore_ascii_case(key))
            .or_else(|| inner.entries.iter().find(|e| e.name == key))
            .map(|e| e.symbol.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// True while `symbol` is still the same watch (not removed, not removed and re-added)
    pub async fn is_current(&self, symbol: &str, generation: u64) -> bool {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .any(|e| e.symbol == symbol && e.generation == generation)
    }

    /// `is_current` as a result, for callers that propagate staleness with `?`
    pub async fn ensure_current(&self, symbol: &str, generation: u64) -> Result<(), WatchError> {
        if self.is_current(symbol, generation).await {
            Ok(())
        } else {
            Err(WatchError::Stale {
                symbol: symbol.to_string(),
            })
        }
    }

    /// Insert a new entry or update the user-editable fields of an existing one.
    /// An existing entry keeps its position, generation and last price.
    pub async fn upsert(&self, entry: WatchEntry) -> UpsertOutcome {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.entry_mut(&entry.symbol) {
            if existing.alert_price != entry.alert_price {
                existing.last_price = None;
            }
            existing.name = entry.name;
            existing.held = entry.held;
            existing.alert_price = entry.alert_price;
            existing.alert_fired = entry.alert_fired;
            return UpsertOutcome::Updated;
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.entries.push(WatchEntry {
            generation,
            last_price: None,
            ..entry
        });
        UpsertOutcome::Inserted
    }

    pub async fn remove(&self, symbol: &str) -> Option<WatchEntry> {
        let mut inner = self.inner.write().await;
        let idx = inner.position(symbol)?;
        Some(inner.entries.remove(idx))
    }

    /// Remove everything, returning the symbols that were dropped
    pub async fn clear(&self) -> Vec<String> {
        let mut inner = self.inner.write().await;
        inner.entries.drain(..).map(|e| e.symbol).collect()
    }

    /// Store the latest price and hand back the state needed for crossing detection.
    /// Returns `None` when the symbol is no longer watched.
    pub async fn record_price(&self, symbol: &str, price: f64) -> Option<PriceObservation> {
        let mut inner = self.inner.write().await;
        let entry = inner.entry_mut(symbol)?;
        let previous = entry.last_price.replace(price);
        Some(PriceObservation {
            name: entry.name.clone(),
            previous,
            alert_price: entry.alert_price,
            alert_fired: entry.alert_fired,
        })
    }

    /// Latch the threshold alert. Only succeeds if the entry is still armed at `target`,
    /// so a re-arm that raced with the evaluation is not overwritten.
    pub async fn mark_alert_fired(&self, symbol: &str, target: f64) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entry_mut(symbol) {
            Some(entry) if entry.alert_price == Some(target) && !entry.alert_fired => {
                entry.alert_fired = true;
                true
            }
            _ => false,
        }
    }

    /// Set a fresh threshold. Resets the fired latch and the crossing baseline.
    pub async fn arm_alert(&self, symbol: &str, price: f64) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entry_mut(symbol) {
            Some(entry) => {
                entry.alert_price = Some(price);
                entry.alert_fired = false;
                entry.last_price = None;
                true
            }
            None => false,
        }
    }

    pub async fn disarm_alert(&self, symbol: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entry_mut(symbol) {
            Some(entry) => {
                entry.alert_price = None;
                entry.alert_fired = false;
                true
            }
            None => false,
        }
    }

    pub async fn set_held(&self, symbol: &str, held: bool) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entry_mut(symbol) {
            Some(entry) => {
                entry.held = held;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_does_not_duplicate() {
        let store = WatchlistStore::new();
        assert_eq!(
            store.upsert(WatchEntry::new("SH600000", "PF Bank")).await,
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert(WatchEntry::new("SH600000", "Pudong Bank").held(true)).await,
            UpsertOutcome::Updated
        );

        let entries = store.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Pudong Bank");
        assert!(entries[0].held);
    }

    #[tokio::test]
    async fn test_insertion_order_preserved() {
        let store = WatchlistStore::new();
        store.upsert(WatchEntry::new("SZ000001", "Ping An")).await;
        store.upsert(WatchEntry::new("SH600519", "Moutai")).await;
        store.upsert(WatchEntry::new("SH600000", "PF Bank")).await;
        store.upsert(WatchEntry::new("SZ000001", "Ping An Bank")).await;

        assert_eq!(store.symbols().await, vec!["SZ000001", "SH600519", "SH600000"]);
    }

    #[tokio::test]
    async fn test_display_order_puts_held_first() {
        let store = WatchlistStore::new();
        store.upsert(WatchEntry::new("SZ000001", "Ping An")).await;
        store.upsert(WatchEntry::new("SH600519", "Moutai").held(true)).await;

        let display: Vec<String> = store
            .list_for_display()
            .await
            .into_iter()
            .map(|e| e.symbol)
            .collect();
        assert_eq!(display, vec!["SH600519", "SZ000001"]);
    }

    #[tokio::test]
    async fn test_generation_changes_on_readd() {
        let store = WatchlistStore::new();
        store.upsert(WatchEntry::new("SH600000", "PF Bank")).await;
        let first = store.get("SH600000").await.unwrap().generation;
        assert!(store.is_current("SH600000", first).await);

        store.remove("SH600000").await;
        assert!(!store.is_current("SH600000", first).await);

        store.upsert(WatchEntry::new("SH600000", "PF Bank")).await;
        let second = store.get("SH600000").await.unwrap().generation;
        assert_ne!(first, second);
        assert!(!store.is_current("SH600000", first).await);

        assert!(store.ensure_current("SH600000", second).await.is_ok());
        assert!(matches!(
            store.ensure_current("SH600000", first).await,
            Err(WatchError::Stale { symbol }) if symbol == "SH600000"
        ));
    }

    #[tokio::test]
    async fn test_record_price_returns_previous() {
        let store = WatchlistStore::new();
        store.upsert(WatchEntry::new("SH600000", "PF Bank").with_alert(50.0)).await;

        let first = store.record_price("SH600000", 45.0).await.unwrap();
        assert_eq!(first.previous, None);
        assert_eq!(first.alert_price, Some(50.0));

        let second = store.record_price("SH600000", 48.0).await.unwrap();
        assert_eq!(second.previous, Some(45.0));

        assert!(store.record_price("SZ000001", 10.0).await.is_none());
    }

    #[tokio::test]
    async fn test_mark_fired_requires_same_target() {
        let store = WatchlistStore::new();
        store.upsert(WatchEntry::new("SH600000", "PF Bank").with_alert(50.0)).await;

        assert!(!store.mark_alert_fired("SH600000", 55.0).await);
        assert!(store.mark_alert_fired("SH600000", 50.0).await);
        assert!(!store.mark_alert_fired("SH600000", 50.0).await);
        assert!(store.get("SH600000").await.unwrap().alert_fired);
    }

    #[tokio::test]
    async fn test_arm_resets_latch_and_baseline() {
        let store = WatchlistStore::new();
        store.upsert(WatchEntry::new("SH600000", "PF Bank").with_alert(50.0)).await;
        store.record_price("SH600000", 52.0).await;
        store.mark_alert_fired("SH600000", 50.0).await;

        assert!(store.arm_alert("SH600000", 60.0).await);
        let entry = store.get("SH600000").await.unwrap();
        assert_eq!(entry.alert_price, Some(60.0));
        assert!(!entry.alert_fired);
        assert_eq!(entry.last_price, None);
    }

    #[tokio::test]
    async fn test_mutations_on_missing_symbol_are_noops() {
        let store = WatchlistStore::new();
        assert!(!store.arm_alert("SH600000", 1.0).await);
        assert!(!store.set_held("SH600000", true).await);
        assert!(!store.disarm_alert("SH600000").await);
        assert!(store.remove("SH600000").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_and_resolve() {
        let store = WatchlistStore::from_entries(vec![
            WatchEntry::new("SH600000", "PF Bank"),
            WatchEntry::new("SZ000001", "Ping An"),
        ]);
        assert_eq!(store.resolve("Ping An").await.as_deref(), Some("SZ000001"));
        assert_eq!(store.resolve("sh600000").await.as_deref(), Some("SH600000"));
        assert_eq!(store.resolve("nope").await, None);

        let removed = store.clear().await;
        assert_eq!(removed, vec!["SH600000", "SZ000001"]);
        assert_eq!(store.len().await, 0);
    }
}
