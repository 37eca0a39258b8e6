//! Watchlist Snapshot
//!
//! The persisted fields per symbol: symbol, name, held flag, alert price and
//! alert-fired flag. Runtime state (last price) is never written.

use serde::{Deserialize, Serialize};
use std::path::Path;
use watch_core::{WatchEntry, WatchError};

use crate::store::WatchlistStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchlistSnapshot {
    #[serde(default)]
    pub entries: Vec<WatchEntry>,
}

impl WatchlistSnapshot {
    pub async fn capture(store: &WatchlistStore) -> Self {
        Self {
            entries: store.list().await,
        }
    }

    pub fn into_store(self) -> WatchlistStore {
        WatchlistStore::from_entries(self.entries)
    }

    /// Load from disk. A missing or empty file is an empty watchlist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let path = path.as_ref();
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No watchlist at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&raw)
            .map_err(|e| WatchError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Write atomically (temp file + rename)
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| WatchError::Parse(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!("Saved {} watchlist entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}
