use alert_engine::AlertEngine;
use moving_average::MovingAverageEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use watch_core::{WatchEntry, WatchError};
use watchlist::{Command, UpsertOutcome, WatchlistSnapshot, WatchlistStore};

/// Applies user commands to the watchlist and keeps the engines and the
/// snapshot file in step with it.
pub struct CommandDispatcher {
    store: WatchlistStore,
    engine: Arc<MovingAverageEngine>,
    alerts: Arc<AlertEngine>,
    snapshot_path: Option<PathBuf>,
}

impl CommandDispatcher {
    pub fn new(
        store: WatchlistStore,
        engine: Arc<MovingAverageEngine>,
        alerts: Arc<AlertEngine>,
        snapshot_path: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            engine,
            alerts,
            snapshot_path,
        }
    }

    /// Parse and apply one command line, then persist the watchlist.
    /// Returns a short summary for the log.
    pub async fn execute(&self, line: &str) -> Result<String, WatchError> {
        let command = Command::parse(line)?;
        let mutates = command != Command::List;
        let summary = self.apply(command).await?;
        if mutates {
            self.persist().await;
        }
        Ok(summary)
    }

    async fn apply(&self, command: Command) -> Result<String, WatchError> {
        match command {
            Command::Add(pairs) => {
                let mut added = Vec::new();
                for (name, symbol) in pairs {
                    // Re-adding only renames; flags and alert survive
                    let entry = match self.store.get(&symbol).await {
                        Some(existing) => WatchEntry { name, ..existing },
                        None => WatchEntry::new(symbol.as_str(), name),
                    };
                    if self.store.upsert(entry).await == UpsertOutcome::Inserted {
                        added.push(symbol);
                    }
                }
                for symbol in &added {
                    self.engine.recompute_symbol(symbol).await;
                }
                Ok(format!("added {}", added.join(", ")))
            }
            Command::Remove(key) => {
                let symbol = self.resolve(&key).await?;
                self.store.remove(&symbol).await;
                self.forget(&symbol);
                Ok(format!("removed {}", symbol))
            }
            Command::Clear => {
                let removed = self.store.clear().await;
                for symbol in &removed {
                    self.forget(symbol);
                }
                Ok(format!("cleared {} symbols", removed.len()))
            }
            Command::Hold { key, held } => {
                let symbol = self.resolve(&key).await?;
                self.store.set_held(&symbol, held).await;
                Ok(format!("{} {}", if held { "holding" } else { "not holding" }, symbol))
            }
            Command::Alert { key, price } => {
                let symbol = self.resolve(&key).await?;
                self.store.arm_alert(&symbol, price).await;
                Ok(format!("alert armed for {} at {:.2}", symbol, price))
            }
            Command::Unalert(key) => {
                let symbol = self.resolve(&key).await?;
                self.store.disarm_alert(&symbol).await;
                Ok(format!("alert cleared for {}", symbol))
            }
            Command::List => Ok(self.render().await),
        }
    }

    /// One line per entry, held first: name, symbol, last price, alert and averages
    async fn render(&self) -> String {
        let entries = self.store.list_for_display().await;
        if entries.is_empty() {
            return "watchlist is empty".to_string();
        }

        let cache = self.engine.cache();
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut line = format!(
                "{}{} {} {}",
                if entry.held { "*" } else { " " },
                entry.name,
                entry.symbol,
                entry
                    .last_price
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_else(|| "-".to_string()),
            );
            if let Some(target) = entry.alert_price {
                line.push_str(&format!(
                    " alert@{:.2}{}",
                    target,
                    if entry.alert_fired { " (fired)" } else { "" }
                ));
            }
            for (label, value) in cache.get(&entry.symbol).unwrap_or_default() {
                match value {
                    Some(v) => line.push_str(&format!(" {}={:.2}", label, v)),
                    None => line.push_str(&format!(" {}=N/A", label)),
                }
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    async fn resolve(&self, key: &str) -> Result<String, WatchError> {
        self.store
            .resolve(key)
            .await
            .ok_or_else(|| WatchError::Command(format!("not watched: {}", key)))
    }

    fn forget(&self, symbol: &str) {
        self.engine.forget(symbol);
        self.alerts.forget(symbol);
    }

    /// Save failures are logged; the in-memory list stays authoritative
    pub async fn persist(&self) {
        let Some(path) = &self.snapshot_path else { return };
        let snapshot = WatchlistSnapshot::capture(&self.store).await;
        if let Err(e) = snapshot.save(path).await {
            warn!("Failed to save watchlist to {}: {}", path.display(), e);
        }
    }
}

/// Read commands from stdin until EOF
pub async fn run_command_reader(dispatcher: Arc<CommandDispatcher>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match dispatcher.execute(&line).await {
                Ok(summary) => info!("{}", summary),
                Err(e) => warn!("{}", e),
            },
            Ok(None) => {
                info!("stdin closed, no more commands");
                break;
            }
            Err(e) => {
                warn!("Failed to read command: {}", e);
                break;
            }
        }
    }
}
