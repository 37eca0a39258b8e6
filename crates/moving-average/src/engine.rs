use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use watch_core::{Field, FieldUpdate, HistoryBar, HistorySource, MarketClock, Sink, WatchEntry, WatchError};
use watchlist::WatchlistStore;

use crate::cache::IndicatorCache;
use crate::indicators::{completed_closes, moving_average};
use crate::policy::{TimeframePolicy, TimeframeSpec};

/// Counters for one recomputation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Slices that produced a value
    pub computed: usize,
    /// Slices with too little history (stored as `None`)
    pub insufficient: usize,
    /// Slices whose fetch failed and were skipped
    pub failed: usize,
    /// Slices whose symbol was removed while the fetch was in flight
    pub stale: usize,
    /// Sink updates emitted
    pub emitted: usize,
}

/// One fetched (symbol, timeframe) slice, tagged so late results can be attributed
struct SliceResult<'a> {
    symbol: String,
    generation: u64,
    timeframe: &'a TimeframeSpec,
    bars: Result<Vec<HistoryBar>, WatchError>,
}

/// Periodic moving-average recomputation over every watched symbol.
pub struct MovingAverageEngine {
    store: WatchlistStore,
    history: Arc<dyn HistorySource>,
    sink: Arc<dyn Sink>,
    clock: MarketClock,
    policy: TimeframePolicy,
    cache: IndicatorCache,
    /// Last value sent to the sink per (symbol, label), for change suppression
    emitted: DashMap<(String, String), Option<f64>>,
}

impl MovingAverageEngine {
    pub fn new(
        store: WatchlistStore,
        history: Arc<dyn HistorySource>,
        sink: Arc<dyn Sink>,
        clock: MarketClock,
        policy: TimeframePolicy,
    ) -> Self {
        Self {
            store,
            history,
            sink,
            clock,
            policy,
            cache: IndicatorCache::new(),
            emitted: DashMap::new(),
        }
    }

    /// Read handle on the computed values
    pub fn cache(&self) -> IndicatorCache {
        self.cache.clone()
    }

    pub fn policy(&self) -> &TimeframePolicy {
        &self.policy
    }

    /// Timer entry point: does nothing while the market is closed
    pub async fn on_timer(&self) -> Option<RecomputeReport> {
        if !self.clock.is_open_now() {
            debug!("Market closed, skipping moving-average refresh");
            return None;
        }
        Some(self.recompute_all().await)
    }

    /// Recompute every timeframe for every watched symbol
    pub async fn recompute_all(&self) -> RecomputeReport {
        let entries = self.store.list().await;

        // Symbols dropped from the watchlist lose their indicators
        for symbol in self.cache.symbols() {
            if !entries.iter().any(|e| e.symbol == symbol) {
                self.forget(&symbol);
            }
        }

        let report = self.recompute(&entries).await;
        info!(
            symbols = entries.len(),
            computed = report.computed,
            insufficient = report.insufficient,
            failed = report.failed,
            stale = report.stale,
            emitted = report.emitted,
            "Moving averages refreshed ({} policy)",
            self.policy.name()
        );
        report
    }

    /// Recompute a single symbol, e.g. right after it was added
    pub async fn recompute_symbol(&self, symbol: &str) -> RecomputeReport {
        match self.store.get(symbol).await {
            Some(entry) => self.recompute(std::slice::from_ref(&entry)).await,
            None => {
                debug!("{} is not watched, nothing to recompute", symbol);
                RecomputeReport::default()
            }
        }
    }

    /// Drop cached values and change-suppression memory for a symbol
    pub fn forget(&self, symbol: &str) {
        self.cache.remove(symbol);
        self.emitted.retain(|(s, _), _| s != symbol);
    }

    async fn recompute(&self, entries: &[WatchEntry]) -> RecomputeReport {
        let mut report = RecomputeReport::default();
        if entries.is_empty() {
            return report;
        }

        let market_open = self.clock.is_open_now();
        let now_local = self.clock.local_now();

        // Fan out every (symbol, timeframe) fetch and join before storing
        let mut fetches = Vec::with_capacity(entries.len() * self.policy.timeframes().len());
        for entry in entries {
            for timeframe in self.policy.timeframes() {
                fetches.push(self.fetch_slice(entry.symbol.clone(), entry.generation, timeframe));
            }
        }

        for slice in join_all(fetches).await {
            if let Err(e) = self.store.ensure_current(&slice.symbol, slice.generation).await {
                debug!("Discarding {} result: {}", slice.timeframe.label, e);
                report.stale += 1;
                continue;
            }

            let bars = match slice.bars {
                Ok(bars) => bars,
                Err(e) => {
                    warn!("Failed to fetch {} history for {}: {}", slice.timeframe.label, slice.symbol, e);
                    report.failed += 1;
                    continue;
                }
            };

            let closes = completed_closes(&bars, slice.timeframe.bar, market_open, now_local);
            let value = moving_average(&closes, slice.timeframe.period);
            match value {
                Some(_) => report.computed += 1,
                None => {
                    debug!(
                        "Insufficient data for {} {}: {} closes",
                        slice.symbol,
                        slice.timeframe.label,
                        closes.len()
                    );
                    report.insufficient += 1;
                }
            }

            if self.store_value(&slice.symbol, &slice.timeframe.label, value) {
                report.emitted += 1;
            }
        }

        report
    }

    async fn fetch_slice<'a>(&self, symbol: String, generation: u64, timeframe: &'a TimeframeSpec) -> SliceResult<'a> {
        debug!("Fetching {} {} bars for {}", timeframe.lookback, timeframe.bar.name(), symbol);
        let bars = self.history.fetch(&symbol, &timeframe.request()).await;
        SliceResult {
            symbol,
            generation,
            timeframe,
            bars,
        }
    }

    /// Cache the value and emit it if it differs from the last emitted one.
    /// Returns whether an update was emitted.
    fn store_value(&self, symbol: &str, label: &str, value: Option<f64>) -> bool {
        self.cache.insert(symbol, label, value);

        let key = (symbol.to_string(), label.to_string());
        if self.emitted.get(&key).map(|prev| *prev == value).unwrap_or(false) {
            return false;
        }

        self.emitted.insert(key, value);
        self.sink
            .on_update(FieldUpdate::new(symbol, Field::Indicator(label.to_string()), value));
        true
    }
}
