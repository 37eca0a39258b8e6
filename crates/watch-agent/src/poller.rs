use alert_engine::AlertEngine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use watch_core::{Field, FieldUpdate, MarketClock, Quote, QuoteSource, Sink};
use watchlist::WatchlistStore;

/// Result of one quote cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Market closed, nothing fetched
    Closed,
    /// Watchlist empty, nothing fetched
    Empty,
    /// Previous cycle still in flight
    Busy,
    /// Request failed; the whole cycle was skipped
    Failed,
    /// Quotes applied for this many symbols
    Applied(usize),
}

/// Resets the in-flight flag however the cycle ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Real-time price refresh: one batched request per cycle for every watched symbol.
pub struct QuotePoller {
    store: WatchlistStore,
    quotes: Arc<dyn QuoteSource>,
    alerts: Arc<AlertEngine>,
    sink: Arc<dyn Sink>,
    clock: MarketClock,
    in_flight: AtomicBool,
}

impl QuotePoller {
    pub fn new(
        store: WatchlistStore,
        quotes: Arc<dyn QuoteSource>,
        alerts: Arc<AlertEngine>,
        sink: Arc<dyn Sink>,
        clock: MarketClock,
    ) -> Self {
        Self {
            store,
            quotes,
            alerts,
            sink,
            clock,
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn tick(&self) -> PollOutcome {
        if !self.clock.is_open_now() {
            return PollOutcome::Closed;
        }

        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Previous quote request still in flight, skipping tick");
            return PollOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        let symbols = self.store.symbols().await;
        if symbols.is_empty() {
            return PollOutcome::Empty;
        }

        let quotes = match self.quotes.fetch(&symbols).await {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!("Quote request for {} symbols failed: {}", symbols.len(), e);
                return PollOutcome::Failed;
            }
        };

        let mut by_symbol: HashMap<String, Quote> = quotes
            .into_iter()
            .map(|quote| (quote.symbol.clone(), quote))
            .collect();

        let mut applied = 0;
        for symbol in &symbols {
            let Some(quote) = by_symbol.remove(symbol) else {
                debug!("No quote returned for {}", symbol);
                continue;
            };

            // Removed while the request was in flight
            if self.store.get(symbol).await.is_none() {
                debug!("Discarding stale quote for {}", symbol);
                continue;
            }

            self.sink
                .on_update(FieldUpdate::new(symbol.as_str(), Field::Price, Some(quote.current)));
            self.sink
                .on_update(FieldUpdate::new(symbol.as_str(), Field::Percent, Some(quote.percent)));
            self.alerts.on_price(symbol, quote.current).await;
            applied += 1;
        }

        debug!("Applied {} of {} quotes", applied, symbols.len());
        PollOutcome::Applied(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_engine::AlertConfig;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use moving_average::IndicatorCache;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;
    use watch_core::{AlertKind, WatchEntry, WatchError};
    use watch_sinks::MemorySink;

    #[derive(Default)]
    struct MockQuotes {
        quotes: Mutex<Vec<Quote>>,
        fail: bool,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
        remove_on_fetch: Option<(WatchlistStore, String)>,
    }

    impl MockQuotes {
        fn with(quotes: &[(&str, f64, f64)]) -> Self {
            let mock = Self::default();
            mock.set(quotes);
            mock
        }

        fn set(&self, quotes: &[(&str, f64, f64)]) {
            *self.quotes.lock().unwrap() = quotes
                .iter()
                .map(|(symbol, current, percent)| Quote {
                    symbol: symbol.to_string(),
                    current: *current,
                    percent: *percent,
                })
                .collect();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for MockQuotes {
        async fn fetch(&self, _symbols: &[String]) -> Result<Vec<Quote>, WatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            if let Some((store, symbol)) = &self.remove_on_fetch {
                store.remove(symbol).await;
            }
            if self.fail {
                return Err(WatchError::Http { status: 502, body: "bad gateway".into() });
            }
            Ok(self.quotes.lock().unwrap().clone())
        }
    }

    // Monday 2024-06-17 10:00 in Shanghai
    fn open_clock() -> MarketClock {
        MarketClock::new(chrono_tz::Asia::Shanghai)
            .with_now(|| Utc.with_ymd_and_hms(2024, 6, 17, 2, 0, 0).unwrap())
    }

    // Saturday 2024-06-15 10:00 in Shanghai
    fn weekend_clock() -> MarketClock {
        MarketClock::new(chrono_tz::Asia::Shanghai)
            .with_now(|| Utc.with_ymd_and_hms(2024, 6, 15, 2, 0, 0).unwrap())
    }

    fn watchlist() -> WatchlistStore {
        WatchlistStore::from_entries(vec![
            WatchEntry::new("SH600000", "PF Bank"),
            WatchEntry::new("SZ000001", "Ping An").with_alert(11.0),
        ])
    }

    fn poller(
        store: &WatchlistStore,
        quotes: Arc<MockQuotes>,
        clock: MarketClock,
    ) -> (QuotePoller, MemorySink) {
        let sink = MemorySink::new();
        let sink_arc: Arc<dyn Sink> = Arc::new(sink.clone());
        let alerts = Arc::new(AlertEngine::new(
            store.clone(),
            IndicatorCache::new(),
            sink_arc.clone(),
            AlertConfig::default(),
        ));
        (QuotePoller::new(store.clone(), quotes, alerts, sink_arc, clock), sink)
    }

    #[tokio::test]
    async fn test_closed_market_does_not_fetch() {
        let store = watchlist();
        let quotes = Arc::new(MockQuotes::with(&[("SH600000", 10.0, 0.5)]));
        let (poller, sink) = poller(&store, quotes.clone(), weekend_clock());

        assert_eq!(poller.tick().await, PollOutcome::Closed);
        assert_eq!(quotes.calls(), 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_watchlist_does_not_fetch() {
        let store = WatchlistStore::new();
        let quotes = Arc::new(MockQuotes::default());
        let (poller, _sink) = poller(&store, quotes.clone(), open_clock());

        assert_eq!(poller.tick().await, PollOutcome::Empty);
        assert_eq!(quotes.calls(), 0);
    }

    #[tokio::test]
    async fn test_updates_in_insertion_order() {
        let store = watchlist();
        // Response order differs from watchlist order
        let quotes = Arc::new(MockQuotes::with(&[
            ("SZ000001", 10.8, -0.37),
            ("SH600000", 10.52, 1.25),
        ]));
        let (poller, sink) = poller(&store, quotes.clone(), open_clock());

        assert_eq!(poller.tick().await, PollOutcome::Applied(2));

        let updates = sink.updates();
        assert_eq!(updates.len(), 4);
        assert_eq!(updates[0], FieldUpdate::new("SH600000", Field::Price, Some(10.52)));
        assert_eq!(updates[1], FieldUpdate::new("SH600000", Field::Percent, Some(1.25)));
        assert_eq!(updates[2].symbol, "SZ000001");

        assert_eq!(store.get("SH600000").await.unwrap().last_price, Some(10.52));
    }

    #[tokio::test]
    async fn test_failure_skips_cycle() {
        let store = watchlist();
        let quotes = Arc::new(MockQuotes {
            fail: true,
            ..MockQuotes::default()
        });
        let (poller, sink) = poller(&store, quotes, open_clock());

        assert_eq!(poller.tick().await, PollOutcome::Failed);
        assert!(sink.events().is_empty());
        assert_eq!(store.get("SH600000").await.unwrap().last_price, None);
    }

    #[tokio::test]
    async fn test_removed_symbol_not_recreated() {
        let store = watchlist();
        let quotes = Arc::new(MockQuotes {
            remove_on_fetch: Some((store.clone(), "SH600000".to_string())),
            ..MockQuotes::with(&[("SH600000", 10.52, 1.25), ("SZ000001", 10.8, -0.37)])
        });
        let (poller, sink) = poller(&store, quotes, open_clock());

        assert_eq!(poller.tick().await, PollOutcome::Applied(1));
        assert!(store.get("SH600000").await.is_none());
        assert!(sink.updates().iter().all(|u| u.symbol == "SZ000001"));
    }

    #[tokio::test]
    async fn test_threshold_alert_across_ticks() {
        let store = watchlist();
        let quotes = Arc::new(MockQuotes::with(&[("SZ000001", 10.8, -0.37)]));
        let (poller, sink) = poller(&store, quotes.clone(), open_clock());

        poller.tick().await;
        assert!(sink.alerts().is_empty());

        quotes.set(&[("SZ000001", 11.2, 1.5)]);
        poller.tick().await;
        quotes.set(&[("SZ000001", 11.5, 2.1)]);
        poller.tick().await;

        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert!(matches!(alerts[0].kind, AlertKind::ThresholdCross { target, .. } if target == 11.0));
        assert!(store.get("SZ000001").await.unwrap().alert_fired);
    }

    #[tokio::test]
    async fn test_skip_if_busy() {
        let store = watchlist();
        let gate = Arc::new(Semaphore::new(0));
        let quotes = Arc::new(MockQuotes {
            gate: Some(gate.clone()),
            ..MockQuotes::with(&[("SH600000", 10.52, 1.25)])
        });
        let (poller, _sink) = poller(&store, quotes.clone(), open_clock());
        let poller = Arc::new(poller);

        let first = tokio::spawn({
            let poller = poller.clone();
            async move { poller.tick().await }
        });
        while quotes.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(poller.tick().await, PollOutcome::Busy);
        assert_eq!(quotes.calls(), 1);

        gate.add_permits(1);
        assert_eq!(first.await.unwrap(), PollOutcome::Applied(1));

        // Guard released once the first cycle finished
        gate.add_permits(1);
        assert_eq!(poller.tick().await, PollOutcome::Applied(1));
    }
}
