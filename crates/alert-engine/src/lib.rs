//! Alert Engine
//!
//! Two independent checks per price observation:
//!
//! - band touch: price within ±1% of a moving average. Stateless, repeats every
//!   cycle while in band unless `suppress_repeated_band_touch` is set.
//! - threshold cross: one-shot per arming. Fires on the first crossing of the
//!   user's alert price and latches `alert_fired` until re-armed.

pub mod conditions;

pub use conditions::{crossing, touches_band, DEFAULT_BAND};

use dashmap::DashSet;
use moving_average::IndicatorCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use watch_core::{Alert, AlertKind, Sink};
use watchlist::WatchlistStore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Band half-width as a fraction of the moving average
    pub band: f64,
    /// Emit band touches only on entering the band instead of every cycle
    pub suppress_repeated_band_touch: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            band: DEFAULT_BAND,
            suppress_repeated_band_touch: false,
        }
    }
}

pub struct AlertEngine {
    store: WatchlistStore,
    indicators: IndicatorCache,
    sink: Arc<dyn Sink>,
    config: AlertConfig,
    /// (symbol, label) cells currently in band; only used with suppression on
    in_band: DashSet<(String, String)>,
}

impl AlertEngine {
    pub fn new(
        store: WatchlistStore,
        indicators: IndicatorCache,
        sink: Arc<dyn Sink>,
        config: AlertConfig,
    ) -> Self {
        Self {
            store,
            indicators,
            sink,
            config,
            in_band: DashSet::new(),
        }
    }

    /// Record a fresh price for `symbol` and emit any alerts it triggers.
    /// Returns the emitted alerts. Unknown symbols are ignored.
    pub async fn on_price(&self, symbol: &str, price: f64) -> Vec<Alert> {
        let observation = match self.store.record_price(symbol, price).await {
            Some(observation) => observation,
            None => {
                debug!("Ignoring price for unwatched symbol {}", symbol);
                return Vec::new();
            }
        };

        let mut alerts = self.band_touches(symbol, &observation.name, price);

        if let Some(target) = observation.alert_price {
            if !observation.alert_fired {
                if let Some(direction) = crossing(observation.previous, price, target) {
                    if self.store.mark_alert_fired(symbol, target).await {
                        info!("{} crossed alert price {:.2} at {:.2}", symbol, target, price);
                        alerts.push(Alert::new(
                            symbol,
                            &observation.name,
                            AlertKind::ThresholdCross { target, direction },
                            price,
                        ));
                    }
                }
            }
        }

        for alert in &alerts {
            self.sink.on_alert(alert.clone());
        }
        alerts
    }

    /// Drop band memory for a removed symbol
    pub fn forget(&self, symbol: &str) {
        self.in_band.retain(|(s, _)| s != symbol);
    }

    fn band_touches(&self, symbol: &str, name: &str, price: f64) -> Vec<Alert> {
        let Some(set) = self.indicators.get(symbol) else {
            return Vec::new();
        };

        let mut alerts = Vec::new();
        for (label, value) in set {
            // Missing averages disable the comparison
            let Some(ma) = value else { continue };
            let key = (symbol.to_string(), label.clone());

            if !touches_band(price, ma, self.config.band) {
                self.in_band.remove(&key);
                continue;
            }

            if self.config.suppress_repeated_band_touch && !self.in_band.insert(key) {
                continue;
            }

            alerts.push(Alert::new(
                symbol,
                name,
                AlertKind::BandTouch {
                    timeframe: label,
                    value: ma,
                },
                price,
            ));
        }
        alerts
    }
}
