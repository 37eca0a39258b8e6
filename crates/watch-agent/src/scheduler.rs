use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use moving_average::MovingAverageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};
use watch_core::MarketClock;

use crate::poller::{PollOutcome, QuotePoller};

/// Time until the next exchange-local wall-clock multiple of `period_minutes`
/// (e.g. :00 and :30 for 30). A time exactly on a boundary waits a full period.
pub fn delay_to_next_boundary(now: DateTime<Utc>, tz: Tz, period_minutes: u32) -> Duration {
    let local = now.with_timezone(&tz);
    let period_ms = u64::from(period_minutes.max(1)) * 60_000;
    let elapsed_ms = u64::from(local.num_seconds_from_midnight()) * 1_000
        + u64::from(local.nanosecond() / 1_000_000).min(999);
    Duration::from_millis(period_ms - elapsed_ms % period_ms)
}

/// Fixed-period quote refresh. Each tick runs in its own task so the period does
/// not depend on how long a request takes; the poller itself skips overlapping ticks.
pub async fn run_quote_loop(poller: Arc<QuotePoller>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Quote loop started ({}s period)", period.as_secs());

    loop {
        interval.tick().await;
        let poller = poller.clone();
        tokio::spawn(async move {
            match poller.tick().await {
                PollOutcome::Applied(n) => debug!("Quote tick applied {} quotes", n),
                PollOutcome::Busy => debug!("Quote tick skipped, previous still running"),
                outcome => debug!("Quote tick: {:?}", outcome),
            }
        });
    }
}

/// Moving-average refresh: one pass at startup regardless of market hours, then on
/// every aligned boundary while the market is open.
pub async fn run_ma_loop(engine: Arc<MovingAverageEngine>, clock: MarketClock, period_minutes: u32) {
    info!("Initial moving-average pass");
    engine.recompute_all().await;

    loop {
        let wait = delay_to_next_boundary(clock.now(), clock.timezone(), period_minutes);
        debug!("Next moving-average refresh in {}s", wait.as_secs());
        time::sleep(wait).await;
        engine.on_timer().await;
    }
}
