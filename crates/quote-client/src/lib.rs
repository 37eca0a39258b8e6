//! HTTP quote and kline sources for A-share symbols.
//!
//! - [`XueqiuQuoteClient`]: batched real-time quotes.
//! - [`SinaHistoryClient`]: historical closes per bar unit.
//!
//! Both clients return `WatchError` and never retry on their own beyond the
//! 429 backoff in [`send_request`]; the engines skip failed cycles.

pub mod sina;
pub mod xueqiu;

pub use sina::{parse_kline, SinaHistoryClient, DEFAULT_HISTORY_BASE_URL};
pub use xueqiu::{parse_quotes, XueqiuQuoteClient, DEFAULT_QUOTE_BASE_URL};

use reqwest::Client;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use watch_core::WatchError;

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Debug, Clone)]
pub(crate) struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub(crate) async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let Some(&oldest) = ts.front() else { continue };
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for history slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent("Mozilla/5.0 (market-watch)")
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a request with optional rate limiting and a short 429 backoff.
/// Non-2xx responses become `WatchError::Http`, the body is returned as text.
pub(crate) async fn send_request(
    client: &Client,
    limiter: Option<&RateLimiter>,
    builder: reqwest::RequestBuilder,
) -> Result<String, WatchError> {
    let request = builder.build().map_err(|e| WatchError::Network(e.to_string()))?;

    for attempt in 0..3u32 {
        if let Some(limiter) = limiter {
            limiter.acquire().await;
        }
        let req_clone = request
            .try_clone()
            .ok_or_else(|| WatchError::Network("Cannot clone request".to_string()))?;
        let response = client
            .execute(req_clone)
            .await
            .map_err(|e| WatchError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let wait_secs = 2u64 << attempt;
            tracing::warn!("429 from {}, waiting {}s before retry {}/3", request.url().host_str().unwrap_or("upstream"), wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
            continue;
        }

        if !status.is_success() {
            return Err(WatchError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        return response
            .text()
            .await
            .map_err(|e| WatchError::Network(e.to_string()));
    }

    Err(WatchError::Http {
        status: 429,
        body: "rate limited after 3 retries".to_string(),
    })
}
