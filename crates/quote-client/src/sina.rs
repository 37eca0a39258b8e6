use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use watch_core::{HistoryBar, HistoryRequest, HistorySource, WatchError};

use crate::{build_client, send_request, RateLimiter};

pub const DEFAULT_HISTORY_BASE_URL: &str = "https://quotes.sina.cn";

/// Kline history from Sina's `getKLineData` endpoint
#[derive(Debug, Clone)]
pub struct SinaHistoryClient {
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl SinaHistoryClient {
    /// `rate_limit` is the maximum number of requests per minute
    pub fn new(base_url: impl Into<String>, rate_limit: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(),
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    pub fn url(&self, symbol: &str, request: &HistoryRequest) -> String {
        format!(
            "{}/cn/api/json_v2.php/CN_MarketDataService.getKLineData?symbol={}&scale={}&ma=no&datalen={}",
            self.base_url,
            symbol.to_lowercase(),
            request.bar.to_minutes(),
            request.length
        )
    }
}

impl Default for SinaHistoryClient {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_BASE_URL, 120)
    }
}

#[async_trait]
impl HistorySource for SinaHistoryClient {
    async fn fetch(&self, symbol: &str, request: &HistoryRequest) -> Result<Vec<HistoryBar>, WatchError> {
        let url = self.url(symbol, request);
        let body = send_request(&self.client, Some(&self.rate_limiter), self.client.get(url)).await?;
        let bars = parse_kline(&body)?;
        debug!("{}: {} {} bars", symbol, bars.len(), request.bar.name());
        Ok(bars)
    }
}

#[derive(Debug, Deserialize)]
struct KlineRow {
    day: String,
    close: Number,
}

/// Sina quotes numbers as strings; accept both
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Text(String),
    Float(f64),
}

impl Number {
    fn value(&self) -> Option<f64> {
        match self {
            Number::Text(s) => s.trim().parse().ok(),
            Number::Float(f) => Some(*f),
        }
    }
}

fn parse_day(day: &str) -> Option<NaiveDateTime> {
    let day = day.trim();
    NaiveDateTime::parse_from_str(day, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Parse a kline body into bars, oldest first. A `null` body means no history.
pub fn parse_kline(body: &str) -> Result<Vec<HistoryBar>, WatchError> {
    let rows: Option<Vec<KlineRow>> =
        serde_json::from_str(body).map_err(|e| WatchError::Parse(e.to_string()))?;

    let mut bars = rows
        .unwrap_or_default()
        .into_iter()
        .map(|row| {
            let timestamp = parse_day(&row.day)
                .ok_or_else(|| WatchError::Parse(format!("bad kline day {:?}", row.day)))?;
            let close = row
                .close
                .value()
                .ok_or_else(|| WatchError::Parse(format!("bad close on {}", row.day)))?;
            Ok(HistoryBar { timestamp, close })
        })
        .collect::<Result<Vec<_>, WatchError>>()?;

    bars.sort_by_key(|bar| bar.timestamp);
    Ok(bars)
}
