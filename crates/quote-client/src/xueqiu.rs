use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use watch_core::{Quote, QuoteSource, WatchError};

use crate::{build_client, send_request};

pub const DEFAULT_QUOTE_BASE_URL: &str = "https://stock.xueqiu.com";

/// Batched real-time quotes from Xueqiu's `quotec` endpoint
#[derive(Debug, Clone)]
pub struct XueqiuQuoteClient {
    base_url: String,
    client: Client,
}

impl XueqiuQuoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(),
        }
    }

    pub fn url(&self, symbols: &[String]) -> String {
        format!(
            "{}/v5/stock/realtime/quotec.json?symbol={}",
            self.base_url,
            symbols.join(",")
        )
    }
}

impl Default for XueqiuQuoteClient {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_BASE_URL)
    }
}

#[async_trait]
impl QuoteSource for XueqiuQuoteClient {
    async fn fetch(&self, symbols: &[String]) -> Result<Vec<Quote>, WatchError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let body = send_request(&self.client, None, self.client.get(self.url(symbols))).await?;
        let quotes = parse_quotes(&body)?;
        debug!("Fetched {} quotes for {} symbols", quotes.len(), symbols.len());
        Ok(quotes)
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    data: Option<Vec<QuoteRow>>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteRow {
    symbol: String,
    current: Option<f64>,
    percent: Option<f64>,
}

/// Parse a `quotec.json` body. Rows without a current price (suspended or
/// unknown symbols) are dropped.
pub fn parse_quotes(body: &str) -> Result<Vec<Quote>, WatchError> {
    let response: QuoteResponse =
        serde_json::from_str(body).map_err(|e| WatchError::Parse(e.to_string()))?;

    if response.error_code != 0 {
        return Err(WatchError::Parse(format!(
            "quote error {}: {}",
            response.error_code,
            response.error_description.unwrap_or_default()
        )));
    }

    Ok(response
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|row| {
            let current = row.current?;
            Some(Quote {
                symbol: row.symbol.to_uppercase(),
                current,
                percent: row.percent.unwrap_or(0.0),
            })
        })
        .collect())
}
