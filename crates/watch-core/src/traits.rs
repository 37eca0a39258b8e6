use async_trait::async_trait;
use crate::{Alert, FieldUpdate, HistoryBar, HistoryRequest, Quote, WatchError};

/// Batched real-time quote provider
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// One request for all symbols. Symbols absent from the response are simply missing.
    async fn fetch(&self, symbols: &[String]) -> Result<Vec<Quote>, WatchError>;
}

/// Historical close provider, oldest bar first
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch(&self, symbol: &str, request: &HistoryRequest) -> Result<Vec<HistoryBar>, WatchError>;
}

/// Receiver of cell updates and alerts. Fire-and-forget: implementations must not block.
pub trait Sink: Send + Sync {
    fn on_update(&self, update: FieldUpdate);
    fn on_alert(&self, alert: Alert);
}
