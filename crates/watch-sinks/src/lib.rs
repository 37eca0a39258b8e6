mod discord;

pub use discord::DiscordWebhookSink;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use watch_core::{Alert, FieldUpdate, Sink};

/// Everything a sink can receive, as one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SinkEvent {
    Update(FieldUpdate),
    Alert(Alert),
}

/// Configuration for the alert sinks.
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    pub discord_webhook_url: Option<String>,
}

impl SinkConfig {
    /// Log sink plus every configured remote channel.
    pub fn build(&self) -> FanoutSink {
        let mut sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(LogSink)];

        if let Some(ref webhook_url) = self.discord_webhook_url {
            sinks.push(Arc::new(DiscordWebhookSink::new(webhook_url.clone())));
            tracing::info!("Discord webhook alerts enabled");
        } else {
            tracing::info!("No remote alert channel configured (set DISCORD_WEBHOOK_URL)");
        }

        FanoutSink::new(sinks)
    }
}

/// Writes updates at debug level and alerts at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn on_update(&self, update: FieldUpdate) {
        match update.value {
            Some(value) => tracing::debug!(symbol = %update.symbol, field = %update.field, value, "update"),
            None => tracing::debug!(symbol = %update.symbol, field = %update.field, "update: N/A"),
        }
    }

    fn on_alert(&self, alert: Alert) {
        tracing::warn!(symbol = %alert.symbol, name = %alert.name, "ALERT: {}", alert.detail);
    }
}

/// Keeps every event in memory. Used by tests and by callers that render in batches.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn updates(&self) -> Vec<FieldUpdate> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Update(u) => Some(u),
                SinkEvent::Alert(_) => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Alert(a) => Some(a),
                SinkEvent::Update(_) => None,
            })
            .collect()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn push(&self, event: SinkEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Sink for MemorySink {
    fn on_update(&self, update: FieldUpdate) {
        self.push(SinkEvent::Update(update));
    }

    fn on_alert(&self, alert: Alert) {
        self.push(SinkEvent::Alert(alert));
    }
}

/// Forwards events to an unbounded channel for a renderer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Sink channel closed, dropping event");
        }
    }
}

impl Sink for ChannelSink {
    fn on_update(&self, update: FieldUpdate) {
        self.forward(SinkEvent::Update(update));
    }

    fn on_alert(&self, alert: Alert) {
        self.forward(SinkEvent::Alert(alert));
    }
}

/// Dispatches every event to all wrapped sinks, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Arc<Vec<Arc<dyn Sink>>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Sink for FanoutSink {
    fn on_update(&self, update: FieldUpdate) {
        for sink in self.sinks.iter() {
            sink.on_update(update.clone());
        }
    }

    fn on_alert(&self, alert: Alert) {
        for sink in self.sinks.iter() {
            sink.on_alert(alert.clone());
        }
    }
}
