use watch_core::{Alert, AlertKind, CrossDirection, FieldUpdate, Sink};

/// Posts alerts to a Discord webhook. Cell updates are ignored.
#[derive(Debug, Clone)]
pub struct DiscordWebhookSink {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn payload(alert: &Alert) -> serde_json::Value {
        let (title, color) = match &alert.kind {
            AlertKind::BandTouch { timeframe, .. } => (format!("{} near {}", alert.name, timeframe), 0x0099ff),
            AlertKind::ThresholdCross { direction: CrossDirection::Up, .. } => {
                (format!("{} crossed up", alert.name), 0x00ff00)
            }
            AlertKind::ThresholdCross { direction: CrossDirection::Down, .. } => {
                (format!("{} crossed down", alert.name), 0xff0000)
            }
        };

        serde_json::json!({
            "embeds": [{
                "title": title,
                "description": alert.detail,
                "color": color,
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        })
    }
}

impl Sink for DiscordWebhookSink {
    fn on_update(&self, _update: FieldUpdate) {}

    /// Fire-and-forget via tokio::spawn; delivery is best effort
    fn on_alert(&self, alert: Alert) {
        let client = self.client.clone();
        let url = self.webhook_url.clone();
        let payload = Self::payload(&alert);

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!("Sent alert for {} via discord-webhook", alert.symbol)
                }
                Ok(resp) => tracing::warn!("Discord webhook returned {}", resp.status()),
                Err(e) => tracing::warn!("Failed to send alert via discord-webhook: {}", e),
            }
        });
    }
}
