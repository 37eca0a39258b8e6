use alert_engine::AlertConfig;
use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use moving_average::TimeframePolicy;
use quote_client::{DEFAULT_HISTORY_BASE_URL, DEFAULT_QUOTE_BASE_URL};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // Scheduling
    pub quote_poll_seconds: u64,           // 3
    pub ma_refresh_minutes: u32,           // 30, aligned to wall-clock boundaries
    pub ma_policy: TimeframePolicy,        // "daily" or "intraday"
    pub exchange_tz: Tz,                   // Asia/Shanghai

    // Persistence
    pub watchlist_path: PathBuf,

    // Data sources
    pub quote_base_url: String,
    pub history_base_url: String,
    pub history_rate_limit: usize,         // requests per minute

    // Alerts
    pub band_touch_pct: f64,               // 1.0 (%)
    pub suppress_repeated_band_touch: bool,

    // Discord notifications
    pub discord_webhook_url: Option<String>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let exchange_tz = var("EXCHANGE_TZ", "Asia/Shanghai");

        let config = Self {
            quote_poll_seconds: var("QUOTE_POLL_SECONDS", "3")
                .parse()
                .context("QUOTE_POLL_SECONDS must be a whole number of seconds")?,
            ma_refresh_minutes: var("MA_REFRESH_MINUTES", "30")
                .parse()
                .context("MA_REFRESH_MINUTES must be a whole number of minutes")?,
            ma_policy: var("MA_POLICY", "daily")
                .parse()
                .context("MA_POLICY must be 'daily' or 'intraday'")?,
            exchange_tz: exchange_tz
                .parse()
                .map_err(|e| anyhow!("invalid EXCHANGE_TZ {}: {}", exchange_tz, e))?,

            watchlist_path: PathBuf::from(var("WATCHLIST_PATH", "watchlist.json")),

            quote_base_url: var("QUOTE_BASE_URL", DEFAULT_QUOTE_BASE_URL),
            history_base_url: var("HISTORY_BASE_URL", DEFAULT_HISTORY_BASE_URL),
            history_rate_limit: var("HISTORY_RATE_LIMIT", "120")
                .parse()
                .context("HISTORY_RATE_LIMIT must be requests per minute")?,

            band_touch_pct: var("BAND_TOUCH_PCT", "1.0")
                .parse()
                .context("BAND_TOUCH_PCT must be a number")?,
            suppress_repeated_band_touch: var("SUPPRESS_REPEATED_BAND_TOUCH", "false")
                .parse()
                .context("SUPPRESS_REPEATED_BAND_TOUCH must be true or false")?,

            discord_webhook_url: lookup("DISCORD_WEBHOOK_URL").filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.quote_poll_seconds == 0 {
            bail!("QUOTE_POLL_SECONDS must be at least 1");
        }
        if self.ma_refresh_minutes == 0 || 1440 % self.ma_refresh_minutes != 0 {
            bail!(
                "MA_REFRESH_MINUTES must divide a day evenly, got {}",
                self.ma_refresh_minutes
            );
        }
        if self.history_rate_limit == 0 {
            bail!("HISTORY_RATE_LIMIT must be at least 1");
        }
        if !(self.band_touch_pct > 0.0 && self.band_touch_pct < 100.0) {
            bail!("BAND_TOUCH_PCT must be between 0 and 100, got {}", self.band_touch_pct);
        }
        Ok(())
    }

    pub fn quote_period(&self) -> Duration {
        Duration::from_secs(self.quote_poll_seconds)
    }

    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            band: self.band_touch_pct / 100.0,
            suppress_repeated_band_touch: self.suppress_repeated_band_touch,
        }
    }
}
