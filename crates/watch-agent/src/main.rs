use std::sync::Arc;

use alert_engine::AlertEngine;
use anyhow::{Context, Result};
use moving_average::MovingAverageEngine;
use quote_client::{SinaHistoryClient, XueqiuQuoteClient};
use tokio::signal::unix::SignalKind;
use watch_core::{MarketClock, Sink};
use watch_sinks::SinkConfig;
use watchlist::WatchlistSnapshot;

mod commands;
mod config;
mod poller;
mod scheduler;

use commands::CommandDispatcher;
use config::AgentConfig;
use poller::QuotePoller;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting market watch agent");

    // 2. Load configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Quote poll: every {}s", config.quote_poll_seconds);
    tracing::info!(
        "  Moving averages: {} policy ({}), refreshed every {} min",
        config.ma_policy.name(),
        config.ma_policy.labels().join(", "),
        config.ma_refresh_minutes
    );
    tracing::info!("  Exchange time zone: {}", config.exchange_tz);
    tracing::info!(
        "  Band touch: ±{}%{}",
        config.band_touch_pct,
        if config.suppress_repeated_band_touch { " (edge-only)" } else { "" }
    );

    // 3. Restore the watchlist
    let snapshot = WatchlistSnapshot::load(&config.watchlist_path)
        .await
        .with_context(|| format!("failed to load watchlist from {}", config.watchlist_path.display()))?;
    let store = snapshot.into_store();
    tracing::info!(
        "Watchlist restored: {} symbols from {}",
        store.len().await,
        config.watchlist_path.display()
    );

    // 4. Wire sources, engines and sinks
    let clock = MarketClock::new(config.exchange_tz);
    let sink: Arc<dyn Sink> = Arc::new(
        SinkConfig {
            discord_webhook_url: config.discord_webhook_url.clone(),
        }
        .build(),
    );
    let quotes = Arc::new(XueqiuQuoteClient::new(config.quote_base_url.clone()));
    let history = Arc::new(SinaHistoryClient::new(
        config.history_base_url.clone(),
        config.history_rate_limit,
    ));

    let engine = Arc::new(MovingAverageEngine::new(
        store.clone(),
        history,
        sink.clone(),
        clock.clone(),
        config.ma_policy.clone(),
    ));
    let alerts = Arc::new(AlertEngine::new(
        store.clone(),
        engine.cache(),
        sink.clone(),
        config.alert_config(),
    ));
    let poller = Arc::new(QuotePoller::new(
        store.clone(),
        quotes,
        alerts.clone(),
        sink,
        clock.clone(),
    ));
    let dispatcher = Arc::new(CommandDispatcher::new(
        store,
        engine.clone(),
        alerts,
        Some(config.watchlist_path.clone()),
    ));

    tracing::info!(
        "Market is {}",
        if clock.is_open_now() { "open" } else { "closed" }
    );

    // 5. Background loops
    let quote_task = tokio::spawn(scheduler::run_quote_loop(poller, config.quote_period()));
    let ma_task = tokio::spawn(scheduler::run_ma_loop(
        engine,
        clock,
        config.ma_refresh_minutes,
    ));
    let command_task = tokio::spawn(commands::run_command_reader(dispatcher.clone()));

    // 6. Wait for shutdown (SIGINT + SIGTERM)
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }

    tracing::info!("Shutdown signal received, exiting gracefully...");
    quote_task.abort();
    ma_task.abort();
    command_task.abort();

    // Final save
    dispatcher.persist().await;
    tracing::info!("Watchlist saved to {}", config.watchlist_path.display());

    Ok(())
}
