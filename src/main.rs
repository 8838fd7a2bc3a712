use anyhow::{Context, Result};
use clap::Parser;
use feedrelay::config::{CliOverrides, Config, Settings, WEBHOOK_ENV_VAR};
use feedrelay::delivery::WebhookSink;
use feedrelay::feed::HttpFeedSource;
use feedrelay::monitor::{Monitor, MonitorEvent};
use feedrelay::output::print_events;
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Default config file location (~/.config/feedrelay/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedrelay")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedrelay",
    about = "Monitor an RSS/Atom feed and relay new entries to a webhook"
)]
struct Args {
    /// RSS/Atom feed URL
    #[arg(long, value_name = "URL")]
    feed: Option<String>,

    /// Webhook URL (required unless --dry-run is set)
    #[arg(long, value_name = "URL")]
    webhook: Option<String>,

    /// Check interval in minutes [default: 10]
    #[arg(long, value_name = "MINUTES")]
    interval: Option<u64>,

    /// Preview the newest entry without sending anything, then exit
    #[arg(long)]
    dry_run: bool,

    /// Config file path [default: ~/.config/feedrelay/config.toml]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Flips `shutdown` on SIGINT/SIGTERM (Ctrl-C elsewhere).
async fn forward_shutdown_signal(shutdown: watch::Sender<bool>) -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down gracefully"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, shutting down gracefully");
    }

    if shutdown.send(true).is_err() {
        tracing::debug!("Monitor already finished before shutdown was requested");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let file_config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let overrides = CliOverrides {
        feed_url: args.feed,
        webhook_url: args.webhook,
        interval_minutes: args.interval,
        dry_run: args.dry_run,
    };
    let env_webhook = std::env::var(WEBHOOK_ENV_VAR).ok();
    let settings =
        Settings::resolve(overrides, env_webhook, file_config).context("Invalid configuration")?;
    tracing::debug!(?settings, "Resolved settings");

    println!("Target: {}", settings.feed_url);
    println!(
        "Interval: {} minutes",
        settings.monitor.poll_interval.as_secs() / 60
    );
    println!(
        "Mode: {}",
        if settings.monitor.dry_run {
            "Dry Run"
        } else {
            "Live"
        }
    );
    println!("------------------------------------------------");

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedrelay/", env!("CARGO_PKG_VERSION")))
        .timeout(settings.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let source = HttpFeedSource::new(client.clone(), settings.feed_url.as_str())
        .with_timeout(settings.request_timeout);
    let sink = match settings.webhook_url {
        Some(webhook) => WebhookSink::live(client, webhook).with_timeout(settings.request_timeout),
        None => WebhookSink::preview_only(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = forward_shutdown_signal(shutdown_tx).await {
            tracing::warn!(error = %e, "Failed to install signal handlers");
        }
    });

    let (event_tx, event_rx) = mpsc::channel::<MonitorEvent>(32);
    let printer = tokio::spawn(print_events(event_rx));

    let result = Monitor::new(source, sink, settings.monitor, shutdown_rx)
        .with_events(event_tx)
        .run()
        .await;

    // Monitor (and its sender) is gone; let the printer drain
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Event printer task failed");
    }

    let report = result.context("Monitor aborted")?;
    tracing::info!(
        cycles = report.cycles,
        delivered = report.delivered,
        dropped = report.dropped,
        fetch_failures = report.fetch_failures,
        "Run finished"
    );
    Ok(())
}
