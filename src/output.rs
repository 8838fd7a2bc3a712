//! Operator-facing progress lines rendered from [`MonitorEvent`]s.
//!
//! These go to stdout and are separate from `tracing` diagnostics on stderr.

use crate::monitor::{MonitorEvent, Termination};
use chrono::Local;
use std::time::Duration;
use tokio::sync::mpsc;

fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Renders one event as a single line, without timestamp.
pub fn render(event: &MonitorEvent) -> String {
    match event {
        MonitorEvent::Started { dry_run: true } => "Starting monitor (dry run)".to_string(),
        MonitorEvent::Started { dry_run: false } => "Starting monitor (live)".to_string(),
        MonitorEvent::BaselineEstablished { latest: Some(entry) } => {
            format!("Initialized. Latest post: {}", entry.title)
        }
        MonitorEvent::BaselineEstablished { latest: None } => {
            "Initialized. Feed is empty; baseline deferred".to_string()
        }
        MonitorEvent::Preview(entry) => {
            format!("[Dry Run] Found: {} ({})", entry.title, entry.display_link())
        }
        MonitorEvent::Delivered(entry) => format!("Sent: {}", entry.title),
        MonitorEvent::Dropped { entry, error } => {
            format!("Dropped: {} ({})", entry.title, error)
        }
        MonitorEvent::Deferred {
            entry,
            pending,
            error,
        } => format!(
            "Delivery failed for {} ({}); {} entr{} will retry next cycle",
            entry.title,
            error,
            pending,
            if *pending == 1 { "y" } else { "ies" }
        ),
        MonitorEvent::BoundaryLost { visible } => format!(
            "Last delivered entry left the feed window; treating {} visible entries as new",
            visible
        ),
        MonitorEvent::FetchFailed {
            phase,
            cause,
            error,
        } => format!("Fetch failed while {} ({} error): {}", phase, cause, error),
        MonitorEvent::CycleComplete {
            delivered: 0,
            dropped: 0,
        } => "Checked feed: nothing new".to_string(),
        MonitorEvent::CycleComplete { delivered, dropped } => {
            format!("Checked feed: {} sent, {} dropped", delivered, dropped)
        }
        MonitorEvent::Idle { delay } => format!("Next check in {}", human_duration(*delay)),
        MonitorEvent::Backoff { delay, failures } => format!(
            "Backing off for {} after {} consecutive failure{}",
            human_duration(*delay),
            failures,
            if *failures == 1 { "" } else { "s" }
        ),
        MonitorEvent::Terminated(Termination::DryRunComplete) => {
            "Dry run verification complete. Exiting".to_string()
        }
        MonitorEvent::Terminated(Termination::InitializationFailed) => {
            "Initialization failed. Exiting".to_string()
        }
        MonitorEvent::Terminated(Termination::Cancelled) => "Monitor stopped by user".to_string(),
    }
}

/// Prints events with a local `[HH:MM:SS]` prefix until the sender closes.
pub async fn print_events(mut rx: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = rx.recv().await {
        println!("[{}] {}", Local::now().format("%H:%M:%S"), render(&event));
    }
}
