//! The poll loop: cursor bookkeeping plus the state machine that drives
//! fetch → detect → deliver on an interval.
//!
//! ```text
//! Initializing ──► Idle ──► Polling ──► Idle ──► ...
//!      │                      │  ▲
//!      │                      ▼  │
//!      │                    Backoff
//!      ▼
//! Terminated  (dry-run complete, init failure, or cancellation)
//! ```
//!
//! Waits in `Idle` and `Backoff` are the only suspension points apart from
//! network round-trips, and both observe the shutdown signal.

pub mod cursor;
mod events;
mod machine;

use crate::delivery::DeliveryMode;
use std::time::Duration;

pub use cursor::{detect_new, Cursor, Novelty};
pub use events::{MonitorEvent, Phase, Termination};
pub use machine::{Monitor, MonitorError, MonitorState, RunReport};

/// Timing and mode for one monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// First backoff delay after a failed cycle; doubles per consecutive failure.
    pub retry_interval: Duration,
    /// Ceiling for the backoff delay.
    pub max_backoff: Duration,
    /// Pause between consecutive deliveries within one cycle.
    pub delivery_spacing: Duration,
    /// Preview the newest entry once and stop; nothing is sent.
    pub dry_run: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10 * 60),
            retry_interval: Duration::from_secs(60),
            max_backoff: Duration::from_secs(30 * 60),
            delivery_spacing: Duration::from_secs(1),
            dry_run: false,
        }
    }
}

impl MonitorSettings {
    /// Mode passed to the sink on every delivery.
    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.dry_run {
            DeliveryMode::DryRun
        } else {
            DeliveryMode::Live
        }
    }

    /// Delay before retrying after `failures` consecutive failed cycles.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.retry_interval
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let settings = MonitorSettings {
            retry_interval: Duration::from_secs(60),
            max_backoff: Duration::from_secs(300),
            ..MonitorSettings::default()
        };
        assert_eq!(settings.backoff_delay(1), Duration::from_secs(60));
        assert_eq!(settings.backoff_delay(2), Duration::from_secs(120));
        assert_eq!(settings.backoff_delay(3), Duration::from_secs(240));
        assert_eq!(settings.backoff_delay(4), Duration::from_secs(300));
        assert_eq!(settings.backoff_delay(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_delivery_mode_follows_dry_run() {
        let live = MonitorSettings::default();
        assert_eq!(live.delivery_mode(), DeliveryMode::Live);

        let dry = MonitorSettings {
            dry_run: true,
            ..MonitorSettings::default()
        };
        assert_eq!(dry.delivery_mode(), DeliveryMode::DryRun);
    }

    #[test]
    fn test_backoff_zero_failures_uses_base() {
        let settings = MonitorSettings::default();
        assert_eq!(settings.backoff_delay(0), settings.retry_interval);
    }
}
