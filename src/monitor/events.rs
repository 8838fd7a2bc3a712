use crate::feed::{FeedEntry, FetchCause};
use std::time::Duration;

/// Which part of the run a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Polling,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Initializing => f.write_str("initializing"),
            Phase::Polling => f.write_str("polling"),
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Dry run previewed the newest entry and exited.
    DryRunComplete,
    /// The initial fetch failed, so no baseline exists.
    InitializationFailed,
    /// Operator interrupt or shutdown signal.
    Cancelled,
}

/// Progress notifications sent to the operator-facing output.
///
/// Errors are carried as rendered strings so events stay `Clone`.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Started {
        dry_run: bool,
    },
    BaselineEstablished {
        latest: Option<FeedEntry>,
    },
    Preview(FeedEntry),
    Delivered(FeedEntry),
    /// Permanent failure; the entry is skipped for good.
    Dropped {
        entry: FeedEntry,
        error: String,
    },
    /// Transient failure; this entry and `pending - 1` after it retry next cycle.
    Deferred {
        entry: FeedEntry,
        pending: usize,
        error: String,
    },
    /// The cursor was not found in the snapshot.
    BoundaryLost {
        visible: usize,
    },
    FetchFailed {
        phase: Phase,
        cause: FetchCause,
        error: String,
    },
    CycleComplete {
        delivered: usize,
        dropped: usize,
    },
    Idle {
        delay: Duration,
    },
    Backoff {
        delay: Duration,
        failures: u32,
    },
    Terminated(Termination),
}
