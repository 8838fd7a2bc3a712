//! Delivery of new-entry notifications to a webhook.
//!
//! The sink is the only adapter between [`FeedEntry`](crate::feed::FeedEntry)
//! and the destination's wire format. Failures are classified so the monitor
//! can decide between retrying next cycle and dropping the entry.

mod webhook;

use crate::feed::FeedEntry;
use std::future::Future;
use thiserror::Error;

pub use webhook::{format_message, WebhookSink, MAX_CONTENT_CHARS};

/// Whether the sink actually talks to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Record entries for preview, send nothing.
    DryRun,
    Live,
}

/// Errors raised by a delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
    #[error("No destination configured")]
    MissingDestination,
}

impl DeliveryError {
    /// Returns true if the entry should be retried on the next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Timeout => true,
            // A request that cannot be built will fail the same way next time
            DeliveryError::Network(e) => !e.is_builder(),
            // 429 is the destination asking us to slow down, not a rejection
            DeliveryError::HttpStatus(status) => *status >= 500 || *status == 429,
            DeliveryError::InvalidDestination(_) | DeliveryError::MissingDestination => false,
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered,
    TransientFailure(DeliveryError),
    PermanentFailure(DeliveryError),
}

impl DeliveryOutcome {
    pub fn from_result(result: Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) if e.is_transient() => DeliveryOutcome::TransientFailure(e),
            Err(e) => DeliveryOutcome::PermanentFailure(e),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Pushes one entry's notification somewhere.
///
/// `mode` is chosen by the caller on every call. A [`DeliveryMode::DryRun`]
/// call never touches the network; a [`DeliveryMode::Live`] call issues
/// exactly one outbound request.
pub trait Notifier {
    fn deliver(
        &self,
        entry: &FeedEntry,
        mode: DeliveryMode,
    ) -> impl Future<Output = DeliveryOutcome> + Send;
}
