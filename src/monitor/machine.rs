use super::cursor::{detect_new, Cursor};
use super::events::{MonitorEvent, Phase, Termination};
use super::MonitorSettings;
use crate::delivery::{DeliveryMode, DeliveryOutcome, Notifier};
use crate::feed::{FeedSource, FetchError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Fatal monitor errors. Everything after initialization is recoverable.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Initial fetch failed, no baseline established: {0}")]
    Initialization(#[source] FetchError),
}

/// Poll loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Initializing,
    Polling,
    /// Waiting out the poll interval.
    Idle,
    /// Waiting out the recovery delay after a failed cycle.
    Backoff,
    Terminated(Termination),
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Terminated(_))
    }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Poll cycles that fetched successfully.
    pub cycles: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub deferred: usize,
    pub fetch_failures: usize,
    pub previews: usize,
    pub idle_waits: usize,
    pub backoff_waits: usize,
    pub cursor: Cursor,
    pub termination: Option<Termination>,
}

enum Wait {
    Elapsed,
    Cancelled,
}

/// Drives fetch → detect → deliver for a single feed.
///
/// The monitor owns its cursor exclusively and runs strictly sequentially:
/// entries are delivered one at a time, in chronological order, and the
/// cursor reflects every outcome before the next suspension point.
pub struct Monitor<S, N> {
    source: S,
    sink: N,
    settings: MonitorSettings,
    state: MonitorState,
    cursor: Cursor,
    consecutive_failures: u32,
    shutdown: watch::Receiver<bool>,
    events: Option<mpsc::Sender<MonitorEvent>>,
    report: RunReport,
}

impl<S, N> Monitor<S, N>
where
    S: FeedSource,
    N: Notifier,
{
    /// Creates a monitor in [`MonitorState::Initializing`].
    ///
    /// Setting `shutdown` to `true` cancels the run at the next transition or
    /// during any wait.
    pub fn new(
        source: S,
        sink: N,
        settings: MonitorSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            sink,
            settings,
            state: MonitorState::Initializing,
            cursor: Cursor::new(),
            consecutive_failures: 0,
            shutdown,
            events: None,
            report: RunReport::default(),
        }
    }

    /// Sends progress events to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<MonitorEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Runs until a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Initialization`] if the first fetch fails.
    /// Later fetch and delivery failures never end the run.
    pub async fn run(mut self) -> Result<RunReport, MonitorError> {
        while !self.state.is_terminal() {
            self.step().await?;
        }
        Ok(self.into_report())
    }

    pub fn into_report(mut self) -> RunReport {
        self.report.cursor = self.cursor.clone();
        self.report
    }

    /// Performs the current state's work and moves to the next state.
    pub async fn step(&mut self) -> Result<MonitorState, MonitorError> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        if *self.shutdown.borrow() {
            self.terminate(Termination::Cancelled).await;
            return Ok(self.state);
        }

        let next = match self.state {
            MonitorState::Initializing => self.initialize().await?,
            MonitorState::Polling => self.poll().await,
            MonitorState::Idle => {
                self.report.idle_waits += 1;
                let delay = self.settings.poll_interval;
                self.emit(MonitorEvent::Idle { delay }).await;
                match self.wait(delay).await {
                    Wait::Elapsed => MonitorState::Polling,
                    Wait::Cancelled => MonitorState::Terminated(Termination::Cancelled),
                }
            }
            MonitorState::Backoff => {
                self.report.backoff_waits += 1;
                let failures = self.consecutive_failures;
                let delay = self.settings.backoff_delay(failures);
                tracing::info!(delay_secs = delay.as_secs(), failures, "Backing off");
                self.emit(MonitorEvent::Backoff { delay, failures }).await;
                match self.wait(delay).await {
                    Wait::Elapsed => MonitorState::Polling,
                    Wait::Cancelled => MonitorState::Terminated(Termination::Cancelled),
                }
            }
            MonitorState::Terminated(t) => MonitorState::Terminated(t),
        };

        match next {
            MonitorState::Terminated(t) => self.terminate(t).await,
            other => self.state = other,
        }
        Ok(self.state)
    }

    async fn initialize(&mut self) -> Result<MonitorState, MonitorError> {
        self.emit(MonitorEvent::Started {
            dry_run: self.settings.dry_run,
        })
        .await;

        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, cause = %e.cause(), "Initial fetch failed");
                self.report.fetch_failures += 1;
                self.emit(MonitorEvent::FetchFailed {
                    phase: Phase::Initializing,
                    cause: e.cause(),
                    error: e.to_string(),
                })
                .await;
                self.terminate(Termination::InitializationFailed).await;
                return Err(MonitorError::Initialization(e));
            }
        };

        let novelty = detect_new(&snapshot, &self.cursor);
        if let Some(candidate) = &novelty.candidate {
            self.cursor.advance_to(candidate);
        }
        tracing::info!(
            entries = snapshot.len(),
            cursor = ?self.cursor.last_delivered_id(),
            "Baseline established"
        );
        self.emit(MonitorEvent::BaselineEstablished {
            latest: snapshot.newest().cloned(),
        })
        .await;

        if !self.settings.dry_run {
            return Ok(MonitorState::Idle);
        }

        if let Some(newest) = snapshot.newest() {
            match self.sink.deliver(newest, DeliveryMode::DryRun).await {
                DeliveryOutcome::Delivered => {
                    self.report.previews += 1;
                    self.emit(MonitorEvent::Preview(newest.clone())).await;
                }
                DeliveryOutcome::TransientFailure(e) | DeliveryOutcome::PermanentFailure(e) => {
                    tracing::warn!(error = %e, "Dry-run preview failed");
                }
            }
        }
        Ok(MonitorState::Terminated(Termination::DryRunComplete))
    }

    async fn poll(&mut self) -> MonitorState {
        tracing::debug!("Checking feed");

        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, cause = %e.cause(), "Feed fetch failed");
                self.report.fetch_failures += 1;
                self.emit(MonitorEvent::FetchFailed {
                    phase: Phase::Polling,
                    cause: e.cause(),
                    error: e.to_string(),
                })
                .await;
                return self.fail_cycle();
            }
        };
        self.report.cycles += 1;

        if !self.cursor.is_established() {
            // Empty feed at startup; the first entries seen become the baseline
            if let Some(newest) = snapshot.newest() {
                self.cursor.advance_to(&newest.id);
                self.emit(MonitorEvent::BaselineEstablished {
                    latest: Some(newest.clone()),
                })
                .await;
            }
            self.consecutive_failures = 0;
            return MonitorState::Idle;
        }

        let novelty = detect_new(&snapshot, &self.cursor);
        if novelty.boundary_lost {
            self.emit(MonitorEvent::BoundaryLost {
                visible: novelty.entries.len(),
            })
            .await;
        }

        let mode = self.settings.delivery_mode();
        let total = novelty.entries.len();
        let mut delivered = 0;
        let mut dropped = 0;

        for (index, entry) in novelty.entries.iter().enumerate() {
            if index > 0 && !self.settings.delivery_spacing.is_zero() {
                if let Wait::Cancelled = self.wait(self.settings.delivery_spacing).await {
                    return MonitorState::Terminated(Termination::Cancelled);
                }
            }

            match self.sink.deliver(entry, mode).await {
                DeliveryOutcome::Delivered => {
                    self.cursor.advance_to(&entry.id);
                    delivered += 1;
                    self.report.delivered += 1;
                    self.emit(MonitorEvent::Delivered(entry.clone())).await;
                }
                DeliveryOutcome::PermanentFailure(e) => {
                    tracing::warn!(id = %entry.id, error = %e, "Dropping entry after permanent failure");
                    self.cursor.advance_to(&entry.id);
                    dropped += 1;
                    self.report.dropped += 1;
                    self.emit(MonitorEvent::Dropped {
                        entry: entry.clone(),
                        error: e.to_string(),
                    })
                    .await;
                }
                DeliveryOutcome::TransientFailure(e) => {
                    let pending = total - index;
                    tracing::warn!(
                        id = %entry.id,
                        pending,
                        error = %e,
                        "Delivery deferred to next cycle"
                    );
                    self.report.deferred += pending;
                    self.emit(MonitorEvent::Deferred {
                        entry: entry.clone(),
                        pending,
                        error: e.to_string(),
                    })
                    .await;
                    return self.fail_cycle();
                }
            }
        }

        if let Some(candidate) = &novelty.candidate {
            self.cursor.advance_to(candidate);
        }
        self.consecutive_failures = 0;
        self.emit(MonitorEvent::CycleComplete { delivered, dropped })
            .await;
        MonitorState::Idle
    }

    fn fail_cycle(&mut self) -> MonitorState {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        MonitorState::Backoff
    }

    async fn terminate(&mut self, termination: Termination) {
        tracing::info!(reason = ?termination, "Monitor stopped");
        self.state = MonitorState::Terminated(termination);
        self.report.termination = Some(termination);
        self.emit(MonitorEvent::Terminated(termination)).await;
    }

    async fn emit(&self, event: MonitorEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.send(event).await {
                tracing::debug!(error = %e, "Event receiver dropped");
            }
        }
    }

    /// Sleeps for `delay` unless shutdown is requested first.
    async fn wait(&mut self, delay: Duration) -> Wait {
        let deadline = Instant::now() + delay;
        loop {
            if *self.shutdown.borrow_and_update() {
                return Wait::Cancelled;
            }
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can cancel any more
                        tokio::time::sleep_until(deadline).await;
                        return Wait::Elapsed;
                    }
                }

                _ = tokio::time::sleep_until(deadline) => return Wait::Elapsed,
            }
        }
    }
}
