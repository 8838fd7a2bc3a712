//! Cursor tracking and novelty detection.
//!
//! The cursor is the id of the most recently delivered entry. Detection scans
//! a newest-first snapshot down to that id and hands back everything above it,
//! oldest first.
//!
//! Dedup is by id only. If more entries arrive between polls than the feed
//! retains, the cursor scrolls out of the window and every visible entry is
//! treated as new; some of those may already have been delivered.

use crate::feed::{FeedEntry, FeedSnapshot};

/// Boundary between delivered and not-yet-seen entries.
///
/// `None` until a baseline is established. Owned by a single monitor; never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    last_delivered_id: Option<String>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(id: impl Into<String>) -> Self {
        Self {
            last_delivered_id: Some(id.into()),
        }
    }

    pub fn last_delivered_id(&self) -> Option<&str> {
        self.last_delivered_id.as_deref()
    }

    pub fn is_established(&self) -> bool {
        self.last_delivered_id.is_some()
    }

    /// Moves the cursor to `id`.
    ///
    /// Callers only pass ids of entries observed more recently than the
    /// current position, so this never regresses.
    pub fn advance_to(&mut self, id: &str) {
        if self.last_delivered_id.as_deref() != Some(id) {
            self.last_delivered_id = Some(id.to_string());
        }
    }
}

/// Result of comparing a snapshot against the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Novelty {
    /// New entries, oldest first.
    pub entries: Vec<FeedEntry>,
    /// Snapshot head, to commit once every new entry is delivered or skipped.
    pub candidate: Option<String>,
    /// True when the cursor id was not found in the snapshot.
    pub boundary_lost: bool,
}

/// Computes the entries of `snapshot` that are new relative to `cursor`.
///
/// With no baseline, nothing is new and the candidate is the snapshot's newest
/// id. An empty snapshot yields no candidate.
pub fn detect_new(snapshot: &FeedSnapshot, cursor: &Cursor) -> Novelty {
    let candidate = snapshot.newest().map(|e| e.id.clone());

    let Some(last_id) = cursor.last_delivered_id() else {
        return Novelty {
            entries: Vec::new(),
            candidate,
            boundary_lost: false,
        };
    };

    let mut fresh = Vec::new();
    let mut found = false;
    for entry in snapshot.entries() {
        if entry.id == last_id {
            found = true;
            break;
        }
        fresh.push(entry.clone());
    }

    if !found && !fresh.is_empty() {
        tracing::warn!(
            cursor = %last_id,
            visible = fresh.len(),
            "Cursor entry not in feed window; treating all visible entries as new"
        );
    }

    fresh.reverse();

    Novelty {
        entries: fresh,
        candidate,
        boundary_lost: !found && !snapshot.is_empty(),
    }
}
