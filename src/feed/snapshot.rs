use std::collections::HashSet;

/// One item from the monitored feed.
///
/// `id` is the entry's canonical link where the feed supplies one; it must be
/// stable for a given post across polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    /// Position in the feed's native (newest-first) ordering, 0 = newest.
    pub published_order: usize,
}

impl FeedEntry {
    /// Link shown to readers, falling back to the id when the feed has none.
    pub fn display_link(&self) -> &str {
        self.link.as_deref().unwrap_or(&self.id)
    }
}

/// Point-in-time read of the feed, newest entry first.
///
/// Ids are unique within a snapshot. Newest-first ordering is a precondition
/// inherited from the feed itself and is not re-sorted here: feeds without
/// reliable dates would be reordered incorrectly, and novelty detection only
/// needs the feed's own order to be consistent between polls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    entries: Vec<FeedEntry>,
}

impl FeedSnapshot {
    /// Builds a snapshot from entries in feed order.
    ///
    /// Duplicate ids keep their first (newest) occurrence. `published_order`
    /// is renumbered to match the resulting positions.
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut kept = Vec::with_capacity(entries.len());

        for entry in entries {
            if !seen.insert(entry.id.clone()) {
                tracing::debug!(id = %entry.id, "Dropping duplicate entry id from snapshot");
                continue;
            }
            kept.push(entry);
        }

        for (position, entry) in kept.iter_mut().enumerate() {
            entry.published_order = position;
        }

        Self { entries: kept }
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn newest(&self) -> Option<&FeedEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
