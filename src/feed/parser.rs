use crate::feed::snapshot::{FeedEntry, FeedSnapshot};
use anyhow::Result;
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// Parses an RSS/Atom document into a newest-first snapshot.
///
/// Entries keep the document's order. Each entry's id is its first link,
/// falling back to the feed-supplied id and finally to a content hash.
pub fn parse_snapshot(bytes: &[u8]) -> Result<FeedSnapshot> {
    let feed = parser::parse(bytes)?;

    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty());
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let id = entry_id(link.as_deref(), &entry.id, &title, published);

            FeedEntry {
                id,
                title,
                link,
                published_order: position,
            }
        })
        .collect();

    Ok(FeedSnapshot::new(entries))
}

fn entry_id(link: Option<&str>, feed_id: &str, title: &str, published: Option<i64>) -> String {
    if let Some(link) = link {
        return link.to_string();
    }

    let trimmed = feed_id.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    let input = format!(
        "{}|{}",
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
