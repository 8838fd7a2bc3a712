//! Feed snapshots: the data model plus the adapter from RSS/Atom over HTTP.
//!
//! - [`snapshot`] - `FeedEntry` and the newest-first `FeedSnapshot`
//! - [`parser`] - Document parsing using the `feed-rs` crate
//! - [`fetcher`] - HTTP retrieval with timeout and size limits, no retries
//!
//! # Example
//!
//! ```ignore
//! use feedrelay::feed::{FeedSource, HttpFeedSource};
//!
//! let source = HttpFeedSource::new(reqwest::Client::new(), "https://example.com/rss.xml");
//! let snapshot = source.fetch().await?;
//! ```

mod fetcher;
mod parser;
mod snapshot;

pub use fetcher::{
    fetch_snapshot, FeedSource, FetchCause, FetchError, HttpFeedSource, DEFAULT_REQUEST_TIMEOUT,
};
pub use parser::parse_snapshot;
pub use snapshot::{FeedEntry, FeedSnapshot};
