//! feedrelay: watch one RSS/Atom feed and relay each new entry to a webhook.
//!
//! The first fetch establishes a baseline without sending anything. Later
//! polls deliver entries that appeared above the last delivered one, oldest
//! first, retrying transient delivery failures on the next cycle.

pub mod config;
pub mod delivery;
pub mod feed;
pub mod monitor;
pub mod output;
pub mod util;
