//! Podcast feed publishing.
//!
//! The published RSS file is a pure projection of a channel's
//! [`FeedState`](crate::storage::FeedState): it is regenerated from the state
//! after every change and never parsed back.

mod rss;

pub use rss::{render, write_feed, RssError};
