//! Upstream video listing and media extraction.
//!
//! The rest of the crate only talks to the [`Extractor`] trait. The shipped
//! implementation, [`YtDlp`], drives the `yt-dlp` executable; tests substitute
//! scripted extractors.

mod ytdlp;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use ytdlp::YtDlp;

/// Errors reported by an [`Extractor`].
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extractor process could not be started.
    #[error("Failed to start extractor: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Extractor timed out after {0:?}")]
    Timeout(Duration),

    /// The extractor ran but reported a failure (removed video, geo block, ...).
    #[error("Extractor failed ({status}): {message}")]
    Failed { status: String, message: String },

    #[error("Failed to decode extractor output: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Shallow listing of a channel, without per-item media resolution.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub title: Option<String>,
    /// Entries in upstream order. Grouping entries (seasons, tabs) are mixed
    /// in with episodes.
    #[serde(default)]
    pub entries: Vec<ListingEntry>,
}

/// One entry of a [`Listing`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListingEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ListingEntry {
    /// Only episodes carry an item identifier; grouping entries do not.
    pub fn is_episode(&self) -> bool {
        self.id.is_some()
    }
}

/// Fully resolved metadata for a single item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Unix timestamp of publication.
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// `YYYYMMDD`, present on some sites that lack a precise timestamp.
    #[serde(default)]
    pub upload_date: Option<String>,
    /// Direct streamable media URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Source of channel listings and item metadata.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Lists the items of a channel without resolving their media.
    async fn list(&self, channel_url: &str) -> Result<Listing, ExtractError>;

    /// Resolves the full metadata and media URL of one item.
    async fn resolve(&self, item_url: &str) -> Result<ItemInfo, ExtractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_entries_are_not_episodes() {
        let listing: Listing = serde_json::from_str(
            r#"{
                "title": "Dagsrevyen",
                "entries": [
                    {"id": "a1", "url": "https://tv.example/a1", "title": "A"},
                    {"url": "https://tv.example/season/2", "title": "Season 2"},
                    {"id": "b2", "url": "https://tv.example/b2"}
                ]
            }"#,
        )
        .unwrap();

        let episodes: Vec<_> = listing
            .entries
            .iter()
            .filter(|e| e.is_episode())
            .map(|e| e.id.as_deref().unwrap())
            .collect();
        assert_eq!(episodes, vec!["a1", "b2"]);
    }

    #[test]
    fn test_listing_without_entries_is_empty() {
        let listing: Listing = serde_json::from_str(r#"{"title": "Nothing"}"#).unwrap();
        assert!(listing.entries.is_empty());
    }

    #[test]
    fn test_item_info_ignores_unknown_fields() {
        let info: ItemInfo = serde_json::from_str(
            r#"{"title": "T", "timestamp": 1717437600, "formats": [], "duration": 1799.5}"#,
        )
        .unwrap();
        assert_eq!(info.timestamp, Some(1717437600.0));
        assert_eq!(info.duration, Some(1799.5));
        assert!(info.url.is_none());
    }
}
