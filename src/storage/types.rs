use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the archive and feed state stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but does not hold a valid feed state record.
    #[error("Corrupt feed state in {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode feed state: {0}")]
    Encode(#[source] serde_json::Error),

    /// Archive entries are stored one per line.
    #[error("Archive entry contains a line break: {0:?}")]
    InvalidEntry(String),
}

// ============================================================================
// Feed State
// ============================================================================

/// The downloadable media attached to an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    /// Size in bytes as declared by the media server.
    pub size: u64,
    pub mime_type: String,
}

/// A podcast episode materialized from one upstream item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    /// May be empty when the upstream item has no description.
    pub summary: String,
    pub media: Media,
    pub published: DateTime<FixedOffset>,
    pub thumbnail: Option<String>,
    /// Upstream item URL this episode was built from; doubles as the RSS guid.
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
}

/// Accumulated feed document for one channel.
///
/// This record is the source of truth for a channel's feed. The published RSS
/// file is always rendered from it and never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedState {
    pub title: String,
    pub website: String,
    pub description: String,
    pub explicit: bool,
    pub image: String,
    /// Episodes in discovery order.
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl FeedState {
    pub fn new(
        title: impl Into<String>,
        website: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
        explicit: bool,
    ) -> Self {
        Self {
            title: title.into(),
            website: website.into(),
            description: description.into(),
            explicit,
            image: image.into(),
            episodes: Vec::new(),
        }
    }

    pub fn push_episode(&mut self, episode: Episode) {
        self.episodes.push(episode);
    }

    /// Upstream item URLs of every episode in the feed.
    pub fn source_urls(&self) -> impl Iterator<Item = &str> {
        self.episodes.iter().map(|e| e.source_url.as_str())
    }
}
