//! Shared fixtures: a scripted extractor and a media server answering HEAD.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use channelcast::channel::{ChannelUpdater, ScheduleFilter};
use channelcast::config::{ChannelConfig, Settings};
use channelcast::storage::{Archive, ChannelPaths, FeedState, FeedStateStore};
use channelcast::upstream::{ExtractError, Extractor, ItemInfo, Listing, ListingEntry};

/// Size every mock media file reports.
pub const MEDIA_SIZE: usize = 4096;

/// 2024-06-03T12:00:00Z
pub const BASE_TIMESTAMP: f64 = 1_717_416_000.0;

/// Extractor answering from in-memory tables.
///
/// Listings and items can be changed between updates. Unknown item URLs fail
/// to resolve; a listing URL of `panic://` panics.
#[derive(Default)]
pub struct ScriptedExtractor {
    listings: Mutex<HashMap<String, Result<Listing, String>>>,
    items: Mutex<HashMap<String, ItemInfo>>,
    listed: Mutex<Vec<String>>,
    resolved: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn set_listing(&self, channel_url: &str, entries: Vec<ListingEntry>) {
        self.listings.lock().unwrap().insert(
            channel_url.to_string(),
            Ok(Listing {
                title: None,
                entries,
            }),
        );
    }

    pub fn fail_listing(&self, channel_url: &str, message: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(channel_url.to_string(), Err(message.to_string()));
    }

    pub fn set_item(&self, item_url: &str, info: ItemInfo) {
        self.items
            .lock()
            .unwrap()
            .insert(item_url.to_string(), info);
    }

    pub fn remove_item(&self, item_url: &str) {
        self.items.lock().unwrap().remove(item_url);
    }

    pub fn list_count(&self, channel_url: &str) -> usize {
        self.listed
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == channel_url)
            .count()
    }

    /// Item URLs passed to `resolve`, in call order.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn resolve_count(&self, item_url: &str) -> usize {
        self.resolved
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == item_url)
            .count()
    }
}

fn failure(message: &str) -> ExtractError {
    ExtractError::Failed {
        status: "exit status: 1".to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn list(&self, channel_url: &str) -> Result<Listing, ExtractError> {
        if channel_url.starts_with("panic://") {
            panic!("scripted extractor asked to panic");
        }
        self.listed.lock().unwrap().push(channel_url.to_string());
        let listings = self.listings.lock().unwrap();
        match listings.get(channel_url) {
            Some(Ok(listing)) => Ok(listing.clone()),
            Some(Err(message)) => Err(failure(message)),
            None => Err(failure("Unsupported URL")),
        }
    }

    async fn resolve(&self, item_url: &str) -> Result<ItemInfo, ExtractError> {
        self.resolved.lock().unwrap().push(item_url.to_string());
        self.items
            .lock()
            .unwrap()
            .get(item_url)
            .cloned()
            .ok_or_else(|| failure("Video unavailable"))
    }
}

/// Temp directories, a mock media server and an extractor wired together.
pub struct Harness {
    pub dir: TempDir,
    pub server: MockServer,
    pub extractor: Arc<ScriptedExtractor>,
    pub settings: Settings,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path_regex(r"^/media/.+"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(vec![0u8; MEDIA_SIZE], "audio/mp4")
                    .insert_header("content-length", MEDIA_SIZE.to_string().as_str()),
            )
            .mount(&server)
            .await;

        let mut settings = Settings::default();
        settings.paths.output_dir = dir.path().join("data");
        settings.paths.persistent_dir = dir.path().join("persistent");
        settings.podcasts.timezone = chrono_tz::Tz::UTC;
        settings.probe.timeout_secs = 5;

        Self {
            dir,
            server,
            extractor: Arc::new(ScriptedExtractor::default()),
            settings,
        }
    }

    pub fn updater(&self) -> ChannelUpdater {
        ChannelUpdater::new(
            &self.settings,
            self.extractor.clone(),
            reqwest::Client::new(),
        )
    }

    pub fn paths(&self, channel: &ChannelConfig) -> ChannelPaths {
        ChannelPaths::new(
            &self.settings.paths.persistent_dir,
            &self.settings.paths.output_dir,
            &channel.fname,
        )
    }

    /// Registers a resolvable item `id` published `offset_hours` after
    /// [`BASE_TIMESTAMP`], and returns its listing entry.
    pub fn item(&self, id: &str, offset_hours: i64) -> ListingEntry {
        let entry = episode_entry(id);
        self.extractor.set_item(
            entry.url.as_deref().unwrap(),
            ItemInfo {
                title: Some(format!("Episode {id}")),
                description: Some(format!("About {id}")),
                thumbnail: Some(format!("https://img.example/{id}.jpg")),
                timestamp: Some(BASE_TIMESTAMP + (offset_hours * 3600) as f64),
                upload_date: None,
                url: Some(format!("{}/media/{id}.m4a", self.server.uri())),
                duration: Some(1800.0),
            },
        );
        entry
    }

    pub fn load_state(&self, channel: &ChannelConfig) -> Option<FeedState> {
        FeedStateStore::new(self.paths(channel).state).load().unwrap()
    }

    pub fn load_archive(&self, channel: &ChannelConfig) -> Archive {
        Archive::load(self.paths(channel).archive).unwrap()
    }
}

pub fn channel(fname: &str) -> ChannelConfig {
    ChannelConfig {
        fname: fname.to_string(),
        title: format!("{fname} podcast"),
        description: format!("Episodes of {fname}"),
        url: format!("https://tv.example/channel/{fname}"),
        image: format!("https://img.example/{fname}.png"),
        explicit: false,
        schedule: ScheduleFilter::default(),
        episode_cap: 10,
    }
}

/// Listing entry for a video item.
pub fn episode_entry(id: &str) -> ListingEntry {
    ListingEntry {
        id: Some(id.to_string()),
        url: Some(item_url(id)),
        title: Some(format!("Episode {id}")),
    }
}

/// Listing entry for a season or tab; carries no item id.
pub fn grouping_entry(name: &str) -> ListingEntry {
    ListingEntry {
        id: None,
        url: Some(format!("https://tv.example/season/{name}")),
        title: Some(name.to_string()),
    }
}

pub fn item_url(id: &str) -> String {
    format!("https://tv.example/video/{id}")
}

pub fn titles(state: &FeedState) -> Vec<&str> {
    state.episodes.iter().map(|e| e.title.as_str()).collect()
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
