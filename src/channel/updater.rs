use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use super::{EpisodeMaterializer, FilterSkip};
use crate::config::{ChannelConfig, Settings};
use crate::feed::{self, RssError};
use crate::storage::{Archive, ChannelPaths, FeedState, FeedStateStore, StorageError};
use crate::upstream::{ExtractError, Extractor};

/// Channel-level failures. Each aborts the channel's update for the current
/// cycle only.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The upstream listing could not be fetched or decoded.
    #[error("Failed to list channel: {0}")]
    Listing(#[source] ExtractError),

    /// Archive or feed state could not be read or written.
    #[error("Failed to persist channel state: {0}")]
    Persistence(#[from] StorageError),

    /// The RSS file could not be rendered or written.
    #[error("Failed to publish feed: {0}")]
    Publish(#[from] RssError),
}

/// Counters for one channel update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Episode-like listing entries looked at, archived ones included.
    pub examined: usize,
    pub added: usize,
    /// Entries whose resolution or probe failed; retried next cycle.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Schedule filters excluded this cycle; nothing was read or written.
    Skipped(FilterSkip),
    Updated(UpdateStats),
}

/// Brings one channel's feed up to date with its upstream listing.
///
/// Updates of different channels may run concurrently; two updates of the
/// same channel must not.
pub struct ChannelUpdater {
    extractor: Arc<dyn Extractor>,
    materializer: EpisodeMaterializer,
    persistent_dir: PathBuf,
    output_dir: PathBuf,
    timezone: Tz,
}

impl ChannelUpdater {
    pub fn new(settings: &Settings, extractor: Arc<dyn Extractor>, client: reqwest::Client) -> Self {
        let timezone = settings.podcasts.timezone;
        let materializer = EpisodeMaterializer::new(
            Arc::clone(&extractor),
            client,
            timezone,
            Duration::from_secs(settings.probe.timeout_secs),
        );

        Self {
            extractor,
            materializer,
            persistent_dir: settings.paths.persistent_dir.clone(),
            output_dir: settings.paths.output_dir.clone(),
            timezone,
        }
    }

    pub fn paths(&self, channel: &ChannelConfig) -> ChannelPaths {
        ChannelPaths::new(&self.persistent_dir, &self.output_dir, &channel.fname)
    }

    /// Updates `channel` using the current time for schedule filters.
    pub async fn update(&self, channel: &ChannelConfig) -> Result<UpdateOutcome, UpdateError> {
        let now = Utc::now().with_timezone(&self.timezone);
        self.update_at(channel, now).await
    }

    /// Updates `channel` as if the current time were `now`.
    ///
    /// Listing entries are visited in upstream order. Every new episode is
    /// persisted before the next entry is looked at, in the order feed state,
    /// RSS file, archive.
    pub async fn update_at(
        &self,
        channel: &ChannelConfig,
        now: DateTime<Tz>,
    ) -> Result<UpdateOutcome, UpdateError> {
        if let Some(reason) = channel.schedule.skip_reason(&now) {
            tracing::info!(channel = %channel.fname, %reason, "Skipping channel due to schedule filter");
            return Ok(UpdateOutcome::Skipped(reason));
        }

        let listing = self
            .extractor
            .list(&channel.url)
            .await
            .map_err(UpdateError::Listing)?;

        let paths = self.paths(channel);
        let mut archive = Archive::load(&paths.archive)?;
        let store = FeedStateStore::new(&paths.state);

        let (mut state, state_existed) = match store.load()? {
            Some(state) => (state, true),
            None => {
                tracing::info!(channel = %channel.fname, "No existing feed state, starting a new feed");
                (seed_state(channel), false)
            }
        };
        let metadata_changed = state_existed && apply_metadata(&mut state, channel);

        let reconciled = reconcile_archive(&mut archive, &state, &channel.fname)?;

        let mut stats = UpdateStats::default();
        for entry in listing.entries.iter().filter(|e| e.is_episode()) {
            stats.examined += 1;

            match entry.url.as_deref() {
                None => {
                    tracing::warn!(
                        channel = %channel.fname,
                        id = ?entry.id,
                        "Listing entry has no URL, skipping"
                    );
                }
                Some(url) if archive.contains(url) => {
                    tracing::debug!(channel = %channel.fname, url = %url, "Already archived, skipping");
                }
                Some(url) => match self.materializer.materialize(url).await {
                    Ok(episode) => {
                        let title = episode.title.clone();
                        state.push_episode(episode);
                        store.save(&state)?;
                        feed::write_feed(&state, &paths.feed)?;
                        archive.append(url)?;
                        stats.added += 1;
                        tracing::info!(channel = %channel.fname, url = %url, title = %title, "Added episode");
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::error!(channel = %channel.fname, url = %url, error = %e, "Failed to materialize episode");
                    }
                },
            }

            if stats.examined >= channel.episode_cap {
                tracing::debug!(
                    channel = %channel.fname,
                    cap = channel.episode_cap,
                    "Reached episode cap"
                );
                break;
            }
        }

        if stats.added == 0 && state_existed {
            if metadata_changed {
                store.save(&state)?;
                feed::write_feed(&state, &paths.feed)?;
                tracing::info!(channel = %channel.fname, "Channel metadata changed, feed regenerated");
            } else if reconciled || !paths.feed.exists() {
                // A reconciled episode may never have reached the published feed.
                feed::write_feed(&state, &paths.feed)?;
                tracing::info!(channel = %channel.fname, reconciled, "Feed regenerated from state");
            }
        }

        tracing::info!(
            channel = %channel.fname,
            examined = stats.examined,
            added = stats.added,
            failed = stats.failed,
            "Channel updated"
        );
        Ok(UpdateOutcome::Updated(stats))
    }
}

fn seed_state(channel: &ChannelConfig) -> FeedState {
    FeedState::new(
        &channel.title,
        &channel.url,
        &channel.description,
        &channel.image,
        channel.explicit,
    )
}

/// Copies channel-level metadata from the configuration into `state`.
/// Returns whether anything changed.
fn apply_metadata(state: &mut FeedState, channel: &ChannelConfig) -> bool {
    let seeded = seed_state(channel);
    let changed = state.title != seeded.title
        || state.website != seeded.website
        || state.description != seeded.description
        || state.image != seeded.image
        || state.explicit != seeded.explicit;

    if changed {
        state.title = seeded.title;
        state.website = seeded.website;
        state.description = seeded.description;
        state.image = seeded.image;
        state.explicit = seeded.explicit;
    }
    changed
}

/// Archives episodes that reached the feed state but not the archive.
///
/// That happens when the process stops, or the feed write fails, between the
/// state write and the archive append. Without this the item would be added
/// to the feed twice. Returns whether anything was archived.
fn reconcile_archive(
    archive: &mut Archive,
    state: &FeedState,
    fname: &str,
) -> Result<bool, StorageError> {
    let mut reconciled = false;
    for url in state.source_urls() {
        if archive.append(url)? {
            tracing::warn!(channel = %fname, url = %url, "Episode missing from archive, archived it");
            reconciled = true;
        }
    }
    Ok(reconciled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScheduleFilter;

    fn channel() -> ChannelConfig {
        ChannelConfig {
            fname: "show".into(),
            title: "Show".into(),
            description: "About the show".into(),
            url: "https://tv.example/show".into(),
            image: "https://img.example/show.png".into(),
            explicit: false,
            schedule: ScheduleFilter::default(),
            episode_cap: 10,
        }
    }

    #[test]
    fn test_seed_state_uses_channel_metadata() {
        let state = seed_state(&channel());
        assert_eq!(state.title, "Show");
        assert_eq!(state.website, "https://tv.example/show");
        assert_eq!(state.description, "About the show");
        assert_eq!(state.image, "https://img.example/show.png");
        assert!(!state.explicit);
        assert!(state.episodes.is_empty());
    }

    #[test]
    fn test_apply_metadata_reports_changes() {
        let mut state = seed_state(&channel());
        assert!(!apply_metadata(&mut state, &channel()));

        let mut renamed = channel();
        renamed.title = "Renamed".into();
        assert!(apply_metadata(&mut state, &renamed));
        assert_eq!(state.title, "Renamed");
    }

    #[test]
    fn test_reconcile_reports_only_new_archive_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = Archive::load(dir.path().join("show.txt")).unwrap();

        let mut state = seed_state(&channel());
        state.push_episode(crate::storage::Episode {
            title: "A".into(),
            summary: String::new(),
            media: crate::storage::Media {
                url: "https://cdn.example/a.m4a".into(),
                size: 10,
                mime_type: "audio/mp4".into(),
            },
            published: chrono::DateTime::parse_from_rfc3339("2024-06-03T12:00:00+02:00").unwrap(),
            thumbnail: None,
            source_url: "https://tv.example/a".into(),
            duration_secs: None,
        });

        assert!(reconcile_archive(&mut archive, &state, "show").unwrap());
        assert!(archive.contains("https://tv.example/a"));
        assert!(!reconcile_archive(&mut archive, &state, "show").unwrap());
    }
}
