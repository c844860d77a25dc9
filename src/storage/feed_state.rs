use std::path::{Path, PathBuf};

use super::{FeedState, StorageError};
use crate::util::write_atomic;

/// Durable store for one channel's [`FeedState`].
///
/// The state is kept as pretty-printed JSON and fully rewritten after every
/// appended episode.
#[derive(Debug, Clone)]
pub struct FeedStateStore {
    path: PathBuf,
}

impl FeedStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored state; `Ok(None)` when none has been written yet.
    pub fn load(&self) -> Result<Option<FeedState>, StorageError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No feed state found");
                return Ok(None);
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    pub fn save(&self, state: &FeedState) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(state).map_err(StorageError::Encode)?;
        write_atomic(&self.path, &content).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Episode, Media};
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;

    fn episode(n: u32) -> Episode {
        let offset = FixedOffset::east_opt(3600).unwrap();
        Episode {
            title: format!("Episode {n}"),
            summary: if n % 2 == 0 { String::new() } else { format!("Summary {n}") },
            media: Media {
                url: format!("https://cdn.example/{n}.m4a"),
                size: 1000 + u64::from(n),
                mime_type: "audio/mp4".into(),
            },
            published: offset.with_ymd_and_hms(2024, 3, n, 18, 0, 0).unwrap(),
            thumbnail: Some(format!("https://img.example/{n}.jpg")),
            source_url: format!("https://tv.example/ep/{n}"),
            duration_secs: (n % 2 == 1).then_some(1800),
        }
    }

    #[test]
    fn test_missing_state_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedStateStore::new(dir.path().join("show.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_round_trip_preserves_episodes_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedStateStore::new(dir.path().join("show.json"));

        let mut state = FeedState::new(
            "Show",
            "https://tv.example/show",
            "A show",
            "https://img.example/cover.png",
            false,
        );
        for n in [3, 1, 2] {
            state.push_episode(episode(n));
        }

        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, state);
        let titles: Vec<_> = loaded.episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Episode 3", "Episode 1", "Episode 2"]);
    }

    #[test]
    fn test_published_offset_survives_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedStateStore::new(dir.path().join("show.json"));

        let mut state = FeedState::new("Show", "", "", "", false);
        state.push_episode(episode(1));
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.episodes[0].published.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.json");
        std::fs::write(&path, b"\x80\x04pickle").unwrap();

        let result = FeedStateStore::new(&path).load();
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }
}
