//! Per-channel persistent state: the archive of processed items and the
//! accumulated feed record.

mod archive;
mod feed_state;
mod types;

use std::path::{Path, PathBuf};

pub use archive::Archive;
pub use feed_state::FeedStateStore;
pub use types::{Episode, FeedState, Media, StorageError};

/// Filesystem locations owned by one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPaths {
    /// `<persistent_dir>/<fname>.txt`
    pub archive: PathBuf,
    /// `<persistent_dir>/<fname>.json`
    pub state: PathBuf,
    /// `<output_dir>/<fname>.rss`
    pub feed: PathBuf,
}

impl ChannelPaths {
    pub fn new(persistent_dir: &Path, output_dir: &Path, fname: &str) -> Self {
        Self {
            archive: persistent_dir.join(format!("{fname}.txt")),
            state: persistent_dir.join(format!("{fname}.json")),
            feed: output_dir.join(format!("{fname}.rss")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_paths_layout() {
        let paths = ChannelPaths::new(Path::new("/persistent"), Path::new("/data"), "dagsrevyen");
        assert_eq!(paths.archive, PathBuf::from("/persistent/dagsrevyen.txt"));
        assert_eq!(paths.state, PathBuf::from("/persistent/dagsrevyen.json"));
        assert_eq!(paths.feed, PathBuf::from("/data/dagsrevyen.rss"));
    }
}
