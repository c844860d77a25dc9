use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::StorageError;

/// Append-only record of upstream item URLs already turned into episodes.
///
/// Persisted as a plain text file with one URL per line. Entries are never
/// removed, and appending a URL that is already present is a no-op, so the
/// file never holds duplicates.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    entries: HashSet<String>,
    /// The file ends in a partial line (interrupted append).
    needs_newline: bool,
}

impl Archive {
    /// Loads the archive at `path`.
    ///
    /// A missing file is an empty archive; the file is created on the first
    /// append.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No archive file found");
                String::new()
            }
            Err(source) => return Err(StorageError::Read { path, source }),
        };

        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        let needs_newline = !content.is_empty() && !content.ends_with('\n');

        Ok(Self {
            path,
            entries,
            needs_newline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains(url.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `url` as processed.
    ///
    /// Returns `Ok(false)` without touching the file when the URL is already
    /// archived. The line is synced to disk before returning.
    pub fn append(&mut self, url: &str) -> Result<bool, StorageError> {
        let url = url.trim();
        if url.contains(['\n', '\r']) {
            return Err(StorageError::InvalidEntry(url.to_string()));
        }
        if self.entries.contains(url) {
            return Ok(false);
        }

        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let mut line = String::with_capacity(url.len() + 2);
        if self.needs_newline {
            line.push('\n');
        }
        line.push_str(url);
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        file.write_all(line.as_bytes()).map_err(write_err)?;
        file.sync_data().map_err(write_err)?;

        self.needs_newline = false;
        self.entries.insert(url.to_string());
        Ok(true)
    }
}
