use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::{ExtractError, Extractor, ItemInfo, Listing};
use crate::config::ExtractorSettings;

/// [`Extractor`] backed by the `yt-dlp` command-line tool.
///
/// Listings use `--flat-playlist` so that no per-item pages are fetched;
/// resolution asks for a single-file format so the info carries one direct
/// media URL.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    args: Vec<String>,
    format: String,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(settings: &ExtractorSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            args: settings.args.clone(),
            format: settings.format.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, ExtractError> {
        let mut command = Command::new(&self.binary);
        command
            .args(&self.args)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(binary = %self.binary, args = ?args, "Running extractor");

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ExtractError::Timeout(self.timeout))?
            .map_err(ExtractError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Failed {
                status: output.status.to_string(),
                message: last_line(&stderr).to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn list(&self, channel_url: &str) -> Result<Listing, ExtractError> {
        self.run_json(&["--dump-single-json", "--flat-playlist", "--", channel_url])
            .await
    }

    async fn resolve(&self, item_url: &str) -> Result<ItemInfo, ExtractError> {
        self.run_json(&[
            "--dump-single-json",
            "--no-playlist",
            "-f",
            self.format.as_str(),
            "--",
            item_url,
        ])
        .await
    }
}

/// Last non-empty line of the tool's stderr, which holds the `ERROR:` summary.
fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no error output")
}
