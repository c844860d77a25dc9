use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use thiserror::Error;

use crate::storage::{Episode, Media};
use crate::upstream::{ExtractError, Extractor, ItemInfo};

const UNTITLED_EPISODE: &str = "Untitled episode";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Why a single item could not be turned into an episode.
///
/// Always item-scoped: the caller logs it, leaves the item out of the
/// archive, and moves on to the next entry.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Failed to resolve item: {0}")]
    Extract(#[from] ExtractError),

    #[error("Resolved item has no media URL")]
    MissingMediaUrl,

    #[error("Resolved item has no timestamp or upload date")]
    MissingTimestamp,

    /// Network-level error while probing the media URL.
    #[error("Media probe failed: {0}")]
    Probe(#[from] reqwest::Error),

    #[error("Media probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    #[error("Media probe returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("Media probe response has no usable Content-Length")]
    MissingContentLength,
}

/// Builds [`Episode`]s from upstream item URLs.
pub struct EpisodeMaterializer {
    extractor: Arc<dyn Extractor>,
    client: reqwest::Client,
    timezone: Tz,
    probe_timeout: Duration,
}

impl EpisodeMaterializer {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        client: reqwest::Client,
        timezone: Tz,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            client,
            timezone,
            probe_timeout,
        }
    }

    /// Resolves `item_url` and probes its media.
    ///
    /// Performs one extractor resolution and one HEAD request. Never touches
    /// the filesystem.
    pub async fn materialize(&self, item_url: &str) -> Result<Episode, ResolutionError> {
        let info = self.extractor.resolve(item_url).await?;

        let media_url = info
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or(ResolutionError::MissingMediaUrl)?;
        let published =
            publication_date(&info, &self.timezone).ok_or(ResolutionError::MissingTimestamp)?;

        let (size, content_type) = self.probe(&media_url).await?;
        let mime_type = content_type
            .filter(|t| is_media_type(t))
            .unwrap_or_else(|| guess_mime_type(&media_url).to_string());

        Ok(Episode {
            title: info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_EPISODE.to_string()),
            summary: info.description.unwrap_or_default(),
            media: Media {
                url: media_url,
                size,
                mime_type,
            },
            published,
            thumbnail: info.thumbnail.filter(|t| !t.is_empty()),
            source_url: item_url.to_string(),
            duration_secs: info
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.round() as u64),
        })
    }

    /// HEAD request to read the declared size and type without the body.
    async fn probe(&self, media_url: &str) -> Result<(u64, Option<String>), ResolutionError> {
        let response = tokio::time::timeout(self.probe_timeout, self.client.head(media_url).send())
            .await
            .map_err(|_| ResolutionError::ProbeTimeout(self.probe_timeout))??;

        if !response.status().is_success() {
            return Err(ResolutionError::HttpStatus(response.status().as_u16()));
        }

        // Read the header directly: for HEAD responses the body is empty, so
        // the body-derived length would always be zero.
        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or(ResolutionError::MissingContentLength)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

        Ok((size, content_type))
    }
}

/// Publication date of an item in `tz`.
///
/// Prefers the precise Unix timestamp and falls back to midnight of the
/// `YYYYMMDD` upload date.
fn publication_date(info: &ItemInfo, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    if let Some(ts) = info.timestamp.filter(|t| t.is_finite()) {
        let utc = Utc.timestamp_opt(ts.trunc() as i64, 0).single()?;
        return Some(utc.with_timezone(tz).fixed_offset());
    }

    let date = NaiveDate::parse_from_str(info.upload_date.as_deref()?, "%Y%m%d").ok()?;
    let local = tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).earliest()?;
    Some(local.fixed_offset())
}

fn is_media_type(content_type: &str) -> bool {
    content_type.starts_with("audio/") || content_type.starts_with("video/")
}

/// Media type from the URL's file extension.
fn guess_mime_type(url: &str) -> &'static str {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    match extension {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => FALLBACK_MIME_TYPE,
    }
}
