//! Startup configuration.
//!
//! Two files live in the configuration directory:
//!
//! - `config.toml`: global settings. Optional; a missing or empty file yields
//!   `Settings::default()`. Unknown keys are ignored with a warning.
//! - `channels.json`: the channel list. Required; a missing file is fatal.
//!
//! Both are loaded once at startup into immutable values that are shared with
//! every worker.
use chrono::Weekday;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::channel::ScheduleFilter;
use crate::util::{slugify, validate_url};

pub const SETTINGS_FILE: &str = "config.toml";
pub const CHANNELS_FILE: &str = "channels.json";

pub const DEFAULT_PODCAST_TITLE: &str = "Untitled Podcast";
pub const DEFAULT_EPISODE_COUNT: usize = 10;

/// Maximum size accepted for either configuration file (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];
/// A weekday name matches when it is a prefix of at least three letters.
const WEEKDAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid JSON in channel list: {0}")]
    ChannelsParse(#[from] serde_json::Error),

    #[error("Channel list not found at {}", .0.display())]
    MissingChannels(PathBuf),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid channel {channel}: {reason}")]
    InvalidChannel { channel: String, reason: String },
}

// ============================================================================
// Settings (config.toml)
// ============================================================================

/// Global settings from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub updates: UpdateSettings,
    pub podcasts: PodcastSettings,
    pub paths: PathSettings,
    pub extractor: ExtractorSettings,
    pub probe: ProbeSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Target length of one refresh cycle, in seconds.
    pub frequency_sec: u64,
    /// Channels updated concurrently within a cycle.
    pub max_concurrent_channels: usize,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            frequency_sec: 3600,
            max_concurrent_channels: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodcastSettings {
    /// Default episode cap for channels without their own `ep_count`.
    pub ep_count: usize,
    /// Timezone for publication dates and schedule filters.
    pub timezone: Tz,
}

impl Default for PodcastSettings {
    fn default() -> Self {
        Self {
            ep_count: DEFAULT_EPISODE_COUNT,
            timezone: chrono_tz::Europe::Oslo,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Published RSS feeds.
    pub output_dir: PathBuf,
    /// Archives and feed state, kept between runs.
    pub persistent_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/data"),
            persistent_dir: PathBuf::from("/persistent"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    pub binary: String,
    /// Extra arguments placed before the generated ones.
    pub args: Vec<String>,
    /// Format selector; must pick a single file so a direct URL exists.
    pub format: String,
    pub timeout_secs: u64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            args: Vec::new(),
            format: "best".to_string(),
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub timeout_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML or unknown timezone → `Err(ConfigError::Parse)`
    /// - Unknown sections or keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match read_limited(path)? {
            Some(content) => content,
            None => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in unknown_keys(&raw) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }

        let settings: Settings = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            frequency_sec = settings.updates.frequency_sec,
            timezone = %settings.podcasts.timezone,
            "Loaded configuration"
        );
        Ok(settings)
    }
}

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("logging", &["level"]),
    ("updates", &["frequency_sec", "max_concurrent_channels"]),
    ("podcasts", &["ep_count", "timezone"]),
    ("paths", &["output_dir", "persistent_dir"]),
    ("extractor", &["binary", "args", "format", "timeout_secs"]),
    ("probe", &["timeout_secs"]),
];

/// Dotted paths of keys in `raw` that `Settings` does not read.
fn unknown_keys(raw: &toml::Table) -> Vec<String> {
    let mut unknown = Vec::new();
    for (section, value) in raw {
        let Some((_, fields)) = KNOWN_KEYS.iter().find(|(name, _)| name == section) else {
            unknown.push(section.clone());
            continue;
        };
        if let Some(table) = value.as_table() {
            for key in table.keys() {
                if !fields.contains(&key.as_str()) {
                    unknown.push(format!("{section}.{key}"));
                }
            }
        }
    }
    unknown
}

/// Reads a config file, `Ok(None)` when it does not exist.
fn read_limited(path: &Path) -> Result<Option<String>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_FILE_SIZE => {
            return Err(ConfigError::TooLarge(format!(
                "{} is {} bytes (max {} bytes)",
                path.display(),
                meta.len(),
                MAX_FILE_SIZE
            )));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(e)),
        Ok(_) => {}
    }

    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(e)),
    }
}

// ============================================================================
// Channel list (channels.json)
// ============================================================================

/// One configured channel, validated and with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Filename-safe identifier; names the archive, state and feed files.
    pub fname: String,
    pub title: String,
    pub description: String,
    pub url: String,
    /// Cover art URL; empty when the channel has none.
    pub image: String,
    pub explicit: bool,
    pub schedule: ScheduleFilter,
    /// Maximum episode-like entries examined per cycle.
    pub episode_cap: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeekdaySpec {
    Index(u8),
    Name(String),
}

impl WeekdaySpec {
    fn resolve(&self) -> Option<Weekday> {
        match self {
            WeekdaySpec::Index(i) => WEEKDAYS.get(usize::from(*i)).copied(),
            WeekdaySpec::Name(name) => {
                let name = name.trim().to_ascii_lowercase();
                WEEKDAY_NAMES
                    .iter()
                    .position(|full| name.len() >= 3 && full.starts_with(name.as_str()))
                    .map(|i| WEEKDAYS[i])
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    url: String,
    #[serde(default, alias = "title")]
    name: Option<String>,
    #[serde(default, alias = "description")]
    desc: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    fname: Option<String>,
    #[serde(default)]
    weekdays: Option<Vec<WeekdaySpec>>,
    #[serde(default)]
    hours: Option<Vec<u32>>,
    #[serde(default)]
    ep_count: Option<usize>,
    #[serde(default)]
    explicit: bool,
}

impl RawChannel {
    fn into_config(self, defaults: &PodcastSettings) -> Result<ChannelConfig, ConfigError> {
        let title = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PODCAST_TITLE.to_string());
        let fname = self.fname.unwrap_or_else(|| slugify(&title));

        let invalid = |reason: String| ConfigError::InvalidChannel {
            channel: fname.clone(),
            reason,
        };

        if !is_filename_safe(&fname) {
            return Err(invalid(format!(
                "fname {fname:?} may only contain letters, digits, '.', '_' and '-'"
            )));
        }
        validate_url(&self.url).map_err(|e| invalid(format!("url: {e}")))?;

        let weekdays = match self.weekdays {
            Some(specs) => {
                let mut days = HashSet::new();
                for spec in &specs {
                    let day = spec
                        .resolve()
                        .ok_or_else(|| invalid(format!("unknown weekday {spec:?}")))?;
                    days.insert(day);
                }
                Some(days)
            }
            None => None,
        };

        let hours = match self.hours {
            Some(hours) => {
                if let Some(bad) = hours.iter().find(|h| **h > 23) {
                    return Err(invalid(format!("hour {bad} is outside 0-23")));
                }
                Some(hours.into_iter().collect::<BTreeSet<_>>())
            }
            None => None,
        };

        let episode_cap = self.ep_count.unwrap_or(defaults.ep_count);
        if episode_cap == 0 {
            return Err(invalid("ep_count must be at least 1".to_string()));
        }

        Ok(ChannelConfig {
            title,
            description: self.desc.unwrap_or_default(),
            image: self.image.unwrap_or_default(),
            url: self.url,
            explicit: self.explicit,
            schedule: ScheduleFilter { weekdays, hours },
            episode_cap,
            fname,
        })
    }
}

fn is_filename_safe(fname: &str) -> bool {
    !fname.is_empty()
        && !fname.starts_with('.')
        && fname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Loads and validates the channel list.
///
/// Unlike settings, the channel list is mandatory: without it there is
/// nothing to do.
pub fn load_channels(
    path: &Path,
    defaults: &PodcastSettings,
) -> Result<Vec<ChannelConfig>, ConfigError> {
    let content =
        read_limited(path)?.ok_or_else(|| ConfigError::MissingChannels(path.to_path_buf()))?;
    parse_channels(&content, defaults)
}

fn parse_channels(
    content: &str,
    defaults: &PodcastSettings,
) -> Result<Vec<ChannelConfig>, ConfigError> {
    let raw: Vec<RawChannel> = serde_json::from_str(content)?;

    let mut seen = HashSet::new();
    let mut channels = Vec::with_capacity(raw.len());
    for entry in raw {
        let channel = entry.into_config(defaults)?;
        if !seen.insert(channel.fname.clone()) {
            return Err(ConfigError::InvalidChannel {
                channel: channel.fname,
                reason: "fname is used by more than one channel".to_string(),
            });
        }
        channels.push(channel);
    }

    tracing::info!(channels = channels.len(), "Loaded channel list");
    Ok(channels)
}

// ============================================================================
// Tests
// ============================================================================
