use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use channelcast::channel::ChannelUpdater;
use channelcast::config::{load_channels, Settings, CHANNELS_FILE, SETTINGS_FILE};
use channelcast::refresh::RefreshScheduler;
use channelcast::upstream::YtDlp;

#[derive(Parser, Debug)]
#[command(name = "channelcast", about = "Publish video channels as podcast RSS feeds")]
struct Args {
    /// Directory holding config.toml and channels.json
    #[arg(long, value_name = "DIR", default_value = "/config")]
    config_dir: PathBuf,

    /// Run a single refresh cycle and exit
    #[arg(long)]
    once: bool,
}

/// `RUST_LOG` wins over the configured level when set.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_ascii_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings_path = args.config_dir.join(SETTINGS_FILE);
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    init_logging(&settings.logging.level);

    let channels_path = args.config_dir.join(CHANNELS_FILE);
    let channels = load_channels(&channels_path, &settings.podcasts)
        .with_context(|| format!("Failed to load channels from {}", channels_path.display()))?;
    if channels.is_empty() {
        tracing::warn!(path = %channels_path.display(), "Channel list is empty, nothing to do");
    }

    for dir in [&settings.paths.output_dir, &settings.paths.persistent_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("channelcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let extractor = Arc::new(YtDlp::new(&settings.extractor));
    let updater = Arc::new(ChannelUpdater::new(&settings, extractor, client));

    let scheduler = RefreshScheduler::new(
        updater,
        channels,
        Duration::from_secs(settings.updates.frequency_sec),
        settings.updates.max_concurrent_channels,
    );

    tracing::info!(
        output_dir = %settings.paths.output_dir.display(),
        persistent_dir = %settings.paths.persistent_dir.display(),
        frequency_sec = settings.updates.frequency_sec,
        "Starting channelcast"
    );

    if args.once {
        let report = scheduler.run_cycle().await;
        tracing::info!(
            elapsed_secs = report.elapsed.as_secs_f64(),
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            added = report.added,
            "Refresh finished"
        );
        return Ok(());
    }

    tokio::select! {
        never = scheduler.run() => match never {},
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested, exiting");
        }
    }

    Ok(())
}
