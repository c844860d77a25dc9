//! The refresh loop: update every channel, wait, repeat.
//!
//! All channels share one cadence. A cycle dispatches one task per channel
//! through a bounded stream, waits for every task, then sleeps whatever is
//! left of the interval. A slow channel therefore delays the start of the
//! next cycle, never the completion of the other channels.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use crate::channel::{ChannelUpdater, UpdateOutcome};
use crate::config::ChannelConfig;

/// Totals for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Channels that ran to completion, with or without new episodes.
    pub updated: usize,
    /// Channels excluded by their schedule filter.
    pub skipped: usize,
    /// Channels whose update returned an error or panicked.
    pub failed: usize,
    /// Episodes added across all channels.
    pub added: usize,
    pub elapsed: Duration,
}

pub struct RefreshScheduler {
    updater: Arc<ChannelUpdater>,
    channels: Vec<ChannelConfig>,
    interval: Duration,
    max_concurrent: usize,
}

impl RefreshScheduler {
    pub fn new(
        updater: Arc<ChannelUpdater>,
        channels: Vec<ChannelConfig>,
        interval: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            updater,
            channels,
            interval,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs cycles forever.
    pub async fn run(&self) -> Infallible {
        loop {
            let report = self.run_cycle().await;
            let delay = next_delay(self.interval, report.elapsed);
            tracing::info!(
                elapsed_secs = report.elapsed.as_secs_f64(),
                next_in_secs = delay.as_secs_f64(),
                updated = report.updated,
                skipped = report.skipped,
                failed = report.failed,
                added = report.added,
                "Refresh finished"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Updates every channel once and waits for all of them.
    ///
    /// Each channel runs in its own task; an error or panic in one is logged
    /// and counted without affecting the others.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();

        let results: Vec<_> = stream::iter(self.channels.iter().cloned())
            .map(|channel| {
                let updater = Arc::clone(&self.updater);
                async move {
                    let fname = channel.fname.clone();
                    let handle = tokio::spawn(async move { updater.update(&channel).await });
                    (fname, handle.await)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = CycleReport::default();
        for (fname, result) in results {
            match result {
                Ok(Ok(UpdateOutcome::Updated(stats))) => {
                    report.updated += 1;
                    report.added += stats.added;
                }
                Ok(Ok(UpdateOutcome::Skipped(_))) => report.skipped += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::error!(channel = %fname, error = %e, "Channel update failed");
                }
                Err(join_err) => {
                    report.failed += 1;
                    tracing::error!(channel = %fname, error = %join_err, "Channel update task panicked");
                }
            }
        }

        report.elapsed = start.elapsed();
        report
    }
}

/// Time to sleep after a cycle that took `elapsed`.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_delay_subtracts_elapsed() {
        assert_eq!(
            next_delay(Duration::from_secs(3600), Duration::from_secs(600)),
            Duration::from_secs(3000)
        );
    }

    #[test]
    fn test_next_delay_never_negative() {
        assert_eq!(
            next_delay(Duration::from_secs(60), Duration::from_secs(61)),
            Duration::ZERO
        );
        assert_eq!(next_delay(Duration::ZERO, Duration::ZERO), Duration::ZERO);
    }
}
