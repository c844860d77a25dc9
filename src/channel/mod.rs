//! Per-channel update pipeline.
//!
//! - [`filter`]: weekday/hour schedule filters
//! - [`materializer`]: turns one upstream item into an episode
//! - [`updater`]: the incremental feed update for one channel

mod filter;
mod materializer;
mod updater;

pub use filter::{FilterSkip, ScheduleFilter};
pub use materializer::{EpisodeMaterializer, ResolutionError};
pub use updater::{ChannelUpdater, UpdateError, UpdateOutcome, UpdateStats};
