//! channelcast turns video channels into podcast feeds.
//!
//! Every cycle, each configured channel is listed upstream; items not yet in
//! the channel's archive are resolved, probed for their media size, appended
//! to the channel's feed state, and published as an RSS file.
//!
//! ```text
//! refresh ──► channel::updater ──► upstream (list)
//!                    │
//!                    ├──► channel::materializer ──► upstream (resolve) + HEAD probe
//!                    │
//!                    └──► storage (feed state, archive) ──► feed (RSS)
//! ```

pub mod channel;
pub mod config;
pub mod feed;
pub mod refresh;
pub mod storage;
pub mod upstream;
pub mod util;
