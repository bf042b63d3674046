//! Collection cadence subsystem.
//!
//! # Data Flow
//! ```text
//! ticker (update interval)
//!     → Collector::collect(): every plugin concurrently, each on the blocking pool
//!       under its own timeout
//!     → Status { metrics: successes keyed by plugin name }
//!     → encode once → Hub::publish
//! ```
//!
//! # Design Decisions
//! - A failing, panicking or slow plugin is skipped for that round only
//! - A round with no successes still publishes `{"metrics":{}}`
//! - An encoding failure drops the round; the next tick tries again
//! - A plugin that overruns its timeout keeps running on the blocking
//!   pool, but the round no longer waits for it; the plugin is skipped
//!   until that call returns, so it holds at most one blocking thread

pub mod round;

pub use round::{Collector, Updater};
