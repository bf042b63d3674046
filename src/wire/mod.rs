//! Wire format shared by the hub and its subscribers.
//!
//! # Data Flow
//! ```text
//! plugins → Snapshot (one per plugin)
//!     → updater collects into Status { metrics }
//!     → Status::encode → Frame (shared UTF-8 bytes)
//!     → hub fans the same Frame out to every subscriber queue
//!     → client receives text, Status::decode on demand
//! ```
//!
//! # Design Decisions
//! - Encoding happens once per round; subscribers share one buffer
//! - Plugin values are a closed sum type with an opaque escape hatch
//! - The "no data yet" sentinel is an envelope without `metrics`

pub mod status;

pub use status::{no_data_yet, Frame, LoadAvg, Snapshot, Status, Usage, WireError, NO_DATA_YET};
