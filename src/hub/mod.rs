//! Subscriber hub subsystem.
//!
//! # Data Flow
//! ```text
//! connection (websocket.rs) ── Join / Leave ──┐
//!                                             ▼
//! updater ──────────────── Publish ──→ HubLoop mailbox (one task)
//!                                             │
//!                   try_send(frame) per member, in id order
//!                                             ▼
//!                              per-connection outbound queue
//! ```
//!
//! # Design Decisions
//! - Membership and the last-known frame are owned by a single task;
//!   every mutation is a message, so join/leave/publish never interleave
//! - A joining subscriber is primed with the last-known frame, or the
//!   `{}` sentinel when nothing has been published yet
//! - Slow consumers are disconnected: a full outbound queue during
//!   publish evicts that member instead of blocking the broadcast
//! - Leaving twice is a no-op

pub mod broadcast;

pub use broadcast::{Hub, HubError, HubLoop, HubStats, Subscription};
