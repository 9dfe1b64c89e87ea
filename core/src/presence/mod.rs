//! Presence and capability gossip engine.
//!
//! Tracks three things about every peer on the channel:
//! - **Presence**: did they ever answer a query (they run the addon at all)
//! - **Grace**: are we still inside the optimistic window where an
//!   unanswered peer is shown rather than flickered off the board
//! - **Capability**: which interrupt kit they reported
//!
//! One query session may be in flight at a time; its timeout carries the
//! request id it resolves, so duplicate or stale timer firings are no-ops.

mod engine;

#[cfg(test)]
mod engine_tests;

pub use engine::{PresenceEngine, PresenceSession};
