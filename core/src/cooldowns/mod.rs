//! Cooldown tracking store.
//!
//! This module provides:
//! - **Windows**: one active cooldown per (peer, ability) pair
//! - **Capability sets**: which interrupts each peer confirmed having
//! - **Snapshots**: the sorted read-only view a board renderer draws from
//!
//! The store is passive: it never schedules anything itself. The host's
//! render loop drives `prune_expired` on a short cadence and reads
//! `snapshot_rows` when the refresh flag says something changed.

mod store;


pub use store::{CooldownRow, CooldownStore, CooldownWindow};
