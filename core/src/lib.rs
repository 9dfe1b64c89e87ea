pub mod catalog;
pub mod config;
pub mod cooldowns;
pub mod guard;
pub mod host;
pub mod presence;
pub mod service;
pub mod wire;

// Re-exports for convenience
pub use catalog::AbilityCatalog;
pub use config::Settings;
pub use cooldowns::{CooldownRow, CooldownStore};
pub use guard::TransmissionGuard;
pub use host::{Ctx, Scheduler, TimerEvent, Transport};
pub use presence::PresenceEngine;
pub use service::KickwatchService;
pub use wire::{DecodeError, PROTOCOL_VERSION, WireMessage};
