pub mod abilities;
pub mod formatting;
pub mod peer;

// Re-exports for convenience
pub use abilities::{AbilityInfo, INTERRUPT_ABILITIES, base_cooldown_secs, is_known_interrupt};
pub use peer::PeerName;
