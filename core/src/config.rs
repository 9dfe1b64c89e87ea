//! Protocol tunables.
//!
//! Every protocol timing knob lives here so the host can persist
//! adjustments. Values load from the standard config location via
//! `confy` and fall back to defaults on any error; a broken settings file
//! must never keep the board from coming up.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Optimistic "treat as present" window after a presence query, seconds.
    /// Slightly longer than the ack timeout so confirmed peers never flicker
    /// off the board between timeout and resolution.
    pub grace_secs: f64,

    /// How long a presence session waits for acks before resolving, seconds.
    /// Must stay below `grace_secs`.
    pub ack_timeout_secs: f64,

    /// Settle delay collapsing roster-changed bursts into one query, seconds.
    pub debounce_secs: f64,

    /// Minimum spacing between outbound capability requests, seconds.
    pub capability_request_throttle_secs: f64,

    /// Minimum spacing between broadcasts of our own capability list, seconds.
    pub capability_broadcast_throttle_secs: f64,

    /// Missing peers named in a summary before collapsing to "+N more".
    pub max_named_missing: usize,

    /// Largest group presence tracking runs for; beyond this the all-to-all
    /// handshake is suppressed entirely.
    pub max_tracked_peers: usize,

    /// Cadence the host should call `tick` at, milliseconds.
    pub prune_interval_ms: u64,

    /// Show numbers in European format (swap `.` and `,`).
    pub european_number_format: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grace_secs: 2.8,
            ack_timeout_secs: 2.5,
            debounce_secs: 0.8,
            capability_request_throttle_secs: 2.0,
            capability_broadcast_throttle_secs: 1.0,
            max_named_missing: 6,
            max_tracked_peers: 20,
            prune_interval_ms: 100,
            european_number_format: false,
        }
    }
}

impl Settings {
    /// Load persisted settings, or defaults if none exist or parsing fails.
    pub fn load() -> Self {
        confy::load("kickwatch", None).unwrap_or_default()
    }

    /// Persist settings to the standard config location.
    pub fn store(&self) -> Result<(), confy::ConfyError> {
        confy::store("kickwatch", None, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_grace_above_timeout() {
        let s = Settings::default();
        assert!(s.ack_timeout_secs < s.grace_secs);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let s: Settings = toml::from_str("grace_secs = 3.5\n").unwrap();
        assert_eq!(s.grace_secs, 3.5);
        assert_eq!(s.max_named_missing, 6);
    }
}
