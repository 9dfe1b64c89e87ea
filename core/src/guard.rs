//! Outbound transmission de-duplication.
//!
//! A single real ability use can surface as several local "succeeded"
//! notifications (retries of the same cast id, double-fired events). Peers
//! must hear about it exactly once. The guard remembers what was recently
//! reported, keyed by cast id when one exists and by ability id always, and
//! suppresses repeats inside a short echo window.
//!
//! The guard gates *transmission only*: callers update the local store
//! before consulting it, so the local board never lags behind throttling.

use std::collections::HashMap;

/// Repeats of the same cast id inside this window are echoes.
const CAST_ECHO_SECS: f64 = 0.60;

/// Repeats of the same ability id inside this window are echoes. Tighter
/// than the cast window since it also has to pass legitimate re-casts when
/// no cast id is available.
const ABILITY_ECHO_SECS: f64 = 0.25;

/// Minimum spacing between cache sweeps.
const SWEEP_MIN_INTERVAL_SECS: f64 = 2.0;

/// Cache entries older than this are dead weight.
const ENTRY_TTL_SECS: f64 = 3.0;

/// Short-lived de-dupe caches for the local peer's own broadcasts.
#[derive(Debug, Default)]
pub struct TransmissionGuard {
    by_cast_id: HashMap<String, f64>,
    by_ability_id: HashMap<u32, f64>,
    last_sweep: f64,
}

impl TransmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this ability-use event should go out on the wire.
    ///
    /// Records the event against both keys when it passes, so the next echo
    /// is caught whichever key it arrives under.
    pub fn should_transmit(&mut self, cast_id: Option<&str>, ability_id: u32, now: f64) -> bool {
        self.maybe_sweep(now);

        if let Some(cast) = cast_id
            && let Some(&seen) = self.by_cast_id.get(cast)
            && now - seen < CAST_ECHO_SECS
        {
            tracing::trace!(cast, ability_id, "suppressing duplicate cast id");
            return false;
        }
        if let Some(&seen) = self.by_ability_id.get(&ability_id)
            && now - seen < ABILITY_ECHO_SECS
        {
            tracing::trace!(ability_id, "suppressing ability echo");
            return false;
        }

        if let Some(cast) = cast_id {
            self.by_cast_id.insert(cast.to_string(), now);
        }
        self.by_ability_id.insert(ability_id, now);
        true
    }

    /// Drop entries older than the TTL, at most once per sweep interval.
    fn maybe_sweep(&mut self, now: f64) {
        if now - self.last_sweep < SWEEP_MIN_INTERVAL_SECS {
            return;
        }
        self.last_sweep = now;
        self.by_cast_id.retain(|_, seen| now - *seen < ENTRY_TTL_SECS);
        self.by_ability_id.retain(|_, seen| now - *seen < ENTRY_TTL_SECS);
    }

    #[cfg(test)]
    fn cache_sizes(&self) -> (usize, usize) {
        (self.by_cast_id.len(), self.by_ability_id.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_cast_id_suppressed_then_allowed() {
        let mut guard = TransmissionGuard::new();
        assert!(guard.should_transmit(Some("cast-77"), 2139, 10.0));
        assert!(!guard.should_transmit(Some("cast-77"), 2139, 10.1));
        // 0.7s after the first report the echo window has passed
        assert!(guard.should_transmit(Some("cast-77"), 2139, 10.7));
    }

    #[test]
    fn test_ability_echo_without_cast_id() {
        let mut guard = TransmissionGuard::new();
        assert!(guard.should_transmit(None, 6552, 5.0));
        assert!(!guard.should_transmit(None, 6552, 5.2));
        assert!(guard.should_transmit(None, 6552, 5.3));
    }

    #[test]
    fn test_different_abilities_do_not_collide() {
        let mut guard = TransmissionGuard::new();
        assert!(guard.should_transmit(None, 6552, 5.0));
        assert!(guard.should_transmit(None, 1766, 5.05));
    }

    #[test]
    fn test_suppressed_echo_does_not_extend_window() {
        let mut guard = TransmissionGuard::new();
        assert!(guard.should_transmit(Some("c1"), 2139, 0.0));
        assert!(!guard.should_transmit(Some("c1"), 2139, 0.5));
        // Window is measured from the transmitted report, not the echo
        assert!(guard.should_transmit(Some("c1"), 2139, 0.65));
    }

    #[test]
    fn test_sweep_bounds_memory() {
        let mut guard = TransmissionGuard::new();
        for i in 0..50u32 {
            guard.should_transmit(Some(&format!("cast-{i}")), 2139 + i, i as f64 * 0.3);
        }
        // Far in the future, one more call triggers a sweep of stale entries
        guard.should_transmit(Some("late"), 9999, 60.0);
        let (casts, abilities) = guard.cache_sizes();
        assert_eq!(casts, 1);
        assert_eq!(abilities, 1);
    }
}
