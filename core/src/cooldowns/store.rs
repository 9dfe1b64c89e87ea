use std::cmp::Ordering;
use std::collections::BTreeSet;

use hashbrown::HashMap;
use serde::Serialize;

/// One active cooldown. Stored exactly as reported; rounding for display
/// happens at render time only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownWindow {
    pub started_at: f64,
    pub duration_secs: f64,
    pub expires_at: f64,
}

impl CooldownWindow {
    fn new(started_at: f64, duration_secs: f64) -> Self {
        Self {
            started_at,
            duration_secs,
            expires_at: started_at + duration_secs,
        }
    }
}

/// One row of the rendered cooldown board.
#[derive(Debug, Clone, Serialize)]
pub struct CooldownRow {
    /// Peer display name.
    pub peer: String,
    pub ability_id: u32,
    pub started_at: f64,
    pub duration_secs: f64,
    pub remaining_secs: f64,
    /// 0.0 just started, 1.0 about to expire.
    pub progress: f64,
}

/// In-memory map of active cooldowns and confirmed capability sets.
///
/// Keys are peer *display* names: roster queries return the short form, and
/// broadcast senders reduce to it, so both observation paths land on the
/// same row.
#[derive(Debug, Default)]
pub struct CooldownStore {
    /// peer display name -> ability id -> active window
    windows: HashMap<String, HashMap<u32, CooldownWindow>>,

    /// peer display name -> confirmed interrupt kit.
    /// Absent peer = unknown; present-but-empty = confirmed to have none.
    capabilities: HashMap<String, BTreeSet<u32>>,

    /// Set whenever state changed in a way a renderer would care about.
    refresh_pending: bool,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the cooldown for `(peer, ability)`.
    ///
    /// The latest report always wins: a re-cast before expiry replaces the
    /// old window rather than queueing behind it. Non-positive or non-finite
    /// durations are dropped.
    pub fn start(&mut self, peer: &str, ability_id: u32, duration_secs: f64, now: f64) {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            tracing::trace!(peer, ability_id, duration_secs, "dropping bad cooldown start");
            return;
        }
        self.windows
            .entry(peer.to_string())
            .or_default()
            .insert(ability_id, CooldownWindow::new(now, duration_secs));
        self.refresh_pending = true;
    }

    /// Remove every window that has expired by `now`; peers with no windows
    /// left are dropped entirely.
    pub fn prune_expired(&mut self, now: f64) {
        let mut removed = false;
        self.windows.retain(|_, per_ability| {
            let before = per_ability.len();
            per_ability.retain(|_, w| w.expires_at > now);
            removed |= per_ability.len() != before;
            !per_ability.is_empty()
        });
        if removed {
            self.refresh_pending = true;
        }
    }

    /// Wipe all windows and capability sets (group exit).
    pub fn clear_all(&mut self) {
        self.windows.clear();
        self.capabilities.clear();
        self.refresh_pending = true;
    }

    /// Replace `peer`'s capability set wholesale.
    pub fn set_capabilities(&mut self, peer: &str, ability_ids: &[u32]) {
        self.capabilities
            .insert(peer.to_string(), ability_ids.iter().copied().collect());
        self.refresh_pending = true;
    }

    /// Confirmed capability set for `peer`, or `None` if we never heard one.
    pub fn capabilities(&self, peer: &str) -> Option<&BTreeSet<u32>> {
        self.capabilities.get(peer)
    }

    /// The active window for `(peer, ability)`, if any.
    pub fn window(&self, peer: &str, ability_id: u32) -> Option<&CooldownWindow> {
        self.windows.get(peer).and_then(|m| m.get(&ability_id))
    }

    /// Freshly computed view of all unexpired windows.
    ///
    /// Sorted ascending by expiry (soonest to finish first); ties break by
    /// peer name then ability id so repeated renders are stable even with
    /// equal timestamps.
    pub fn snapshot_rows(&self, now: f64) -> Vec<CooldownRow> {
        let mut rows: Vec<CooldownRow> = Vec::new();
        for (peer, per_ability) in &self.windows {
            for (ability_id, window) in per_ability {
                if window.expires_at <= now {
                    continue;
                }
                let progress = ((now - window.started_at) / window.duration_secs).clamp(0.0, 1.0);
                rows.push(CooldownRow {
                    peer: peer.clone(),
                    ability_id: *ability_id,
                    started_at: window.started_at,
                    duration_secs: window.duration_secs,
                    remaining_secs: window.expires_at - now,
                    progress,
                });
            }
        }
        rows.sort_by(|a, b| {
            let ea = a.started_at + a.duration_secs;
            let eb = b.started_at + b.duration_secs;
            ea.partial_cmp(&eb)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.peer.cmp(&b.peer))
                .then_with(|| a.ability_id.cmp(&b.ability_id))
        });
        rows
    }

    /// Drain the refresh flag. Returns true if anything changed since the
    /// last drain.
    pub fn take_refresh(&mut self) -> bool {
        std::mem::take(&mut self.refresh_pending)
    }
}
