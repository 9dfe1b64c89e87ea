//! Top-level service wiring the protocol core together.
//!
//! Owns the presence engine, cooldown store, transmission guard, catalog,
//! and settings, and routes every external event to the right place:
//!
//! ```text
//! local ability use ──► guard ──► wire ──► transport (broadcast)
//!        │                                     ▲
//!        └────────► cooldown store ◄── decode ─┴── inbound channel line
//!                        │
//!                        ▼
//!              snapshot_rows / refresh ──► board renderer
//! ```
//!
//! Every handler runs to completion on the host's single event thread;
//! timers come back in through [`handle_timer`](KickwatchService::handle_timer)
//! as values.

use std::collections::BTreeSet;

use kickwatch_types::PeerName;

use crate::catalog::AbilityCatalog;
use crate::config::Settings;
use crate::cooldowns::{CooldownRow, CooldownStore};
use crate::guard::TransmissionGuard;
use crate::host::{Ctx, TimerEvent};
use crate::presence::PresenceEngine;
use crate::wire::{self, WireMessage};


/// The addon core as one object: construct it once, feed it events.
#[derive(Debug)]
pub struct KickwatchService {
    local: PeerName,
    settings: Settings,
    catalog: AbilityCatalog,
    engine: PresenceEngine,
    store: CooldownStore,
    guard: TransmissionGuard,

    /// Our own interrupt kit, sorted. External game state, pushed in by the
    /// host whenever spec/talents change.
    own_kit: Vec<u32>,

    /// Latest roster snapshot from the host.
    roster: Vec<PeerName>,
}

impl KickwatchService {
    pub fn new(local: PeerName, settings: Settings, catalog: AbilityCatalog) -> Self {
        let engine = PresenceEngine::new(local.clone(), settings.clone());
        Self {
            local,
            settings,
            catalog,
            engine,
            store: CooldownStore::new(),
            guard: TransmissionGuard::new(),
            own_kit: Vec::new(),
            roster: Vec::new(),
        }
    }

    pub fn local(&self) -> &PeerName {
        &self.local
    }

    pub fn catalog(&self) -> &AbilityCatalog {
        &self.catalog
    }

    /// The host learned (or re-derived) which interrupts we have.
    ///
    /// The local store row updates even when the broadcast is throttled, so
    /// our own board entry never waits on the wire.
    pub fn set_own_kit(&mut self, ability_ids: &[u32], ctx: &mut Ctx) {
        let mut kit: Vec<u32> = ability_ids
            .iter()
            .copied()
            .filter(|id| self.catalog.is_valid(*id))
            .collect();
        kit.sort_unstable();
        kit.dedup();
        self.own_kit = kit;
        self.store
            .set_capabilities(self.local.display(), &self.own_kit);
        self.engine.broadcast_capabilities(&self.own_kit, ctx);
    }

    /// An inbound channel line from `sender`. Undecodable lines drop here.
    pub fn handle_channel_message(&mut self, sender: &PeerName, payload: &str, ctx: &mut Ctx) {
        let msg = match wire::decode(payload, &self.catalog) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::trace!(sender = %sender, error = %e, "dropping channel line");
                return;
            }
        };
        match msg {
            WireMessage::AbilityUsed {
                ability_id,
                duration_secs,
            } => {
                // Our own broadcast looped back: the store was updated before
                // transmission, a second start would reset the window.
                if sender.matches(&self.local) {
                    return;
                }
                self.store
                    .start(sender.display(), ability_id, f64::from(duration_secs), ctx.now);
            }
            WireMessage::CapabilityList { ability_ids } => {
                self.store.set_capabilities(sender.display(), &ability_ids);
            }
            WireMessage::CapabilityRequest => {
                if sender.matches(&self.local) {
                    return;
                }
                self.engine.on_capability_request(&self.own_kit, ctx);
            }
            WireMessage::PresenceQuery { request_id } => {
                self.engine.on_query(sender, &request_id, ctx);
            }
            WireMessage::PresenceAck { request_id } => {
                self.engine.on_ack(sender, &request_id);
            }
        }
    }

    /// The local player used an interrupt.
    ///
    /// The store starts the window immediately; only the broadcast is
    /// subject to echo suppression, so retries of one cast reach peers once.
    pub fn handle_local_ability_use(
        &mut self,
        cast_id: Option<&str>,
        ability_id: u32,
        ctx: &mut Ctx,
    ) {
        let Some(duration) = self.catalog.base_cooldown_secs(ability_id) else {
            tracing::trace!(ability_id, "local cast of untracked ability");
            return;
        };
        let duration = f64::from(duration);
        self.store
            .start(self.local.display(), ability_id, duration, ctx.now);

        if self.guard.should_transmit(cast_id, ability_id, ctx.now) {
            ctx.transport.broadcast(&wire::encode(&WireMessage::AbilityUsed {
                ability_id,
                duration_secs: duration.round() as u32,
            }));
        }
    }

    /// Group membership changed. An empty roster means we left the group:
    /// everything session-scoped resets. Otherwise a debounced presence
    /// query goes out once the burst of roster events settles.
    pub fn handle_roster_changed(&mut self, members: Vec<PeerName>, ctx: &mut Ctx) {
        if members.is_empty() {
            self.roster.clear();
            self.engine.on_group_exit();
            self.store.clear_all();
            return;
        }
        self.roster = members;
        if self.roster.len() > self.settings.max_tracked_peers {
            tracing::debug!(
                size = self.roster.len(),
                "group too large, presence handshake suppressed"
            );
            return;
        }
        self.engine.debounce_then_query(ctx);
    }

    /// A scheduled callback came due.
    pub fn handle_timer(&mut self, event: TimerEvent, ctx: &mut Ctx) {
        match event {
            TimerEvent::ResolvePresence { request_id } => {
                self.engine.resolve(&request_id, ctx);
            }
            TimerEvent::DebouncedQuery => {
                if !self.engine.take_debounce() {
                    return;
                }
                if self.roster.len() > self.settings.max_tracked_peers {
                    return;
                }
                self.engine.initiate_query(&self.roster, ctx);
            }
        }
    }

    /// Ask the group for capability lists (slash command, options screen).
    pub fn request_capabilities(&mut self, ctx: &mut Ctx) {
        self.engine.request_capabilities(&self.own_kit, ctx);
    }

    /// Periodic maintenance, driven by the host render loop (~100 ms).
    pub fn tick(&mut self, now: f64) {
        self.store.prune_expired(now);
    }

    // ─── Renderer-facing queries ─────────────────────────────────────────────

    pub fn snapshot_rows(&self, now: f64) -> Vec<CooldownRow> {
        self.store.snapshot_rows(now)
    }

    pub fn capabilities(&self, peer: &str) -> Option<&BTreeSet<u32>> {
        self.store.capabilities(peer)
    }

    pub fn should_treat_as_present(&self, display: &str, qualified: Option<&str>, now: f64) -> bool {
        self.engine.should_treat_as_present(display, qualified, now)
    }

    /// True if anything render-relevant changed since the last call.
    pub fn take_refresh(&mut self) -> bool {
        let engine = self.engine.take_refresh();
        let store = self.store.take_refresh();
        engine || store
    }

    /// Drain queued one-line notices (missing-peer summaries).
    pub fn take_notices(&mut self) -> Vec<String> {
        self.engine.take_notices()
    }
}
