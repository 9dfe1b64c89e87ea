use std::collections::{HashMap, HashSet};

use kickwatch_types::PeerName;

use crate::config::Settings;
use crate::host::{Ctx, TimerEvent};
use crate::wire::{self, WireMessage};

/// One in-flight presence query. At most one exists per process.
#[derive(Debug, Clone)]
pub struct PresenceSession {
    pub request_id: String,
    /// Group membership snapshotted at query time.
    pub members: Vec<PeerName>,
    pub started_at: f64,
}

/// What we know about peers across the current group session.
///
/// All three sets are wiped together when the local peer leaves the group:
/// reachability changed, so old confirmations prove nothing.
#[derive(Debug, Default)]
struct PresenceKnowledge {
    /// Qualified names that acked a query at some point this group session.
    confirmed: HashSet<String>,

    /// Qualified names already reported absent, to avoid repeat spam.
    announced_missing: HashSet<String>,

    /// Display name -> deadline. Peers optimistically treated as present
    /// until the deadline elapses.
    pending_grace: HashMap<String, f64>,
}

/// Presence/capability protocol state machine.
///
/// Pure state plus wire sends through the per-call [`Ctx`]; renderer-facing
/// output accumulates in drained queues (`take_refresh`, `take_notices`).
#[derive(Debug)]
pub struct PresenceEngine {
    local: PeerName,
    settings: Settings,

    session: Option<PresenceSession>,
    knowledge: PresenceKnowledge,

    /// Query tokens we already acked. Guarantees at most one ack per token
    /// no matter how often the channel duplicates delivery.
    seen_request_ids: HashSet<String>,

    last_capability_broadcast: Option<f64>,
    last_capability_request: Option<f64>,

    /// True while a debounced query is waiting to fire.
    debounce_armed: bool,

    /// Monotonic per-process counter for request ids. Combined with the
    /// process id rather than a seeded random source, which some hosts
    /// restrict.
    request_counter: u64,

    refresh_pending: bool,
    notices: Vec<String>,
}

impl PresenceEngine {
    pub fn new(local: PeerName, settings: Settings) -> Self {
        Self {
            local,
            settings,
            session: None,
            knowledge: PresenceKnowledge::default(),
            seen_request_ids: HashSet::new(),
            last_capability_broadcast: None,
            last_capability_request: None,
            debounce_armed: false,
            request_counter: 0,
            refresh_pending: false,
            notices: Vec::new(),
        }
    }

    /// The in-flight session, if any.
    pub fn session(&self) -> Option<&PresenceSession> {
        self.session.as_ref()
    }

    /// Qualified names confirmed this group session.
    pub fn confirmed(&self) -> &HashSet<String> {
        &self.knowledge.confirmed
    }

    /// Qualified names already announced as missing this group session.
    pub fn announced_missing(&self) -> &HashSet<String> {
        &self.knowledge.announced_missing
    }

    fn next_request_id(&mut self) -> String {
        self.request_counter += 1;
        format!(
            "{}-{}-{}",
            self.local.display(),
            std::process::id(),
            self.request_counter
        )
    }

    /// Start a presence query over `members`.
    ///
    /// Silent no-op while a session is pending or when the group is too
    /// small to be worth a handshake. Every member enters the grace window
    /// immediately so the board shows the whole group while acks trickle in.
    pub fn initiate_query(&mut self, members: &[PeerName], ctx: &mut Ctx) {
        if self.session.is_some() {
            tracing::debug!("presence query already pending, ignoring");
            return;
        }
        if members.len() < 2 {
            return;
        }

        let request_id = self.next_request_id();
        for member in members {
            if member.matches(&self.local) {
                continue;
            }
            self.knowledge
                .pending_grace
                .insert(member.display().to_string(), ctx.now + self.settings.grace_secs);
        }
        // Never ack our own query when the channel loops it back
        self.seen_request_ids.insert(request_id.clone());

        self.session = Some(PresenceSession {
            request_id: request_id.clone(),
            members: members.to_vec(),
            started_at: ctx.now,
        });

        ctx.transport.broadcast(&wire::encode(&WireMessage::PresenceQuery {
            request_id: request_id.clone(),
        }));
        ctx.scheduler.schedule(
            self.settings.ack_timeout_secs,
            TimerEvent::ResolvePresence { request_id },
        );
        self.refresh_pending = true;
        tracing::debug!(members = members.len(), "presence query started");
    }

    /// A peer acked a query.
    ///
    /// Confirmation is unconditional: a late or unsolicited ack still proves
    /// the sender runs the addon, which is worth knowing across sessions.
    pub fn on_ack(&mut self, sender: &PeerName, request_id: &str) {
        tracing::debug!(sender = %sender, request_id, "presence ack");
        self.knowledge.confirmed.insert(sender.full());
        self.knowledge.pending_grace.remove(sender.display());
        self.refresh_pending = true;
    }

    /// The session timeout fired. Idempotent: only the timer carrying the
    /// live session's request id does anything.
    pub fn resolve(&mut self, request_id: &str, _ctx: &mut Ctx) {
        let Some(session) = self.session.take_if(|s| s.request_id == request_id) else {
            tracing::debug!(request_id, "stale presence timeout, ignoring");
            return;
        };

        let mut newly_missing: Vec<String> = Vec::new();
        for member in &session.members {
            if member.matches(&self.local) {
                continue;
            }
            let full = member.full();
            if self.knowledge.confirmed.contains(&full)
                || self.knowledge.announced_missing.contains(&full)
            {
                continue;
            }
            self.knowledge.announced_missing.insert(full);
            self.knowledge.pending_grace.remove(member.display());
            newly_missing.push(member.display().to_string());
        }

        if !newly_missing.is_empty() {
            newly_missing.sort();
            self.notices.push(missing_summary(
                &newly_missing,
                self.settings.max_named_missing,
            ));
        }
        self.refresh_pending = true;
    }

    /// Collapse a burst of roster-change triggers into one query after a
    /// settle delay. Re-entrant triggers while one is armed are dropped.
    pub fn debounce_then_query(&mut self, ctx: &mut Ctx) {
        if self.debounce_armed {
            return;
        }
        self.debounce_armed = true;
        ctx.scheduler
            .schedule(self.settings.debounce_secs, TimerEvent::DebouncedQuery);
    }

    /// The debounce timer fired. Returns true if a query should run now;
    /// false for a stale firing.
    pub fn take_debounce(&mut self) -> bool {
        std::mem::take(&mut self.debounce_armed)
    }

    /// A peer asked who is running the addon. Exactly one ack per request
    /// token, whispered back to the sender rather than broadcast.
    pub fn on_query(&mut self, sender: &PeerName, request_id: &str, ctx: &mut Ctx) {
        if !self.seen_request_ids.insert(request_id.to_string()) {
            tracing::trace!(request_id, "duplicate presence query, already acked");
            return;
        }
        ctx.transport.whisper(
            sender,
            &wire::encode(&WireMessage::PresenceAck {
                request_id: request_id.to_string(),
            }),
        );
    }

    /// The three-way visibility check the renderer gates rows on.
    ///
    /// Present means: the qualified name acked, or the display name is still
    /// inside its grace window, or some confirmed peer's display form
    /// matches (roster queries only return short names).
    pub fn should_treat_as_present(
        &self,
        display: &str,
        qualified: Option<&str>,
        now: f64,
    ) -> bool {
        if let Some(full) = qualified
            && self.knowledge.confirmed.contains(full)
        {
            return true;
        }
        if let Some(deadline) = self.knowledge.pending_grace.get(display)
            && now < *deadline
        {
            return true;
        }
        self.knowledge
            .confirmed
            .iter()
            .any(|full| PeerName::parse(full).display() == display)
    }

    /// Ask the channel for everyone's capability list, throttled. The
    /// request is self-answered by re-broadcasting our own list so the local
    /// peer never waits a round trip for its own row.
    pub fn request_capabilities(&mut self, own_kit: &[u32], ctx: &mut Ctx) {
        if let Some(last) = self.last_capability_request
            && ctx.now - last < self.settings.capability_request_throttle_secs
        {
            return;
        }
        self.last_capability_request = Some(ctx.now);
        ctx.transport
            .broadcast(&wire::encode(&WireMessage::CapabilityRequest));
        self.broadcast_capabilities(own_kit, ctx);
    }

    /// Broadcast our own capability list, throttled. Empty kits stay off the
    /// wire; the caller records the kit locally regardless of whether the
    /// broadcast went out.
    pub fn broadcast_capabilities(&mut self, own_kit: &[u32], ctx: &mut Ctx) {
        if own_kit.is_empty() {
            return;
        }
        if let Some(last) = self.last_capability_broadcast
            && ctx.now - last < self.settings.capability_broadcast_throttle_secs
        {
            return;
        }
        self.last_capability_broadcast = Some(ctx.now);
        let mut ability_ids = own_kit.to_vec();
        ability_ids.sort_unstable();
        ability_ids.dedup();
        ctx.transport
            .broadcast(&wire::encode(&WireMessage::CapabilityList { ability_ids }));
    }

    /// A peer asked for capability lists; answer with ours.
    pub fn on_capability_request(&mut self, own_kit: &[u32], ctx: &mut Ctx) {
        self.broadcast_capabilities(own_kit, ctx);
    }

    /// The local peer left the group. Fresh session boundary: confirmations,
    /// announcements, grace windows, and acked tokens all reset.
    pub fn on_group_exit(&mut self) {
        self.session = None;
        self.knowledge = PresenceKnowledge::default();
        self.seen_request_ids.clear();
        self.debounce_armed = false;
        self.refresh_pending = true;
        tracing::debug!("group exited, presence state wiped");
    }

    /// Drain the refresh flag.
    pub fn take_refresh(&mut self) -> bool {
        std::mem::take(&mut self.refresh_pending)
    }

    /// Drain queued human-readable notices (missing-peer summaries).
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

/// One line naming up to `max_named` missing peers, lexicographically
/// sorted, with a `+N more` suffix past the cap.
fn missing_summary(missing: &[String], max_named: usize) -> String {
    let named: Vec<&str> = missing.iter().take(max_named).map(String::as_str).collect();
    let overflow = missing.len().saturating_sub(max_named);
    if overflow > 0 {
        format!("No addon response from: {} +{} more", named.join(", "), overflow)
    } else {
        format!("No addon response from: {}", named.join(", "))
    }
}
