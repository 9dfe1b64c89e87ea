//! Tests for the presence engine.
//!
//! Drives the engine with a recording transport and scheduler so every
//! handshake, throttle, and timeout path can be scripted deterministically.

use kickwatch_types::PeerName;

use super::engine::PresenceEngine;
use crate::config::Settings;
use crate::host::{Ctx, Scheduler, TimerEvent, Transport};

#[derive(Debug, Default)]
struct RecordingTransport {
    broadcasts: Vec<String>,
    whispers: Vec<(String, String)>,
}

impl Transport for RecordingTransport {
    fn broadcast(&mut self, payload: &str) {
        self.broadcasts.push(payload.to_string());
    }

    fn whisper(&mut self, target: &PeerName, payload: &str) {
        self.whispers.push((target.full(), payload.to_string()));
    }
}

#[derive(Debug, Default)]
struct RecordingScheduler {
    scheduled: Vec<(f64, TimerEvent)>,
}

impl Scheduler for RecordingScheduler {
    fn schedule(&mut self, delay_secs: f64, event: TimerEvent) {
        self.scheduled.push((delay_secs, event));
    }
}

/// Engine plus recording collaborators; wrapper methods build the per-call
/// `Ctx` from disjoint fields so tests read as straight-line scripts.
struct Harness {
    engine: PresenceEngine,
    transport: RecordingTransport,
    scheduler: RecordingScheduler,
}

impl Harness {
    fn new() -> Self {
        Self {
            engine: PresenceEngine::new(PeerName::parse("Self-Home"), Settings::default()),
            transport: RecordingTransport::default(),
            scheduler: RecordingScheduler::default(),
        }
    }

    fn initiate(&mut self, members: &[PeerName], now: f64) {
        let mut ctx = Ctx {
            now,
            transport: &mut self.transport,
            scheduler: &mut self.scheduler,
        };
        self.engine.initiate_query(members, &mut ctx);
    }

    fn resolve(&mut self, request_id: &str, now: f64) {
        let mut ctx = Ctx {
            now,
            transport: &mut self.transport,
            scheduler: &mut self.scheduler,
        };
        self.engine.resolve(request_id, &mut ctx);
    }

    fn on_query(&mut self, sender: &PeerName, request_id: &str, now: f64) {
        let mut ctx = Ctx {
            now,
            transport: &mut self.transport,
            scheduler: &mut self.scheduler,
        };
        self.engine.on_query(sender, request_id, &mut ctx);
    }

    fn debounce(&mut self, now: f64) {
        let mut ctx = Ctx {
            now,
            transport: &mut self.transport,
            scheduler: &mut self.scheduler,
        };
        self.engine.debounce_then_query(&mut ctx);
    }

    fn broadcast_caps(&mut self, kit: &[u32], now: f64) {
        let mut ctx = Ctx {
            now,
            transport: &mut self.transport,
            scheduler: &mut self.scheduler,
        };
        self.engine.broadcast_capabilities(kit, &mut ctx);
    }

    fn request_caps(&mut self, kit: &[u32], now: f64) {
        let mut ctx = Ctx {
            now,
            transport: &mut self.transport,
            scheduler: &mut self.scheduler,
        };
        self.engine.request_capabilities(kit, &mut ctx);
    }

    fn answer_cap_request(&mut self, kit: &[u32], now: f64) {
        let mut ctx = Ctx {
            now,
            transport: &mut self.transport,
            scheduler: &mut self.scheduler,
        };
        self.engine.on_capability_request(kit, &mut ctx);
    }

    /// Pull the request id out of the last scheduled resolution.
    fn scheduled_request_id(&self) -> String {
        match self.scheduler.scheduled.last() {
            Some((_, TimerEvent::ResolvePresence { request_id })) => request_id.clone(),
            other => panic!("expected a scheduled resolution, got {other:?}"),
        }
    }
}

fn party(names: &[&str]) -> Vec<PeerName> {
    names.iter().map(|n| PeerName::parse(n)).collect()
}

#[test]
fn test_initiate_broadcasts_query_and_schedules_resolution() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "Bob-Home", "Cara-Home"]);

    h.initiate(&members, 10.0);

    assert_eq!(h.transport.broadcasts.len(), 1);
    assert!(h.transport.broadcasts[0].starts_with("Q|1|"));
    assert_eq!(h.scheduler.scheduled.len(), 1);
    assert_eq!(h.scheduler.scheduled[0].0, Settings::default().ack_timeout_secs);
    assert!(h.engine.session().is_some());
    assert!(h.engine.take_refresh());
}

#[test]
fn test_second_initiate_while_pending_is_noop() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "Bob-Home"]);

    h.initiate(&members, 0.0);
    let first_id = h.engine.session().unwrap().request_id.clone();

    h.initiate(&members, 0.5);

    assert_eq!(h.engine.session().unwrap().request_id, first_id);
    assert_eq!(h.transport.broadcasts.len(), 1, "no second query broadcast");
    assert_eq!(h.scheduler.scheduled.len(), 1);
}

#[test]
fn test_initiate_requires_two_members() {
    let mut h = Harness::new();
    h.initiate(&party(&["Self-Home"]), 0.0);
    assert!(h.engine.session().is_none());
    assert!(h.transport.broadcasts.is_empty());
}

#[test]
fn test_request_ids_unique_across_sessions() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "Bob-Home"]);

    h.initiate(&members, 0.0);
    let first = h.scheduled_request_id();
    h.resolve(&first, 3.0);

    h.initiate(&members, 4.0);
    let second = h.scheduled_request_id();

    assert_ne!(first, second);
}

#[test]
fn test_ack_confirms_and_clears_grace() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "Bob-Home", "Cara-Home"]);
    h.initiate(&members, 0.0);

    h.engine.on_ack(&PeerName::parse("Bob-Home"), "whatever");

    assert!(h.engine.confirmed().contains("Bob-Home"));
    assert!(h.engine.should_treat_as_present("Bob", Some("Bob-Home"), 100.0));
}

#[test]
fn test_unsolicited_ack_still_counts() {
    let mut h = Harness::new();
    h.engine.on_ack(&PeerName::parse("Bob-Home"), "tok-from-nowhere");
    assert!(h.engine.confirmed().contains("Bob-Home"));
    assert!(h.engine.take_refresh());
}

#[test]
fn test_timeout_scenario_one_ack_one_missing() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "P1-Home", "P2-Home"]);
    h.initiate(&members, 0.0);
    let request_id = h.scheduled_request_id();

    h.engine.on_ack(&PeerName::parse("P1-Home"), &request_id);

    h.resolve(&request_id, 2.5);

    assert!(h.engine.session().is_none());
    assert!(h.engine.confirmed().contains("P1-Home"));
    assert!(h.engine.announced_missing().contains("P2-Home"));
    assert!(!h.engine.announced_missing().contains("P1-Home"));
    assert!(!h.engine.announced_missing().contains("Self-Home"));

    let notices = h.engine.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("P2"), "summary names P2: {}", notices[0]);
    assert!(!notices[0].contains("P1"));
}

#[test]
fn test_resolve_is_idempotent() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "P1-Home"]);
    h.initiate(&members, 0.0);
    let request_id = h.scheduled_request_id();

    h.resolve(&request_id, 2.5);
    assert_eq!(h.engine.take_notices().len(), 1);

    // Duplicate timer firing: nothing further happens
    h.resolve(&request_id, 2.6);
    assert!(h.engine.take_notices().is_empty());
}

#[test]
fn test_stale_timer_from_other_token_is_noop() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "P1-Home"]);
    h.initiate(&members, 0.0);

    // A resolution for some other token leaves the live session alone
    h.resolve("Self-999-42", 1.0);
    assert!(h.engine.session().is_some());
}

#[test]
fn test_missing_already_announced_not_repeated() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "P2-Home"]);

    h.initiate(&members, 0.0);
    let id = h.scheduled_request_id();
    h.resolve(&id, 2.5);
    assert_eq!(h.engine.take_notices().len(), 1);

    // Second session, same roster: P2 is already announced
    h.initiate(&members, 10.0);
    let id = h.scheduled_request_id();
    h.resolve(&id, 12.5);
    assert!(h.engine.take_notices().is_empty(), "no repeat announcement");
}

#[test]
fn test_missing_summary_truncates_past_six() {
    let mut h = Harness::new();
    let names = [
        "Self-Home", "Ann-Home", "Ben-Home", "Cal-Home", "Dee-Home", "Eli-Home", "Fay-Home",
        "Gus-Home", "Hal-Home",
    ];
    let members = party(&names);
    h.initiate(&members, 0.0);
    let id = h.scheduled_request_id();
    h.resolve(&id, 2.5);

    let notices = h.engine.take_notices();
    assert_eq!(notices.len(), 1);
    let summary = &notices[0];
    // 8 missing: six named lexicographically, then the overflow suffix
    assert!(summary.contains("Ann, Ben, Cal, Dee, Eli, Fay"), "{summary}");
    assert!(summary.ends_with("+2 more"), "{summary}");
    assert!(!summary.contains("Gus"));
}

#[test]
fn test_on_query_acks_exactly_once() {
    let mut h = Harness::new();
    let bob = PeerName::parse("Bob-Home");

    h.on_query(&bob, "Bob-123-1", 0.0);
    h.on_query(&bob, "Bob-123-1", 0.1);

    assert_eq!(h.transport.whispers.len(), 1, "one ack per request token");
    let (target, payload) = &h.transport.whispers[0];
    assert_eq!(target, "Bob-Home");
    assert_eq!(payload, "A|1|Bob-123-1");
    assert!(h.transport.broadcasts.is_empty(), "acks are whispered");
}

#[test]
fn test_own_query_loopback_not_acked() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "Bob-Home"]);
    h.initiate(&members, 0.0);
    let request_id = h.scheduled_request_id();

    // The channel loops our own broadcast back to us
    h.on_query(&PeerName::parse("Self-Home"), &request_id, 0.1);
    assert!(h.transport.whispers.is_empty());
}

#[test]
fn test_grace_window_expires() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "Bob-Home"]);
    h.initiate(&members, 100.0);

    let grace = Settings::default().grace_secs;
    assert!(h.engine.should_treat_as_present("Bob", None, 100.0));
    assert!(h.engine.should_treat_as_present("Bob", None, 100.0 + grace - 0.1));
    assert!(!h.engine.should_treat_as_present("Bob", None, 100.0 + grace + 0.1));
}

#[test]
fn test_present_by_confirmed_display_match() {
    let mut h = Harness::new();
    h.engine.on_ack(&PeerName::parse("Bob-Home"), "tok");

    // Roster APIs only hand back the short form
    assert!(h.engine.should_treat_as_present("Bob", None, 999.0));
    assert!(!h.engine.should_treat_as_present("Cara", None, 999.0));
}

#[test]
fn test_debounce_collapses_bursts() {
    let mut h = Harness::new();

    h.debounce(0.0);
    h.debounce(0.1);
    h.debounce(0.2);

    let debounces = h
        .scheduler
        .scheduled
        .iter()
        .filter(|(_, e)| *e == TimerEvent::DebouncedQuery)
        .count();
    assert_eq!(debounces, 1, "re-entrant triggers dropped while armed");

    assert!(h.engine.take_debounce());
    assert!(!h.engine.take_debounce(), "stale firing is a no-op");
}

#[test]
fn test_capability_broadcast_throttled() {
    let mut h = Harness::new();
    let kit = [2139u32];

    h.broadcast_caps(&kit, 0.0);
    h.broadcast_caps(&kit, 0.5);
    assert_eq!(h.transport.broadcasts.len(), 1, "second send throttled");

    h.broadcast_caps(&kit, 1.5);
    assert_eq!(h.transport.broadcasts.len(), 2);
    assert_eq!(h.transport.broadcasts[0], "L|1|2139");
}

#[test]
fn test_empty_kit_stays_off_the_wire() {
    let mut h = Harness::new();
    h.broadcast_caps(&[], 0.0);
    assert!(h.transport.broadcasts.is_empty());
}

#[test]
fn test_capability_list_sorted_on_wire() {
    let mut h = Harness::new();
    h.broadcast_caps(&[187707, 147362], 0.0);
    assert_eq!(h.transport.broadcasts[0], "L|1|147362,187707");
}

#[test]
fn test_request_capabilities_self_answers() {
    let mut h = Harness::new();
    let kit = [2139u32];
    h.request_caps(&kit, 0.0);

    assert_eq!(h.transport.broadcasts.len(), 2);
    assert_eq!(h.transport.broadcasts[0], "R|1");
    assert_eq!(h.transport.broadcasts[1], "L|1|2139");

    // Throttled: an immediate repeat sends nothing at all
    h.request_caps(&kit, 0.5);
    assert_eq!(h.transport.broadcasts.len(), 2);
}

#[test]
fn test_capability_request_answered() {
    let mut h = Harness::new();
    h.answer_cap_request(&[6552, 1766], 0.0);
    assert_eq!(h.transport.broadcasts, vec!["L|1|1766,6552".to_string()]);
}

#[test]
fn test_group_exit_wipes_everything() {
    let mut h = Harness::new();
    let members = party(&["Self-Home", "Bob-Home"]);
    h.initiate(&members, 0.0);
    h.engine.on_ack(&PeerName::parse("Bob-Home"), "tok");

    h.engine.on_group_exit();

    assert!(h.engine.session().is_none());
    assert!(h.engine.confirmed().is_empty());
    assert!(h.engine.announced_missing().is_empty());
    assert!(!h.engine.should_treat_as_present("Bob", Some("Bob-Home"), 0.1));
}

#[test]
fn test_group_exit_forgets_acked_tokens() {
    let mut h = Harness::new();
    let bob = PeerName::parse("Bob-Home");

    h.on_query(&bob, "Bob-123-9", 0.0);
    h.engine.on_group_exit();
    // Same token in the next group gets acked again: reachability changed
    h.on_query(&bob, "Bob-123-9", 5.0);

    assert_eq!(h.transport.whispers.len(), 2);
}
