//! Deterministic party simulation.
//!
//! Runs one real [`KickwatchService`] against a handful of scripted peers on
//! an in-process broadcast bus. Peers answer presence queries (except the
//! designated laggard, so the missing-peer summary fires), report their kits,
//! and cast their interrupts on a fixed schedule. Time advances in 100 ms
//! steps; every queued delivery and timer fires on the step it comes due, so
//! two runs with the same arguments produce the same board.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use kickwatch_core::{Ctx, KickwatchService, Scheduler, TimerEvent, Transport};
use kickwatch_types::formatting::format_countdown;
use kickwatch_types::PeerName;

/// Simulated one-way channel latency, seconds.
const CHANNEL_LATENCY: f64 = 0.15;

/// How long each simulation step advances the clock.
pub const STEP_SECS: f64 = 0.1;

/// Outbound traffic recorded from the local service during one handler call.
#[derive(Debug, Default)]
struct BusTap {
    broadcasts: Vec<String>,
    whispers: Vec<(String, String)>,
}

impl Transport for BusTap {
    fn broadcast(&mut self, payload: &str) {
        self.broadcasts.push(payload.to_string());
    }

    fn whisper(&mut self, target: &PeerName, payload: &str) {
        self.whispers.push((target.full(), payload.to_string()));
    }
}

/// Service timers, recorded with their absolute due time.
#[derive(Debug, Default)]
struct TimerQueue {
    now: f64,
    heap: BinaryHeap<Due<TimerEvent>>,
}

impl Scheduler for TimerQueue {
    fn schedule(&mut self, delay_secs: f64, event: TimerEvent) {
        self.heap.push(Due {
            at: self.now + delay_secs,
            payload: event,
        });
    }
}

/// Min-heap entry ordered by due time.
#[derive(Debug)]
struct Due<T> {
    at: f64,
    payload: T,
}

impl<T> PartialEq for Due<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl<T> Eq for Due<T> {}

impl<T> Ord for Due<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want earliest-first
        other.at.total_cmp(&self.at)
    }
}

impl<T> PartialOrd for Due<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Something the scripted world does to the local service.
#[derive(Debug)]
enum WorldEvent {
    /// A channel line reaches the local peer.
    Deliver { sender: String, payload: String },
    /// A scripted peer casts its interrupt (it broadcasts an ability-used
    /// line; delivery to the local peer goes through the latency queue).
    PeerCast { peer_idx: usize },
}

/// One scripted party member.
#[derive(Debug, Clone)]
struct SimPeer {
    name: PeerName,
    kit: Vec<u32>,
    /// Laggards never answer anything: they are not running the addon.
    laggard: bool,
}

pub struct Simulation {
    service: KickwatchService,
    tap: BusTap,
    timers: TimerQueue,
    world: BinaryHeap<Due<WorldEvent>>,
    peers: Vec<SimPeer>,
    now: f64,
    json: bool,
    european: bool,
}

impl Simulation {
    pub fn new(service: KickwatchService, peer_count: usize, json: bool, european: bool) -> Self {
        // Hand each peer an interrupt from the builtin table, round-robin
        // over a stable ordering so runs are reproducible.
        let mut ability_ids: Vec<u32> = kickwatch_types::abilities::INTERRUPT_ABILITIES
            .keys()
            .copied()
            .collect();
        ability_ids.sort_unstable();

        let names = [
            "Brakka", "Cindral", "Dorvu", "Eshkara", "Feyla", "Gorrum", "Hallix", "Ishane",
            "Jorenn", "Kessira", "Lothar", "Mivva", "Nerith", "Ozrek", "Pellam", "Quissa",
            "Rendal", "Sovara", "Tyrric",
        ];
        let peers: Vec<SimPeer> = (0..peer_count)
            .map(|i| SimPeer {
                name: PeerName::qualified(names[i % names.len()], "SimRealm"),
                kit: vec![ability_ids[i % ability_ids.len()]],
                // The last peer drags its feet so the summary line shows up
                laggard: peer_count > 1 && i == peer_count - 1,
            })
            .collect();

        Self {
            service,
            tap: BusTap::default(),
            timers: TimerQueue::default(),
            world: BinaryHeap::new(),
            peers,
            now: 0.0,
            json,
            european,
        }
    }

    /// Script the whole run: the party forms at t=0, everyone casts on a
    /// staggered schedule, re-casting when their cooldown comes back.
    pub fn script(&mut self, duration_secs: f64) {
        for (idx, peer) in self.peers.iter().enumerate() {
            // A peer without the addon casts too, but nobody hears about it
            if peer.laggard {
                continue;
            }
            let Some(&ability) = peer.kit.first() else {
                continue;
            };
            let cooldown = self
                .service
                .catalog()
                .base_cooldown_secs(ability)
                .unwrap_or(15.0) as f64;
            let mut at = 2.0 + idx as f64 * 1.7;
            while at < duration_secs {
                self.world.push(Due {
                    at,
                    payload: WorldEvent::PeerCast { peer_idx: idx },
                });
                at += cooldown + 1.3;
            }
        }
    }

    /// Advance one step: fire due timers and world events, then prune.
    pub fn step(&mut self) {
        self.now += STEP_SECS;

        while let Some(due) = self.timers.heap.peek() {
            if due.at > self.now {
                break;
            }
            let event = self.timers.heap.pop().map(|d| d.payload);
            if let Some(event) = event {
                self.with_ctx(|service, ctx| service.handle_timer(event, ctx));
            }
        }

        while let Some(due) = self.world.peek() {
            if due.at > self.now {
                break;
            }
            let Some(due) = self.world.pop() else { break };
            match due.payload {
                WorldEvent::Deliver { sender, payload } => {
                    let sender = PeerName::parse(&sender);
                    self.with_ctx(|service, ctx| {
                        service.handle_channel_message(&sender, &payload, ctx)
                    });
                }
                WorldEvent::PeerCast { peer_idx } => self.peer_cast(peer_idx),
            }
        }

        self.service.tick(self.now);
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// The party forms: the host reports the roster and our own kit.
    pub fn form_party(&mut self, own_kit: &[u32]) {
        let mut members: Vec<PeerName> = vec![self.service.local().clone()];
        members.extend(self.peers.iter().map(|p| p.name.clone()));
        let kit = own_kit.to_vec();
        self.with_ctx(|service, ctx| {
            service.set_own_kit(&kit, ctx);
            service.handle_roster_changed(members, ctx);
            // Forming up is also the moment to learn everyone's kit
            service.request_capabilities(ctx);
        });
    }

    /// The local player casts; the host event carries a cast id.
    pub fn local_cast(&mut self, cast_id: &str, ability_id: u32) {
        let cast_id = cast_id.to_string();
        self.with_ctx(|service, ctx| {
            service.handle_local_ability_use(Some(&cast_id), ability_id, ctx)
        });
    }

    /// Run a service handler with a fresh ctx, then route whatever it sent.
    fn with_ctx(&mut self, f: impl FnOnce(&mut KickwatchService, &mut Ctx)) {
        self.timers.now = self.now;
        let mut ctx = Ctx {
            now: self.now,
            transport: &mut self.tap,
            scheduler: &mut self.timers,
        };
        f(&mut self.service, &mut ctx);
        self.route_outbound();
    }

    /// Deliver everything the service just sent: broadcasts reach every
    /// scripted peer (and loop back to the local peer, as the real channel
    /// does); whispers reach only their target.
    fn route_outbound(&mut self) {
        let broadcasts = std::mem::take(&mut self.tap.broadcasts);
        let whispers = std::mem::take(&mut self.tap.whispers);

        for payload in broadcasts {
            tracing::debug!(%payload, "local -> channel");
            self.world.push(Due {
                at: self.now + CHANNEL_LATENCY,
                payload: WorldEvent::Deliver {
                    sender: self.service.local().full(),
                    payload: payload.clone(),
                },
            });
            for idx in 0..self.peers.len() {
                self.peer_receive(idx, &payload);
            }
        }
        for (target, payload) in whispers {
            tracing::debug!(%target, %payload, "local -> whisper");
            // Scripted peers do not react to acks; nothing to do.
        }
    }

    /// A scripted peer's reaction to a channel line from the local service.
    fn peer_receive(&mut self, idx: usize, payload: &str) {
        let peer = &self.peers[idx];
        if peer.laggard {
            return;
        }
        let reply = match payload.split('|').next() {
            Some("Q") => payload
                .rsplit('|')
                .next()
                .map(|token| format!("A|1|{token}")),
            Some("R") => {
                let ids: Vec<String> = peer.kit.iter().map(u32::to_string).collect();
                Some(format!("L|1|{}", ids.join(",")))
            }
            _ => None,
        };
        if let Some(reply) = reply {
            self.world.push(Due {
                at: self.now + 2.0 * CHANNEL_LATENCY,
                payload: WorldEvent::Deliver {
                    sender: self.peers[idx].name.full(),
                    payload: reply,
                },
            });
        }
    }

    fn peer_cast(&mut self, idx: usize) {
        let peer = &self.peers[idx];
        let Some(&ability) = peer.kit.first() else {
            return;
        };
        let Some(cooldown) = self.service.catalog().base_cooldown_secs(ability) else {
            return;
        };
        let line = format!("I|1|{}|{}", ability, cooldown.round() as u32);
        let sender = peer.name.full();
        self.world.push(Due {
            at: self.now + CHANNEL_LATENCY,
            payload: WorldEvent::Deliver {
                sender,
                payload: line,
            },
        });
    }

    /// Print notices and, when anything changed (or on a forced repaint),
    /// the current board.
    pub fn render(&mut self, force: bool) {
        for notice in self.service.take_notices() {
            println!(">> {notice}");
        }
        let changed = self.service.take_refresh();
        if !changed && !force {
            return;
        }
        let rows = self.service.snapshot_rows(self.now);
        if rows.is_empty() && !changed {
            return;
        }
        if self.json {
            for row in &rows {
                match serde_json::to_string(row) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "row serialization failed"),
                }
            }
            return;
        }
        println!("-- t={:>5.1}s --------------------------------", self.now);
        for row in &rows {
            let name = self
                .service
                .catalog()
                .get(row.ability_id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| row.ability_id.to_string());
            let filled = (row.progress * 20.0).round() as usize;
            let bar: String = "#".repeat(filled) + &"-".repeat(20 - filled.min(20));
            println!(
                "{:<10} {:<18} [{}] {}",
                row.peer,
                name,
                bar,
                format_countdown(row.remaining_secs as f32, self.european)
            );
        }
    }
}
