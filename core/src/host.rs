//! Collaborator seams between the protocol core and its host environment.
//!
//! The core never owns I/O or timers. Every handler receives a [`Ctx`] with
//! the current monotonic time and mutable access to the host's transport and
//! scheduler, runs to completion, and returns. Scheduled work is expressed as
//! a [`TimerEvent`] value carrying everything it needs to resolve itself, so
//! a stale timer from a superseded session is a safe no-op instead of a
//! dangling closure over dead state.

use kickwatch_types::PeerName;

/// Best-effort message channel reaching the current group.
///
/// No delivery or ordering guarantee; payloads are short ASCII lines.
pub trait Transport {
    /// Send to every peer on the channel (including, on some hosts, a loopback
    /// copy to the local peer).
    fn broadcast(&mut self, payload: &str);

    /// Send to one named peer only.
    fn whisper(&mut self, target: &PeerName, payload: &str);
}

/// One-shot timer callbacks routed back into the service.
pub trait Scheduler {
    /// Deliver `event` to the service after `delay_secs`.
    fn schedule(&mut self, delay_secs: f64, event: TimerEvent);
}

/// A scheduled callback, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Resolve the presence session with this request id. Carries the id so
    /// resolution can verify it still addresses the live session.
    ResolvePresence { request_id: String },

    /// A debounced roster-changed burst has settled; run the pending query.
    DebouncedQuery,
}

/// Per-call host context handed to every mutating entry point.
pub struct Ctx<'a> {
    /// Monotonic seconds. All protocol timing derives from this value.
    pub now: f64,
    pub transport: &'a mut dyn Transport,
    pub scheduler: &'a mut dyn Scheduler,
}
