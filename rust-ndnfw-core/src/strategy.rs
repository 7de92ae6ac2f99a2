//! Forwarding strategies.
//!
//! A strategy decides which upstream faces an Interest goes out on. It is
//! handed the FIB entry matched for the PIT entry, the face registry and the
//! PIT entry itself, and records every face it sends on in that entry.

use crate::config::StrategyKind;
use crate::face::FaceRegistry;
use crate::fib::FibEntry;
use crate::pit::PitEntry;
use bytes::Bytes;
use rust_ndnfw_common::{
    metrics::ForwarderMetrics,
    ndn::Interest,
    types::{FaceId, FaceStatus},
};
use std::time::Instant;

/// Read-only view of the engine state a strategy may use.
pub struct StrategyContext<'a> {
    pub fib_entry: Option<&'a FibEntry>,
    pub faces: &'a FaceRegistry,
    pub now: Instant,
    pub metrics: &'a ForwarderMetrics,
}

impl<'a> StrategyContext<'a> {
    /// FIB faces, best first, that may carry `entry`'s Interest: not the
    /// face it came from, registered and up, not RED, and still within the
    /// entry's retransmission budget.
    pub fn eligible_faces(&self, entry: &PitEntry, incoming: FaceId) -> Vec<FaceId> {
        let fib_entry = match self.fib_entry {
            Some(fib_entry) => fib_entry,
            None => return Vec::new(),
        };

        fib_entry
            .ordered_faces()
            .into_iter()
            .filter(|metric| metric.face != incoming)
            .filter(|metric| metric.status != FaceStatus::Red)
            .filter(|metric| self.faces.is_up(metric.face))
            .filter(|metric| entry.can_send_to(metric.face))
            .map(|metric| metric.face)
            .collect()
    }

    /// Sends `packet` on `face` and records it in `entry`.
    pub fn send_interest(&self, entry: &mut PitEntry, face: FaceId, packet: &Bytes) -> bool {
        let handle = match self.faces.get(face) {
            Some(handle) => handle,
            None => return false,
        };

        match handle.send(packet.clone()) {
            Ok(()) => {
                log::debug!("[Face {}] Interest {} sent", face.0, entry.name());
                entry.add_outgoing(face, self.now);
                self.metrics.interests_sent.increment();
                true
            }
            Err(e) => {
                log::debug!("[Face {}] Failed to send Interest {}: {}", face.0, entry.name(), e);
                self.metrics.send_failures.increment();
                false
            }
        }
    }
}

/// Pluggable forwarding decision.
pub trait ForwardingStrategy: Send {
    fn name(&self) -> &'static str;

    /// Sends `interest` (wire form `packet`, received on `incoming`) out one
    /// or more faces. Returns false if it could not be sent anywhere.
    fn propagate_interest(
        &mut self,
        ctx: &StrategyContext<'_>,
        entry: &mut PitEntry,
        incoming: FaceId,
        interest: &Interest,
        packet: &Bytes,
    ) -> bool;

    /// Called when a pending entry expires without being satisfied.
    fn will_erase_pending_interest(&mut self, _entry: &PitEntry) {}
}

/// Builds the strategy selected in the configuration.
pub fn from_kind(kind: StrategyKind) -> Box<dyn ForwardingStrategy> {
    match kind {
        StrategyKind::BestRoute => Box::new(BestRoute::new()),
        StrategyKind::Flooding => Box::new(Flooding::new()),
    }
}

/// Forwards on the single best eligible face.
#[derive(Debug, Default)]
pub struct BestRoute {
    timed_out: u64,
}

impl BestRoute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending entries that expired while using this strategy.
    pub fn timed_out(&self) -> u64 {
        self.timed_out
    }
}

impl ForwardingStrategy for BestRoute {
    fn name(&self) -> &'static str {
        "best-route"
    }

    fn propagate_interest(
        &mut self,
        ctx: &StrategyContext<'_>,
        entry: &mut PitEntry,
        incoming: FaceId,
        _interest: &Interest,
        packet: &Bytes,
    ) -> bool {
        ctx.eligible_faces(entry, incoming)
            .into_iter()
            .any(|face| ctx.send_interest(entry, face, packet))
    }

    fn will_erase_pending_interest(&mut self, entry: &PitEntry) {
        self.timed_out += 1;
        log::debug!("best-route: {} expired unsatisfied", entry.name());
    }
}

/// Forwards on every eligible face.
#[derive(Debug, Default)]
pub struct Flooding;

impl Flooding {
    pub fn new() -> Self {
        Self
    }
}

impl ForwardingStrategy for Flooding {
    fn name(&self) -> &'static str {
        "flooding"
    }

    fn propagate_interest(
        &mut self,
        ctx: &StrategyContext<'_>,
        entry: &mut PitEntry,
        incoming: FaceId,
        _interest: &Interest,
        packet: &Bytes,
    ) -> bool {
        let mut sent = false;
        for face in ctx.eligible_faces(entry, incoming) {
            sent |= ctx.send_interest(entry, face, packet);
        }
        sent
    }
}
