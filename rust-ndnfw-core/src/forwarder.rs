//! The forwarding engine.
//!
//! [`Forwarder`] owns the PIT, the face registry and the timer queue, and is
//! handed the FIB, content store, strategy and clock it works with. Every
//! packet is processed to completion before the next one; faces push what
//! they receive onto the inbound queue and the runtime feeds it back through
//! [`Forwarder::receive`].

use crate::clock::Clock;
use crate::config::{ForwarderConfig, UpstreamRequestPolicy};
use crate::cs::{ContentStore, MemoryContentStore};
use crate::face::{Face, FaceRecord, FaceRegistry};
use crate::fib::{Fib, MemoryFib};
use crate::pit::Pit;
use crate::scheduler::{TimerEvent, TimerQueue};
use crate::strategy::{self, ForwardingStrategy, StrategyContext};
use bytes::Bytes;
use log::{debug, error, info, trace, warn};
use rust_ndnfw_common::{
    metrics::ForwarderMetrics,
    ndn::{Data, Interest, NackCode, Name},
    packet::NdnPacket,
    types::{FaceId, FaceStatus, LowerLayerHandle},
    Error, Result,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;


/// A packet received on a face, waiting to be processed.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub face: FaceId,
    pub packet: Bytes,
}

pub type InboundSender = mpsc::UnboundedSender<Inbound>;
pub type InboundReceiver = mpsc::UnboundedReceiver<Inbound>;

/// Creates the queue faces deliver received packets on.
pub fn inbox() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

pub struct Forwarder {
    config: ForwarderConfig,
    pit: Pit,
    fib: Box<dyn Fib>,
    cs: Box<dyn ContentStore>,
    strategy: Box<dyn ForwardingStrategy>,
    faces: FaceRegistry,
    timers: TimerQueue,
    clock: Arc<dyn Clock>,
    metrics: Arc<ForwarderMetrics>,
    inbox: InboundSender,
}

impl Forwarder {
    pub fn new(
        config: ForwarderConfig,
        fib: Box<dyn Fib>,
        cs: Box<dyn ContentStore>,
        strategy: Box<dyn ForwardingStrategy>,
        clock: Arc<dyn Clock>,
        inbox: InboundSender,
    ) -> Self {
        info!(
            "Forwarder started with strategy {} (NACKs {})",
            strategy.name(),
            if config.nacks_enabled { "enabled" } else { "disabled" }
        );
        Self {
            pit: Pit::new(config.pit_max_size),
            config,
            fib,
            cs,
            strategy,
            faces: FaceRegistry::new(),
            timers: TimerQueue::new(),
            clock,
            metrics: Arc::new(ForwarderMetrics::new()),
            inbox,
        }
    }

    /// A forwarder with an in-memory FIB and content store and the strategy
    /// named in `config`.
    pub fn with_defaults(config: ForwarderConfig, clock: Arc<dyn Clock>, inbox: InboundSender) -> Self {
        let cs = Box::new(MemoryContentStore::new(config.cs_capacity));
        let strategy = strategy::from_kind(config.strategy);
        Self::new(config, Box::new(MemoryFib::new()), cs, strategy, clock, inbox)
    }

    /* ---------------------------------------------------------------- *
     * Faces
     * ---------------------------------------------------------------- */

    /// Registers `face` and starts listening to it.
    pub fn add_face(&mut self, face: Arc<dyn Face>) -> Result<FaceId> {
        let id = self.faces.add(face.clone())?;

        let inbox = self.inbox.clone();
        face.register_receive_callback(Some(Box::new(move |packet: Bytes| {
            if inbox.send(Inbound { face: id, packet }).is_err() {
                trace!("[Face {}] Forwarder gone, dropping packet", id.0);
            }
        })));

        info!("[Face {}] Added {}", id.0, face.description());
        Ok(id)
    }

    /// Unregisters `face`, purging every reference the PIT and FIB hold.
    pub fn remove_face(&mut self, face: &Arc<dyn Face>) -> Result<FaceId> {
        let id = self
            .faces
            .id_of(face)
            .ok_or_else(|| Error::UnknownFace(face.description()))?;
        self.remove_face_by_id(id)?;
        Ok(id)
    }

    pub fn remove_face_by_id(&mut self, id: FaceId) -> Result<()> {
        if self.faces.get(id).is_none() {
            return Err(Error::UnknownFace(id.to_string()));
        }

        let mut orphaned = Vec::new();
        for entry in self.pit.iter_mut() {
            entry.remove_all_references_to_face(id);

            // Nothing left to forward to once the only next hop goes away
            let only_next_hop = entry
                .fib_prefix()
                .and_then(|prefix| self.fib.entry(prefix))
                .map(|fib_entry| fib_entry.faces().len() == 1 && fib_entry.contains_face(id))
                .unwrap_or(false);
            if only_next_hop {
                orphaned.push(entry.name().clone());
            }
        }
        for name in &orphaned {
            debug!("[Face {}] Erasing PIT entry {}", id.0, name);
            self.pit.erase(name);
        }

        self.fib.remove_face(id);
        let record = self.faces.remove(id)?;
        record.face.register_receive_callback(None);
        self.metrics.pit_size.set(self.pit.len() as u64);

        info!("[Face {}] Removed {}", id.0, record.face.description());
        Ok(())
    }

    pub fn get_face(&self, id: FaceId) -> Option<&Arc<dyn Face>> {
        self.faces.get(id)
    }

    pub fn get_face_by_lower_layer_handle(&self, handle: &LowerLayerHandle) -> Option<&FaceRecord> {
        self.faces.get_by_lower_layer_handle(handle)
    }

    /* ---------------------------------------------------------------- *
     * Packet dispatch
     * ---------------------------------------------------------------- */

    pub fn handle(&mut self, inbound: Inbound) {
        self.receive(inbound.face, &inbound.packet);
    }

    /// Processes one packet received on `face`.
    pub fn receive(&mut self, face: FaceId, packet: &Bytes) {
        self.process_timers();

        if !self.faces.is_up(face) {
            trace!("[Face {}] Ignoring packet on unknown or down face", face.0);
            return;
        }

        match NdnPacket::from_bytes(packet) {
            Ok(NdnPacket::Interest(interest)) => match interest.nack {
                Some(code) => self.on_nack(face, interest, code),
                None => self.on_interest(face, interest, packet),
            },
            Ok(NdnPacket::Data(data)) => self.on_data(face, data, packet),
            Err(e) => {
                error!("[Face {}] Dropping malformed packet: {}", face.0, e);
                self.metrics.malformed_packets.increment();
            }
        }

        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    fn on_interest(&mut self, face: FaceId, interest: Interest, packet: &Bytes) {
        self.metrics.interests_received.increment();
        let now = self.clock.now();
        let name = interest.name.clone();
        debug!("[Face {}] Interest {} nonce {}", face.0, name, interest.nonce);

        if self.pit.lookup(&name).is_none() {
            let fib_prefix = self
                .fib
                .longest_prefix_match(&name)
                .map(|fib_entry| fib_entry.prefix.clone());
            let expiry = now + interest.lifetime();
            if let Err(e) = self.pit.create(name.clone(), expiry, fib_prefix) {
                debug!("[Face {}] Dropping Interest {}: {}", face.0, name, e);
                self.metrics.interests_dropped_pit_limit.increment();
                return;
            }
            self.schedule_entry_timer(name.clone(), expiry, 0);
        }

        let entry = match self.pit.get_mut(&name) {
            Some(entry) => entry,
            None => return,
        };
        // A pruning entry has no request in flight, whatever faces late
        // duplicates left behind.
        let is_new = entry.is_new() || entry.is_pruning();
        let has_upstream = !entry.outgoing().is_empty();
        let is_duplicated = !entry.add_seen_nonce(interest.nonce);
        let is_retransmitted = !entry.add_incoming(face, now);
        if interest.can_be_prefix && !is_duplicated {
            entry.allow_prefix_match();
        }
        if is_new && entry.fib_prefix().is_none() {
            let fib_prefix = self
                .fib
                .longest_prefix_match(&name)
                .map(|fib_entry| fib_entry.prefix.clone());
            entry.set_fib_prefix(fib_prefix);
        }

        if is_duplicated {
            debug!("[Face {}] Dropping duplicate Interest {} nonce {}", face.0, name, interest.nonce);
            self.metrics.interests_dropped_duplicated.increment();
            if self.config.nacks_enabled {
                self.send_nack(face, &interest, NackCode::Loop);
            }
            return;
        }

        if let Some(hit) = self.cs.lookup(&interest, now) {
            debug!("[Face {}] Interest {} satisfied from the content store", face.0, name);
            self.metrics.cs_hits.increment();
            self.satisfy_entry(&name, &hit.packet, now);
            return;
        }
        self.metrics.cs_misses.increment();

        self.refresh_lifetime(&name, now, interest.lifetime());

        let (from_upstream, fib_prefix) = match self.pit.lookup(&name) {
            Some(entry) => (
                entry.find_outgoing(face).is_some(),
                entry.fib_prefix().cloned(),
            ),
            None => return,
        };
        if from_upstream
            && self.config.upstream_request_policy == UpstreamRequestPolicy::MarkYellowAndPropagate
        {
            debug!("[Face {}] Upstream asked for {} itself", face.0, name);
            if let Some(prefix) = &fib_prefix {
                self.fib.update_status(prefix, face, FaceStatus::Yellow);
            }
        } else if !is_new && !is_retransmitted && has_upstream {
            debug!("[Face {}] Suppressing Interest {}, already pending", face.0, name);
            self.metrics.interests_dropped_suppressed.increment();
            return;
        }

        if self.propagate(face, &name, &interest, packet, now) {
            self.metrics.interests_forwarded.increment();
            return;
        }

        if is_retransmitted {
            if let Some(entry) = self.pit.get_mut(&name) {
                entry.increase_allowed_retx_count(
                    now,
                    self.config.retx_increment,
                    self.config.retx_min_interval(),
                );
            }
            if self.propagate(face, &name, &interest, packet, now) {
                self.metrics.interests_forwarded.increment();
                return;
            }
        }

        debug!("[Face {}] No face to forward Interest {} to", face.0, name);
        self.metrics.interests_dropped_no_faces.increment();
        self.give_up(&name, &interest, now);
    }

    fn on_data(&mut self, face: FaceId, data: Data, packet: &Bytes) {
        self.metrics.data_received.increment();
        let now = self.clock.now();
        debug!("[Face {}] Data {}", face.0, data.name);

        let matches = self.pit.find_matching(&data.name);
        if matches.is_empty() {
            self.on_unsolicited_data(face, &data, packet, now);
            return;
        }

        let mut solicited = Vec::new();
        let mut all_pruning = true;
        for name in matches {
            if let Some(entry) = self.pit.lookup(&name) {
                all_pruning &= entry.is_pruning();
                if let Some(outgoing) = entry.find_outgoing(face) {
                    solicited.push((name, outgoing.send_time, entry.fib_prefix().cloned()));
                }
            }
        }

        if solicited.is_empty() {
            if self.config.cache_unsolicited_data {
                self.cache(&data, packet, now);
            } else if all_pruning {
                debug!("[Face {}] Late Data {} for a satisfied entry", face.0, data.name);
                self.metrics.data_dropped_unsolicited.increment();
            } else {
                error!(
                    "PIT entry for {} is valid, but outgoing entry for face {} doesn't exist",
                    data.name, face.0
                );
                self.metrics.data_dropped_unsolicited.increment();
            }
            return;
        }

        self.cache(&data, packet, now);
        let mut served = HashSet::new();
        for (name, send_time, fib_prefix) in solicited {
            let rtt = now.saturating_duration_since(send_time);
            if let Some(prefix) = &fib_prefix {
                self.fib.update_rtt(prefix, face, rtt);
                self.fib.update_status(prefix, face, FaceStatus::Green);
            }
            self.metrics.rtt.observe(rtt.as_micros() as u64);

            let no_consumers = match self.pit.get_mut(&name) {
                Some(entry) => {
                    entry.remove_incoming(face);
                    // One copy per consumer even when several entries match
                    let already: Vec<FaceId> = entry
                        .incoming()
                        .iter()
                        .map(|record| record.face)
                        .filter(|consumer| served.contains(consumer))
                        .collect();
                    for consumer in already {
                        entry.remove_incoming(consumer);
                    }
                    served.extend(entry.incoming().iter().map(|record| record.face));
                    entry.incoming().is_empty()
                }
                None => continue,
            };
            if no_consumers {
                self.retire(&name, now);
            } else {
                self.satisfy_entry(&name, packet, now);
            }
        }
    }

    fn on_unsolicited_data(&mut self, face: FaceId, data: &Data, packet: &Bytes, now: Instant) {
        if self.config.cache_unsolicited_data {
            debug!("[Face {}] Caching unsolicited Data {}", face.0, data.name);
            self.cache(data, packet, now);
        } else {
            debug!("[Face {}] Dropping unsolicited Data {}", face.0, data.name);
            self.metrics.data_dropped_unsolicited.increment();
        }
    }

    fn on_nack(&mut self, face: FaceId, nack: Interest, code: NackCode) {
        self.metrics.nacks_received.increment();
        let now = self.clock.now();
        let name = nack.name.clone();

        let entry = match self.pit.get_mut(&name) {
            Some(entry) => entry,
            None => {
                debug!("[Face {}] Dropping NACK for {}: no PIT entry", face.0, name);
                self.metrics.nacks_dropped_stale.increment();
                return;
            }
        };
        if !entry.set_waiting_in_vain(face) {
            debug!("[Face {}] Dropping NACK for {}: Interest was not sent there", face.0, name);
            self.metrics.nacks_dropped_no_outgoing.increment();
            return;
        }

        warn!("[Face {}] Received {} for {}", face.0, code, name);
        if code == NackCode::GiveUpPit {
            entry.remove_incoming(face);
        }
        let no_consumers = entry.incoming().is_empty();
        let all_in_vain = entry.are_all_outgoing_in_vain();
        let fib_prefix = entry.fib_prefix().cloned();

        if let Some(prefix) = &fib_prefix {
            self.fib.update_status(prefix, face, FaceStatus::Yellow);
        }

        if no_consumers {
            self.metrics.nacks_dropped_after_satisfied.increment();
            return;
        }
        if !all_in_vain {
            self.metrics.nacks_dropped_suppressed.increment();
            return;
        }

        let interest = nack.with_nack(None);
        let wire = interest.to_wire();
        if !self.propagate(face, &name, &interest, &wire, now) {
            debug!("No alternative face for {} after {}", name, code);
            self.metrics.nacks_dropped_no_faces.increment();
            self.give_up(&name, &interest, now);
        }
    }

    /* ---------------------------------------------------------------- *
     * Entry transitions
     * ---------------------------------------------------------------- */

    /// Hands the entry to the strategy.
    fn propagate(
        &mut self,
        incoming: FaceId,
        name: &Name,
        interest: &Interest,
        packet: &Bytes,
        now: Instant,
    ) -> bool {
        let entry = match self.pit.get_mut(name) {
            Some(entry) => entry,
            None => return false,
        };
        let fib_entry = match entry.fib_prefix() {
            Some(prefix) => self.fib.entry(prefix),
            None => self.fib.longest_prefix_match(name),
        };
        let ctx = StrategyContext {
            fib_entry,
            faces: &self.faces,
            now,
            metrics: &self.metrics,
        };
        self.strategy
            .propagate_interest(&ctx, entry, incoming, interest, packet)
    }

    /// Sends `packet` once to every consumer, then retires the entry.
    fn satisfy_entry(&mut self, name: &Name, packet: &Bytes, now: Instant) {
        let consumers: Vec<FaceId> = match self.pit.lookup(name) {
            Some(entry) => entry.incoming().iter().map(|record| record.face).collect(),
            None => return,
        };

        for &face in &consumers {
            if self.send_to_face(face, packet) {
                self.metrics.data_sent.increment();
                self.metrics.interests_satisfied.increment();
            }
        }

        if !consumers.is_empty() {
            self.retire(name, now);
        }
    }

    /// Abandons the entry, telling consumers when NACKs are enabled.
    fn give_up(&mut self, name: &Name, interest: &Interest, now: Instant) {
        if self.config.nacks_enabled {
            let consumers: Vec<FaceId> = match self.pit.lookup(name) {
                Some(entry) => entry.incoming().iter().map(|record| record.face).collect(),
                None => Vec::new(),
            };
            for face in consumers {
                self.send_nack(face, interest, NackCode::GiveUpPit);
            }
        }
        self.retire(name, now);
    }

    /// Clears both face sets and starts the pruning window.
    fn retire(&mut self, name: &Name, now: Instant) {
        if let Some(entry) = self.pit.get_mut(name) {
            entry.clear_incoming();
            entry.clear_outgoing();
        }
        let expiry = now + self.config.pit_pruning_timeout();
        if let Some(generation) = self.pit.mark_erased(name, expiry) {
            self.schedule_entry_timer(name.clone(), expiry, generation);
        }
    }

    fn refresh_lifetime(&mut self, name: &Name, now: Instant, lifetime: Duration) {
        let refreshed = self
            .pit
            .get_mut(name)
            .and_then(|entry| entry.update_lifetime(now, lifetime).map(|g| (entry.expiry(), g)));
        if let Some((expiry, generation)) = refreshed {
            self.schedule_entry_timer(name.clone(), expiry, generation);
        }
    }

    fn cache(&mut self, data: &Data, packet: &Bytes, now: Instant) {
        self.cs.insert(data, packet, now);
        self.metrics.cs_inserts.increment();
    }

    /* ---------------------------------------------------------------- *
     * Timers
     * ---------------------------------------------------------------- */

    fn schedule_entry_timer(&mut self, name: Name, deadline: Instant, generation: u64) {
        self.timers
            .schedule(deadline, TimerEvent::PitEntry { name, generation });
    }

    /// Runs every timer due at the current time.
    pub fn process_timers(&mut self) {
        let now = self.clock.now();
        while let Some(event) = self.timers.pop_due(now) {
            match event {
                TimerEvent::PitEntry { name, generation } => {
                    self.on_entry_timer(&name, generation, now)
                }
            }
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    fn on_entry_timer(&mut self, name: &Name, generation: u64, now: Instant) {
        let entry = match self.pit.get_mut(name) {
            Some(entry) if entry.generation() == generation => entry,
            _ => return,
        };

        if entry.is_pruning() {
            trace!("Pruning PIT entry {}", name);
            self.pit.erase(name);
            return;
        }

        debug!("PIT entry {} expired with {} consumers", name, entry.incoming().len());
        self.metrics.interests_timed_out.increment();
        self.strategy.will_erase_pending_interest(entry);
        self.retire(name, now);
    }

    /// Deadline of the next timer, for the runtime to sleep until.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /* ---------------------------------------------------------------- *
     * Sending
     * ---------------------------------------------------------------- */

    fn send_to_face(&self, face: FaceId, packet: &Bytes) -> bool {
        let handle = match self.faces.get(face) {
            Some(handle) => handle,
            None => return false,
        };
        match handle.send(packet.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("[Face {}] Send failed: {}", face.0, e);
                self.metrics.send_failures.increment();
                false
            }
        }
    }

    fn send_nack(&self, face: FaceId, interest: &Interest, code: NackCode) {
        let nack = interest.clone().with_nack(Some(code));
        if self.send_to_face(face, &nack.to_wire()) {
            debug!("[Face {}] Sent {} for {}", face.0, code, interest.name);
            self.metrics.nacks_sent.increment();
        }
    }

    /* ---------------------------------------------------------------- *
     * Accessors
     * ---------------------------------------------------------------- */

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn fib(&self) -> &dyn Fib {
        self.fib.as_ref()
    }

    pub fn fib_mut(&mut self) -> &mut dyn Fib {
        self.fib.as_mut()
    }

    pub fn content_store(&self) -> &dyn ContentStore {
        self.cs.as_ref()
    }

    pub fn faces(&self) -> &FaceRegistry {
        &self.faces
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn metrics(&self) -> Arc<ForwarderMetrics> {
        self.metrics.clone()
    }
}
