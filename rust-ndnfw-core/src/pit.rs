//! PIT (Pending Interest Table).
//!
//! Entries live in an arena keyed by name. Everything outside the table
//! (timers, face removal, the Data and NACK handlers) refers to an entry by
//! its name and re-looks it up, so no entry is ever shared.

use rust_ndnfw_common::{ndn::Name, types::FaceId, Error, Result};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// A consumer waiting for Data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFace {
    pub face: FaceId,
    pub arrival_time: Instant,
}

/// An upstream face the Interest was forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFace {
    pub face: FaceId,
    pub send_time: Instant,
    /// Number of times the Interest was re-sent on this face.
    pub retx_count: u32,
    /// Set when the face answered with a NACK.
    pub waiting_in_vain: bool,
}

/// Where an entry is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for Data until `expiry`.
    Pending,
    /// Satisfied or abandoned; kept until `expiry` to recognise late duplicates.
    Pruning,
}

/// One outstanding request for a content name.
#[derive(Debug, Clone)]
pub struct PitEntry {
    name: Name,
    incoming: Vec<IncomingFace>,
    outgoing: Vec<OutgoingFace>,
    seen_nonces: HashSet<u32>,
    allowed_retx_count: u32,
    last_retx_increase: Option<Instant>,
    expiry: Instant,
    state: EntryState,
    generation: u64,
    fib_prefix: Option<Name>,
    can_be_prefix: bool,
}

impl PitEntry {
    fn new(name: Name, expiry: Instant, fib_prefix: Option<Name>) -> Self {
        Self {
            name,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            seen_nonces: HashSet::new(),
            allowed_retx_count: 0,
            last_retx_increase: None,
            expiry,
            state: EntryState::Pending,
            generation: 0,
            fib_prefix,
            can_be_prefix: false,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn incoming(&self) -> &[IncomingFace] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[OutgoingFace] {
        &self.outgoing
    }

    pub fn expiry(&self) -> Instant {
        self.expiry
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_pruning(&self) -> bool {
        self.state == EntryState::Pruning
    }

    /// Bumped on every expiry change; timers carry the generation they were
    /// scheduled for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Key of the FIB entry supplying candidate faces.
    pub fn fib_prefix(&self) -> Option<&Name> {
        self.fib_prefix.as_ref()
    }

    pub fn set_fib_prefix(&mut self, prefix: Option<Name>) {
        self.fib_prefix = prefix;
    }

    /// True when nobody waits and nothing was forwarded yet.
    pub fn is_new(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }

    /// Whether Data with a longer name may satisfy this entry.
    pub fn can_be_prefix(&self) -> bool {
        self.can_be_prefix
    }

    /// Set once any pending Interest for the name carried CanBePrefix.
    pub fn allow_prefix_match(&mut self) {
        self.can_be_prefix = true;
    }

    /* ---------------------------- nonces ---------------------------- */

    pub fn is_nonce_seen(&self, nonce: u32) -> bool {
        self.seen_nonces.contains(&nonce)
    }

    /// Records `nonce`; returns false if it had been seen already.
    pub fn add_seen_nonce(&mut self, nonce: u32) -> bool {
        self.seen_nonces.insert(nonce)
    }

    pub fn seen_nonce_count(&self) -> usize {
        self.seen_nonces.len()
    }

    /* --------------------------- incoming --------------------------- */

    pub fn find_incoming(&self, face: FaceId) -> Option<&IncomingFace> {
        self.incoming.iter().find(|record| record.face == face)
    }

    /// Adds a consumer; returns false if the face was already waiting.
    pub fn add_incoming(&mut self, face: FaceId, now: Instant) -> bool {
        if self.find_incoming(face).is_some() {
            return false;
        }
        self.incoming.push(IncomingFace {
            face,
            arrival_time: now,
        });
        true
    }

    pub fn remove_incoming(&mut self, face: FaceId) -> bool {
        let before = self.incoming.len();
        self.incoming.retain(|record| record.face != face);
        self.incoming.len() != before
    }

    pub fn clear_incoming(&mut self) {
        self.incoming.clear();
    }

    /* --------------------------- outgoing --------------------------- */

    pub fn find_outgoing(&self, face: FaceId) -> Option<&OutgoingFace> {
        self.outgoing.iter().find(|record| record.face == face)
    }

    /// Records a send on `face`. A repeated send refreshes the send time,
    /// counts a retransmission and clears the waiting-in-vain flag.
    pub fn add_outgoing(&mut self, face: FaceId, now: Instant) {
        match self.outgoing.iter_mut().find(|record| record.face == face) {
            Some(record) => {
                record.send_time = now;
                record.retx_count += 1;
                record.waiting_in_vain = false;
            }
            None => self.outgoing.push(OutgoingFace {
                face,
                send_time: now,
                retx_count: 0,
                waiting_in_vain: false,
            }),
        }
    }

    /// Whether the strategy may (re)send on `face` under the current budget.
    pub fn can_send_to(&self, face: FaceId) -> bool {
        match self.find_outgoing(face) {
            Some(record) => record.retx_count < self.allowed_retx_count,
            None => true,
        }
    }

    pub fn set_waiting_in_vain(&mut self, face: FaceId) -> bool {
        match self.outgoing.iter_mut().find(|record| record.face == face) {
            Some(record) => {
                record.waiting_in_vain = true;
                true
            }
            None => false,
        }
    }

    pub fn are_all_outgoing_in_vain(&self) -> bool {
        self.outgoing.iter().all(|record| record.waiting_in_vain)
    }

    pub fn clear_outgoing(&mut self) {
        self.outgoing.clear();
    }

    /* ------------------------ retransmissions ----------------------- */

    pub fn allowed_retx_count(&self) -> u32 {
        self.allowed_retx_count
    }

    /// Raises the retransmission budget by `increment`, at most once per
    /// `min_interval`. Returns whether the budget changed.
    pub fn increase_allowed_retx_count(
        &mut self,
        now: Instant,
        increment: u32,
        min_interval: Duration,
    ) -> bool {
        if let Some(last) = self.last_retx_increase {
            if now.saturating_duration_since(last) < min_interval {
                return false;
            }
        }
        self.allowed_retx_count = self.allowed_retx_count.saturating_add(increment);
        self.last_retx_increase = Some(now);
        true
    }

    /* --------------------------- lifetime --------------------------- */

    /// Extends the expiry to `now + lifetime` (never shortens it) and
    /// revives an entry that was being pruned. Returns the new generation
    /// when the deadline moved.
    pub fn update_lifetime(&mut self, now: Instant, lifetime: Duration) -> Option<u64> {
        let new_expiry = now + lifetime;
        let revived = self.state == EntryState::Pruning;
        if !revived && new_expiry <= self.expiry {
            return None;
        }
        self.state = EntryState::Pending;
        self.expiry = if revived { new_expiry } else { new_expiry.max(self.expiry) };
        self.generation += 1;
        Some(self.generation)
    }

    /// Moves the entry into its pruning window. Returns the new generation.
    fn mark_pruning(&mut self, expiry: Instant) -> u64 {
        self.state = EntryState::Pruning;
        self.can_be_prefix = false;
        self.expiry = expiry;
        self.generation += 1;
        self.generation
    }

    /// Drops `face` from both the consumer and the upstream sets.
    pub fn remove_all_references_to_face(&mut self, face: FaceId) {
        self.incoming.retain(|record| record.face != face);
        self.outgoing.retain(|record| record.face != face);
    }
}

/// The table of outstanding Interests.
#[derive(Debug, Default)]
pub struct Pit {
    entries: HashMap<Name, PitEntry>,
    max_size: usize,
}

impl Pit {
    /// Creates a table holding at most `max_size` entries (0 = unlimited).
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size,
        }
    }

    pub fn lookup(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut PitEntry> {
        self.entries.get_mut(name)
    }

    /// Names of every entry `data_name` satisfies, longest first: the exact
    /// name, then each shorter prefix whose entry accepts prefix matches.
    pub fn find_matching(&self, data_name: &Name) -> Vec<Name> {
        (0..=data_name.len())
            .rev()
            .map(|len| data_name.prefix(len))
            .filter(|prefix| match self.entries.get(prefix) {
                Some(entry) => prefix.len() == data_name.len() || entry.can_be_prefix(),
                None => false,
            })
            .collect()
    }

    /// Creates a pending entry expiring at `expiry`.
    pub fn create(
        &mut self,
        name: Name,
        expiry: Instant,
        fib_prefix: Option<Name>,
    ) -> Result<&mut PitEntry> {
        if self.max_size > 0 && self.entries.len() >= self.max_size {
            return Err(Error::PitCapacityExceeded(self.max_size));
        }
        let entry = PitEntry::new(name.clone(), expiry, fib_prefix);
        Ok(self.entries.entry(name).or_insert(entry))
    }

    /// Starts the pruning window of an entry. Returns the generation the
    /// prune timer must carry, or `None` if the entry is gone.
    pub fn mark_erased(&mut self, name: &Name, expiry: Instant) -> Option<u64> {
        self.entries
            .get_mut(name)
            .map(|entry| entry.mark_pruning(expiry))
    }

    /// Physically removes an entry.
    pub fn erase(&mut self, name: &Name) -> Option<PitEntry> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PitEntry> {
        self.entries.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_string(s)
    }

    #[test]
    fn test_faces_are_unique_per_entry() {
        let now = Instant::now();
        let mut pit = Pit::new(0);
        let entry = pit.create(name("/a/b"), now, None).unwrap();

        assert!(entry.is_new());
        assert!(entry.add_incoming(FaceId(1), now));
        assert!(!entry.add_incoming(FaceId(1), now));
        entry.add_outgoing(FaceId(2), now);
        entry.add_outgoing(FaceId(2), now);

        assert_eq!(entry.incoming().len(), 1);
        assert_eq!(entry.outgoing().len(), 1);
        assert_eq!(entry.find_outgoing(FaceId(2)).unwrap().retx_count, 1);
        assert!(!entry.is_new());
    }

    #[test]
    fn test_nonce_set_only_grows() {
        let now = Instant::now();
        let mut pit = Pit::new(0);
        let entry = pit.create(name("/a"), now, None).unwrap();

        assert!(entry.add_seen_nonce(5));
        assert!(!entry.add_seen_nonce(5));
        assert!(entry.add_seen_nonce(6));
        entry.clear_incoming();
        entry.clear_outgoing();
        assert_eq!(entry.seen_nonce_count(), 2);
        assert!(entry.is_nonce_seen(5));
    }

    #[test]
    fn test_data_matches_exact_and_prefix_entries() {
        let now = Instant::now();
        let mut pit = Pit::new(0);
        pit.create(name("/a/v1"), now, None).unwrap();
        pit.create(name("/a"), now, None).unwrap();
        pit.create(name("/b"), now, None).unwrap();

        // "/a" only matches longer names once an Interest allowed it
        assert_eq!(pit.find_matching(&name("/a/v1")), vec![name("/a/v1")]);
        pit.get_mut(&name("/a")).unwrap().allow_prefix_match();
        assert_eq!(
            pit.find_matching(&name("/a/v1")),
            vec![name("/a/v1"), name("/a")]
        );
        assert_eq!(pit.find_matching(&name("/a")), vec![name("/a")]);
        assert!(pit.find_matching(&name("/c/d")).is_empty());

        pit.mark_erased(&name("/a"), now);
        assert!(!pit.lookup(&name("/a")).unwrap().can_be_prefix());
    }

    #[test]
    fn test_capacity_limit() {
        let now = Instant::now();
        let mut pit = Pit::new(1);
        pit.create(name("/a"), now, None).unwrap();
        assert!(matches!(
            pit.create(name("/b"), now, None),
            Err(Error::PitCapacityExceeded(1))
        ));
    }

    #[test]
    fn test_waiting_in_vain() {
        let now = Instant::now();
        let mut pit = Pit::new(0);
        let entry = pit.create(name("/a"), now, None).unwrap();
        entry.add_outgoing(FaceId(1), now);
        entry.add_outgoing(FaceId(2), now);

        assert!(entry.set_waiting_in_vain(FaceId(1)));
        assert!(!entry.are_all_outgoing_in_vain());
        assert!(entry.set_waiting_in_vain(FaceId(2)));
        assert!(entry.are_all_outgoing_in_vain());
        assert!(!entry.set_waiting_in_vain(FaceId(3)));

        entry.add_outgoing(FaceId(2), now);
        assert!(!entry.are_all_outgoing_in_vain());
    }

    #[test]
    fn test_retx_budget_gates_resends() {
        let now = Instant::now();
        let mut pit = Pit::new(0);
        let entry = pit.create(name("/a"), now, None).unwrap();
        entry.add_outgoing(FaceId(1), now);
        assert!(!entry.can_send_to(FaceId(1)));
        assert!(entry.can_send_to(FaceId(2)));

        let interval = Duration::from_millis(100);
        assert!(entry.increase_allowed_retx_count(now, 1, interval));
        assert!(entry.can_send_to(FaceId(1)));
        assert!(!entry.increase_allowed_retx_count(now + Duration::from_millis(50), 1, interval));
        assert!(entry.increase_allowed_retx_count(now + interval, 1, interval));
        assert_eq!(entry.allowed_retx_count(), 2);
    }

    #[test]
    fn test_lifetime_never_shrinks_and_revives_pruned_entries() {
        let now = Instant::now();
        let mut pit = Pit::new(0);
        let expiry = now + Duration::from_secs(4);
        pit.create(name("/a"), expiry, None).unwrap();

        let entry = pit.get_mut(&name("/a")).unwrap();
        assert_eq!(entry.update_lifetime(now, Duration::from_secs(1)), None);
        assert_eq!(entry.expiry(), expiry);
        assert_eq!(entry.update_lifetime(now, Duration::from_secs(6)), Some(1));

        let generation = pit.mark_erased(&name("/a"), now + Duration::from_millis(100)).unwrap();
        assert_eq!(generation, 2);
        let entry = pit.get_mut(&name("/a")).unwrap();
        assert!(entry.is_pruning());

        assert_eq!(entry.update_lifetime(now, Duration::from_secs(1)), Some(3));
        assert_eq!(entry.state(), EntryState::Pending);
        assert_eq!(entry.expiry(), now + Duration::from_secs(1));
    }

    #[test]
    fn test_remove_all_references_to_face() {
        let now = Instant::now();
        let mut pit = Pit::new(0);
        let entry = pit.create(name("/a"), now, None).unwrap();
        entry.add_incoming(FaceId(1), now);
        entry.add_incoming(FaceId(2), now);
        entry.add_outgoing(FaceId(1), now);

        entry.remove_all_references_to_face(FaceId(1));
        assert!(entry.find_incoming(FaceId(1)).is_none());
        assert!(entry.find_outgoing(FaceId(1)).is_none());
        assert!(entry.find_incoming(FaceId(2)).is_some());
    }
}
