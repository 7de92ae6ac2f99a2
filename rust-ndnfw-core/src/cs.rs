//! Content Store (CS).
//!
//! Caches Data packets so later Interests for the same content can be
//! answered locally. The engine stores the decoded Data alongside the
//! original wire packet, which is what gets sent back to consumers.

use bytes::Bytes;
use rust_ndnfw_common::ndn::{Data, Interest, Name};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// A cached Data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsEntry {
    pub data: Data,
    /// The packet exactly as it was received
    pub packet: Bytes,
    pub inserted_at: Instant,
}

impl CsEntry {
    /// Whether the entry is still within its freshness period at `now`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.inserted_at + self.data.freshness_period()
    }

    fn satisfies(&self, interest: &Interest, now: Instant) -> bool {
        self.data.matches(interest) && (!interest.must_be_fresh || self.is_fresh(now))
    }
}

/// Cache of Data packets keyed by name.
pub trait ContentStore: Send {
    /// Finds a cached packet able to satisfy `interest`.
    fn lookup(&mut self, interest: &Interest, now: Instant) -> Option<CsEntry>;

    /// Caches `data`, whose wire form is `packet`.
    fn insert(&mut self, data: &Data, packet: &Bytes, now: Instant);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-memory store with least-recently-used eviction.
#[derive(Debug)]
pub struct MemoryContentStore {
    entries: HashMap<Name, CsEntry>,
    /// Names from least to most recently used
    recency: VecDeque<Name>,
    capacity: usize,
}

impl MemoryContentStore {
    /// Creates a store for at most `capacity` packets; 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    fn touch(&mut self, name: &Name) {
        if let Some(pos) = self.recency.iter().position(|n| n == name) {
            if let Some(name) = self.recency.remove(pos) {
                self.recency.push_back(name);
            }
        }
    }

    fn evict(&mut self) {
        while self.entries.len() >= self.capacity {
            match self.recency.pop_front() {
                Some(oldest) => {
                    log::trace!("CS: evicting {}", oldest);
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

impl ContentStore for MemoryContentStore {
    fn lookup(&mut self, interest: &Interest, now: Instant) -> Option<CsEntry> {
        if self.capacity == 0 {
            return None;
        }

        let found = if interest.can_be_prefix {
            self.entries
                .values()
                .find(|entry| entry.satisfies(interest, now))
                .cloned()
        } else {
            self.entries
                .get(&interest.name)
                .filter(|entry| entry.satisfies(interest, now))
                .cloned()
        };

        if let Some(entry) = &found {
            self.touch(&entry.data.name);
        }
        found
    }

    fn insert(&mut self, data: &Data, packet: &Bytes, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        if self.entries.contains_key(&data.name) {
            self.touch(&data.name);
        } else {
            self.evict();
            self.recency.push_back(data.name.clone());
        }

        self.entries.insert(
            data.name.clone(),
            CsEntry {
                data: data.clone(),
                packet: packet.clone(),
                inserted_at: now,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn data(name: &str, freshness_ms: u32) -> (Data, Bytes) {
        let data = Data::new(Name::from_string(name), Bytes::from_static(b"payload"))
            .with_freshness(freshness_ms);
        let wire = data.to_wire();
        (data, wire)
    }

    fn interest(name: &str) -> Interest {
        Interest::new(Name::from_string(name)).with_nonce(1)
    }

    #[test]
    fn test_exact_and_prefix_lookup() {
        let now = Instant::now();
        let mut cs = MemoryContentStore::new(8);
        let (d, wire) = data("/a/b/c", 1000);
        cs.insert(&d, &wire, now);

        let hit = cs.lookup(&interest("/a/b/c"), now).unwrap();
        assert_eq!(hit.packet, wire);
        assert!(cs.lookup(&interest("/a/b"), now).is_none());
        assert!(cs
            .lookup(&interest("/a/b").with_can_be_prefix(true), now)
            .is_some());
    }

    #[test]
    fn test_must_be_fresh() {
        let now = Instant::now();
        let mut cs = MemoryContentStore::new(8);
        let (d, wire) = data("/a", 100);
        cs.insert(&d, &wire, now);

        let later = now + Duration::from_millis(200);
        let fresh_only = interest("/a").with_must_be_fresh(true);
        assert!(cs.lookup(&fresh_only, now).is_some());
        assert!(cs.lookup(&fresh_only, later).is_none());
        assert!(cs.lookup(&interest("/a"), later).is_some());
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let now = Instant::now();
        let mut cs = MemoryContentStore::new(2);
        for name in ["/a", "/b"] {
            let (d, wire) = data(name, 1000);
            cs.insert(&d, &wire, now);
        }
        assert!(cs.lookup(&interest("/a"), now).is_some());

        let (d, wire) = data("/c", 1000);
        cs.insert(&d, &wire, now);
        assert_eq!(cs.len(), 2);
        assert!(cs.contains(&Name::from_string("/a")));
        assert!(!cs.contains(&Name::from_string("/b")));
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let now = Instant::now();
        let mut cs = MemoryContentStore::new(0);
        let (d, wire) = data("/a", 1000);
        cs.insert(&d, &wire, now);
        assert!(cs.is_empty());
        assert!(cs.lookup(&interest("/a"), now).is_none());
    }
}
