//! FIB (Forwarding Information Base).
//!
//! Maps name prefixes to the faces Interests may be forwarded on, together
//! with the per-face quality the forwarding engine feeds back: status color,
//! routing cost and an RTT estimate.

use rust_ndnfw_common::{
    ndn::Name,
    types::{FaceId, FaceStatus},
};
use std::collections::HashMap;
use std::time::Duration;

/// Quality of one next hop under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibFaceMetric {
    pub face: FaceId,
    pub status: FaceStatus,
    pub cost: u8,
    /// Smoothed round-trip time, unset until the first sample
    pub srtt: Option<Duration>,
    pub rttvar: Option<Duration>,
}

impl FibFaceMetric {
    pub fn new(face: FaceId, cost: u8) -> Self {
        Self {
            face,
            status: FaceStatus::Green,
            cost,
            srtt: None,
            rttvar: None,
        }
    }

    /// Folds an RTT sample into the estimate (RFC 6298 smoothing).
    pub fn add_rtt_sample(&mut self, rtt: Duration) {
        match (self.srtt, self.rttvar) {
            (Some(srtt), Some(rttvar)) => {
                let delta = if srtt > rtt { srtt - rtt } else { rtt - srtt };
                self.rttvar = Some(rttvar * 3 / 4 + delta / 4);
                self.srtt = Some(srtt * 7 / 8 + rtt / 8);
            }
            _ => {
                self.srtt = Some(rtt);
                self.rttvar = Some(rtt / 2);
            }
        }
    }

    fn rank(&self) -> (FaceStatus, u8, Duration) {
        (self.status, self.cost, self.srtt.unwrap_or(Duration::MAX))
    }
}

/// Next hops registered for a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibEntry {
    pub prefix: Name,
    faces: Vec<FibFaceMetric>,
}

impl FibEntry {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            faces: Vec::new(),
        }
    }

    /// Faces in registration order.
    pub fn faces(&self) -> &[FibFaceMetric] {
        &self.faces
    }

    /// Faces best first: status, then cost, then smoothed RTT.
    pub fn ordered_faces(&self) -> Vec<&FibFaceMetric> {
        let mut faces: Vec<&FibFaceMetric> = self.faces.iter().collect();
        faces.sort_by_key(|metric| metric.rank());
        faces
    }

    pub fn metric(&self, face: FaceId) -> Option<&FibFaceMetric> {
        self.faces.iter().find(|metric| metric.face == face)
    }

    pub fn metric_mut(&mut self, face: FaceId) -> Option<&mut FibFaceMetric> {
        self.faces.iter_mut().find(|metric| metric.face == face)
    }

    pub fn contains_face(&self, face: FaceId) -> bool {
        self.metric(face).is_some()
    }

    /// Adds `face` or updates its cost.
    pub fn add_face(&mut self, face: FaceId, cost: u8) {
        match self.metric_mut(face) {
            Some(metric) => metric.cost = cost,
            None => self.faces.push(FibFaceMetric::new(face, cost)),
        }
    }

    pub fn remove_face(&mut self, face: FaceId) -> bool {
        let before = self.faces.len();
        self.faces.retain(|metric| metric.face != face);
        self.faces.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Routing table consulted by the forwarding engine and strategies.
pub trait Fib: Send {
    /// Entry with the longest prefix of `name`.
    fn longest_prefix_match(&self, name: &Name) -> Option<&FibEntry>;

    /// Entry registered exactly under `prefix`.
    fn entry(&self, prefix: &Name) -> Option<&FibEntry>;

    fn add_route(&mut self, prefix: Name, face: FaceId, cost: u8);

    fn update_status(&mut self, prefix: &Name, face: FaceId, status: FaceStatus);

    fn update_rtt(&mut self, prefix: &Name, face: FaceId, rtt: Duration);

    /// Drops `face` from every entry; entries left without faces disappear.
    fn remove_face(&mut self, face: FaceId);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash map backed FIB.
#[derive(Debug, Default)]
pub struct MemoryFib {
    entries: HashMap<Name, FibEntry>,
}

impl MemoryFib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FibEntry> {
        self.entries.values()
    }
}

impl Fib for MemoryFib {
    fn longest_prefix_match(&self, name: &Name) -> Option<&FibEntry> {
        (0..=name.len())
            .rev()
            .find_map(|len| self.entries.get(&name.prefix(len)))
    }

    fn entry(&self, prefix: &Name) -> Option<&FibEntry> {
        self.entries.get(prefix)
    }

    fn add_route(&mut self, prefix: Name, face: FaceId, cost: u8) {
        log::debug!("FIB: {} -> {} (cost {})", prefix, face, cost);
        self.entries
            .entry(prefix.clone())
            .or_insert_with(|| FibEntry::new(prefix))
            .add_face(face, cost);
    }

    fn update_status(&mut self, prefix: &Name, face: FaceId, status: FaceStatus) {
        if let Some(metric) = self
            .entries
            .get_mut(prefix)
            .and_then(|entry| entry.metric_mut(face))
        {
            if metric.status != status {
                log::debug!("FIB: {} via {} is now {}", prefix, face, status);
            }
            metric.status = status;
        }
    }

    fn update_rtt(&mut self, prefix: &Name, face: FaceId, rtt: Duration) {
        if let Some(metric) = self
            .entries
            .get_mut(prefix)
            .and_then(|entry| entry.metric_mut(face))
        {
            metric.add_rtt_sample(rtt);
        }
    }

    fn remove_face(&mut self, face: FaceId) {
        for entry in self.entries.values_mut() {
            entry.remove_face(face);
        }
        self.entries.retain(|_, entry| !entry.is_empty());
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_string(s)
    }

    #[test]
    fn test_longest_prefix_match() {
        let mut fib = MemoryFib::new();
        fib.add_route(name("/"), FaceId(0), 10);
        fib.add_route(name("/a"), FaceId(1), 10);
        fib.add_route(name("/a/b"), FaceId(2), 10);

        let entry = fib.longest_prefix_match(&name("/a/b/c")).unwrap();
        assert_eq!(entry.prefix, name("/a/b"));
        let entry = fib.longest_prefix_match(&name("/a/x")).unwrap();
        assert_eq!(entry.prefix, name("/a"));
        let entry = fib.longest_prefix_match(&name("/z")).unwrap();
        assert_eq!(entry.prefix, name("/"));
    }

    #[test]
    fn test_no_match_without_default_route() {
        let mut fib = MemoryFib::new();
        fib.add_route(name("/a"), FaceId(1), 10);
        assert!(fib.longest_prefix_match(&name("/b")).is_none());
    }

    #[test]
    fn test_ordering_prefers_status_then_cost_then_rtt() {
        let mut fib = MemoryFib::new();
        let prefix = name("/a");
        fib.add_route(prefix.clone(), FaceId(1), 5);
        fib.add_route(prefix.clone(), FaceId(2), 10);
        fib.add_route(prefix.clone(), FaceId(3), 10);
        fib.update_rtt(&prefix, FaceId(2), Duration::from_millis(50));
        fib.update_rtt(&prefix, FaceId(3), Duration::from_millis(20));

        let order: Vec<FaceId> = fib
            .entry(&prefix)
            .unwrap()
            .ordered_faces()
            .iter()
            .map(|metric| metric.face)
            .collect();
        assert_eq!(order, vec![FaceId(1), FaceId(3), FaceId(2)]);

        fib.update_status(&prefix, FaceId(1), FaceStatus::Yellow);
        let best = fib.entry(&prefix).unwrap().ordered_faces()[0].face;
        assert_eq!(best, FaceId(3));
    }

    #[test]
    fn test_rtt_smoothing() {
        let mut metric = FibFaceMetric::new(FaceId(1), 0);
        metric.add_rtt_sample(Duration::from_millis(80));
        assert_eq!(metric.srtt, Some(Duration::from_millis(80)));
        assert_eq!(metric.rttvar, Some(Duration::from_millis(40)));

        metric.add_rtt_sample(Duration::from_millis(160));
        assert_eq!(metric.srtt, Some(Duration::from_millis(90)));
        assert_eq!(metric.rttvar, Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_remove_face_drops_empty_entries() {
        let mut fib = MemoryFib::new();
        fib.add_route(name("/a"), FaceId(1), 10);
        fib.add_route(name("/b"), FaceId(1), 10);
        fib.add_route(name("/b"), FaceId(2), 10);

        fib.remove_face(FaceId(1));
        assert!(fib.entry(&name("/a")).is_none());
        let entry = fib.entry(&name("/b")).unwrap();
        assert!(!entry.contains_face(FaceId(1)));
        assert!(entry.contains_face(FaceId(2)));
        assert_eq!(fib.len(), 1);
    }
}
