//! Metrics collection and reporting for the forwarding plane.
//!
//! Every anomaly in the forwarding engine degrades to drop-and-count; the
//! counters below are where those drops end up.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic event count.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Last-written level, such as the current PIT size.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, level: u64) {
        self.0.store(level, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Distribution of observed values over fixed upper bounds. Bucket `i`
/// holds values in `(bounds[i-1], bounds[i]]`; a final bucket takes
/// everything above the last bound.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<u64>,
    buckets: Vec<AtomicU64>,
    total: AtomicU64,
    samples: AtomicU64,
}

impl Histogram {
    pub fn new(mut bounds: Vec<u64>) -> Self {
        bounds.sort_unstable();
        bounds.dedup();
        Self {
            buckets: (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect(),
            bounds,
            total: AtomicU64::new(0),
            samples: AtomicU64::new(0),
        }
    }

    /// Buckets suited to round-trip times in microseconds (10µs .. 10s).
    pub fn for_rtt() -> Self {
        Self::new(vec![10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }

    pub fn observe(&self, value: u64) {
        let bucket = self.bounds.partition_point(|&bound| bound < value);
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(value, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn average(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.total.load(Ordering::Relaxed) as f64 / n as f64,
        }
    }

    /// Per-bucket counts keyed by upper bound, `None` for the overflow bucket.
    pub fn buckets(&self) -> Vec<(Option<u64>, u64)> {
        self.bounds
            .iter()
            .map(|&bound| Some(bound))
            .chain(std::iter::once(None))
            .zip(&self.buckets)
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Everything the forwarding engine counts, shared behind an `Arc`.
#[derive(Debug)]
pub struct ForwarderMetrics {
    // Interests
    pub interests_received: Counter,
    pub interests_forwarded: Counter,
    /// Number of Interest copies handed to faces
    pub interests_sent: Counter,
    pub interests_satisfied: Counter,
    pub interests_timed_out: Counter,
    pub interests_dropped_duplicated: Counter,
    pub interests_dropped_suppressed: Counter,
    pub interests_dropped_pit_limit: Counter,
    pub interests_dropped_no_faces: Counter,

    // Data
    pub data_received: Counter,
    pub data_sent: Counter,
    pub data_dropped_unsolicited: Counter,

    // Nacks
    pub nacks_received: Counter,
    pub nacks_sent: Counter,
    pub nacks_dropped_stale: Counter,
    pub nacks_dropped_no_outgoing: Counter,
    pub nacks_dropped_after_satisfied: Counter,
    pub nacks_dropped_suppressed: Counter,
    pub nacks_dropped_no_faces: Counter,

    // Cache metrics
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub cs_inserts: Counter,

    // PIT metrics
    pub pit_size: Gauge,

    // Anomalies
    pub malformed_packets: Counter,
    pub send_failures: Counter,

    /// Round-trip time of solicited Data, in microseconds
    pub rtt: Histogram,
}

impl Default for ForwarderMetrics {
    fn default() -> Self {
        Self {
            interests_received: Counter::new(),
            interests_forwarded: Counter::new(),
            interests_sent: Counter::new(),
            interests_satisfied: Counter::new(),
            interests_timed_out: Counter::new(),
            interests_dropped_duplicated: Counter::new(),
            interests_dropped_suppressed: Counter::new(),
            interests_dropped_pit_limit: Counter::new(),
            interests_dropped_no_faces: Counter::new(),
            data_received: Counter::new(),
            data_sent: Counter::new(),
            data_dropped_unsolicited: Counter::new(),
            nacks_received: Counter::new(),
            nacks_sent: Counter::new(),
            nacks_dropped_stale: Counter::new(),
            nacks_dropped_no_outgoing: Counter::new(),
            nacks_dropped_after_satisfied: Counter::new(),
            nacks_dropped_suppressed: Counter::new(),
            nacks_dropped_no_faces: Counter::new(),
            cs_hits: Counter::new(),
            cs_misses: Counter::new(),
            cs_inserts: Counter::new(),
            pit_size: Gauge::new(),
            malformed_packets: Counter::new(),
            send_failures: Counter::new(),
            rtt: Histogram::for_rtt(),
        }
    }
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of every counter, suitable for reporting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            interests_received: self.interests_received.value(),
            interests_forwarded: self.interests_forwarded.value(),
            interests_sent: self.interests_sent.value(),
            interests_satisfied: self.interests_satisfied.value(),
            interests_timed_out: self.interests_timed_out.value(),
            interests_dropped_duplicated: self.interests_dropped_duplicated.value(),
            interests_dropped_suppressed: self.interests_dropped_suppressed.value(),
            interests_dropped_pit_limit: self.interests_dropped_pit_limit.value(),
            interests_dropped_no_faces: self.interests_dropped_no_faces.value(),
            data_received: self.data_received.value(),
            data_sent: self.data_sent.value(),
            data_dropped_unsolicited: self.data_dropped_unsolicited.value(),
            nacks_received: self.nacks_received.value(),
            nacks_sent: self.nacks_sent.value(),
            nacks_dropped_stale: self.nacks_dropped_stale.value(),
            nacks_dropped_no_outgoing: self.nacks_dropped_no_outgoing.value(),
            nacks_dropped_after_satisfied: self.nacks_dropped_after_satisfied.value(),
            nacks_dropped_suppressed: self.nacks_dropped_suppressed.value(),
            nacks_dropped_no_faces: self.nacks_dropped_no_faces.value(),
            cs_hits: self.cs_hits.value(),
            cs_misses: self.cs_misses.value(),
            cs_inserts: self.cs_inserts.value(),
            pit_size: self.pit_size.value(),
            malformed_packets: self.malformed_packets.value(),
            send_failures: self.send_failures.value(),
            rtt_samples: self.rtt.count(),
            rtt_average_us: self.rtt.average(),
        }
    }
}

/// Serializable view of [`ForwarderMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub interests_received: u64,
    pub interests_forwarded: u64,
    pub interests_sent: u64,
    pub interests_satisfied: u64,
    pub interests_timed_out: u64,
    pub interests_dropped_duplicated: u64,
    pub interests_dropped_suppressed: u64,
    pub interests_dropped_pit_limit: u64,
    pub interests_dropped_no_faces: u64,
    pub data_received: u64,
    pub data_sent: u64,
    pub data_dropped_unsolicited: u64,
    pub nacks_received: u64,
    pub nacks_sent: u64,
    pub nacks_dropped_stale: u64,
    pub nacks_dropped_no_outgoing: u64,
    pub nacks_dropped_after_satisfied: u64,
    pub nacks_dropped_suppressed: u64,
    pub nacks_dropped_no_faces: u64,
    pub cs_hits: u64,
    pub cs_misses: u64,
    pub cs_inserts: u64,
    pub pit_size: u64,
    pub malformed_packets: u64,
    pub send_failures: u64,
    pub rtt_samples: u64,
    pub rtt_average_us: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_buckets() {
        let histogram = Histogram::new(vec![100, 10]);
        histogram.observe(5);
        histogram.observe(10);
        histogram.observe(50);
        histogram.observe(500);

        assert_eq!(histogram.count(), 4);
        assert_eq!(histogram.average(), 141.25);
        assert_eq!(
            histogram.buckets(),
            vec![(Some(10), 2), (Some(100), 1), (None, 1)]
        );
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = ForwarderMetrics::new();
        metrics.interests_received.add(3);
        metrics.pit_size.set(2);
        metrics.rtt.observe(1_000);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.interests_received, 3);
        assert_eq!(snapshot.pit_size, 2);
        assert_eq!(snapshot.rtt_samples, 1);
        assert_eq!(snapshot.rtt_average_us, 1_000.0);
    }
}
