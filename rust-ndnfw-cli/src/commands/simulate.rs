//! Simulation command implementation for the ndnfw CLI
//!
//! Builds a forwarder with one producer face and a number of consumer faces,
//! all in memory, and drives it with a manual clock so every run produces the
//! same counters.

use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, info};
use rust_ndnfw_common::{
    metrics::MetricsSnapshot,
    ndn::{Data, Interest, Name, NameComponent},
    packet::NdnPacket,
};
use rust_ndnfw_core::{
    forwarder::{self, InboundReceiver},
    ChannelFace, Fib, Forwarder, ForwarderConfig, ManualClock, NodeConfig,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::utils;

/// Simulated time between two requested names
const STEP: Duration = Duration::from_millis(10);

const INTEREST_LIFETIME_MS: u32 = 1000;

pub struct SimulateOptions {
    pub prefix: String,
    pub consumers: usize,
    pub names: usize,
    pub rounds: usize,
    pub drop_every: usize,
    pub config: Option<PathBuf>,
    pub nacks: bool,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub requested: usize,
    pub delivered: usize,
    pub nacked: usize,
    pub simulated: Duration,
    pub metrics: MetricsSnapshot,
}

struct Consumer {
    face: Arc<ChannelFace>,
    output: UnboundedReceiver<Bytes>,
}

/// Run the simulation and print its report
pub fn run_simulation(options: SimulateOptions, json: bool) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => {
            NodeConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
                .forwarder
        }
        None => ForwarderConfig::default(),
    };
    if options.nacks {
        config.nacks_enabled = true;
    }

    let report = simulate(config, &options)?;

    if json {
        let value = serde_json::json!({
            "requested": report.requested,
            "delivered": report.delivered,
            "nacked": report.nacked,
            "simulated_ms": report.simulated.as_millis() as u64,
            "metrics": report.metrics,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        utils::print_header("Simulation results");
        println!("  {:<24}{}", "Interests expressed:", report.requested);
        println!("  {:<24}{}", "Data delivered:", report.delivered);
        println!("  {:<24}{}", "NACKs delivered:", report.nacked);
        println!("  {:<24}{}", "Simulated time:", utils::format_duration(report.simulated));
        utils::print_header("Forwarder counters");
        utils::print_metrics(&report.metrics)?;
    }

    Ok(())
}

/// Drive a fresh forwarder through the scenario described by `options`
pub fn simulate(config: ForwarderConfig, options: &SimulateOptions) -> Result<SimulationReport> {
    let prefix: Name = options
        .prefix
        .parse()
        .with_context(|| format!("Invalid prefix '{}'", options.prefix))?;
    info!(
        "Simulating {} consumers x {} names x {} rounds under {}",
        options.consumers, options.names, options.rounds, prefix
    );

    let pruning = config.pit_pruning_timeout();
    let clock = Arc::new(ManualClock::new());
    let (inbox_tx, mut inbox) = forwarder::inbox();
    let mut forwarder = Forwarder::with_defaults(config, clock.clone(), inbox_tx);

    let (producer, mut producer_output) = ChannelFace::new("producer");
    let producer_id = forwarder.add_face(producer.clone())?;
    forwarder.fib_mut().add_route(prefix.clone(), producer_id, 10);

    let mut consumers = Vec::with_capacity(options.consumers);
    for i in 0..options.consumers {
        let (face, output) = ChannelFace::new(format!("consumer{}", i));
        forwarder.add_face(face.clone())?;
        consumers.push(Consumer { face, output });
    }

    let mut requested = 0;
    let mut delivered = 0;
    let mut nacked = 0;

    for round in 0..options.rounds {
        for index in 0..options.names {
            let mut name = prefix.clone();
            name.push(NameComponent::new(index.to_string().into_bytes()));

            // Every consumer asks for the same name: one request goes
            // upstream, the others wait on the same PIT entry.
            for (c, consumer) in consumers.iter().enumerate() {
                let nonce = ((round as u32) << 24) | ((index as u32 & 0xffff) << 8) | (c as u32 & 0xff);
                let interest = Interest::new(name.clone())
                    .with_nonce(nonce)
                    .with_lifetime(INTEREST_LIFETIME_MS);
                consumer.face.inject(interest.to_wire());
                requested += 1;
            }
            pump(&mut forwarder, &mut inbox);
            clock.advance(STEP);

            let answer = options.drop_every == 0 || (index + 1) % options.drop_every != 0;
            while let Ok(packet) = producer_output.try_recv() {
                match NdnPacket::from_bytes(&packet) {
                    Ok(NdnPacket::Interest(interest)) if !interest.is_nack() && answer => {
                        let content = Bytes::from(format!("content of {}", interest.name));
                        producer.inject(Data::new(interest.name, content).to_wire());
                    }
                    Ok(other) => debug!("Producer ignores {} {}", other.packet_type(), other.name()),
                    Err(e) => debug!("Producer received a malformed packet: {}", e),
                }
            }
            pump(&mut forwarder, &mut inbox);

            let (data, nacks) = collect(&mut consumers);
            delivered += data;
            nacked += nacks;
        }
    }

    // Let whatever is still pending expire and be pruned
    clock.advance(Duration::from_millis(INTEREST_LIFETIME_MS as u64));
    forwarder.process_timers();
    clock.advance(pruning);
    forwarder.process_timers();
    let (data, nacks) = collect(&mut consumers);
    delivered += data;
    nacked += nacks;

    Ok(SimulationReport {
        requested,
        delivered,
        nacked,
        simulated: clock.elapsed(),
        metrics: forwarder.metrics().snapshot(),
    })
}

/// Hands every queued inbound packet to the forwarder.
fn pump(forwarder: &mut Forwarder, inbox: &mut InboundReceiver) {
    while let Ok(inbound) = inbox.try_recv() {
        forwarder.handle(inbound);
    }
}

/// Counts Data and NACKs the consumers received.
fn collect(consumers: &mut [Consumer]) -> (usize, usize) {
    let mut data = 0;
    let mut nacks = 0;
    for consumer in consumers.iter_mut() {
        while let Ok(packet) = consumer.output.try_recv() {
            match NdnPacket::from_bytes(&packet) {
                Ok(NdnPacket::Data(_)) => data += 1,
                Ok(NdnPacket::Interest(interest)) if interest.is_nack() => nacks += 1,
                _ => {}
            }
        }
    }
    (data, nacks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(drop_every: usize) -> SimulateOptions {
        SimulateOptions {
            prefix: "/sim".into(),
            consumers: 2,
            names: 10,
            rounds: 2,
            drop_every,
            config: None,
            nacks: false,
        }
    }

    #[test]
    fn test_every_consumer_is_served_once_per_request() {
        let report = simulate(ForwarderConfig::default(), &options(0)).unwrap();

        assert_eq!(report.requested, 40);
        assert_eq!(report.delivered, 40);
        assert_eq!(report.nacked, 0);
        // First round goes upstream once per name, second round hits the cache
        assert_eq!(report.metrics.interests_forwarded, 10);
        assert_eq!(report.metrics.interests_dropped_suppressed, 10);
        assert_eq!(report.metrics.cs_hits, 20);
        assert_eq!(report.metrics.pit_size, 0);
    }

    #[test]
    fn test_unanswered_names_time_out() {
        let mut opts = options(5);
        opts.rounds = 1;
        let report = simulate(ForwarderConfig::default(), &opts).unwrap();

        assert_eq!(report.requested, 20);
        assert_eq!(report.delivered, 16);
        assert_eq!(report.metrics.interests_timed_out, 2);
        assert_eq!(report.metrics.pit_size, 0);
    }

    #[test]
    fn test_abandoned_retransmission_is_nacked() {
        let config = ForwarderConfig {
            nacks_enabled: true,
            ..Default::default()
        };
        let mut opts = options(1);
        opts.names = 1;
        let report = simulate(config, &opts).unwrap();

        // The second consumer's retransmission cannot raise the retry budget
        // again within the minimum interval, so the entry is given up.
        assert_eq!(report.delivered, 0);
        assert_eq!(report.nacked, 2);
        assert_eq!(report.metrics.interests_dropped_no_faces, 1);
    }

    #[test]
    fn test_invalid_prefix_is_rejected() {
        let mut opts = options(0);
        opts.prefix = "sim".into();
        assert!(simulate(ForwarderConfig::default(), &opts).is_err());
    }
}
