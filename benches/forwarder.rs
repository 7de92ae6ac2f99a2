use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_ndnfw_common::{
    ndn::{Data, Interest, Name},
    packet::NdnPacket,
    types::FaceId,
};
use rust_ndnfw_core::{forwarder, ChannelFace, Fib, Forwarder, ForwarderConfig, ManualClock};
use std::sync::Arc;
use std::time::Duration;

fn bench_round_trip(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new());
    let (inbox_tx, _inbox_rx) = forwarder::inbox();
    let config = ForwarderConfig {
        cs_capacity: 0,
        ..Default::default()
    };
    let mut forwarder = Forwarder::with_defaults(config, clock.clone(), inbox_tx);

    let (producer, mut producer_out) = ChannelFace::new("producer");
    let (consumer, mut consumer_out) = ChannelFace::new("consumer");
    forwarder.add_face(producer).unwrap();
    forwarder.add_face(consumer).unwrap();
    forwarder
        .fib_mut()
        .add_route(Name::from_string("/bench"), FaceId(0), 10);

    let mut nonce = 0u32;
    c.bench_function("interest_data_round_trip", |b| {
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            let name = Name::from_string(&format!("/bench/{}", nonce));
            let interest = Interest::new(name.clone()).with_nonce(nonce).to_wire();
            forwarder.receive(FaceId(1), &interest);

            let data = Data::new(name, Bytes::from_static(b"payload")).to_wire();
            forwarder.receive(FaceId(0), &data);

            black_box(producer_out.try_recv().ok());
            black_box(consumer_out.try_recv().ok());
            clock.advance(Duration::from_millis(1));
        })
    });
}

fn bench_classify(c: &mut Criterion) {
    let wire = Interest::new(Name::from_string("/bench/a/b/c"))
        .with_nonce(7)
        .with_can_be_prefix(true)
        .to_wire();

    c.bench_function("classify_interest", |b| {
        b.iter(|| NdnPacket::from_bytes(black_box(&wire)).unwrap())
    });
}

criterion_group!(benches, bench_round_trip, bench_classify);
criterion_main!(benches);
