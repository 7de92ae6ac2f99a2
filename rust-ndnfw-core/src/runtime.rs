//! Async driver for the forwarding engine.
//!
//! A single tokio task owns the [`Forwarder`]; faces only ever reach it
//! through the inbound queue, so packets and timers are processed strictly
//! one at a time.

use crate::forwarder::{Forwarder, InboundReceiver};
use log::{debug, info};
use std::future::Future;
use std::time::Instant;

pub struct Node {
    forwarder: Forwarder,
    inbox: InboundReceiver,
}

impl Node {
    /// `inbox` must be the receiving end of the queue `forwarder` was built with.
    pub fn new(forwarder: Forwarder, inbox: InboundReceiver) -> Self {
        Self { forwarder, inbox }
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    pub fn forwarder_mut(&mut self) -> &mut Forwarder {
        &mut self.forwarder
    }

    pub fn into_forwarder(self) -> Forwarder {
        self.forwarder
    }

    /// Processes packets and timers until `shutdown` completes.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Node running");

        loop {
            let deadline = self.forwarder.next_timer_deadline();

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                inbound = self.inbox.recv() => match inbound {
                    Some(inbound) => self.forwarder.handle(inbound),
                    None => {
                        debug!("Inbound queue closed");
                        break;
                    }
                },
                _ = wait_until(deadline) => self.forwarder.process_timers(),
            }
        }

        info!("Node stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::ForwarderConfig;
    use crate::face::ChannelFace;
    use crate::fib::Fib;
    use crate::forwarder::inbox;
    use bytes::Bytes;
    use rust_ndnfw_common::ndn::{Data, Interest, Name};
    use rust_ndnfw_common::types::FaceId;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
    use tokio::time::timeout;

    struct Setup {
        node: Node,
        producer: Arc<ChannelFace>,
        producer_out: UnboundedReceiver<Bytes>,
        consumer: Arc<ChannelFace>,
        consumer_out: UnboundedReceiver<Bytes>,
    }

    fn setup(config: ForwarderConfig) -> Setup {
        let (tx, rx) = inbox();
        let mut forwarder = Forwarder::with_defaults(config, Arc::new(SystemClock), tx);

        let (producer, producer_out) = ChannelFace::new("producer");
        let (consumer, consumer_out) = ChannelFace::new("consumer");
        forwarder.add_face(producer.clone()).unwrap();
        forwarder.add_face(consumer.clone()).unwrap();
        forwarder
            .fib_mut()
            .add_route(Name::from_string("/a"), FaceId(0), 10);

        Setup {
            node: Node::new(forwarder, rx),
            producer,
            producer_out,
            consumer,
            consumer_out,
        }
    }

    #[tokio::test]
    async fn test_node_forwards_interest_and_data() {
        let Setup {
            mut node,
            producer,
            mut producer_out,
            consumer,
            mut consumer_out,
        } = setup(ForwarderConfig::default());

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            node.run(async {
                let _ = stopped.await;
            })
            .await;
            node
        });

        let interest = Interest::new(Name::from_string("/a/b")).with_nonce(1).to_wire();
        assert!(consumer.inject(interest.clone()));
        let forwarded = timeout(Duration::from_secs(1), producer_out.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forwarded, interest);

        let data = Data::new(Name::from_string("/a/b"), Bytes::from_static(b"x")).to_wire();
        assert!(producer.inject(data.clone()));
        let delivered = timeout(Duration::from_secs(1), consumer_out.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered, data);

        stop.send(()).unwrap();
        let node = task.await.unwrap();
        assert_eq!(node.forwarder().metrics().data_sent.value(), 1);
    }

    #[tokio::test]
    async fn test_node_expires_entries_without_traffic() {
        let Setup {
            mut node,
            consumer,
            mut producer_out,
            ..
        } = setup(ForwarderConfig::default());

        let interest = Interest::new(Name::from_string("/a/b"))
            .with_nonce(1)
            .with_lifetime(50)
            .to_wire();
        assert!(consumer.inject(interest));

        node.run(tokio::time::sleep(Duration::from_millis(400))).await;

        let metrics = node.forwarder().metrics();
        assert_eq!(metrics.interests_timed_out.value(), 1);
        assert!(node.forwarder().pit().is_empty());
        assert!(producer_out.try_recv().is_ok());
    }
}
