//! Forwarding plane of an NDN node.
//!
//! The [`Forwarder`] mediates between the faces a node is attached to, its
//! Pending Interest Table, the FIB, the content store and the forwarding
//! strategy. Every inbound packet is processed to completion before the next
//! one; timers run on the same serialized queue (see [`runtime::Node`]).

pub mod clock;
pub mod config;
pub mod cs;
pub mod face;
pub mod fib;
pub mod forwarder;
pub mod pit;
pub mod runtime;
pub mod scheduler;
pub mod strategy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ForwarderConfig, NodeConfig, StrategyKind, UpstreamRequestPolicy};
pub use cs::{ContentStore, CsEntry, MemoryContentStore};
pub use face::{ChannelFace, Face, FaceRegistry, UdpFace};
pub use fib::{Fib, FibEntry, FibFaceMetric, MemoryFib};
pub use forwarder::{Forwarder, Inbound, InboundReceiver, InboundSender};
pub use pit::{Pit, PitEntry};
pub use runtime::Node;
pub use strategy::{BestRoute, Flooding, ForwardingStrategy, StrategyContext};

pub use rust_ndnfw_common::{Error, Result};
