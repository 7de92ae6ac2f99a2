//! Face abstraction and the registry of active faces.
//!
//! A face is a bidirectional packet endpoint. The forwarding engine calls
//! into faces (status, send, callback registration); faces never call the
//! engine directly, they only hand received bytes to the registered
//! [`ReceiveHandler`].

use bytes::Bytes;
use rust_ndnfw_common::{types::LowerLayerHandle, Result};

mod channel;
mod registry;
mod udp;

pub use channel::ChannelFace;
pub use registry::{FaceRecord, FaceRegistry};
pub use udp::UdpFace;

/// Callback invoked by a face for every packet received from the lower layer.
pub type ReceiveHandler = Box<dyn Fn(Bytes) + Send + Sync>;

/// A named-content packet endpoint.
pub trait Face: Send + Sync {
    /// Whether the face is currently able to send and receive.
    fn is_up(&self) -> bool;

    /// Hands a packet to the lower layer. Fire-and-forget: an `Ok` means the
    /// packet was accepted, not that it was delivered.
    fn send(&self, packet: Bytes) -> Result<()>;

    /// Installs the handler for received packets, or removes it with `None`.
    fn register_receive_callback(&self, handler: Option<ReceiveHandler>);

    /// The lower-layer handle the face is attached to, if it has one.
    fn lower_layer_handle(&self) -> Option<LowerLayerHandle> {
        None
    }

    /// Short human readable description used in logs.
    fn description(&self) -> String;
}
