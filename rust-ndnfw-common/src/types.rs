//! Identifiers and small value types shared across the forwarding plane.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Default number of entries in the content store.
pub const DEFAULT_CS_CAPACITY: usize = 4096;

/// Default time an Interest stays pending when it carries no lifetime.
pub const DEFAULT_INTEREST_LIFETIME_MS: u32 = 4000;

/// Default time a satisfied or abandoned PIT entry lingers to catch late duplicates.
pub const DEFAULT_PIT_PRUNING_TIMEOUT_MS: u64 = 100;

/// Unique identifier for a face, assigned sequentially by the face registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

impl From<u32> for FaceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Health color of a face for a given FIB prefix.
///
/// Ordering follows preference: GREEN faces are tried before YELLOW ones,
/// RED faces are not tried at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceStatus {
    /// Data has recently been retrieved through the face.
    Green,
    /// Unknown or degraded: NACKed, or asked us for data we expect from it.
    Yellow,
    /// The face is known not to work for this prefix.
    Red,
}

impl fmt::Display for FaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaceStatus::Green => "GREEN",
            FaceStatus::Yellow => "YELLOW",
            FaceStatus::Red => "RED",
        };
        f.write_str(s)
    }
}

/// Handle of the lower layer a face is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LowerLayerHandle {
    /// A network device identified by its interface name.
    NetDevice(String),
    /// A datagram socket peer.
    Socket(SocketAddr),
}

impl fmt::Display for LowerLayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LowerLayerHandle::NetDevice(name) => write!(f, "dev:{}", name),
            LowerLayerHandle::Socket(addr) => write!(f, "udp:{}", addr),
        }
    }
}
