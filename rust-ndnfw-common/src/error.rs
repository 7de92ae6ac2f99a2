//! Error types for the forwarding plane.

use crate::types::FaceId;
use thiserror::Error;

/// Errors of the codec and the engine's collaborators. Packet input never
/// fails the engine; anomalies there are dropped and counted instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed TLV framing.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Well-framed TLV that is not a valid packet.
    #[error("NDN packet error: {0}")]
    NdnPacket(String),

    /// The outer TLV type is neither an Interest nor a Data.
    #[error("Unrecognized NDN header type 0x{0:02x}")]
    UnrecognizedHeader(u8),

    /// The face is already registered under the given id.
    #[error("Face is already registered as {0}")]
    DuplicateFace(FaceId),

    /// The face is not registered.
    #[error("Unknown face: {0}")]
    UnknownFace(String),

    /// The PIT is full and no entry could be created.
    #[error("PIT capacity of {0} entries exceeded")]
    PitCapacityExceeded(usize),

    /// A face refused or failed to send a packet.
    #[error("Face error: {0}")]
    Face(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
