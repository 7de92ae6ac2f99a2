//! Packet classification at the face boundary.
//!
//! The forwarding engine only ever sees two wire types: Interest (which may
//! carry a NACK code) and Data. Anything else is a classification failure.

use crate::error::Error;
use crate::ndn::{Data, Interest, Name};
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes};

/// Outer wire type of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Interest,
    Data,
}

impl PacketType {
    /// Peeks the outer TLV type without decoding the packet.
    pub fn classify(wire: &[u8]) -> Result<Self, Error> {
        match wire.first() {
            Some(&tlv::TLV_INTEREST) => Ok(PacketType::Interest),
            Some(&tlv::TLV_DATA) => Ok(PacketType::Data),
            Some(&other) => Err(Error::UnrecognizedHeader(other)),
            None => Err(Error::NdnPacket("Empty packet".into())),
        }
    }
}

/// A decoded packet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdnPacket {
    /// An Interest, possibly carrying a NACK code
    Interest(Interest),

    /// A Data packet
    Data(Data),
}

impl NdnPacket {
    /// Classifies and decodes a raw packet.
    pub fn from_bytes(wire: &Bytes) -> Result<Self, Error> {
        let packet_type = PacketType::classify(wire)?;

        let mut buf = wire.clone();
        let element = TlvElement::decode(&mut buf)?;

        if buf.has_remaining() {
            return Err(Error::NdnPacket(format!(
                "{} trailing bytes after the packet",
                buf.remaining()
            )));
        }

        match packet_type {
            PacketType::Interest => Ok(NdnPacket::Interest(Interest::from_tlv(&element)?)),
            PacketType::Data => Ok(NdnPacket::Data(Data::from_tlv(&element)?)),
        }
    }

    /// Encodes the packet for transmission.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            NdnPacket::Interest(interest) => interest.to_wire(),
            NdnPacket::Data(data) => data.to_wire(),
        }
    }

    /// Get the name of the packet
    pub fn name(&self) -> &Name {
        match self {
            NdnPacket::Interest(interest) => &interest.name,
            NdnPacket::Data(data) => &data.name,
        }
    }

    /// Get the type of the packet as a string
    pub fn packet_type(&self) -> &'static str {
        match self {
            NdnPacket::Interest(interest) if interest.is_nack() => "Nack",
            NdnPacket::Interest(_) => "Interest",
            NdnPacket::Data(_) => "Data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndn::NackCode;

    #[test]
    fn test_classifies_interest_and_data() {
        let interest = Interest::new(Name::from_string("/a/b")).with_nonce(5);
        let data = Data::new(Name::from_string("/a/b"), Bytes::from_static(b"x"));

        match NdnPacket::from_bytes(&interest.to_wire()).unwrap() {
            NdnPacket::Interest(decoded) => assert_eq!(decoded, interest),
            other => panic!("expected Interest, got {:?}", other),
        }
        assert_eq!(
            NdnPacket::from_bytes(&data.to_wire()).unwrap().packet_type(),
            "Data"
        );
    }

    #[test]
    fn test_nack_is_an_interest() {
        let nack = Interest::new(Name::from_string("/a"))
            .with_nonce(1)
            .with_nack(Some(NackCode::Loop));
        let packet = NdnPacket::from_bytes(&nack.to_wire()).unwrap();
        assert_eq!(packet.packet_type(), "Nack");
        assert_eq!(packet.name(), &Name::from_string("/a"));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let interest = Interest::new(Name::from_string("/a")).with_nonce(1).to_wire();
        let data = Data::new(Name::from_string("/a"), Bytes::from_static(b"x")).to_wire();

        for wire in [interest, data] {
            let mut padded = wire.to_vec();
            padded.extend_from_slice(&[0xde, 0xad]);
            assert!(matches!(
                NdnPacket::from_bytes(&Bytes::from(padded)),
                Err(Error::NdnPacket(_))
            ));
        }
    }

    #[test]
    fn test_unknown_type_is_unrecognized_header() {
        let wire = Bytes::from_static(&[0x64, 0x01, 0x00]);
        assert!(matches!(
            NdnPacket::from_bytes(&wire),
            Err(Error::UnrecognizedHeader(0x64))
        ));
        assert!(NdnPacket::from_bytes(&Bytes::new()).is_err());
    }
}
