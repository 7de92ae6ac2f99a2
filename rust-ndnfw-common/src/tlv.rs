//! NDN TLV codec.
//!
//! Types are a single byte. Lengths use the NDN variable-width scheme:
//! values below 253 fit in one byte, marker 253 announces a 16-bit length
//! and marker 254 a 32-bit one. 64-bit lengths are rejected.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

// Packet types
pub const TLV_INTEREST: u8 = 0x05;
pub const TLV_DATA: u8 = 0x06;
/// Carried inside an Interest to turn it into a NACK
pub const TLV_NACK: u8 = 0x03;

// Name
pub const TLV_NAME: u8 = 0x07;
pub const TLV_COMPONENT: u8 = 0x08;

// Interest fields
pub const TLV_NONCE: u8 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u8 = 0x0C;
pub const TLV_MUST_BE_FRESH: u8 = 0x12;
pub const TLV_CAN_BE_PREFIX: u8 = 0x21;
pub const TLV_HOP_LIMIT: u8 = 0x22;

// Data fields
pub const TLV_META_INFO: u8 = 0x14;
pub const TLV_CONTENT: u8 = 0x15;
pub const TLV_FRESHNESS_PERIOD: u8 = 0x19;

const LENGTH_MARKER_U16: u8 = 253;
const LENGTH_MARKER_U32: u8 = 254;

fn length_field_size(length: usize) -> usize {
    match length {
        0..=252 => 1,
        253..=0xFFFF => 3,
        _ => 5,
    }
}

fn put_header(tlv_type: u8, length: usize, buf: &mut BytesMut) {
    buf.put_u8(tlv_type);
    match length_field_size(length) {
        1 => buf.put_u8(length as u8),
        3 => {
            buf.put_u8(LENGTH_MARKER_U16);
            buf.put_u16(length as u16);
        }
        _ => {
            buf.put_u8(LENGTH_MARKER_U32);
            buf.put_u32(length as u32);
        }
    }
}

fn take_length(buf: &mut impl Buf) -> Result<usize, Error> {
    let marker = buf.get_u8();
    let width = match marker {
        LENGTH_MARKER_U16 => 2,
        LENGTH_MARKER_U32 => 4,
        255 => return Err(Error::Tlv("TLV length wider than 32 bits".into())),
        short => return Ok(short as usize),
    };
    if buf.remaining() < width {
        return Err(Error::Tlv(format!(
            "Truncated {}-byte TLV length field",
            width
        )));
    }
    Ok(if width == 2 {
        buf.get_u16() as usize
    } else {
        buf.get_u32() as usize
    })
}

/// Encode a NonNegativeInteger in its shortest 1/2/4/8 byte form.
pub fn encode_non_negative(value: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    if let Ok(v) = u8::try_from(value) {
        buf.put_u8(v);
    } else if let Ok(v) = u16::try_from(value) {
        buf.put_u16(v);
    } else if let Ok(v) = u32::try_from(value) {
        buf.put_u32(v);
    } else {
        buf.put_u64(value);
    }
    buf.freeze()
}

/// Decode a NonNegativeInteger value of 1, 2, 4 or 8 bytes.
pub fn decode_non_negative(value: &[u8]) -> Result<u64, Error> {
    let mut buf = value;
    match value.len() {
        1 => Ok(buf.get_u8() as u64),
        2 => Ok(buf.get_u16() as u64),
        4 => Ok(buf.get_u32() as u64),
        8 => Ok(buf.get_u64()),
        n => Err(Error::Tlv(format!("NonNegativeInteger cannot be {} bytes long", n))),
    }
}

/// One decoded (or to-be-encoded) TLV element. The value is a zero-copy
/// slice of the packet it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Builds a parent element whose value is the concatenation of `children`.
    pub fn nested(tlv_type: u8, children: &[TlvElement]) -> Self {
        let mut buf = BytesMut::with_capacity(children.iter().map(TlvElement::len).sum());
        for child in children {
            child.encode(&mut buf);
        }
        Self::new(tlv_type, buf.freeze())
    }

    /// Encoded size, header included.
    pub fn len(&self) -> usize {
        1 + length_field_size(self.value.len()) + self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        put_header(self.tlv_type, self.value.len(), buf);
        buf.put_slice(&self.value);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Reads one element from the front of `buf`, advancing past it.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv(format!(
                "Need at least 2 bytes for a TLV header, got {}",
                buf.remaining()
            )));
        }
        let tlv_type = buf.get_u8();
        let length = take_length(buf)?;
        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "TLV {:#04x} announces {} value bytes, {} left",
                tlv_type,
                length,
                buf.remaining()
            )));
        }
        Ok(Self {
            tlv_type,
            value: buf.copy_to_bytes(length),
        })
    }

    /// Decodes the value as a sequence of nested elements.
    pub fn children(&self) -> Result<Vec<TlvElement>, Error> {
        let mut buf = self.value.clone();
        let mut children = Vec::new();
        while buf.has_remaining() {
            children.push(TlvElement::decode(&mut buf)?);
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(length: usize) -> BytesMut {
        let mut buf = BytesMut::new();
        put_header(TLV_CONTENT, length, &mut buf);
        buf
    }

    #[test]
    fn test_length_field_widths() {
        assert_eq!(&header(100)[..], &[TLV_CONTENT, 100]);

        let medium = header(1000);
        assert_eq!(medium.len(), 4);
        assert_eq!(medium[1], LENGTH_MARKER_U16);
        assert_eq!(take_length(&mut medium.freeze().slice(1..)).unwrap(), 1000);

        let large = header(100_000);
        assert_eq!(large.len(), 6);
        assert_eq!(large[1], LENGTH_MARKER_U32);
        assert_eq!(take_length(&mut large.freeze().slice(1..)).unwrap(), 100_000);
    }

    #[test]
    fn test_element_wire_layout() {
        let element = TlvElement::new(1, Bytes::from_static(b"abc"));
        let wire = element.to_bytes();
        assert_eq!(&wire[..], &[1, 3, b'a', b'b', b'c']);
        assert_eq!(element.len(), 5);
        assert_eq!(TlvElement::decode(&mut wire.clone()).unwrap(), element);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let mut value = Bytes::from_static(&[1, 5, b'a', b'b']);
        assert!(matches!(TlvElement::decode(&mut value), Err(Error::Tlv(_))));

        let mut length = Bytes::from_static(&[1, LENGTH_MARKER_U16, 0]);
        assert!(matches!(TlvElement::decode(&mut length), Err(Error::Tlv(_))));

        let mut wide = Bytes::from_static(&[1, 255, 0, 0]);
        assert!(TlvElement::decode(&mut wide).is_err());
    }

    #[test]
    fn test_non_negative_integer() {
        assert_eq!(encode_non_negative(7).len(), 1);
        assert_eq!(encode_non_negative(4000).len(), 2);
        assert_eq!(encode_non_negative(70_000).len(), 4);
        assert_eq!(encode_non_negative(u64::MAX).len(), 8);
        assert_eq!(decode_non_negative(&encode_non_negative(4000)).unwrap(), 4000);
        assert!(decode_non_negative(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_nested_children() {
        let parent = TlvElement::nested(
            TLV_NAME,
            &[
                TlvElement::new(TLV_COMPONENT, Bytes::from_static(b"a")),
                TlvElement::new(TLV_COMPONENT, Bytes::from_static(b"b")),
            ],
        );
        let children = parent.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].value, Bytes::from_static(b"b"));
    }
}
