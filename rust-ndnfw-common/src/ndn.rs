//! Names and the Interest/Data/NACK packets the forwarder moves around.
//!
//! Every packet type converts to and from a [`TlvElement`]; `to_wire` and
//! `decode` wrap that with the outer framing.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use crate::types::DEFAULT_INTEREST_LIFETIME_MS;
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Longest accepted name component, in bytes.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 255;

/// Deepest accepted name.
pub const MAX_NAME_COMPONENTS: usize = 16;

/// Largest datagram a face will read.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;


fn expect_type(element: &TlvElement, expected: u8, what: &str) -> Result<(), Error> {
    if element.tlv_type == expected {
        Ok(())
    } else {
        Err(Error::NdnPacket(format!(
            "{} must have TLV type {:#04x}, found {:#04x}",
            what, expected, element.tlv_type
        )))
    }
}

/// One opaque segment of a [`Name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        expect_type(element, tlv::TLV_COMPONENT, "Name component")?;
        if element.value.len() > MAX_NAME_COMPONENT_LENGTH {
            return Err(Error::NdnPacket(format!(
                "Name component of {} bytes exceeds the {} byte limit",
                element.value.len(),
                MAX_NAME_COMPONENT_LENGTH
            )));
        }
        Ok(Self(element.value.clone()))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|&b| b.is_ascii_graphic() && b != b'/') {
            return f.write_str(&String::from_utf8_lossy(&self.0));
        }
        f.write_str("0x")?;
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

/// Hierarchical content name. PIT, FIB and CS are all keyed by it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// The root name `/`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `s` on `/`, ignoring empty segments. Use `parse` to validate.
    pub fn from_string(s: &str) -> Self {
        Self {
            components: s
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| NameComponent::new(segment.as_bytes().to_vec()))
                .collect(),
        }
    }

    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// The first `len` components (the whole name if it is shorter).
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components[..len.min(self.components.len())].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.components.starts_with(&self.components)
    }

    pub fn to_tlv(&self) -> TlvElement {
        let children: Vec<TlvElement> = self.components.iter().map(NameComponent::to_tlv).collect();
        TlvElement::nested(tlv::TLV_NAME, &children)
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        expect_type(element, tlv::TLV_NAME, "Name")?;
        let components = element
            .children()?
            .iter()
            .map(NameComponent::from_tlv)
            .collect::<Result<Vec<_>, _>>()?;

        if components.len() > MAX_NAME_COMPONENTS {
            return Err(Error::NdnPacket(format!(
                "Name has {} components, at most {} are allowed",
                components.len(),
                MAX_NAME_COMPONENTS
            )));
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("/");
        }
        self.components.iter().try_for_each(|c| write!(f, "/{}", c))
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('/') {
            return Err(Error::NdnPacket(format!("Name '{}' must start with '/'", s)));
        }
        let name = Self::from_string(s);
        if name.len() > MAX_NAME_COMPONENTS {
            return Err(Error::NdnPacket(format!(
                "Name '{}' has more than {} components",
                s, MAX_NAME_COMPONENTS
            )));
        }
        Ok(name)
    }
}

/// Reason carried by a negative acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum NackCode {
    /// The Interest was seen before: a loop or a duplicate.
    Loop = 10,
    /// The upstream is congested.
    Congestion = 11,
    /// The upstream gave up and removed its PIT entry.
    GiveUpPit = 12,
}

impl NackCode {
    /// Parses the on-wire code.
    pub fn from_u8(code: u8) -> Result<Self, Error> {
        match code {
            10 => Ok(NackCode::Loop),
            11 => Ok(NackCode::Congestion),
            12 => Ok(NackCode::GiveUpPit),
            other => Err(Error::NdnPacket(format!("Unknown NACK code {}", other))),
        }
    }
}

impl fmt::Display for NackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NackCode::Loop => "NACK_LOOP",
            NackCode::Congestion => "NACK_CONGESTION",
            NackCode::GiveUpPit => "NACK_GIVEUP_PIT",
        };
        f.write_str(s)
    }
}

/// A request for named content. With `nack` set it travels back
/// downstream as a negative acknowledgment instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,

    /// Identifies this request instance for loop detection
    pub nonce: u32,

    pub lifetime_ms: u32,

    pub hop_limit: Option<u8>,

    /// Whether this Interest can be satisfied by Data with a longer name.
    pub can_be_prefix: bool,

    /// Whether cached Data must still be fresh to satisfy this Interest.
    pub must_be_fresh: bool,

    /// Set when the Interest is a negative acknowledgment.
    pub nack: Option<NackCode>,
}

impl Interest {
    /// An Interest with the default lifetime and a time-derived nonce.
    pub fn new(name: Name) -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let nonce = (since_epoch.as_millis() as u32) ^ since_epoch.subsec_nanos().rotate_left(16);

        Self {
            name,
            nonce,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
            nack: None,
        }
    }

    pub fn with_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Turns the Interest into a NACK carrying `code`, or back into a
    /// normal Interest with `None`.
    pub fn with_nack(mut self, code: Option<NackCode>) -> Self {
        self.nack = code;
        self
    }

    pub fn is_nack(&self) -> bool {
        self.nack.is_some()
    }

    /// The requested lifetime as a duration.
    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms as u64)
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut children = vec![self.name.to_tlv()];
        if self.can_be_prefix {
            children.push(TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()));
        }
        if self.must_be_fresh {
            children.push(TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()));
        }
        children.push(TlvElement::new(
            tlv::TLV_NONCE,
            Bytes::copy_from_slice(&self.nonce.to_be_bytes()),
        ));
        children.push(TlvElement::new(
            tlv::TLV_INTEREST_LIFETIME,
            tlv::encode_non_negative(self.lifetime_ms as u64),
        ));
        if let Some(hop_limit) = self.hop_limit {
            children.push(TlvElement::new(tlv::TLV_HOP_LIMIT, vec![hop_limit]));
        }
        if let Some(code) = self.nack {
            children.push(TlvElement::new(tlv::TLV_NACK, vec![code as u8]));
        }
        TlvElement::nested(tlv::TLV_INTEREST, &children)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        self.to_tlv().encode(buf);
    }

    pub fn to_wire(&self) -> Bytes {
        self.to_tlv().to_bytes()
    }

    /// Decodes an Interest from an already-split outer TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        expect_type(element, tlv::TLV_INTEREST, "Interest")?;

        let mut name = None;
        let mut nonce = None;
        let mut interest = Interest {
            name: Name::new(),
            nonce: 0,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
            nack: None,
        };

        for child in element.children()? {
            match child.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&child)?),
                tlv::TLV_CAN_BE_PREFIX => interest.can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::TLV_NONCE => {
                    if child.value.len() != 4 {
                        return Err(Error::NdnPacket(format!(
                            "Nonce must be 4 bytes, got {}",
                            child.value.len()
                        )));
                    }
                    nonce = Some(child.value.clone().get_u32());
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    let lifetime = tlv::decode_non_negative(&child.value)?;
                    interest.lifetime_ms = u32::try_from(lifetime).unwrap_or(u32::MAX);
                }
                tlv::TLV_HOP_LIMIT => {
                    interest.hop_limit = child.value.first().copied();
                }
                tlv::TLV_NACK => {
                    let code = child
                        .value
                        .first()
                        .copied()
                        .ok_or_else(|| Error::NdnPacket("Empty NACK element".into()))?;
                    interest.nack = Some(NackCode::from_u8(code)?);
                }
                // Unknown non-critical elements are skipped
                other => log::trace!("Skipping Interest element of type {}", other),
            }
        }

        interest.name = name.ok_or_else(|| Error::NdnPacket("Interest without a name".into()))?;
        interest.nonce = nonce.ok_or_else(|| Error::NdnPacket("Interest without a nonce".into()))?;
        Ok(interest)
    }

    /// Decodes a standalone Interest; trailing bytes are an error.
    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let element = TlvElement::decode(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::NdnPacket("Payload of Interests should be zero".into()));
        }
        Self::from_tlv(&element)
    }
}

/// Named content answering an Interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,

    pub content: Bytes,

    /// How long a cached copy counts as fresh, in milliseconds.
    pub freshness_period_ms: u32,
}

impl Data {
    /// Data fresh for ten seconds.
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            freshness_period_ms: 10_000,
        }
    }

    pub fn with_freshness(mut self, freshness_period_ms: u32) -> Self {
        self.freshness_period_ms = freshness_period_ms;
        self
    }

    /// The freshness period as a duration.
    pub fn freshness_period(&self) -> Duration {
        Duration::from_millis(self.freshness_period_ms as u64)
    }

    /// Checks whether this Data can satisfy the given Interest by name.
    pub fn matches(&self, interest: &Interest) -> bool {
        if interest.can_be_prefix {
            interest.name.is_prefix_of(&self.name)
        } else {
            interest.name == self.name
        }
    }

    pub fn to_tlv(&self) -> TlvElement {
        let meta_info = TlvElement::nested(
            tlv::TLV_META_INFO,
            &[TlvElement::new(
                tlv::TLV_FRESHNESS_PERIOD,
                tlv::encode_non_negative(self.freshness_period_ms as u64),
            )],
        );
        TlvElement::nested(
            tlv::TLV_DATA,
            &[
                self.name.to_tlv(),
                meta_info,
                TlvElement::new(tlv::TLV_CONTENT, self.content.clone()),
            ],
        )
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        self.to_tlv().encode(buf);
    }

    pub fn to_wire(&self) -> Bytes {
        self.to_tlv().to_bytes()
    }

    /// Decodes a Data from an already-split outer TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        expect_type(element, tlv::TLV_DATA, "Data")?;

        let mut name = None;
        let mut content = Bytes::new();
        let mut freshness_period_ms = 0;

        for child in element.children()? {
            match child.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&child)?),
                tlv::TLV_META_INFO => {
                    for meta in child.children()? {
                        if meta.tlv_type == tlv::TLV_FRESHNESS_PERIOD {
                            let period = tlv::decode_non_negative(&meta.value)?;
                            freshness_period_ms = u32::try_from(period).unwrap_or(u32::MAX);
                        }
                    }
                }
                tlv::TLV_CONTENT => content = child.value.clone(),
                other => log::trace!("Skipping Data element of type {}", other),
            }
        }

        Ok(Self {
            name: name.ok_or_else(|| Error::NdnPacket("Data without a name".into()))?,
            content,
            freshness_period_ms,
        })
    }

    /// Decodes a standalone Data; trailing bytes are an error.
    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let element = TlvElement::decode(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::NdnPacket("Trailing bytes after Data".into()));
        }
        Self::from_tlv(&element)
    }
}
