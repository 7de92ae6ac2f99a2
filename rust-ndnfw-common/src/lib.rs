//! Common types and utilities for the ndnfw forwarding plane.
//!
//! This crate provides the pieces shared by the forwarding engine, the
//! daemon and the command-line tooling: names, the TLV codec, the
//! Interest/Data/NACK packet types, shared identifiers and metrics.

pub mod ndn;
pub mod packet;
pub mod tlv;
pub mod metrics;
pub mod types;
pub mod error;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
