//! Packet encoding command implementation for the ndnfw CLI

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use rust_ndnfw_common::{
    ndn::{Data, Interest, NackCode, Name},
    packet::NdnPacket,
};

use crate::utils;

pub struct EncodeOptions {
    pub name: String,
    pub content: Option<String>,
    pub nonce: Option<u32>,
    pub lifetime: u32,
    pub nack: Option<String>,
    pub freshness: u32,
}

/// Encode the requested packet and print its summary and hex dump
pub fn encode_packet(options: EncodeOptions) -> Result<()> {
    let name: Name = options
        .name
        .parse()
        .with_context(|| format!("Invalid name '{}'", options.name))?;

    let wire = match options.content {
        Some(content) => {
            if options.nack.is_some() {
                bail!("A Data packet cannot carry a NACK reason");
            }
            Data::new(name, Bytes::from(content))
                .with_freshness(options.freshness)
                .to_wire()
        }
        None => {
            let nack = options.nack.as_deref().map(parse_nack_code).transpose()?;
            let mut interest = Interest::new(name)
                .with_lifetime(options.lifetime)
                .with_nack(nack);
            if let Some(nonce) = options.nonce {
                interest = interest.with_nonce(nonce);
            }
            interest.to_wire()
        }
    };

    // Decode what we built so the summary reflects the wire format
    let packet = NdnPacket::from_bytes(&wire).context("Encoded packet does not decode")?;
    println!("{} {} ({} bytes)", packet.packet_type(), packet.name(), wire.len());
    println!("{}", utils::to_hex(&wire));

    Ok(())
}

fn parse_nack_code(reason: &str) -> Result<NackCode> {
    match reason.to_ascii_lowercase().as_str() {
        "loop" => Ok(NackCode::Loop),
        "congestion" => Ok(NackCode::Congestion),
        "giveup-pit" | "giveup" => Ok(NackCode::GiveUpPit),
        other => bail!(
            "Unknown NACK reason '{}' (expected loop, congestion or giveup-pit)",
            other
        ),
    }
}
