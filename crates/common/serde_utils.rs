//! Serde helpers for the quantity encodings used by Ethereum JSON-RPC.
//!
//! Nodes are inconsistent: the same field can arrive as a `0x`-prefixed hex
//! string, a bare decimal string, or a JSON number (geth's struct logger emits
//! `gas`/`gasCost` as numbers while receipts use hex strings).

use serde::{Deserialize, Deserializer, Serializer, de::Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u64),
    Text(String),
}

pub fn parse_quantity(raw: &str) -> Result<u64, std::num::ParseIntError> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some("") => Ok(0),
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse::<u64>(),
    }
}

pub mod u64_quantity {
    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Quantity::deserialize(d)? {
            Quantity::Number(value) => Ok(value),
            Quantity::Text(text) => parse_quantity(&text).map_err(D::Error::custom),
        }
    }

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{value:#x}"))
    }
}

pub mod opt_u64_quantity {
    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Quantity>::deserialize(d)? {
            None => Ok(None),
            Some(Quantity::Number(value)) => Ok(Some(value)),
            Some(Quantity::Text(text)) => parse_quantity(&text).map(Some).map_err(D::Error::custom),
        }
    }

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_str(&format!("{value:#x}")),
            None => serializer.serialize_none(),
        }
    }
}

/// `0x`-prefixed hex blobs (calldata, return data, bytecode).
pub mod bytes_hex {
    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = Option::<String>::deserialize(d)?.unwrap_or_default();
        let trimmed = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(trimmed).map_err(D::Error::custom)
    }

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }
}
