//! Identifier and address newtypes shared across the message envelope, delegation,
//! and replica.
//!
//! Follows the teacher's habit (`EvmAddress`, `HexEncodedNonce`, `TransactionHash` in
//! `types.rs`) of wrapping validated wire primitives instead of passing raw
//! `String`/`Vec<u8>` around: a malformed address or id is rejected at deserialization,
//! not discovered three layers deep in the replica.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("wallet address must be 20 bytes of hex, optionally 0x-prefixed: {0}")]
    InvalidAddress(String),
    #[error("device public key must be 32 bytes of hex: {0}")]
    InvalidDevicePubKey(String),
    #[error("author must be a 20-byte hex wallet address or a UUIDv4 session id: {0}")]
    InvalidAuthor(String),
}

/// A 20-byte wallet address. Always stored and compared lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        if trimmed.len() != 40 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidAddress(s.to_string()));
        }
        let bytes = hex::decode(trimmed).map_err(|_| IdError::InvalidAddress(s.to_string()))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidAddress(s.to_string()))?;
        Ok(Address(array))
    }

    pub fn to_hex(self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// `"0xAAAA…DDDD"` form used for display fallback (first 6, last 4 hex chars).
    pub fn short_display(self) -> String {
        let full = self.to_hex();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte Ed25519 device public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePubKey(pub [u8; 32]);

impl DevicePubKey {
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(trimmed).map_err(|_| IdError::InvalidDevicePubKey(s.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidDevicePubKey(s.to_string()))?;
        Ok(DevicePubKey(array))
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for DevicePubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for DevicePubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DevicePubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DevicePubKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// The author of a message: either a wallet address (delegated signing) or an
/// anonymous session id (self-signed by the device key alone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Wallet(Address),
    Anonymous(Uuid),
}

impl Author {
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if let Ok(addr) = Address::parse(s) {
            return Ok(Author::Wallet(addr));
        }
        if let Ok(uuid) = Uuid::parse_str(s) {
            if uuid.get_version_num() == 4 {
                return Ok(Author::Anonymous(uuid));
            }
        }
        Err(IdError::InvalidAuthor(s.to_string()))
    }

    pub fn is_wallet(&self) -> bool {
        matches!(self, Author::Wallet(_))
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::Wallet(a) => write!(f, "{a}"),
            Author::Anonymous(id) => write!(f, "{id}"),
        }
    }
}
