//! Domain primitives: Address, PoolName, Side, TxId.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length in bytes of a ledger account address.
pub const ADDRESS_LEN: usize = 32;

/// Ledger account address (lowercase hex of 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("expected {ADDRESS_LEN} bytes, got {0}")]
    Length(usize),
}

impl Address {
    /// Parse and normalize a hex address (optional `0x` prefix).
    pub fn parse(s: &str) -> Result<Self, AddressParseError> {
        let trimmed = s.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_part).map_err(|e| AddressParseError::Hex(e.to_string()))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(AddressParseError::Length(bytes.len()));
        }
        Ok(Address(hex::encode(bytes)))
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(hex::encode(bytes))
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];
        // The inner string is always valid hex of the right length.
        if let Ok(bytes) = hex::decode(&self.0) {
            out.copy_from_slice(&bytes);
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Human-readable pool name, the seed for the pool's account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolName(pub String);

impl PoolName {
    pub fn new(name: impl Into<String>) -> Self {
        PoolName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Seed byte used when deriving the position address.
    pub fn seed(&self) -> u8 {
        match self {
            Side::Long => 1,
            Side::Short => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Some(Side::Long),
            "short" => Some(Side::Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Transaction signature returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(sig: impl Into<String>) -> Self {
        TxId(sig.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
