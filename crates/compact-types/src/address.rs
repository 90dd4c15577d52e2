//! 20-byte account addresses with EIP-55 checksum handling.

use crate::hashing::keccak256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address parse failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Not `0x` + 40 hex digits.
    #[error("malformed address: {0}")]
    Malformed(&'static str),

    /// Mixed-case input whose capitalisation does not match EIP-55.
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// A 20-byte account address.
///
/// Parsing accepts all-lower or all-upper hexadecimal and verifies the
/// EIP-55 checksum for mixed-case input. Rendering always produces the
/// checksummed form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse a `0x`-prefixed address, enforcing EIP-55 on mixed-case input.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let digits = s
            .strip_prefix("0x")
            .ok_or(AddressError::Malformed("missing 0x prefix"))?;
        if digits.len() != 40 {
            return Err(AddressError::Malformed("expected 40 hex digits"));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(&digits.to_ascii_lowercase(), &mut bytes)
            .map_err(|_| AddressError::Malformed("invalid hex digit"))?;
        let addr = Self(bytes);

        let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper && digits != addr.checksum_digits() {
            return Err(AddressError::ChecksumMismatch);
        }
        Ok(addr)
    }

    /// EIP-55 checksummed rendering, `0x`-prefixed.
    pub fn to_checksum(&self) -> String {
        format!("0x{}", self.checksum_digits())
    }

    /// Lower-case 40-nibble rendering without prefix.
    pub fn to_lower_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn checksum_digits(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        lower
            .bytes()
            .enumerate()
            .map(|(i, b)| {
                let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0F;
                if b.is_ascii_alphabetic() && nibble >= 8 {
                    b.to_ascii_uppercase() as char
                } else {
                    b as char
                }
            })
            .collect()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(de::Error::custom)
    }
}
