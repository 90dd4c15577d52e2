//! 65-byte recoverable ECDSA signatures.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A recoverable signature `r ‖ s ‖ v`, rendered as `0x` + 130 nibbles.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 65]);

impl Signature {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    /// Assemble from components. `v` is the Ethereum recovery byte (27/28).
    pub fn from_parts(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&r);
        bytes[32..64].copy_from_slice(&s);
        bytes[64] = v;
        Self(bytes)
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Recovery byte.
    pub const fn v(&self) -> u8 {
        self.0[64]
    }

    /// Parse a `0x`-prefixed 130-nibble signature.
    pub fn parse(s: &str) -> Result<Self, &'static str> {
        let digits = s.strip_prefix("0x").ok_or("missing 0x prefix")?;
        if digits.len() != 130 {
            return Err("expected 130 hex digits");
        }
        let mut bytes = [0u8; 65];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| "invalid hex digit")?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::parse(&s).map_err(de::Error::custom)
    }
}
