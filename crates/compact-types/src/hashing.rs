//! Keccak-256 hashing and the 32-byte hash type.

use primitive_types::H256;
use sha3::{Digest, Keccak256};

/// 32-byte hash, rendered as `0x` + 64 lower-case nibbles on the wire.
pub type Hash32 = H256;

/// Hash data with Keccak-256 (one-shot).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Render a hash as `0x` + 64 lower-case nibbles.
pub fn hash_to_hex(hash: &Hash32) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}

/// Parse a `0x`-prefixed 64-nibble hash.
pub fn hash_from_hex(s: &str) -> Result<Hash32, &'static str> {
    let digits = s.strip_prefix("0x").ok_or("missing 0x prefix")?;
    if digits.len() != 64 {
        return Err("expected 64 hex digits");
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(digits, &mut bytes).map_err(|_| "invalid hex digit")?;
    Ok(H256(bytes))
}

/// Serde for `Hash32` as `0x` + 64 nibbles.
pub mod h256_hex {
    use super::{hash_from_hex, hash_to_hex, Hash32};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as a hex string.
    pub fn serialize<S: Serializer>(value: &Hash32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hash_to_hex(value))
    }

    /// Deserialize from a hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash32, D::Error> {
        let s = String::deserialize(deserializer)?;
        hash_from_hex(&s).map_err(de::Error::custom)
    }
}

/// Serde for `Option<Hash32>` as `0x` + 64 nibbles or `null`.
pub mod h256_hex_opt {
    use super::{hash_from_hex, hash_to_hex, Hash32};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as a hex string or `null`.
    pub fn serialize<S: Serializer>(
        value: &Option<Hash32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(h) => serializer.serialize_some(&hash_to_hex(h)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from a hex string or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Hash32>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hash_from_hex(&s).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_known_vector() {
        // keccak256("") from the Ethereum yellow paper.
        let empty = keccak256(b"");
        assert_eq!(
            hex::encode(empty),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_deterministic() {
        assert_eq!(keccak256(b"compact"), keccak256(b"compact"));
        assert_ne!(keccak256(b"compact"), keccak256(b"compacts"));
    }

    #[test]
    fn test_hash_hex_round_trip() {
        let h = H256([0xAB; 32]);
        let rendered = hash_to_hex(&h);
        assert_eq!(rendered.len(), 66);
        assert_eq!(hash_from_hex(&rendered).unwrap(), h);
    }

    #[test]
    fn test_hash_from_hex_rejects_bad_input() {
        assert!(hash_from_hex("ab").is_err());
        assert!(hash_from_hex("0xab").is_err());
        assert!(hash_from_hex(&format!("0x{}", "zz".repeat(32))).is_err());
    }
}
