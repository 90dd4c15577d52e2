//! 256-bit unsigned integers and their wire encodings.
//!
//! Identifiers (`id`, `nonce`) travel as fixed-width hexadecimal; amounts
//! travel as decimal strings. Both encodings are exposed as serde helper
//! modules so each field picks the convention its wire format demands.

pub use primitive_types::U256;

/// Render a `U256` as exactly 64 lower-case nibbles, no prefix.
pub fn to_hex64(value: &U256) -> String {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    hex::encode(bytes)
}

/// Parse a `0x`-prefixed 64-nibble hexadecimal `U256`.
pub fn from_hex64(s: &str) -> Result<U256, &'static str> {
    let digits = s.strip_prefix("0x").ok_or("missing 0x prefix")?;
    if digits.len() != 64 {
        return Err("expected 64 hex digits");
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(digits, &mut bytes).map_err(|_| "invalid hex digit")?;
    Ok(U256::from_big_endian(&bytes))
}

/// Parse a strict ASCII-decimal `U256` (`/^[0-9]+$/`, must fit 256 bits).
pub fn from_dec_strict(s: &str) -> Result<U256, &'static str> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err("expected decimal digits");
    }
    U256::from_dec_str(s).map_err(|_| "value exceeds 256 bits")
}

/// Serde for `U256` as `0x` + 64 nibbles.
pub mod u256_hex {
    use super::{from_hex64, to_hex64, U256};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as a fixed-width hex string.
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", to_hex64(value)))
    }

    /// Deserialize from a fixed-width hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        from_hex64(&s).map_err(de::Error::custom)
    }
}

/// Serde for `Option<U256>` as `0x` + 64 nibbles or `null`.
pub mod u256_hex_opt {
    use super::{from_hex64, to_hex64, U256};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as a fixed-width hex string or `null`.
    pub fn serialize<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&format!("0x{}", to_hex64(v))),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from a fixed-width hex string or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| from_hex64(&s).map_err(de::Error::custom))
            .transpose()
    }
}

/// Serde for `U256` as an ASCII decimal string.
pub mod u256_dec {
    use super::{from_dec_strict, U256};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as a decimal string.
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        from_dec_strict(&s).map_err(de::Error::custom)
    }
}

/// Serde for `u64` as an ASCII decimal string.
pub mod u64_dec {
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as a decimal string.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(de::Error::custom("expected decimal digits"));
        }
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex64_fixed_width() {
        assert_eq!(to_hex64(&U256::one()), format!("{}1", "0".repeat(63)));
        assert_eq!(to_hex64(&U256::zero()).len(), 64);
    }

    #[test]
    fn test_hex64_round_trip() {
        let v = U256::from(0xDEAD_BEEFu64) << 128;
        let rendered = format!("0x{}", to_hex64(&v));
        assert_eq!(from_hex64(&rendered).unwrap(), v);
    }

    #[test]
    fn test_from_hex64_rejects_short_input() {
        assert!(from_hex64("0x1").is_err());
        assert!(from_hex64("1").is_err());
    }

    #[test]
    fn test_from_dec_strict() {
        assert_eq!(
            from_dec_strict("1000000000000000000").unwrap(),
            U256::from(10u64).pow(U256::from(18u64))
        );
        assert!(from_dec_strict("").is_err());
        assert!(from_dec_strict("-1").is_err());
        assert!(from_dec_strict("1e18").is_err());
        assert!(from_dec_strict(" 1").is_err());
    }

    #[test]
    fn test_from_dec_strict_allows_leading_zeros() {
        assert_eq!(from_dec_strict("007").unwrap(), U256::from(7u64));
    }

    #[test]
    fn test_from_dec_strict_overflow() {
        // 2^256 has 78 digits; one above U256::MAX must fail.
        let too_big = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(from_dec_strict(too_big).is_err());
    }
}
