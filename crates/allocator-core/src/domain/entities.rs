//! Core domain entities of the admission pipeline.

use super::errors::AllocationError;
use compact_types::hashing::h256_hex;
use compact_types::hashing::h256_hex_opt;
use compact_types::uint::{u256_dec, u256_hex, u256_hex_opt, u64_dec};
use compact_types::{Address, Hash32, Signature, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical positive decimal chain identifier.
///
/// Canonical means `parse(render(n)) == input`: digits only, no leading
/// zeros, no sign, no whitespace, value above zero.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Parse and canonicality-check a chain id.
    pub fn parse(raw: &str) -> Result<Self, AllocationError> {
        let canonical = !raw.is_empty()
            && raw.bytes().all(|b| b.is_ascii_digit())
            && !raw.starts_with('0');
        if !canonical {
            return Err(AllocationError::InvalidChainId(raw.to_string()));
        }
        // Bound the value to what EIP-712 domain encoding can carry.
        U256::from_dec_str(raw).map_err(|_| AllocationError::InvalidChainId(raw.to_string()))?;
        Ok(Self(raw.to_string()))
    }

    /// The canonical decimal rendering.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The chain id as a 256-bit integer for domain hashing.
    pub fn to_u256(&self) -> U256 {
        // Canonicality was established at parse time.
        U256::from_dec_str(&self.0).unwrap_or_else(|_| U256::zero())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ChainId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A compact as submitted on the wire, before structural validation.
///
/// Addresses and the amount are carried verbatim as strings - their
/// validation failures belong to the admission pipeline, not the codec.
/// The validator owns the conversion into [`Compact`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactSubmission {
    /// Arbiter address, checksummed hex.
    pub arbiter: String,
    /// Sponsor address, checksummed hex.
    pub sponsor: String,
    /// Nonce as `0x` + 64 nibbles, or `null` to request generation.
    #[serde(default, with = "u256_hex_opt")]
    pub nonce: Option<U256>,
    /// Expiry as unix-seconds decimal string.
    #[serde(with = "u64_dec")]
    pub expires: u64,
    /// Lock id as `0x` + 64 nibbles.
    #[serde(with = "u256_hex")]
    pub id: U256,
    /// Amount as decimal string.
    pub amount: String,
    /// Witness type string, present iff `witness_hash` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_type_string: Option<String>,
    /// Witness hash, present iff `witness_type_string` is.
    #[serde(default, with = "h256_hex_opt", skip_serializing_if = "Option::is_none")]
    pub witness_hash: Option<Hash32>,
}

/// A structurally valid compact.
///
/// `nonce` is `None` until the allocator resolves one; every persisted
/// compact carries a concrete nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compact {
    /// Arbiter contract address.
    pub arbiter: Address,
    /// Sponsor account address.
    pub sponsor: Address,
    /// Address-prefixed nonce.
    #[serde(default, with = "u256_hex_opt")]
    pub nonce: Option<U256>,
    /// Expiry, unix seconds.
    #[serde(with = "u64_dec")]
    pub expires: u64,
    /// Packed resource-lock id.
    #[serde(with = "u256_hex")]
    pub id: U256,
    /// Locked amount.
    #[serde(with = "u256_dec")]
    pub amount: U256,
    /// Witness type string, present iff `witness_hash` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_type_string: Option<String>,
    /// Witness hash, present iff `witness_type_string` is.
    #[serde(default, with = "h256_hex_opt", skip_serializing_if = "Option::is_none")]
    pub witness_hash: Option<Hash32>,
}

impl Compact {
    /// The witness pair, if present. Coherence is a validator concern.
    pub fn witness(&self) -> Option<(&str, &Hash32)> {
        match (&self.witness_type_string, &self.witness_hash) {
            (Some(ts), Some(h)) => Some((ts.as_str(), h)),
            _ => None,
        }
    }
}

/// A consumed nonce row. The 4-tuple is the primary uniqueness constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonceEntry {
    /// Chain the nonce was consumed on.
    pub chain_id: ChainId,
    /// Sponsor the nonce belongs to.
    pub sponsor: Address,
    /// Upper 64 bits of the sponsor-scoped fragment.
    pub high: u64,
    /// Lower 32 bits of the sponsor-scoped fragment.
    pub low: u32,
}

/// A persisted, co-signed compact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactRecord {
    /// Chain the compact settles on.
    pub chain_id: ChainId,
    /// The admitted compact, nonce resolved.
    pub compact: Compact,
    /// EIP-712 digest the allocator signed.
    #[serde(with = "h256_hex")]
    pub claim_hash: Hash32,
    /// Allocator co-signature over `claim_hash`.
    pub signature: Signature,
    /// Admission time, unix seconds.
    #[serde(with = "u64_dec")]
    pub created_at: u64,
}

/// A signed 256-bit quantity, for indexer account deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedU256 {
    /// True for values below zero.
    pub negative: bool,
    /// Absolute value.
    pub magnitude: U256,
}

impl SignedU256 {
    /// Zero.
    pub const ZERO: SignedU256 = SignedU256 {
        negative: false,
        magnitude: U256::zero(),
    };

    /// Parse an optionally `-`-prefixed decimal string.
    pub fn parse(s: &str) -> Result<Self, &'static str> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let magnitude = compact_types::uint::from_dec_strict(digits)?;
        Ok(Self {
            negative: negative && !magnitude.is_zero(),
            magnitude,
        })
    }
}

/// Point-in-time view of one resource lock, as reported by the indexer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockSnapshot {
    /// On-chain balance of the lock.
    pub balance: U256,
    /// Zero unless a forced withdrawal is pending or enabled.
    pub withdrawal_status: u8,
    /// Allocator id the lock is registered to on this chain.
    pub allocator_id: U256,
    /// Unfinalised balance changes, signed.
    pub pending_deltas: Vec<SignedU256>,
    /// Claim hashes already settled on chain.
    pub claims: Vec<Hash32>,
}

/// Lifecycle of an admitted compact, derived from a snapshot and a clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompactState {
    /// Persisted and counted against the sponsor's allocatable balance.
    Admitted,
    /// Its claim hash appears in the snapshot; settled on chain.
    Finalised,
    /// Past expiry plus the finalisation grace period, never settled.
    Expired,
}

impl CompactState {
    /// Classify a persisted record against settled claims and the clock.
    pub fn classify(
        record: &CompactRecord,
        settled_claims: &[Hash32],
        now: u64,
        finalization_threshold: u64,
    ) -> Self {
        if settled_claims.contains(&record.claim_hash) {
            return CompactState::Finalised;
        }
        if now >= record.compact.expires.saturating_add(finalization_threshold) {
            return CompactState::Expired;
        }
        CompactState::Admitted
    }

    /// Whether a compact in this state counts toward local allocation.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, CompactState::Admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_canonical() {
        assert!(ChainId::parse("1").is_ok());
        assert!(ChainId::parse("8453").is_ok());
        assert!(ChainId::parse("0").is_err());
        assert!(ChainId::parse("01").is_err());
        assert!(ChainId::parse(" 1").is_err());
        assert!(ChainId::parse("1 ").is_err());
        assert!(ChainId::parse("-1").is_err());
        assert!(ChainId::parse("").is_err());
        assert!(ChainId::parse("1e3").is_err());
    }

    #[test]
    fn test_chain_id_to_u256() {
        assert_eq!(ChainId::parse("8453").unwrap().to_u256(), U256::from(8453u64));
    }

    #[test]
    fn test_signed_parse() {
        let pos = SignedU256::parse("42").unwrap();
        assert!(!pos.negative);
        assert_eq!(pos.magnitude, U256::from(42u64));

        let neg = SignedU256::parse("-42").unwrap();
        assert!(neg.negative);
        assert_eq!(neg.magnitude, U256::from(42u64));

        // Negative zero collapses to zero.
        assert_eq!(SignedU256::parse("-0").unwrap(), SignedU256::ZERO);
        assert!(SignedU256::parse("- 1").is_err());
        assert!(SignedU256::parse("--1").is_err());
    }

    #[test]
    fn test_compact_wire_round_trip() {
        let compact = Compact {
            arbiter: Address::new([0x01; 20]),
            sponsor: Address::new([0x02; 20]),
            nonce: Some(U256::from(7u64)),
            expires: 1_700_003_600,
            id: U256::from(1u64) << 160,
            amount: U256::from(10u64).pow(U256::from(18u64)),
            witness_type_string: None,
            witness_hash: None,
        };
        let json = serde_json::to_string(&compact).unwrap();
        // Hex for ids/nonce, decimal for amount and expiry.
        assert!(json.contains("\"amount\":\"1000000000000000000\""));
        assert!(json.contains("\"expires\":\"1700003600\""));
        assert!(json.contains(&format!(
            "\"nonce\":\"0x{}7\"",
            "0".repeat(63)
        )));
        let back: Compact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, compact);
    }

    #[test]
    fn test_compact_witness_fields_omitted_when_absent() {
        let compact = Compact {
            arbiter: Address::new([0x01; 20]),
            sponsor: Address::new([0x02; 20]),
            nonce: None,
            expires: 100,
            id: U256::one(),
            amount: U256::one(),
            witness_type_string: None,
            witness_hash: None,
        };
        let json = serde_json::to_string(&compact).unwrap();
        assert!(!json.contains("witness"));
    }

    #[test]
    fn test_state_classification() {
        let record = CompactRecord {
            chain_id: ChainId::parse("1").unwrap(),
            compact: Compact {
                arbiter: Address::new([0x01; 20]),
                sponsor: Address::new([0x02; 20]),
                nonce: Some(U256::zero()),
                expires: 1000,
                id: U256::one(),
                amount: U256::one(),
                witness_type_string: None,
                witness_hash: None,
            },
            claim_hash: Hash32::repeat_byte(0xAA),
            signature: Signature::new([0u8; 65]),
            created_at: 900,
        };

        // Live before expiry plus grace.
        assert_eq!(
            CompactState::classify(&record, &[], 1050, 60),
            CompactState::Admitted
        );
        // Expired exactly at the boundary.
        assert_eq!(
            CompactState::classify(&record, &[], 1060, 60),
            CompactState::Expired
        );
        // Settled claims win over the clock.
        assert_eq!(
            CompactState::classify(&record, &[Hash32::repeat_byte(0xAA)], 2000, 60),
            CompactState::Finalised
        );
    }
}
