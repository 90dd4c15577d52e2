//! EIP-712 typed-data hashing for compacts.
//!
//! The digest must match the on-chain verifier byte for byte: domain
//! separator over `("The Compact", "0", chainId, verifyingContract)`,
//! struct hash over the compact fields, and the final
//! `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`.

use super::entities::{ChainId, Compact};
use compact_types::{keccak256, Address, Hash32, U256};
use sha3::{Digest, Keccak256};

/// EIP-712 domain name.
pub const DOMAIN_NAME: &str = "The Compact";

/// EIP-712 domain version.
pub const DOMAIN_VERSION: &str = "0";

/// The Compact verifying contract, identical on every chain.
pub const VERIFYING_CONTRACT: Address = Address::new([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0xDF, 0x02, 0x1F, 0xF2, 0x46, 0x7D, 0xF9, 0x7F,
    0xF8, 0x46, 0xE0, 0x9F, 0x48,
]);

const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const COMPACT_TYPE: &str =
    "Compact(address arbiter,address sponsor,uint256 nonce,uint256 expires,uint256 id,uint256 amount)";

const COMPACT_TYPE_WITH_WITNESS: &str = "Compact(address arbiter,address sponsor,uint256 nonce,uint256 expires,uint256 id,uint256 amount,string witnessTypeString,bytes32 witnessHash)";

fn encode_u256(value: &U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

fn encode_address(addr: &Address) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(addr.as_bytes());
    bytes
}

/// The domain separator for a chain.
pub fn domain_separator(chain_id: &ChainId) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(keccak256(EIP712_DOMAIN_TYPE.as_bytes()));
    hasher.update(keccak256(DOMAIN_NAME.as_bytes()));
    hasher.update(keccak256(DOMAIN_VERSION.as_bytes()));
    hasher.update(encode_u256(&chain_id.to_u256()));
    hasher.update(encode_address(&VERIFYING_CONTRACT));
    hasher.finalize().into()
}

/// The struct hash of a compact under the schema its witness presence
/// selects. `nonce` is passed resolved; a submission without one cannot
/// be hashed.
pub fn struct_hash(compact: &Compact, nonce: U256) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    match compact.witness() {
        None => {
            hasher.update(keccak256(COMPACT_TYPE.as_bytes()));
        }
        Some(_) => {
            hasher.update(keccak256(COMPACT_TYPE_WITH_WITNESS.as_bytes()));
        }
    }
    hasher.update(encode_address(&compact.arbiter));
    hasher.update(encode_address(&compact.sponsor));
    hasher.update(encode_u256(&nonce));
    hasher.update(encode_u256(&U256::from(compact.expires)));
    hasher.update(encode_u256(&compact.id));
    hasher.update(encode_u256(&compact.amount));
    if let Some((type_string, witness_hash)) = compact.witness() {
        hasher.update(keccak256(type_string.as_bytes()));
        hasher.update(witness_hash.as_bytes());
    }
    hasher.finalize().into()
}

/// The claim hash: the digest the allocator signs and the arbiter checks.
pub fn claim_hash(compact: &Compact, nonce: U256, chain_id: &ChainId) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update([0x19, 0x01]);
    hasher.update(domain_separator(chain_id));
    hasher.update(struct_hash(compact, nonce));
    Hash32::from_slice(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compact_types::Hash32;

    fn base_compact() -> Compact {
        Compact {
            arbiter: Address::new([0x11; 20]),
            sponsor: Address::new([0x22; 20]),
            nonce: Some(U256::from(5u64)),
            expires: 1_700_003_600,
            id: (U256::from(7u64) << 253) | (U256::one() << 160),
            amount: U256::from(10u64).pow(U256::from(18u64)),
            witness_type_string: None,
            witness_hash: None,
        }
    }

    #[test]
    fn test_digest_deterministic() {
        let chain = ChainId::parse("1").unwrap();
        let compact = base_compact();
        let a = claim_hash(&compact, U256::from(5u64), &chain);
        let b = claim_hash(&compact, U256::from(5u64), &chain);
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_varies_with_every_field() {
        let chain = ChainId::parse("1").unwrap();
        let base = base_compact();
        let base_digest = claim_hash(&base, U256::from(5u64), &chain);

        let mut other = base.clone();
        other.amount = base.amount + U256::one();
        assert_ne!(claim_hash(&other, U256::from(5u64), &chain), base_digest);

        let mut other = base.clone();
        other.expires += 1;
        assert_ne!(claim_hash(&other, U256::from(5u64), &chain), base_digest);

        assert_ne!(claim_hash(&base, U256::from(6u64), &chain), base_digest);
    }

    #[test]
    fn test_digest_varies_with_chain() {
        let compact = base_compact();
        assert_ne!(
            claim_hash(&compact, U256::from(5u64), &ChainId::parse("1").unwrap()),
            claim_hash(&compact, U256::from(5u64), &ChainId::parse("10").unwrap())
        );
    }

    #[test]
    fn test_witness_presence_switches_schema() {
        let chain = ChainId::parse("1").unwrap();
        let plain = base_compact();
        let mut with_witness = plain.clone();
        with_witness.witness_type_string =
            Some("Mandate mandate)Mandate(uint256 deadline".to_string());
        with_witness.witness_hash = Some(Hash32::repeat_byte(0x33));

        assert_ne!(
            claim_hash(&plain, U256::from(5u64), &chain),
            claim_hash(&with_witness, U256::from(5u64), &chain)
        );
    }

    #[test]
    fn test_witness_hash_contributes() {
        let chain = ChainId::parse("1").unwrap();
        let mut a = base_compact();
        a.witness_type_string = Some("Witness w".to_string());
        a.witness_hash = Some(Hash32::repeat_byte(0x01));
        let mut b = a.clone();
        b.witness_hash = Some(Hash32::repeat_byte(0x02));

        assert_ne!(
            claim_hash(&a, U256::from(5u64), &chain),
            claim_hash(&b, U256::from(5u64), &chain)
        );
    }

    #[test]
    fn test_domain_separator_stable_per_chain() {
        let chain = ChainId::parse("1").unwrap();
        assert_eq!(domain_separator(&chain), domain_separator(&chain));
        assert_ne!(
            domain_separator(&chain),
            domain_separator(&ChainId::parse("137").unwrap())
        );
    }
}
