//! Bit-field packing for compact ids and address-prefixed nonces.
//!
//! Both values are 256-bit integers carrying fixed-position fields:
//!
//! ```text
//! id:    [255..253 reset period | 252..160 allocator id | 159..0 token lock]
//! nonce: [255..96  sponsor      | 95..32   high         | 31..0  low      ]
//! ```
//!
//! Extraction is mask-and-shift; nothing here touches string renderings.

use compact_types::{Address, U256};

/// Reset periods in seconds, indexed by the 3-bit field of a compact id.
pub const RESET_PERIODS_SECS: [u64; 8] = [1, 15, 60, 600, 3900, 86_400, 612_000, 2_592_000];

/// Largest admissible `low` value. The backing column is a signed 32-bit
/// integer, so bit 31 stays clear.
pub const LOW_MAX: u32 = i32::MAX as u32;

/// Decoded fields of a compact id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockFields {
    /// Index into [`RESET_PERIODS_SECS`].
    pub reset_period_index: u8,
    /// 93-bit allocator identifier.
    pub allocator_id: U256,
    /// 160-bit resource-lock identifier.
    pub token_lock_id: U256,
}

impl LockFields {
    /// Reset period of this lock in seconds.
    pub fn reset_period_secs(&self) -> u64 {
        RESET_PERIODS_SECS[usize::from(self.reset_period_index) % RESET_PERIODS_SECS.len()]
    }
}

/// The sponsor-scoped 96-bit portion of a nonce.
///
/// Ordering is numeric on `high · 2^32 + low`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NonceFragment {
    /// Upper 64 bits.
    pub high: u64,
    /// Lower 32 bits, in `[0, LOW_MAX]` for storable fragments.
    pub low: u32,
}

impl NonceFragment {
    /// The first fragment of the space.
    pub const FIRST: NonceFragment = NonceFragment { high: 0, low: 0 };

    /// The next fragment in combined order, rolling `low` into `high` at
    /// the storage bound.
    pub fn successor(&self) -> NonceFragment {
        if self.low < LOW_MAX {
            NonceFragment {
                high: self.high,
                low: self.low + 1,
            }
        } else {
            NonceFragment {
                high: self.high + 1,
                low: 0,
            }
        }
    }
}

/// Decoded fields of a nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonceFields {
    /// Sponsor address occupying the top 160 bits.
    pub sponsor: Address,
    /// The sponsor-scoped fragment.
    pub fragment: NonceFragment,
}

fn low_160_mask() -> U256 {
    (U256::one() << 160) - U256::one()
}

/// Split a compact id into its bit-fields.
pub fn split_id(id: U256) -> LockFields {
    let reset_period_index = (id >> 253).low_u64() as u8;
    let allocator_id = (id >> 160) & ((U256::one() << 93) - U256::one());
    let token_lock_id = id & low_160_mask();
    LockFields {
        reset_period_index,
        allocator_id,
        token_lock_id,
    }
}

/// Pack id fields, masking each input to its field width.
pub fn pack_id(fields: &LockFields) -> U256 {
    let reset = U256::from(fields.reset_period_index & 0x07) << 253;
    let allocator = (fields.allocator_id & ((U256::one() << 93) - U256::one())) << 160;
    let token = fields.token_lock_id & low_160_mask();
    reset | allocator | token
}

/// Pack a sponsor address and fragment into a nonce.
pub fn pack_nonce(sponsor: Address, fragment: NonceFragment) -> U256 {
    let addr = U256::from_big_endian(sponsor.as_bytes());
    (addr << 96) | (U256::from(fragment.high) << 32) | U256::from(fragment.low)
}

/// Split a nonce into its sponsor prefix and fragment.
pub fn split_nonce(nonce: U256) -> NonceFields {
    let mut addr_bytes = [0u8; 32];
    (nonce >> 96).to_big_endian(&mut addr_bytes);
    let mut sponsor = [0u8; 20];
    sponsor.copy_from_slice(&addr_bytes[12..]);

    let high = ((nonce >> 32) & U256::from(u64::MAX)).low_u64();
    let low = (nonce & U256::from(u32::MAX)).low_u64() as u32;
    NonceFields {
        sponsor: Address::new(sponsor),
        fragment: NonceFragment { high, low },
    }
}

/// Smallest free fragment given the used fragments in ascending combined
/// order. The scan is the gap search: the first row whose successor is not
/// the next row marks the gap; an empty ledger yields `(0, 0)`.
pub fn next_available<I>(used_ascending: I) -> NonceFragment
where
    I: IntoIterator<Item = NonceFragment>,
{
    let mut expected = NonceFragment::FIRST;
    for used in used_ascending {
        if used != expected {
            return expected;
        }
        expected = used.successor();
    }
    expected
}
