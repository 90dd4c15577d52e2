//! Admission validation stages.
//!
//! Stages run in a fixed order and the first failure short-circuits:
//! chain-id canonicality, structure, nonce binding and freshness, expiry,
//! lock policy, allocation. The stateful consults (nonce membership, the
//! indexer snapshot, the local ledger) are sequenced by the service; every
//! check here is pure so it can be exercised without I/O. A single `now`
//! captured at the start of validation feeds every temporal stage.

use super::codec::{split_id, split_nonce, LockFields, NonceFields};
use super::entities::{ChainId, Compact, CompactSubmission, LockSnapshot};
use super::errors::{AddressField, AllocationError};
use compact_types::uint::from_dec_strict;
use compact_types::{Address, U256};

/// Stage 1: chain-id canonicality.
pub fn validate_chain_id(raw: &str) -> Result<ChainId, AllocationError> {
    ChainId::parse(raw)
}

/// Stage 2: structural validation, producing a typed compact.
///
/// Checks checksum-decoding of both addresses, `expires > 0`, `id > 0`,
/// the decimal amount, and witness coherence.
pub fn validate_structure(submission: &CompactSubmission) -> Result<Compact, AllocationError> {
    let arbiter =
        Address::parse(&submission.arbiter).map_err(|e| AllocationError::InvalidAddress {
            field: AddressField::Arbiter,
            detail: e.to_string(),
        })?;
    let sponsor =
        Address::parse(&submission.sponsor).map_err(|e| AllocationError::InvalidAddress {
            field: AddressField::Sponsor,
            detail: e.to_string(),
        })?;

    if submission.expires == 0 {
        return Err(AllocationError::Expired {
            expires: 0,
            now: 0,
        });
    }
    if submission.id.is_zero() {
        return Err(AllocationError::LockNotFound);
    }

    let amount = from_dec_strict(&submission.amount)
        .map_err(|e| AllocationError::InvalidAmount(e.to_string()))?;

    let witness_coherent =
        submission.witness_type_string.is_some() == submission.witness_hash.is_some();
    if !witness_coherent {
        return Err(AllocationError::WitnessInconsistent);
    }

    Ok(Compact {
        arbiter,
        sponsor,
        nonce: submission.nonce,
        expires: submission.expires,
        id: submission.id,
        amount,
        witness_type_string: submission.witness_type_string.clone(),
        witness_hash: submission.witness_hash,
    })
}

/// Stage 3 (pure half): the nonce's top 160 bits must equal the sponsor.
///
/// Freshness of the 4-tuple is a ledger consult sequenced by the service.
pub fn validate_nonce_binding(
    nonce: U256,
    sponsor: Address,
) -> Result<NonceFields, AllocationError> {
    let fields = split_nonce(nonce);
    if fields.sponsor != sponsor {
        return Err(AllocationError::NonceMismatchSponsor {
            sponsor: sponsor.to_checksum(),
        });
    }
    Ok(fields)
}

/// Stage 4: `now < expires ≤ now + window`.
pub fn validate_expiry(expires: u64, now: u64, window_secs: u64) -> Result<(), AllocationError> {
    if expires <= now {
        return Err(AllocationError::Expired { expires, now });
    }
    if expires > now.saturating_add(window_secs) {
        return Err(AllocationError::ExpiryTooFar {
            expires,
            now,
            window: window_secs,
        });
    }
    Ok(())
}

/// Stage 5: lock policy. The lock's reset period must cover the expiry.
pub fn validate_lock(id: U256, expires: u64, now: u64) -> Result<LockFields, AllocationError> {
    if id.is_zero() {
        return Err(AllocationError::LockNotFound);
    }
    let fields = split_id(id);
    let reset_period = fields.reset_period_secs();
    if now.saturating_add(reset_period) < expires {
        return Err(AllocationError::ResetPeriodTooShort {
            reset_period,
            expires,
        });
    }
    Ok(fields)
}

/// Stage 6 (snapshot half): the lock must accept new allocations and be
/// registered to this allocator.
///
/// The balance check itself lives in [`super::reconcile`].
pub fn validate_lock_snapshot(
    snapshot: &LockSnapshot,
    expected_allocator_id: U256,
) -> Result<(), AllocationError> {
    if snapshot.withdrawal_status != 0 {
        return Err(AllocationError::ForcedWithdrawalEnabled);
    }
    if snapshot.allocator_id != expected_allocator_id {
        return Err(AllocationError::AllocatorMismatch {
            detail: format!(
                "lock is registered to allocator {}, not {}",
                snapshot.allocator_id, expected_allocator_id
            ),
        });
    }
    Ok(())
}
