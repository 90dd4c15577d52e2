//! Allocatable-balance reconciliation against an indexer snapshot.
//!
//! The snapshot carries the on-chain balance, unfinalised deltas, and the
//! claim hashes already settled. The local ledger carries every compact
//! this allocator has co-signed. Allocatable balance is what the snapshot
//! allows minus what is still promised locally.

use super::codec::split_id;
use super::entities::{CompactRecord, CompactState, LockSnapshot, SignedU256};
use super::errors::AllocationError;
use compact_types::U256;

/// Net of the snapshot's pending deltas.
pub fn pending_delta_total(deltas: &[SignedU256]) -> SignedU256 {
    let mut positive = U256::zero();
    let mut negative = U256::zero();
    for delta in deltas {
        if delta.negative {
            negative = negative.saturating_add(delta.magnitude);
        } else {
            positive = positive.saturating_add(delta.magnitude);
        }
    }
    if positive >= negative {
        SignedU256 {
            negative: false,
            magnitude: positive - negative,
        }
    } else {
        SignedU256 {
            negative: true,
            magnitude: negative - positive,
        }
    }
}

/// `max(0, balance − pendingDelta)`.
pub fn snapshot_allocatable(snapshot: &LockSnapshot) -> U256 {
    let pending = pending_delta_total(&snapshot.pending_deltas);
    if pending.negative {
        snapshot.balance.saturating_add(pending.magnitude)
    } else {
        snapshot.balance.saturating_sub(pending.magnitude)
    }
}

/// Sum of amounts over compacts that are still outstanding for the given
/// token lock: not yet settled in the snapshot and not past expiry plus
/// the finalisation grace period.
pub fn locally_allocated(
    records: &[CompactRecord],
    token_lock_id: U256,
    snapshot: &LockSnapshot,
    now: u64,
    finalization_threshold: u64,
) -> U256 {
    records
        .iter()
        .filter(|r| split_id(r.compact.id).token_lock_id == token_lock_id)
        .filter(|r| {
            CompactState::classify(r, &snapshot.claims, now, finalization_threshold)
                .is_outstanding()
        })
        .fold(U256::zero(), |acc, r| acc.saturating_add(r.compact.amount))
}

/// Allocatable balance remaining after local commitments, clamped at zero.
pub fn allocatable_remaining(
    snapshot: &LockSnapshot,
    records: &[CompactRecord],
    token_lock_id: U256,
    now: u64,
    finalization_threshold: u64,
) -> U256 {
    snapshot_allocatable(snapshot).saturating_sub(locally_allocated(
        records,
        token_lock_id,
        snapshot,
        now,
        finalization_threshold,
    ))
}

/// Accept or reject a new allocation of `amount` against the lock.
pub fn check_allocation(
    snapshot: &LockSnapshot,
    records: &[CompactRecord],
    token_lock_id: U256,
    amount: U256,
    now: u64,
    finalization_threshold: u64,
) -> Result<(), AllocationError> {
    let have = allocatable_remaining(snapshot, records, token_lock_id, now, finalization_threshold);
    if have < amount {
        return Err(AllocationError::InsufficientBalance { have, need: amount });
    }
    Ok(())
}
