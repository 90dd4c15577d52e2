//! Outbound ports: traits for the collaborators the admission core
//! depends on, with mock implementations for testing.

use crate::domain::codec::NonceFragment;
use crate::domain::entities::{ChainId, CompactRecord, LockSnapshot, NonceEntry};
use crate::domain::errors::{IndexerError, LedgerError, SignerError};
use async_trait::async_trait;
use compact_types::{Address, Hash32, Signature, U256};

/// Sparse persistent set of consumed nonce tuples - outbound port.
#[async_trait]
pub trait NonceLedger: Send + Sync {
    /// Smallest free fragment for `(chain, sponsor)` in combined order.
    ///
    /// The gap search runs against a single consistent read; the returned
    /// fragment is a tentative reservation and is not durable until the
    /// admission commits.
    async fn next_fragment(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<NonceFragment, LedgerError>;

    /// Membership query on the 4-tuple.
    async fn is_used(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
        fragment: NonceFragment,
    ) -> Result<bool, LedgerError>;
}

/// Append-only ledger of admitted compacts - outbound port.
#[async_trait]
pub trait CompactStore: Send + Sync {
    /// Persist the nonce row and the compact record in one atomic step.
    ///
    /// Fails with [`LedgerError::NonceTaken`] when a concurrent admission
    /// won the same fragment, and [`LedgerError::DuplicateClaim`] on a
    /// repeated `(chainId, claimHash)`.
    async fn append(
        &self,
        entry: &NonceEntry,
        record: &CompactRecord,
    ) -> Result<(), LedgerError>;

    /// Point lookup by `(chainId, claimHash)`.
    async fn get(
        &self,
        chain_id: &ChainId,
        claim_hash: &Hash32,
    ) -> Result<Option<CompactRecord>, LedgerError>;

    /// All records for a sponsor, newest first.
    async fn list_by_sponsor(&self, sponsor: Address) -> Result<Vec<CompactRecord>, LedgerError>;

    /// Records consulted by the balance reconciler for `(chain, sponsor)`.
    /// Lock filtering and liveness classification happen in the domain.
    async fn list_for_allocation(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<Vec<CompactRecord>, LedgerError>;
}

/// Query parameters for a lock snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockQuery {
    /// This allocator's on-chain address.
    pub allocator: Address,
    /// Sponsor owning the lock.
    pub sponsor: Address,
    /// The 160-bit resource-lock identifier.
    pub token_lock_id: U256,
    /// Chain the lock lives on.
    pub chain_id: ChainId,
}

/// Chain indexer - outbound port. The single source of on-chain truth.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Fetch the point-in-time state of one resource lock.
    async fn lock_snapshot(&self, query: &LockQuery) -> Result<LockSnapshot, IndexerError>;
}

/// Digest-signing oracle - outbound port.
///
/// Signs the raw 32-byte digest with no message prefix; the digest is
/// already the EIP-712 result.
#[async_trait]
pub trait SignerOracle: Send + Sync {
    /// Produce a 65-byte recoverable signature over the digest.
    async fn sign(&self, digest: &Hash32) -> Result<Signature, SignerError>;
}

/// Second-resolution clock - outbound port.
///
/// Captured once per admission so every validation stage shares one `now`.
pub trait TimeSource: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}

// Shared handles satisfy the persistence ports, so one adapter instance
// can back both the ledger and the store.

#[async_trait]
impl<T: NonceLedger + ?Sized> NonceLedger for std::sync::Arc<T> {
    async fn next_fragment(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<NonceFragment, LedgerError> {
        (**self).next_fragment(chain_id, sponsor).await
    }

    async fn is_used(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
        fragment: NonceFragment,
    ) -> Result<bool, LedgerError> {
        (**self).is_used(chain_id, sponsor, fragment).await
    }
}

#[async_trait]
impl<T: CompactStore + ?Sized> CompactStore for std::sync::Arc<T> {
    async fn append(
        &self,
        entry: &NonceEntry,
        record: &CompactRecord,
    ) -> Result<(), LedgerError> {
        (**self).append(entry, record).await
    }

    async fn get(
        &self,
        chain_id: &ChainId,
        claim_hash: &Hash32,
    ) -> Result<Option<CompactRecord>, LedgerError> {
        (**self).get(chain_id, claim_hash).await
    }

    async fn list_by_sponsor(&self, sponsor: Address) -> Result<Vec<CompactRecord>, LedgerError> {
        (**self).list_by_sponsor(sponsor).await
    }

    async fn list_for_allocation(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<Vec<CompactRecord>, LedgerError> {
        (**self).list_for_allocation(chain_id, sponsor).await
    }
}

// =============================================================================
// Mock implementations for testing
// =============================================================================

/// Mock indexer returning a preconfigured result.
pub struct MockIndexerClient {
    /// Result handed to every query.
    pub result: parking_lot::Mutex<Result<LockSnapshot, IndexerError>>,
}

impl MockIndexerClient {
    /// Mock that always yields `snapshot`.
    pub fn with_snapshot(snapshot: LockSnapshot) -> Self {
        Self {
            result: parking_lot::Mutex::new(Ok(snapshot)),
        }
    }

    /// Mock that always fails with `error`.
    pub fn with_error(error: IndexerError) -> Self {
        Self {
            result: parking_lot::Mutex::new(Err(error)),
        }
    }

    /// Replace the configured result.
    pub fn set(&self, result: Result<LockSnapshot, IndexerError>) {
        *self.result.lock() = result;
    }
}

#[async_trait]
impl IndexerClient for MockIndexerClient {
    async fn lock_snapshot(&self, _query: &LockQuery) -> Result<LockSnapshot, IndexerError> {
        self.result.lock().clone()
    }
}

/// Mock signer producing a deterministic pseudo-signature from the digest.
#[derive(Clone, Copy, Default)]
pub struct MockSigner;

#[async_trait]
impl SignerOracle for MockSigner {
    async fn sign(&self, digest: &Hash32) -> Result<Signature, SignerError> {
        Ok(Signature::from_parts(
            *digest.as_fixed_bytes(),
            *digest.as_fixed_bytes(),
            27,
        ))
    }
}

/// Fixed clock for tests.
#[derive(Clone, Copy)]
pub struct FixedTimeSource(pub u64);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> u64 {
        self.0
    }
}
