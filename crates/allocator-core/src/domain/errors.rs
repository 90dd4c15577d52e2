//! Error types for the admission core.

use compact_types::U256;
use std::fmt;
use thiserror::Error;

/// Which address field failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressField {
    /// The `arbiter` field.
    Arbiter,
    /// The `sponsor` field.
    Sponsor,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressField::Arbiter => write!(f, "arbiter"),
            AddressField::Sponsor => write!(f, "sponsor"),
        }
    }
}

/// Which upstream collaborator failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamSource {
    /// The chain indexer.
    Indexer,
    /// The persistent store.
    Storage,
    /// The signing oracle.
    Signer,
}

impl fmt::Display for UpstreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamSource::Indexer => write!(f, "indexer"),
            UpstreamSource::Storage => write!(f, "storage"),
            UpstreamSource::Signer => write!(f, "signer"),
        }
    }
}

impl std::error::Error for UpstreamSource {}

/// Admission failures surfaced to the caller.
///
/// Validation failures are surfaced verbatim; `Upstream` marks an I/O
/// failure and is never conflated with a validation outcome.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// Chain id is not a canonical positive decimal integer.
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),

    /// Arbiter or sponsor failed checksum decode.
    #[error("invalid {field} address: {detail}")]
    InvalidAddress {
        /// Offending field.
        field: AddressField,
        /// Parse failure description.
        detail: String,
    },

    /// Amount is not a decimal integer.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Witness fields must be both present or both absent.
    #[error("witness type string and witness hash must be supplied together")]
    WitnessInconsistent,

    /// `expires` is not in the future.
    #[error("compact expired at {expires}, now {now}")]
    Expired {
        /// Submitted expiry.
        expires: u64,
        /// Validation clock.
        now: u64,
    },

    /// `expires` exceeds the admission window.
    #[error("expiry {expires} exceeds the {window}s window from {now}")]
    ExpiryTooFar {
        /// Submitted expiry.
        expires: u64,
        /// Validation clock.
        now: u64,
        /// Maximum seconds ahead.
        window: u64,
    },

    /// The lock's reset period ends before the compact expires.
    #[error("reset period of {reset_period}s does not cover expiry {expires}")]
    ResetPeriodTooShort {
        /// Reset period of the referenced lock, seconds.
        reset_period: u64,
        /// Submitted expiry.
        expires: u64,
    },

    /// Nonce upper 160 bits differ from the sponsor address.
    #[error("nonce is not bound to sponsor {sponsor}")]
    NonceMismatchSponsor {
        /// Expected sponsor.
        sponsor: String,
    },

    /// Nonce already consumed for this sponsor and chain.
    #[error("nonce already used")]
    NonceUsed,

    /// No resource lock matched the query.
    #[error("resource lock not found")]
    LockNotFound,

    /// The lock is mid forced-withdrawal and cannot back new compacts.
    #[error("forced withdrawal enabled for this lock")]
    ForcedWithdrawalEnabled,

    /// The lock's allocator id does not match this allocator.
    #[error("allocator mismatch: {detail}")]
    AllocatorMismatch {
        /// Mismatch description.
        detail: String,
    },

    /// Allocatable balance cannot cover the requested amount.
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance {
        /// Allocatable remaining.
        have: U256,
        /// Requested amount.
        need: U256,
    },

    /// Session principal is not the compact's sponsor.
    #[error("authenticated account is not the sponsor")]
    Unauthorised,

    /// Nonce-reservation retries exhausted under concurrent load.
    #[error("admission contention: retries exhausted")]
    Contention,

    /// Upstream I/O failure.
    #[error("upstream failure in {source}: {detail}")]
    Upstream {
        /// Failing collaborator.
        source: UpstreamSource,
        /// Failure description.
        detail: String,
    },
}

/// Nonce ledger and compact store failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Insert raced a concurrent reservation of the same tuple. Retryable.
    #[error("nonce already taken")]
    NonceTaken,

    /// A record with this `(chainId, claimHash)` already exists.
    #[error("duplicate claim hash")]
    DuplicateClaim,

    /// Backend failure.
    #[error("ledger backend: {0}")]
    Backend(String),
}

impl From<LedgerError> for AllocationError {
    fn from(err: LedgerError) -> Self {
        match err {
            // The service catches NonceTaken before conversion; reaching
            // here means the retry budget is spent.
            LedgerError::NonceTaken => AllocationError::Contention,
            LedgerError::DuplicateClaim | LedgerError::Backend(_) => AllocationError::Upstream {
                source: UpstreamSource::Storage,
                detail: err.to_string(),
            },
        }
    }
}

/// Indexer query failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IndexerError {
    /// Transport failure reaching the indexer.
    #[error("indexer network failure: {0}")]
    Network(String),

    /// The response named no resource lock for the query.
    #[error("no resource lock in indexer response")]
    LockNotFound,

    /// The response named no supported-chain entry for the allocator.
    #[error("no supported-chain entry in indexer response")]
    ChainNotSupported,

    /// The response did not match the expected shape.
    #[error("malformed indexer response: {0}")]
    Malformed(String),
}

impl From<IndexerError> for AllocationError {
    fn from(err: IndexerError) -> Self {
        match err {
            IndexerError::LockNotFound => AllocationError::LockNotFound,
            IndexerError::ChainNotSupported => AllocationError::AllocatorMismatch {
                detail: "indexer lists no allocator entry for this chain".to_string(),
            },
            IndexerError::Network(_) | IndexerError::Malformed(_) => AllocationError::Upstream {
                source: UpstreamSource::Indexer,
                detail: err.to_string(),
            },
        }
    }
}

/// Signer oracle failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignerError {
    /// The oracle could not produce a signature.
    #[error("signing failed: {0}")]
    Failure(String),
}

impl From<SignerError> for AllocationError {
    fn from(err: SignerError) -> Self {
        AllocationError::Upstream {
            source: UpstreamSource::Signer,
            detail: err.to_string(),
        }
    }
}
