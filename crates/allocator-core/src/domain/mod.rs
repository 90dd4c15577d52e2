//! Domain layer: entities, bit codec, typed-data hashing, reconciliation,
//! validation stages, configuration, and the error taxonomy.

pub mod codec;
pub mod config;
pub mod entities;
pub mod errors;
pub mod reconcile;
pub mod typed_data;
pub mod validation;

pub use codec::{LockFields, NonceFields, NonceFragment, LOW_MAX, RESET_PERIODS_SECS};
pub use config::{AllocatorConfig, FinalizationConfig, IndexerConfig};
pub use entities::{
    ChainId, Compact, CompactRecord, CompactState, CompactSubmission, LockSnapshot, NonceEntry,
    SignedU256,
};
pub use errors::{
    AddressField, AllocationError, IndexerError, LedgerError, SignerError, UpstreamSource,
};
