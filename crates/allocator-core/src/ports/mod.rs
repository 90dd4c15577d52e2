//! Ports: the inbound admission API and the outbound collaborator traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{Admission, AllocatorApi};
pub use outbound::{
    CompactStore, FixedTimeSource, IndexerClient, LockQuery, MockIndexerClient, MockSigner,
    NonceLedger, SignerOracle, TimeSource,
};
