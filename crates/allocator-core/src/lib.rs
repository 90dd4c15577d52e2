//! # Compact Allocator - Admission Core
//!
//! Server-side allocation core for The Compact resource-lock protocol.
//! Sponsors submit compacts; this crate validates them, co-signs the
//! EIP-712 claim hash, and records the consumed nonce and the issued
//! compact in one atomic commit.
//!
//! ## Admission flow
//!
//! ```text
//! submission ──► validate (chain, structure, nonce, expiry, lock, balance)
//!            ──► claim hash (EIP-712) ──► sign ──► persist nonce + record
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! allocator-core/
//! ├── domain/     # entities, bit codec, typed-data hashing, reconciliation
//! ├── ports/      # AllocatorApi inbound; ledger/store/indexer/signer outbound
//! ├── adapters/   # SQLite ledger, HTTP indexer, local k256 signer, clock
//! └── service     # CompactService: the admission orchestration
//! ```
//!
//! ## Guarantees
//!
//! | Property | Enforcement |
//! |----------|-------------|
//! | Nonce uniqueness per (chain, sponsor) | primary key on the 4-tuple |
//! | Nonce bound to sponsor | top 160 bits checked / generated |
//! | No over-allocation | reconciliation against the indexer snapshot |
//! | No partial writes | nonce row + record commit in one transaction |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{HttpIndexerClient, InMemoryLedger, LocalSigner, SqliteLedger, SystemTimeSource};
pub use domain::{
    AllocationError, AllocatorConfig, ChainId, Compact, CompactRecord, CompactState,
    CompactSubmission, LockSnapshot, NonceEntry,
};
pub use ports::{Admission, AllocatorApi};
pub use service::CompactService;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
