//! Inbound port: the admission API the transport layer consumes.

use crate::domain::entities::{CompactRecord, CompactSubmission};
use crate::domain::errors::AllocationError;
use async_trait::async_trait;
use compact_types::hashing::h256_hex;
use compact_types::{Address, Hash32, Signature};
use serde::{Deserialize, Serialize};

/// Result of a successful admission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    /// EIP-712 digest the allocator signed.
    #[serde(with = "h256_hex")]
    pub claim_hash: Hash32,
    /// The allocator's co-signature.
    pub signature: Signature,
}

/// Allocator admission API - inbound port.
#[async_trait]
pub trait AllocatorApi: Send + Sync {
    /// Admit a compact: validate, co-sign, and persist it.
    ///
    /// `authenticated_sponsor` is the session principal established by the
    /// transport layer; it must equal the compact's sponsor.
    async fn admit(
        &self,
        submission: CompactSubmission,
        chain_id: &str,
        authenticated_sponsor: Address,
    ) -> Result<Admission, AllocationError>;

    /// Fetch one admitted compact by `(chainId, claimHash)`.
    async fn lookup(
        &self,
        chain_id: &str,
        claim_hash: &Hash32,
    ) -> Result<Option<CompactRecord>, AllocationError>;

    /// All compacts admitted for a sponsor, newest first.
    async fn list_by_sponsor(
        &self,
        sponsor: Address,
    ) -> Result<Vec<CompactRecord>, AllocationError>;
}
