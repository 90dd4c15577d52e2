//! Top-level admission service.
//!
//! Sequences one admission: authenticate the sponsor, resolve a nonce,
//! run the validation stages in order, hash, sign, and persist the nonce
//! row and compact record atomically. A lost nonce race restarts the
//! attempt up to the configured bound; nothing durable happens before the
//! final commit.

use crate::domain::codec::pack_nonce;
use crate::domain::config::AllocatorConfig;
use crate::domain::entities::{ChainId, Compact, CompactRecord, CompactSubmission, NonceEntry};
use crate::domain::errors::{AllocationError, LedgerError};
use crate::domain::{reconcile, typed_data, validation};
use crate::ports::inbound::{Admission, AllocatorApi};
use crate::ports::outbound::{
    CompactStore, IndexerClient, LockQuery, NonceLedger, SignerOracle, TimeSource,
};
use async_trait::async_trait;
use compact_types::{Address, Hash32, U256};
use tracing::{debug, info, warn};

/// The admission core, generic over its collaborators.
pub struct CompactService<L, S, I, O, T> {
    ledger: L,
    store: S,
    indexer: I,
    signer: O,
    clock: T,
    config: AllocatorConfig,
}

impl<L, S, I, O, T> CompactService<L, S, I, O, T>
where
    L: NonceLedger,
    S: CompactStore,
    I: IndexerClient,
    O: SignerOracle,
    T: TimeSource,
{
    /// Assemble the service from its collaborators.
    pub fn new(ledger: L, store: S, indexer: I, signer: O, clock: T, config: AllocatorConfig) -> Self {
        Self {
            ledger,
            store,
            indexer,
            signer,
            clock,
            config,
        }
    }

    /// One admission attempt with a resolved nonce. Everything up to the
    /// final append is side-effect free.
    async fn try_admit(
        &self,
        compact: &Compact,
        nonce: U256,
        chain_id: &ChainId,
        now: u64,
    ) -> Result<Admission, AllocationError> {
        let sponsor = compact.sponsor;

        // Nonce: sponsor binding, then freshness.
        let nonce_fields = validation::validate_nonce_binding(nonce, sponsor)?;
        if self
            .ledger
            .is_used(chain_id, sponsor, nonce_fields.fragment)
            .await?
        {
            return Err(AllocationError::NonceUsed);
        }

        // Expiry window, then lock policy.
        validation::validate_expiry(compact.expires, now, self.config.expiry_window_secs)?;
        let lock = validation::validate_lock(compact.id, compact.expires, now)?;

        // Allocation against the indexer snapshot and local commitments.
        let snapshot = self
            .indexer
            .lock_snapshot(&LockQuery {
                allocator: self.config.allocator_address,
                sponsor,
                token_lock_id: lock.token_lock_id,
                chain_id: chain_id.clone(),
            })
            .await?;
        validation::validate_lock_snapshot(&snapshot, lock.allocator_id)?;

        let records = self.store.list_for_allocation(chain_id, sponsor).await?;
        let threshold = self.config.finalization.threshold_secs(chain_id.as_str());
        reconcile::check_allocation(
            &snapshot,
            &records,
            lock.token_lock_id,
            compact.amount,
            now,
            threshold,
        )?;

        // Hash, sign, persist.
        let claim_hash = typed_data::claim_hash(compact, nonce, chain_id);
        let signature = self.signer.sign(&claim_hash).await?;

        let record = CompactRecord {
            chain_id: chain_id.clone(),
            compact: Compact {
                nonce: Some(nonce),
                ..compact.clone()
            },
            claim_hash,
            signature,
            created_at: now,
        };
        let entry = NonceEntry {
            chain_id: chain_id.clone(),
            sponsor,
            high: nonce_fields.fragment.high,
            low: nonce_fields.fragment.low,
        };

        match self.store.append(&entry, &record).await {
            Ok(()) => {
                info!(
                    chain = %chain_id,
                    sponsor = %sponsor,
                    claim_hash = %claim_hash,
                    "compact admitted"
                );
                Ok(Admission {
                    claim_hash,
                    signature,
                })
            }
            Err(LedgerError::NonceTaken) => Err(AllocationError::Contention),
            Err(other) => Err(other.into()),
        }
    }
}

#[async_trait]
impl<L, S, I, O, T> AllocatorApi for CompactService<L, S, I, O, T>
where
    L: NonceLedger,
    S: CompactStore,
    I: IndexerClient,
    O: SignerOracle,
    T: TimeSource,
{
    async fn admit(
        &self,
        submission: CompactSubmission,
        chain_id: &str,
        authenticated_sponsor: Address,
    ) -> Result<Admission, AllocationError> {
        let chain_id = validation::validate_chain_id(chain_id)?;
        let compact = validation::validate_structure(&submission)?;

        if compact.sponsor != authenticated_sponsor {
            return Err(AllocationError::Unauthorised);
        }

        // One clock capture feeds every stage of this request.
        let now = self.clock.now();

        for attempt in 0..self.config.nonce_retry_limit {
            let nonce = match compact.nonce {
                Some(explicit) => explicit,
                None => {
                    let fragment = self
                        .ledger
                        .next_fragment(&chain_id, compact.sponsor)
                        .await?;
                    pack_nonce(compact.sponsor, fragment)
                }
            };
            debug!(chain = %chain_id, sponsor = %compact.sponsor, attempt, "admission attempt");

            match self.try_admit(&compact, nonce, &chain_id, now).await {
                // A lost insert race: another admission committed this
                // fragment between reservation and commit. Re-reserve.
                Err(AllocationError::Contention) => {
                    warn!(
                        chain = %chain_id,
                        sponsor = %compact.sponsor,
                        attempt,
                        "nonce race lost, retrying"
                    );
                    continue;
                }
                outcome => return outcome,
            }
        }
        Err(AllocationError::Contention)
    }

    async fn lookup(
        &self,
        chain_id: &str,
        claim_hash: &Hash32,
    ) -> Result<Option<CompactRecord>, AllocationError> {
        let chain_id = validation::validate_chain_id(chain_id)?;
        Ok(self.store.get(&chain_id, claim_hash).await?)
    }

    async fn list_by_sponsor(
        &self,
        sponsor: Address,
    ) -> Result<Vec<CompactRecord>, AllocationError> {
        Ok(self.store.list_by_sponsor(sponsor).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLedger;
    use crate::domain::codec::{pack_id, LockFields};
    use crate::domain::entities::LockSnapshot;
    use crate::ports::outbound::{FixedTimeSource, MockIndexerClient, MockSigner};
    use compact_types::U256;
    use std::sync::Arc;

    const SPONSOR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const NOW: u64 = 1_700_000_000;

    fn config() -> AllocatorConfig {
        AllocatorConfig {
            allocator_address: Address::new([0x11; 20]),
            ..AllocatorConfig::default()
        }
    }

    fn lock_id() -> U256 {
        pack_id(&LockFields {
            reset_period_index: 7,
            allocator_id: U256::one(),
            token_lock_id: U256::zero(),
        })
    }

    fn snapshot(balance: U256) -> LockSnapshot {
        LockSnapshot {
            balance,
            withdrawal_status: 0,
            allocator_id: U256::one(),
            pending_deltas: vec![],
            claims: vec![],
        }
    }

    fn submission() -> CompactSubmission {
        CompactSubmission {
            arbiter: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
            sponsor: SPONSOR.to_string(),
            nonce: None,
            expires: NOW + 3600,
            id: lock_id(),
            amount: "1000000000000000000".to_string(),
            witness_type_string: None,
            witness_hash: None,
        }
    }

    fn service(
        balance: U256,
    ) -> CompactService<
        Arc<InMemoryLedger>,
        Arc<InMemoryLedger>,
        MockIndexerClient,
        MockSigner,
        FixedTimeSource,
    > {
        let ledger = Arc::new(InMemoryLedger::new());
        CompactService::new(
            Arc::clone(&ledger),
            ledger,
            MockIndexerClient::with_snapshot(snapshot(balance)),
            MockSigner,
            FixedTimeSource(NOW),
            config(),
        )
    }

    fn ten_tokens() -> U256 {
        U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[tokio::test]
    async fn test_admit_rejects_foreign_principal() {
        let svc = service(ten_tokens());
        let err = svc
            .admit(submission(), "1", Address::new([0x99; 20]))
            .await
            .unwrap_err();
        assert_eq!(err, AllocationError::Unauthorised);
    }

    #[tokio::test]
    async fn test_admit_rejects_malformed_chain() {
        let svc = service(ten_tokens());
        let sponsor = Address::parse(SPONSOR).unwrap();
        let err = svc.admit(submission(), "0x1", sponsor).await.unwrap_err();
        assert!(matches!(err, AllocationError::InvalidChainId(_)));
    }

    #[tokio::test]
    async fn test_admit_generates_nonce_and_persists() {
        let svc = service(ten_tokens());
        let sponsor = Address::parse(SPONSOR).unwrap();

        let admission = svc.admit(submission(), "1", sponsor).await.unwrap();

        let stored = svc.lookup("1", &admission.claim_hash).await.unwrap().unwrap();
        let nonce = stored.compact.nonce.unwrap();
        // The generated nonce is sponsor-prefixed and starts the space.
        assert_eq!(nonce, pack_nonce(sponsor, crate::domain::codec::NonceFragment::FIRST));
        assert_eq!(stored.claim_hash, admission.claim_hash);
    }

    #[tokio::test]
    async fn test_admit_surfaces_upstream_indexer_failure_verbatim() {
        let ledger = Arc::new(InMemoryLedger::new());
        let svc = CompactService::new(
            Arc::clone(&ledger),
            ledger,
            MockIndexerClient::with_error(crate::domain::errors::IndexerError::Network(
                "connection refused".to_string(),
            )),
            MockSigner,
            FixedTimeSource(NOW),
            config(),
        );
        let sponsor = Address::parse(SPONSOR).unwrap();
        let err = svc.admit(submission(), "1", sponsor).await.unwrap_err();
        assert!(matches!(err, AllocationError::Upstream { .. }));
    }
}
