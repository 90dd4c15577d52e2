//! In-memory ledger and store for unit and integration tests.
//!
//! A single lock guards both tables so the joint nonce+record insert is
//! atomic, matching the transactional contract of the SQLite adapter.

use crate::domain::codec::{next_available, NonceFragment, LOW_MAX};
use crate::domain::entities::{ChainId, CompactRecord, NonceEntry};
use crate::domain::errors::LedgerError;
use crate::ports::outbound::{CompactStore, NonceLedger};
use async_trait::async_trait;
use compact_types::{Address, Hash32};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
struct Inner {
    nonces: BTreeMap<(String, Address), BTreeSet<NonceFragment>>,
    compacts: Vec<CompactRecord>,
}

/// In-memory ledger for tests. Production uses `SqliteLedger`.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
}

impl InMemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a consumed nonce tuple.
    pub fn seed_nonce(&self, chain_id: &ChainId, sponsor: Address, fragment: NonceFragment) {
        self.inner
            .lock()
            .nonces
            .entry((chain_id.as_str().to_string(), sponsor))
            .or_default()
            .insert(fragment);
    }

    /// Number of stored nonce tuples across all keys.
    pub fn nonce_count(&self) -> usize {
        self.inner.lock().nonces.values().map(BTreeSet::len).sum()
    }
}

#[async_trait]
impl NonceLedger for InMemoryLedger {
    async fn next_fragment(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<NonceFragment, LedgerError> {
        let inner = self.inner.lock();
        let used = inner
            .nonces
            .get(&(chain_id.as_str().to_string(), sponsor));
        Ok(match used {
            Some(set) => next_available(set.iter().copied()),
            None => NonceFragment::FIRST,
        })
    }

    async fn is_used(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
        fragment: NonceFragment,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .inner
            .lock()
            .nonces
            .get(&(chain_id.as_str().to_string(), sponsor))
            .is_some_and(|set| set.contains(&fragment)))
    }
}

#[async_trait]
impl CompactStore for InMemoryLedger {
    async fn append(
        &self,
        entry: &NonceEntry,
        record: &CompactRecord,
    ) -> Result<(), LedgerError> {
        if entry.low > LOW_MAX {
            return Err(LedgerError::Backend(
                "nonce low exceeds the storage bound".to_string(),
            ));
        }
        let mut inner = self.inner.lock();
        let fragment = NonceFragment {
            high: entry.high,
            low: entry.low,
        };
        let key = (entry.chain_id.as_str().to_string(), entry.sponsor);
        if inner
            .nonces
            .get(&key)
            .is_some_and(|set| set.contains(&fragment))
        {
            return Err(LedgerError::NonceTaken);
        }
        if inner
            .compacts
            .iter()
            .any(|r| r.chain_id == record.chain_id && r.claim_hash == record.claim_hash)
        {
            return Err(LedgerError::DuplicateClaim);
        }
        inner.nonces.entry(key).or_default().insert(fragment);
        inner.compacts.push(record.clone());
        Ok(())
    }

    async fn get(
        &self,
        chain_id: &ChainId,
        claim_hash: &Hash32,
    ) -> Result<Option<CompactRecord>, LedgerError> {
        Ok(self
            .inner
            .lock()
            .compacts
            .iter()
            .find(|r| &r.chain_id == chain_id && &r.claim_hash == claim_hash)
            .cloned())
    }

    async fn list_by_sponsor(&self, sponsor: Address) -> Result<Vec<CompactRecord>, LedgerError> {
        let mut records: Vec<_> = self
            .inner
            .lock()
            .compacts
            .iter()
            .filter(|r| r.compact.sponsor == sponsor)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn list_for_allocation(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<Vec<CompactRecord>, LedgerError> {
        Ok(self
            .inner
            .lock()
            .compacts
            .iter()
            .filter(|r| &r.chain_id == chain_id && r.compact.sponsor == sponsor)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Compact;
    use compact_types::{Signature, U256};

    fn chain() -> ChainId {
        ChainId::parse("1").unwrap()
    }

    fn sponsor() -> Address {
        Address::new([0x42; 20])
    }

    fn entry(high: u64, low: u32) -> NonceEntry {
        NonceEntry {
            chain_id: chain(),
            sponsor: sponsor(),
            high,
            low,
        }
    }

    fn record(claim_byte: u8, created_at: u64) -> CompactRecord {
        CompactRecord {
            chain_id: chain(),
            compact: Compact {
                arbiter: Address::new([0x01; 20]),
                sponsor: sponsor(),
                nonce: Some(U256::zero()),
                expires: 2000,
                id: U256::one(),
                amount: U256::from(10u64),
                witness_type_string: None,
                witness_hash: None,
            },
            claim_hash: Hash32::repeat_byte(claim_byte),
            signature: Signature::new([0u8; 65]),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_next_fragment_empty_ledger() {
        let ledger = InMemoryLedger::new();
        assert_eq!(
            ledger.next_fragment(&chain(), sponsor()).await.unwrap(),
            NonceFragment::FIRST
        );
    }

    #[tokio::test]
    async fn test_next_fragment_reuses_gap() {
        let ledger = InMemoryLedger::new();
        ledger.seed_nonce(&chain(), sponsor(), NonceFragment { high: 0, low: 0 });
        ledger.seed_nonce(&chain(), sponsor(), NonceFragment { high: 0, low: 2 });
        assert_eq!(
            ledger.next_fragment(&chain(), sponsor()).await.unwrap(),
            NonceFragment { high: 0, low: 1 }
        );
    }

    #[tokio::test]
    async fn test_nonce_scoped_per_chain_and_sponsor() {
        let ledger = InMemoryLedger::new();
        ledger.seed_nonce(&chain(), sponsor(), NonceFragment::FIRST);

        let other_chain = ChainId::parse("10").unwrap();
        assert_eq!(
            ledger.next_fragment(&other_chain, sponsor()).await.unwrap(),
            NonceFragment::FIRST
        );
        let other_sponsor = Address::new([0x43; 20]);
        assert_eq!(
            ledger.next_fragment(&chain(), other_sponsor).await.unwrap(),
            NonceFragment::FIRST
        );
    }

    #[tokio::test]
    async fn test_append_rejects_taken_nonce() {
        let ledger = InMemoryLedger::new();
        ledger.append(&entry(0, 0), &record(0x01, 100)).await.unwrap();
        assert_eq!(
            ledger
                .append(&entry(0, 0), &record(0x02, 101))
                .await
                .unwrap_err(),
            LedgerError::NonceTaken
        );
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_claim() {
        let ledger = InMemoryLedger::new();
        ledger.append(&entry(0, 0), &record(0x01, 100)).await.unwrap();
        assert_eq!(
            ledger
                .append(&entry(0, 1), &record(0x01, 101))
                .await
                .unwrap_err(),
            LedgerError::DuplicateClaim
        );
    }

    #[tokio::test]
    async fn test_append_rejects_unstorable_low() {
        let ledger = InMemoryLedger::new();
        let result = ledger
            .append(&entry(0, LOW_MAX + 1), &record(0x01, 100))
            .await;
        assert!(matches!(result, Err(LedgerError::Backend(_))));
    }

    #[tokio::test]
    async fn test_list_by_sponsor_newest_first() {
        let ledger = InMemoryLedger::new();
        ledger.append(&entry(0, 0), &record(0x01, 100)).await.unwrap();
        ledger.append(&entry(0, 1), &record(0x02, 300)).await.unwrap();
        ledger.append(&entry(0, 2), &record(0x03, 200)).await.unwrap();

        let records = ledger.list_by_sponsor(sponsor()).await.unwrap();
        let created: Vec<u64> = records.iter().map(|r| r.created_at).collect();
        assert_eq!(created, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let ledger = InMemoryLedger::new();
        let rec = record(0x0A, 100);
        ledger.append(&entry(0, 0), &rec).await.unwrap();

        let fetched = ledger
            .get(&chain(), &Hash32::repeat_byte(0x0A))
            .await
            .unwrap();
        assert_eq!(fetched, Some(rec));
        assert_eq!(
            ledger.get(&chain(), &Hash32::repeat_byte(0x0B)).await.unwrap(),
            None
        );
    }
}
