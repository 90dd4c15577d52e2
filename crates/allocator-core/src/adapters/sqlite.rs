//! Durable ledger and store backed by `SQLite`.
//!
//! # Schema
//!
//! The `nonces` table carries `(chain_id, sponsor, high, low)` with the
//! 4-tuple as primary key - that key is the authoritative concurrency
//! contract for nonce reservation. The `compacts` table carries the
//! admitted compact as JSON plus its claim hash, signature, and creation
//! time, unique on `(chain_id, claim_hash)`.

use crate::domain::codec::{next_available, NonceFragment, LOW_MAX};
use crate::domain::entities::{ChainId, CompactRecord, NonceEntry};
use crate::domain::errors::LedgerError;
use crate::ports::outbound::{CompactStore, NonceLedger};
use async_trait::async_trait;
use compact_types::{Address, Hash32};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// SQLite-backed implementation of both persistence ports.
///
/// Handles are cheap to clone; all of them share one connection.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database, for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, LedgerError> {
        Self::init_schema(&conn).map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create tables and indexes.
    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nonces (
                chain_id TEXT NOT NULL,
                sponsor  BLOB NOT NULL,
                high     INTEGER NOT NULL,
                low      INTEGER NOT NULL,
                PRIMARY KEY (chain_id, sponsor, high, low)
            );
            CREATE TABLE IF NOT EXISTS compacts (
                chain_id   TEXT NOT NULL,
                claim_hash BLOB NOT NULL,
                sponsor    BLOB NOT NULL,
                compact    TEXT NOT NULL,
                signature  BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (chain_id, claim_hash)
            );
            CREATE INDEX IF NOT EXISTS idx_compacts_sponsor
                ON compacts (sponsor, created_at);",
        )
    }
}

fn backend(err: rusqlite::Error) -> LedgerError {
    LedgerError::Backend(err.to_string())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn storable_low(low: u32) -> Result<i64, LedgerError> {
    if low > LOW_MAX {
        return Err(LedgerError::Backend(
            "nonce low exceeds the storage bound".to_string(),
        ));
    }
    Ok(i64::from(low))
}

fn storable_high(high: u64) -> Result<i64, LedgerError> {
    i64::try_from(high)
        .map_err(|_| LedgerError::Backend("nonce high exceeds the storage bound".to_string()))
}

fn row_to_record(
    chain_id: &str,
    claim_hash: &[u8],
    compact_json: &str,
    signature: &[u8],
    created_at: i64,
) -> Result<CompactRecord, LedgerError> {
    if claim_hash.len() != 32 || signature.len() != 65 {
        return Err(LedgerError::Backend("corrupt stored record".to_string()));
    }
    let mut sig = [0u8; 65];
    sig.copy_from_slice(signature);
    Ok(CompactRecord {
        chain_id: ChainId::parse(chain_id)
            .map_err(|_| LedgerError::Backend("stored chain id not canonical".to_string()))?,
        compact: serde_json::from_str(compact_json)
            .map_err(|e| LedgerError::Backend(format!("stored compact unreadable: {e}")))?,
        claim_hash: Hash32::from_slice(claim_hash),
        signature: compact_types::Signature::new(sig),
        created_at: u64::try_from(created_at).unwrap_or(0),
    })
}

#[async_trait]
impl NonceLedger for SqliteLedger {
    async fn next_fragment(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<NonceFragment, LedgerError> {
        let conn = self.conn.lock();
        // One ordered scan: the gap search and its snapshot are a single
        // logical read.
        let mut stmt = conn
            .prepare_cached(
                "SELECT high, low FROM nonces
                 WHERE chain_id = ?1 AND sponsor = ?2
                 ORDER BY high ASC, low ASC",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![chain_id.as_str(), sponsor.as_bytes()], |row| {
                let high: i64 = row.get(0)?;
                let low: i64 = row.get(1)?;
                Ok(NonceFragment {
                    high: high as u64,
                    low: low as u32,
                })
            })
            .map_err(backend)?;

        let mut used = Vec::new();
        for row in rows {
            used.push(row.map_err(backend)?);
        }
        let fragment = next_available(used);
        debug!(
            chain = %chain_id,
            sponsor = %sponsor,
            high = fragment.high,
            low = fragment.low,
            "reserved nonce fragment"
        );
        Ok(fragment)
    }

    async fn is_used(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
        fragment: NonceFragment,
    ) -> Result<bool, LedgerError> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM nonces
                 WHERE chain_id = ?1 AND sponsor = ?2 AND high = ?3 AND low = ?4",
                params![
                    chain_id.as_str(),
                    sponsor.as_bytes(),
                    storable_high(fragment.high)?,
                    storable_low(fragment.low)?
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl CompactStore for SqliteLedger {
    async fn append(
        &self,
        entry: &NonceEntry,
        record: &CompactRecord,
    ) -> Result<(), LedgerError> {
        let compact_json = serde_json::to_string(&record.compact)
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        let high = storable_high(entry.high)?;
        let low = storable_low(entry.low)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(backend)?;

        tx.execute(
            "INSERT INTO nonces (chain_id, sponsor, high, low) VALUES (?1, ?2, ?3, ?4)",
            params![entry.chain_id.as_str(), entry.sponsor.as_bytes(), high, low],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                LedgerError::NonceTaken
            } else {
                backend(e)
            }
        })?;

        tx.execute(
            "INSERT INTO compacts (chain_id, claim_hash, sponsor, compact, signature, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.chain_id.as_str(),
                record.claim_hash.as_bytes(),
                record.compact.sponsor.as_bytes(),
                compact_json,
                &record.signature.as_bytes()[..],
                i64::try_from(record.created_at)
                    .map_err(|_| LedgerError::Backend("created_at out of range".to_string()))?,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                LedgerError::DuplicateClaim
            } else {
                backend(e)
            }
        })?;

        tx.commit().map_err(backend)
    }

    async fn get(
        &self,
        chain_id: &ChainId,
        claim_hash: &Hash32,
    ) -> Result<Option<CompactRecord>, LedgerError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT compact, signature, created_at FROM compacts
                 WHERE chain_id = ?1 AND claim_hash = ?2",
                params![chain_id.as_str(), claim_hash.as_bytes()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(backend)?;
        row.map(|(compact, signature, created_at)| {
            row_to_record(
                chain_id.as_str(),
                claim_hash.as_bytes(),
                &compact,
                &signature,
                created_at,
            )
        })
        .transpose()
    }

    async fn list_by_sponsor(&self, sponsor: Address) -> Result<Vec<CompactRecord>, LedgerError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT chain_id, claim_hash, compact, signature, created_at FROM compacts
                 WHERE sponsor = ?1 ORDER BY created_at DESC",
            )
            .map_err(backend)?;
        collect_records(&mut stmt, params![sponsor.as_bytes()])
    }

    async fn list_for_allocation(
        &self,
        chain_id: &ChainId,
        sponsor: Address,
    ) -> Result<Vec<CompactRecord>, LedgerError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT chain_id, claim_hash, compact, signature, created_at FROM compacts
                 WHERE chain_id = ?1 AND sponsor = ?2",
            )
            .map_err(backend)?;
        collect_records(&mut stmt, params![chain_id.as_str(), sponsor.as_bytes()])
    }
}

fn collect_records(
    stmt: &mut rusqlite::CachedStatement<'_>,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<CompactRecord>, LedgerError> {
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .map_err(backend)?;

    let mut records = Vec::new();
    for row in rows {
        let (chain_id, claim_hash, compact, signature, created_at) = row.map_err(backend)?;
        records.push(row_to_record(
            &chain_id,
            &claim_hash,
            &compact,
            &signature,
            created_at,
        )?);
    }
    Ok(records)
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
                nonce: Some(U256::from(claim_byte)),
                expires: 2000,
                id: U256::one(),
                amount: U256::from(10u64).pow(U256::from(18u64)),
                witness_type_string: None,
                witness_hash: None,
            },
            claim_hash: Hash32::repeat_byte(claim_byte),
            signature: Signature::new([0x07; 65]),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_empty_ledger_yields_first_fragment() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        assert_eq!(
            ledger.next_fragment(&chain(), sponsor()).await.unwrap(),
            NonceFragment::FIRST
        );
    }

    #[tokio::test]
    async fn test_gap_search_over_sql_rows() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.append(&entry(0, 0), &record(0x01, 100)).await.unwrap();
        ledger.append(&entry(0, 2), &record(0x02, 101)).await.unwrap();

        assert_eq!(
            ledger.next_fragment(&chain(), sponsor()).await.unwrap(),
            NonceFragment { high: 0, low: 1 }
        );
    }

    #[tokio::test]
    async fn test_dense_prefix_advances_to_tail() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        for (i, low) in [0u32, 1, 2].iter().enumerate() {
            ledger
                .append(&entry(0, *low), &record(0x10 + i as u8, 100 + i as u64))
                .await
                .unwrap();
        }
        assert_eq!(
            ledger.next_fragment(&chain(), sponsor()).await.unwrap(),
            NonceFragment { high: 0, low: 3 }
        );
    }

    #[tokio::test]
    async fn test_duplicate_nonce_is_nonce_taken() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.append(&entry(0, 0), &record(0x01, 100)).await.unwrap();
        assert_eq!(
            ledger
                .append(&entry(0, 0), &record(0x02, 101))
                .await
                .unwrap_err(),
            LedgerError::NonceTaken
        );
        // The losing transaction rolled back entirely.
        assert_eq!(
            ledger
                .get(&chain(), &Hash32::repeat_byte(0x02))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_duplicate_claim_hash_refused() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.append(&entry(0, 0), &record(0x01, 100)).await.unwrap();
        assert_eq!(
            ledger
                .append(&entry(0, 1), &record(0x01, 101))
                .await
                .unwrap_err(),
            LedgerError::DuplicateClaim
        );
        // The nonce row of the failed admission must not survive.
        assert!(!ledger
            .is_used(&chain(), sponsor(), NonceFragment { high: 0, low: 1 })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_is_used_membership() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.append(&entry(3, 9), &record(0x01, 100)).await.unwrap();
        assert!(ledger
            .is_used(&chain(), sponsor(), NonceFragment { high: 3, low: 9 })
            .await
            .unwrap());
        assert!(!ledger
            .is_used(&chain(), sponsor(), NonceFragment { high: 3, low: 8 })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let rec = record(0x0A, 123);
        ledger.append(&entry(0, 0), &rec).await.unwrap();

        let fetched = ledger
            .get(&chain(), &Hash32::repeat_byte(0x0A))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, rec);
    }

    #[tokio::test]
    async fn test_list_by_sponsor_descending() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.append(&entry(0, 0), &record(0x01, 100)).await.unwrap();
        ledger.append(&entry(0, 1), &record(0x02, 300)).await.unwrap();
        ledger.append(&entry(0, 2), &record(0x03, 200)).await.unwrap();

        let records = ledger.list_by_sponsor(sponsor()).await.unwrap();
        let created: Vec<u64> = records.iter().map(|r| r.created_at).collect();
        assert_eq!(created, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_unstorable_low_rejected() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let result = ledger.append(&entry(0, LOW_MAX + 1), &record(0x01, 100)).await;
        assert!(matches!(result, Err(LedgerError::Backend(_))));
    }
}
