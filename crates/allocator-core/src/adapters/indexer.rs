//! HTTP client for the chain indexer.
//!
//! Issues one query per lock snapshot and maps the response onto the
//! domain view. The three failure shapes stay distinct: transport
//! failures, a missing resource lock, and a missing supported-chain entry.

use crate::domain::config::IndexerConfig;
use crate::domain::entities::{LockSnapshot, SignedU256};
use crate::domain::errors::IndexerError;
use crate::ports::outbound::{IndexerClient, LockQuery};
use async_trait::async_trait;
use compact_types::hashing::hash_from_hex;
use compact_types::uint::from_dec_strict;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const LOCK_STATE_QUERY: &str = "\
query LockState($allocator: String!, $sponsor: String!, $lockId: BigInt!, $chainId: BigInt!) {
  account(address: $sponsor) {
    resourceLocks(lockId: $lockId, chainId: $chainId) { balance withdrawalStatus }
    claims(allocator: $allocator, chainId: $chainId) { claimHash }
  }
  allocator(address: $allocator) {
    supportedChains(chainId: $chainId) { allocatorId }
  }
  accountDeltas(address: $sponsor, chainId: $chainId) { delta }
}";

/// Indexer client over HTTP.
pub struct HttpIndexerClient {
    client: reqwest::Client,
    url: String,
}

impl HttpIndexerClient {
    /// Build a client from configuration.
    pub fn new(config: &IndexerConfig) -> Result<Self, IndexerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IndexerError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl IndexerClient for HttpIndexerClient {
    async fn lock_snapshot(&self, query: &LockQuery) -> Result<LockSnapshot, IndexerError> {
        let body = json!({
            "query": LOCK_STATE_QUERY,
            "variables": {
                "allocator": query.allocator.to_checksum(),
                "sponsor": query.sponsor.to_checksum(),
                "lockId": query.token_lock_id.to_string(),
                "chainId": query.chain_id.as_str(),
            },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexerError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IndexerError::Network(format!(
                "indexer returned {}",
                response.status()
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| IndexerError::Malformed(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let detail = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(IndexerError::Network(detail));
        }

        let data = envelope
            .data
            .ok_or_else(|| IndexerError::Malformed("response carried no data".to_string()))?;
        debug!(chain = %query.chain_id, sponsor = %query.sponsor, "indexer snapshot fetched");
        data.into_snapshot()
    }
}

// Response shape.

#[derive(Deserialize)]
struct Envelope {
    data: Option<QueryData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    account: Option<AccountView>,
    allocator: Option<AllocatorView>,
    #[serde(default)]
    account_deltas: Vec<DeltaView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountView {
    #[serde(default)]
    resource_locks: Vec<ResourceLockView>,
    #[serde(default)]
    claims: Vec<ClaimView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceLockView {
    balance: String,
    withdrawal_status: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimView {
    claim_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocatorView {
    #[serde(default)]
    supported_chains: Vec<SupportedChainView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SupportedChainView {
    allocator_id: String,
}

#[derive(Deserialize)]
struct DeltaView {
    delta: String,
}

impl QueryData {
    fn into_snapshot(self) -> Result<LockSnapshot, IndexerError> {
        let account = self.account.ok_or(IndexerError::LockNotFound)?;
        let lock = account
            .resource_locks
            .into_iter()
            .next()
            .ok_or(IndexerError::LockNotFound)?;
        let supported = self
            .allocator
            .and_then(|a| a.supported_chains.into_iter().next())
            .ok_or(IndexerError::ChainNotSupported)?;

        let balance = from_dec_strict(&lock.balance)
            .map_err(|e| IndexerError::Malformed(format!("balance: {e}")))?;
        let allocator_id = from_dec_strict(&supported.allocator_id)
            .map_err(|e| IndexerError::Malformed(format!("allocatorId: {e}")))?;

        let claims = account
            .claims
            .iter()
            .map(|c| {
                hash_from_hex(&c.claim_hash)
                    .map_err(|e| IndexerError::Malformed(format!("claimHash: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pending_deltas = self
            .account_deltas
            .iter()
            .map(|d| {
                SignedU256::parse(&d.delta)
                    .map_err(|e| IndexerError::Malformed(format!("delta: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LockSnapshot {
            balance,
            withdrawal_status: lock.withdrawal_status,
            allocator_id,
            pending_deltas,
            claims,
        })
    }
}
