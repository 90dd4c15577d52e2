//! Allocator configuration with validation.

use compact_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level allocator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// On-chain address of this allocator, used in indexer queries.
    pub allocator_address: Address,
    /// Maximum seconds a compact's expiry may sit in the future.
    pub expiry_window_secs: u64,
    /// Per-chain settlement grace periods.
    pub finalization: FinalizationConfig,
    /// Bounded retry count for nonce-reservation races.
    pub nonce_retry_limit: u32,
    /// Indexer endpoint configuration.
    pub indexer: IndexerConfig,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            allocator_address: Address::ZERO,
            expiry_window_secs: 7200,
            finalization: FinalizationConfig::default(),
            nonce_retry_limit: 3,
            indexer: IndexerConfig::default(),
        }
    }
}

impl AllocatorConfig {
    /// Validate configuration, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.allocator_address == Address::ZERO {
            return Err("allocator_address must be set".to_string());
        }
        if self.expiry_window_secs == 0 {
            return Err("expiry_window_secs must be positive".to_string());
        }
        if self.nonce_retry_limit == 0 {
            return Err("nonce_retry_limit must be at least 1".to_string());
        }
        if self.indexer.url.is_empty() {
            return Err("indexer.url must be set".to_string());
        }
        Ok(())
    }
}

/// Per-chain finalisation grace periods, seconds after `expires` during
/// which a compact still counts against the sponsor's balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizationConfig {
    /// Fallback for chains without an explicit entry.
    pub default_secs: u64,
    /// Chain-id → grace period overrides.
    pub per_chain_secs: HashMap<String, u64>,
}

impl Default for FinalizationConfig {
    fn default() -> Self {
        Self {
            default_secs: 60,
            per_chain_secs: HashMap::new(),
        }
    }
}

impl FinalizationConfig {
    /// Grace period for a chain.
    pub fn threshold_secs(&self, chain_id: &str) -> u64 {
        self.per_chain_secs
            .get(chain_id)
            .copied()
            .unwrap_or(self.default_secs)
    }
}

/// Indexer endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Query endpoint URL.
    pub url: String,
    /// Request timeout, seconds.
    pub timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 10,
        }
    }
}
