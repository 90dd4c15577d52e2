//! Adapters: concrete implementations of the outbound ports.

pub mod indexer;
pub mod memory;
pub mod signer;
pub mod sqlite;
pub mod time;

pub use indexer::HttpIndexerClient;
pub use memory::InMemoryLedger;
pub use signer::LocalSigner;
pub use sqlite::SqliteLedger;
pub use time::SystemTimeSource;
