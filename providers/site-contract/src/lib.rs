//! Site Contract Provider
//!
//! Consumes the site contract queue and, per work item, either deploys a new
//! per-site contract through the factory and links it to its site, or records
//! a CID on an existing site contract. Work items are processed one at a time
//! and acknowledged exactly once (at-most-once delivery).

pub mod address_cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod handler;
pub mod nats_client;
pub mod processor;
pub mod provider;
pub mod site_store;

pub use address_cache::{ContractAddressCache, RedisContractAddressCache};
pub use chain::{ChainFailure, EvmSiteContractClient, SiteContractChain};
pub use config::SiteContractConfig;
pub use error::SiteContractError;
pub use handler::{ContractMessageHandler, MessageOutcome, SiteLink};
pub use nats_client::{ContractQueuePublisher, NatsClient};
pub use processor::{BatchProcessor, BatchSummary, QueueMessage};
pub use provider::SiteContractProvider;
pub use site_store::{SiteStore, SupabaseSiteStore};

// Re-export Result type for convenience
pub type Result<T> = std::result::Result<T, SiteContractError>;
