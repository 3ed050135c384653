//! Chain client for site contracts.
//!
//! Both operations run the same cycle against a single signing account:
//! simulate (eth_call) → submit → wait for receipt → check status. Every
//! failure along the way comes back as a [`ChainFailure`] value; nothing is
//! raised past this module.

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use thiserror::Error;

mod contracts;
mod evm;
mod wallet;

pub use contracts::{OrbiterFactory, OrbiterSite};
pub use evm::{find_clone_created, EvmSiteContractClient};
pub use wallet::signer_from_private_key;

pub type ChainResult<T> = std::result::Result<T, ChainFailure>;

/// Why a chain operation did not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainFailure {
    #[error("simulation of {function} failed: {reason}")]
    Simulation {
        function: &'static str,
        reason: String,
    },

    #[error("submitting {function} failed: {reason}")]
    Submission {
        function: &'static str,
        reason: String,
    },

    #[error("receipt for {tx_hash} not obtained: {reason}")]
    Receipt { tx_hash: TxHash, reason: String },

    #[error("transaction {tx_hash} not confirmed (status: reverted)")]
    Reverted { tx_hash: TxHash },

    #[error("transaction {tx_hash} emitted no clone creation event")]
    MissingEvent { tx_hash: TxHash },
}

/// A site contract deployed by the factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContractCreated {
    pub clone_address: Address,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// A CID recorded on a site contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidUpdated {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait SiteContractChain: Send + Sync {
    /// Deploy a new site contract through the factory.
    async fn create_site_contract(&self) -> ChainResult<SiteContractCreated>;

    /// Record `cid` on the site contract at `contract_address`.
    async fn write_cid(&self, contract_address: Address, cid: &str) -> ChainResult<CidUpdated>;
}
