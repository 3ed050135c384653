use std::time::Duration;

use alloy::{
    contract::{CallBuilder, CallDecoder},
    network::{EthereumWallet, ReceiptResponse},
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Log, TransactionReceipt},
    sol_types::SolEvent,
    transports::http::reqwest::Url,
};
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::{
    contracts::{OrbiterFactory, OrbiterSite},
    wallet::signer_from_private_key,
    ChainFailure, ChainResult, CidUpdated, SiteContractChain, SiteContractCreated,
};
use crate::{Result, SiteContractConfig, SiteContractError};

const CREATE_FUNCTION: &str = "createOrbiterSite";
const UPDATE_FUNCTION: &str = "updateMapping";

/// EVM implementation of [`SiteContractChain`] backed by one HTTP provider and
/// one signing key.
pub struct EvmSiteContractClient {
    provider: DynProvider,
    signer_address: Address,
    factory_address: Address,
    tx_confirmations: u64,
    receipt_timeout: Option<Duration>,
}

impl EvmSiteContractClient {
    pub async fn new(config: &SiteContractConfig) -> Result<Self> {
        let signer = signer_from_private_key(&config.private_key)?;
        let signer_address = signer.address();

        let factory_address: Address = config.factory_address.trim().parse().map_err(|_| {
            SiteContractError::Configuration(format!(
                "invalid factory address: {}",
                config.factory_address
            ))
        })?;

        let url: Url = config.rpc_url.parse().map_err(|e| {
            SiteContractError::Configuration(format!("invalid RPC URL: {}", e))
        })?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| SiteContractError::Chain(format!("eth_chainId failed: {}", e)))?;

        if chain_id != config.chain_id {
            return Err(SiteContractError::Configuration(format!(
                "RPC endpoint serves chain {} but chain_id {} is configured",
                chain_id, config.chain_id
            )));
        }

        info!(
            chain_id,
            signer = %signer_address,
            factory = %factory_address,
            "EVM site contract client initialized"
        );

        Ok(Self {
            provider,
            signer_address,
            factory_address,
            tx_confirmations: config.tx_confirmations,
            receipt_timeout: config.tx_receipt_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Simulate, submit and await a call; succeeds only on a mined, successful receipt.
    async fn execute<D>(
        &self,
        function: &'static str,
        call: CallBuilder<DynProvider, D>,
    ) -> ChainResult<TransactionReceipt>
    where
        D: CallDecoder + Send + Sync + Unpin,
    {
        let call = call.from(self.signer_address);

        call.call()
            .await
            .map_err(|e| ChainFailure::Simulation {
                function,
                reason: e.to_string(),
            })?;
        debug!(function, "simulation succeeded");

        let pending = call.send().await.map_err(|e| ChainFailure::Submission {
            function,
            reason: e.to_string(),
        })?;
        let tx_hash = *pending.tx_hash();
        debug!(function, %tx_hash, "transaction submitted");

        let receipt = pending
            .with_required_confirmations(self.tx_confirmations)
            .with_timeout(self.receipt_timeout)
            .get_receipt()
            .await
            .map_err(|e| ChainFailure::Receipt {
                tx_hash,
                reason: e.to_string(),
            })?;

        if !ReceiptResponse::status(&receipt) {
            return Err(ChainFailure::Reverted { tx_hash });
        }

        Ok(receipt)
    }

    async fn create_clone(&self) -> ChainResult<SiteContractCreated> {
        let factory = OrbiterFactory::new(self.factory_address, self.provider.clone());
        let call = factory.createOrbiterSite().with_cloned_provider();

        let receipt = self.execute(CREATE_FUNCTION, call).await?;
        let tx_hash = receipt.transaction_hash;

        let clone_address = find_clone_created(receipt.inner.logs(), self.factory_address)
            .ok_or(ChainFailure::MissingEvent { tx_hash })?;

        Ok(SiteContractCreated {
            clone_address,
            tx_hash,
            block_number: receipt.block_number,
        })
    }
}

#[async_trait]
impl SiteContractChain for EvmSiteContractClient {
    async fn create_site_contract(&self) -> ChainResult<SiteContractCreated> {
        let result = self.create_clone().await;

        if let Err(failure) = &result {
            error!(function = CREATE_FUNCTION, error = %failure, "site contract creation failed");
        }
        result
    }

    async fn write_cid(&self, contract_address: Address, cid: &str) -> ChainResult<CidUpdated> {
        let site = OrbiterSite::new(contract_address, self.provider.clone());
        let call = site.updateMapping(cid.to_string()).with_cloned_provider();

        let result = self
            .execute(UPDATE_FUNCTION, call)
            .await
            .map(|receipt| CidUpdated {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
            });

        if let Err(failure) = &result {
            error!(
                function = UPDATE_FUNCTION,
                contract = %contract_address,
                error = %failure,
                "CID write failed"
            );
        }
        result
    }
}

/// Address of the clone announced by the factory's `CloneCreated` event.
///
/// Matches on emitter and event signature; the log's position in the receipt
/// is irrelevant.
pub fn find_clone_created(logs: &[Log], factory_address: Address) -> Option<Address> {
    logs.iter()
        .filter(|log| log.address() == factory_address)
        .filter(|log| log.topics().first() == Some(&OrbiterFactory::CloneCreated::SIGNATURE_HASH))
        .find_map(|log| OrbiterFactory::CloneCreated::decode_log(&log.inner).ok())
        .map(|decoded| decoded.data.cloneAddress)
}
