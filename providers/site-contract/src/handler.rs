use crate::address_cache::ContractAddressCache;
use crate::chain::SiteContractChain;
use crate::nats_client::ContractQueuePublisher;
use crate::site_store::SiteStore;
use crate::{Result, SiteContractConfig, SiteContractError};
use alloy::primitives::{Address, TxHash};
use site_contract_common::{ContractMessage, ContractMessageType};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where a freshly created contract ended up being recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteLink {
    /// `site_contract` set on the row named by the message.
    SiteRow { site_id: String },
    /// Address cached under the domain; `site_id` is the row resolved by
    /// domain lookup and updated, if any.
    DomainCached {
        domain: String,
        site_id: Option<String>,
    },
    /// Neither a site id nor a domain was supplied.
    Unlinked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    ContractCreated {
        address: Address,
        site_link: SiteLink,
        follow_up_enqueued: bool,
    },
    CidWritten {
        address: Address,
        tx_hash: TxHash,
    },
}

pub struct ContractMessageHandler {
    config: SiteContractConfig,
    chain: Arc<dyn SiteContractChain>,
    sites: Arc<dyn SiteStore>,
    cache: Arc<dyn ContractAddressCache>,
    publisher: Arc<dyn ContractQueuePublisher>,
}

impl ContractMessageHandler {
    pub fn new(
        config: SiteContractConfig,
        chain: Arc<dyn SiteContractChain>,
        sites: Arc<dyn SiteStore>,
        cache: Arc<dyn ContractAddressCache>,
        publisher: Arc<dyn ContractQueuePublisher>,
    ) -> Self {
        Self {
            config,
            chain,
            sites,
            cache,
            publisher,
        }
    }

    pub async fn handle(&self, message: &ContractMessage) -> Result<MessageOutcome> {
        match message.message_type {
            ContractMessageType::CreateContract => self.handle_create(message).await,
            ContractMessageType::UpdateContract => self.handle_update(message).await,
        }
    }

    pub async fn handle_create(&self, message: &ContractMessage) -> Result<MessageOutcome> {
        let created = self
            .chain
            .create_site_contract()
            .await
            .map_err(SiteContractError::ContractCreationFailed)?;
        let address = created.clone_address;

        info!(
            contract = %address,
            tx_hash = %created.tx_hash,
            block_number = ?created.block_number,
            "Site contract created"
        );

        let site_link = self.link_site(message, address).await?;

        let follow_up_enqueued = match non_empty(&message.cid) {
            Some(cid) => {
                let follow_up = ContractMessage::follow_up_update(message, address, cid);
                self.publisher.publish_contract_message(&follow_up).await?;
                debug!(contract = %address, cid, "update_contract enqueued");
                true
            }
            None => false,
        };

        Ok(MessageOutcome::ContractCreated {
            address,
            site_link,
            follow_up_enqueued,
        })
    }

    pub async fn handle_update(&self, message: &ContractMessage) -> Result<MessageOutcome> {
        let cid = non_empty(&message.cid);

        let (address, cid) = match (message.contract_address, cid) {
            (Some(address), Some(cid)) => (address, cid),
            (address, cid) => {
                let missing: Vec<&str> = [
                    address.is_none().then_some("contractAddress"),
                    cid.is_none().then_some("cid"),
                ]
                .into_iter()
                .flatten()
                .collect();

                return Err(SiteContractError::MissingField {
                    message_type: message.message_type.to_string(),
                    missing: missing.join(", "),
                });
            }
        };

        let updated = self
            .chain
            .write_cid(address, cid)
            .await
            .map_err(SiteContractError::CidUpdateFailed)?;

        info!(
            contract = %address,
            cid,
            tx_hash = %updated.tx_hash,
            "Contract CID updated"
        );

        Ok(MessageOutcome::CidWritten {
            address,
            tx_hash: updated.tx_hash,
        })
    }

    async fn link_site(&self, message: &ContractMessage, address: Address) -> Result<SiteLink> {
        if let Some(site_id) = non_empty(&message.site_id) {
            self.sites.update_site_contract(site_id, address).await?;
            info!(site_id, contract = %address, "Site updated with contract");
            return Ok(SiteLink::SiteRow {
                site_id: site_id.to_string(),
            });
        }

        if let Some(domain) = non_empty(&message.domain) {
            self.cache.put(domain, address).await?;

            let site_id = self.link_by_domain(message, domain, address).await;
            return Ok(SiteLink::DomainCached {
                domain: domain.to_string(),
                site_id,
            });
        }

        error!(contract = %address, "No siteId or domain on create_contract, contract not linked");
        Ok(SiteLink::Unlinked)
    }

    /// Best-effort: failures here are logged and never fail the message.
    async fn link_by_domain(
        &self,
        message: &ContractMessage,
        domain: &str,
        address: Address,
    ) -> Option<String> {
        let full_domain = self.config.full_domain(domain);

        let site_id = match self.sites.find_site_id_by_domain(&full_domain).await {
            Ok(Some(site_id)) => site_id,
            Ok(None) => {
                warn!(
                    domain = %full_domain,
                    user_id = ?message.user_id,
                    org_id = ?message.org_id,
                    "No site found for domain"
                );
                return None;
            }
            Err(e) => {
                warn!(domain = %full_domain, error = %e, "Site lookup by domain failed");
                return None;
            }
        };

        match self.sites.update_site_contract(&site_id, address).await {
            Ok(()) => {
                info!(site_id = %site_id, domain = %full_domain, contract = %address, "Site updated with contract");
                Some(site_id)
            }
            Err(e) => {
                warn!(site_id = %site_id, error = %e, "Failed to update site found by domain");
                None
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
