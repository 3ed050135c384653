//! Domain → contract address entries in Redis.

use crate::{Result, SiteContractError};
use alloy::primitives::Address;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::debug;

#[async_trait]
pub trait ContractAddressCache: Send + Sync {
    /// Record `contract_address` under the site's domain label.
    async fn put(&self, domain: &str, contract_address: Address) -> Result<()>;
}

/// Redis-backed cache. Entries are plain strings with no expiry.
#[derive(Clone)]
pub struct RedisContractAddressCache {
    connection_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisContractAddressCache {
    pub async fn new(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            SiteContractError::Configuration(format!("Invalid Redis URL: {}", e))
        })?;

        let connection_manager = ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            key_prefix: key_prefix.into(),
        })
    }
}

/// Redis key for a domain; an empty prefix keys by the bare domain.
pub fn cache_key(prefix: &str, domain: &str) -> String {
    format!("{}{}", prefix, domain)
}

#[async_trait]
impl ContractAddressCache for RedisContractAddressCache {
    async fn put(&self, domain: &str, contract_address: Address) -> Result<()> {
        let key = cache_key(&self.key_prefix, domain);
        let mut conn = self.connection_manager.clone();

        conn.set::<_, _, ()>(&key, contract_address.to_checksum(None))
            .await?;

        debug!(%key, contract = %contract_address, "contract address cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SiteContractConfig;

    #[test]
    fn default_config_keys_by_bare_domain() {
        let config = SiteContractConfig::default();
        assert_eq!(cache_key(&config.site_contract_key_prefix, "foo"), "foo");
    }

    #[test]
    fn custom_prefix_namespaces_the_key() {
        assert_eq!(cache_key("site_contract:", "foo"), "site_contract:foo");
    }
}
