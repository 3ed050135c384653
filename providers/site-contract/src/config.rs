//! Configuration for Site Contract Provider

use serde::{Deserialize, Serialize};
use site_contract_common::{contract_queue, CONTRACT_CONSUMER_NAME, CONTRACT_STREAM_NAME};

use crate::{Result, SiteContractError};

/// Configuration for Site Contract Provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteContractConfig {
    /// Hex private key of the account that signs every transaction
    pub private_key: String,

    /// Address of the deployed site factory contract
    pub factory_address: String,

    /// EVM JSON-RPC endpoint (HTTP)
    pub rpc_url: String,

    /// Expected chain id of `rpc_url` (Base mainnet by default)
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Confirmations to wait for before a receipt is accepted
    #[serde(default = "default_tx_confirmations")]
    pub tx_confirmations: u64,

    /// Upper bound on the receipt wait; unset waits until the transaction is mined
    #[serde(default)]
    pub tx_receipt_timeout_secs: Option<u64>,

    /// Supabase project URL (REST API lives under `/rest/v1`)
    pub supabase_url: String,

    /// Supabase service role key
    pub supabase_service_role_key: String,

    /// Table holding site rows
    #[serde(default = "default_sites_table")]
    pub sites_table: String,

    /// Redis connection URL (domain -> contract address cache)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Optional key namespace for cached contract addresses; empty keys by bare domain
    #[serde(default = "default_site_contract_key_prefix")]
    pub site_contract_key_prefix: String,

    /// Suffix appended to bare domains before the site lookup
    #[serde(default = "default_platform_domain")]
    pub platform_domain: String,

    /// NATS connection URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// NATS JetStream stream name for the contract queue
    #[serde(default = "default_stream_name")]
    pub nats_stream_name: String,

    /// Subject contract messages are published to and consumed from
    #[serde(default = "default_subject")]
    pub nats_subject: String,

    /// Durable consumer name
    #[serde(default = "default_consumer_name")]
    pub nats_consumer_name: String,

    /// Maximum messages pulled per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How long a batch pull waits for messages, in seconds
    #[serde(default = "default_batch_expiry")]
    pub batch_expiry_secs: u64,

    /// JetStream ack wait in seconds; must outlast a full create + receipt wait
    #[serde(default = "default_ack_wait")]
    pub ack_wait_secs: u64,

    /// JetStream max deliveries per message (1 = at-most-once)
    #[serde(default = "default_max_deliver")]
    pub max_deliver: i64,

    /// Optional subject prefix that receives copies of failed messages
    #[serde(default)]
    pub dead_letter_subject: Option<String>,
}

impl SiteContractConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Load configuration from wasmCloud properties HashMap
    ///
    /// Used when running as a wasmCloud provider, where the configuration is
    /// passed via HostData.config from the WADM manifest.
    pub fn from_properties(
        props: &std::collections::HashMap<String, String>,
    ) -> std::result::Result<Self, String> {
        let required = |key: &str| {
            props
                .get(key)
                .cloned()
                .ok_or_else(|| format!("{} is required", key))
        };

        let private_key = required("private_key")?;
        let factory_address = required("factory_address")?;
        let rpc_url = required("rpc_url")?;
        let supabase_url = required("supabase_url")?;
        let supabase_service_role_key = required("supabase_service_role_key")?;

        let chain_id = props
            .get("chain_id")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_chain_id);

        let tx_confirmations = props
            .get("tx_confirmations")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_tx_confirmations);

        let tx_receipt_timeout_secs = props
            .get("tx_receipt_timeout_secs")
            .and_then(|v| v.parse().ok());

        let sites_table = props
            .get("sites_table")
            .cloned()
            .unwrap_or_else(default_sites_table);

        let redis_url = props
            .get("redis_url")
            .cloned()
            .unwrap_or_else(default_redis_url);

        let site_contract_key_prefix = props
            .get("site_contract_key_prefix")
            .cloned()
            .unwrap_or_else(default_site_contract_key_prefix);

        let platform_domain = props
            .get("platform_domain")
            .cloned()
            .unwrap_or_else(default_platform_domain);

        let nats_url = props
            .get("nats_url")
            .cloned()
            .unwrap_or_else(default_nats_url);

        let nats_stream_name = props
            .get("nats_stream_name")
            .cloned()
            .unwrap_or_else(default_stream_name);

        let nats_subject = props
            .get("nats_subject")
            .cloned()
            .unwrap_or_else(default_subject);

        let nats_consumer_name = props
            .get("nats_consumer_name")
            .cloned()
            .unwrap_or_else(default_consumer_name);

        let batch_size = props
            .get("batch_size")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_batch_size);

        let batch_expiry_secs = props
            .get("batch_expiry_secs")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_batch_expiry);

        let ack_wait_secs = props
            .get("ack_wait_secs")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_ack_wait);

        let max_deliver = props
            .get("max_deliver")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_max_deliver);

        let dead_letter_subject = props
            .get("dead_letter_subject")
            .filter(|v| !v.is_empty())
            .cloned();

        Ok(Self {
            private_key,
            factory_address,
            rpc_url,
            chain_id,
            tx_confirmations,
            tx_receipt_timeout_secs,
            supabase_url,
            supabase_service_role_key,
            sites_table,
            redis_url,
            site_contract_key_prefix,
            platform_domain,
            nats_url,
            nats_stream_name,
            nats_subject,
            nats_consumer_name,
            batch_size,
            batch_expiry_secs,
            ack_wait_secs,
            max_deliver,
            dead_letter_subject,
        })
    }

    /// Check the keys every deployment must provide
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("private_key", &self.private_key),
            ("factory_address", &self.factory_address),
            ("rpc_url", &self.rpc_url),
            ("supabase_url", &self.supabase_url),
            ("supabase_service_role_key", &self.supabase_service_role_key),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();

        if !missing.is_empty() {
            return Err(SiteContractError::Configuration(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }

        if self.batch_size == 0 {
            return Err(SiteContractError::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Fully qualified domain used for the site row lookup
    pub fn full_domain(&self, domain: &str) -> String {
        format!("{}.{}", domain, self.platform_domain)
    }
}

impl Default for SiteContractConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            factory_address: String::new(),
            rpc_url: String::new(),
            chain_id: default_chain_id(),
            tx_confirmations: default_tx_confirmations(),
            tx_receipt_timeout_secs: None,
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            sites_table: default_sites_table(),
            redis_url: default_redis_url(),
            site_contract_key_prefix: default_site_contract_key_prefix(),
            platform_domain: default_platform_domain(),
            nats_url: default_nats_url(),
            nats_stream_name: default_stream_name(),
            nats_subject: default_subject(),
            nats_consumer_name: default_consumer_name(),
            batch_size: default_batch_size(),
            batch_expiry_secs: default_batch_expiry(),
            ack_wait_secs: default_ack_wait(),
            max_deliver: default_max_deliver(),
            dead_letter_subject: None,
        }
    }
}

fn default_chain_id() -> u64 {
    8453
}

fn default_tx_confirmations() -> u64 {
    1
}

fn default_sites_table() -> String {
    "sites".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_site_contract_key_prefix() -> String {
    String::new()
}

fn default_platform_domain() -> String {
    "orbiter.website".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_stream_name() -> String {
    CONTRACT_STREAM_NAME.to_string()
}

fn default_subject() -> String {
    contract_queue().to_string()
}

fn default_consumer_name() -> String {
    CONTRACT_CONSUMER_NAME.to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_expiry() -> u64 {
    5
}

fn default_ack_wait() -> u64 {
    600
}

fn default_max_deliver() -> i64 {
    1
}
