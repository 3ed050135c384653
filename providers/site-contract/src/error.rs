//! Error types for Site Contract Provider

use crate::chain::ChainFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteContractError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis connection error: {0}")]
    RedisConnection(#[from] redis::RedisError),

    #[error("NATS connection error: {0}")]
    NatsConnection(String),

    #[error("NATS publish error: {0}")]
    NatsPublish(String),

    #[error("Datastore error: {0}")]
    Datastore(String),

    #[error("Datastore request failed with status {status}: {body}")]
    DatastoreStatus { status: u16, body: String },

    #[error("Chain provider error: {0}")]
    Chain(String),

    #[error("Missing required parameters for {message_type}: {missing}")]
    MissingField {
        message_type: String,
        missing: String,
    },

    #[error("Problem creating contract: {0}")]
    ContractCreationFailed(ChainFailure),

    #[error("Failed to update contract: {0}")]
    CidUpdateFailed(ChainFailure),
}

impl SiteContractError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SiteContractError::RedisConnection(_)
                | SiteContractError::NatsConnection(_)
                | SiteContractError::NatsPublish(_)
                | SiteContractError::Datastore(_)
        ) || matches!(self, SiteContractError::DatastoreStatus { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for SiteContractError {
    fn from(err: reqwest::Error) -> Self {
        SiteContractError::Datastore(err.to_string())
    }
}
