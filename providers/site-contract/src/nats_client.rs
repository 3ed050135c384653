use crate::{Result, SiteContractConfig, SiteContractError};
use async_nats::jetstream;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::Client;
use async_trait::async_trait;
use futures::StreamExt;
use site_contract_common::{pattern_contracts_all, ContractMessage};
use std::time::Duration;
use tracing::{debug, info, warn};

#[async_trait]
pub trait ContractQueuePublisher: Send + Sync {
    /// Enqueue a work item on the contract queue.
    async fn publish_contract_message(&self, message: &ContractMessage) -> Result<()>;

    /// Fire-and-forget copy of a failed work item.
    async fn publish_dead_letter(&self, subject: &str, payload: Vec<u8>) -> Result<()>;
}

/// NATS JetStream client for the contract queue.
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    jetstream: jetstream::Context,
    stream_name: String,
    queue_subject: String,
}

impl NatsClient {
    pub async fn new(config: &SiteContractConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.nats_url);

        let client = async_nats::connect(&config.nats_url).await.map_err(|e| {
            SiteContractError::Configuration(format!("Failed to connect to NATS: {}", e))
        })?;

        let jetstream = jetstream::new(client.clone());
        Self::ensure_contract_stream(&jetstream, &config.nats_stream_name).await?;

        Ok(Self {
            client,
            jetstream,
            stream_name: config.nats_stream_name.clone(),
            queue_subject: config.nats_subject.clone(),
        })
    }

    async fn ensure_contract_stream(js: &jetstream::Context, stream_name: &str) -> Result<()> {
        let stream_config = jetstream::stream::Config {
            name: stream_name.to_string(),
            description: Some("Site contract creation and CID update queue".to_string()),
            subjects: vec![pattern_contracts_all().to_string()],
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            storage: jetstream::stream::StorageType::File,
            max_messages: 100_000,
            max_age: Duration::from_secs(7 * 86400),
            max_message_size: 65_536,
            duplicate_window: Duration::from_secs(300),
            ..Default::default()
        };

        match js.get_stream(stream_name).await {
            Ok(_) => {
                debug!("Contract stream {} already exists", stream_name);
            }
            Err(_) => {
                info!("Creating contract stream: {}", stream_name);
                js.create_stream(stream_config).await.map_err(|e| {
                    SiteContractError::Configuration(format!(
                        "Failed to create stream {}: {}",
                        stream_name, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Durable pull consumer on the contract queue subject.
    pub async fn contract_consumer(&self, config: &SiteContractConfig) -> Result<PullConsumer> {
        info!(
            consumer = %config.nats_consumer_name,
            subject = %config.nats_subject,
            "Setting up contract queue consumer"
        );

        let stream = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| {
                SiteContractError::NatsConnection(format!("Failed to get stream: {}", e))
            })?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(config.nats_consumer_name.clone()),
            description: Some("Site contract provider work queue consumer".to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ack_wait: Duration::from_secs(config.ack_wait_secs),
            max_deliver: config.max_deliver,
            filter_subject: config.nats_subject.clone(),
            replay_policy: jetstream::consumer::ReplayPolicy::Instant,
            ..Default::default()
        };

        ensure_durable_consumer(
            &config.nats_consumer_name,
            || stream.create_consumer(consumer_config),
            || stream.get_consumer(&config.nats_consumer_name),
        )
        .await
    }

    /// Pull up to `batch_size` messages, waiting at most `expires` for them.
    pub async fn fetch_batch(
        consumer: &PullConsumer,
        batch_size: usize,
        expires: Duration,
    ) -> Result<Vec<jetstream::Message>> {
        let mut batch = consumer
            .batch()
            .max_messages(batch_size)
            .expires(expires)
            .messages()
            .await
            .map_err(|e| {
                SiteContractError::NatsConnection(format!("Failed to request batch: {}", e))
            })?;

        let mut messages = Vec::with_capacity(batch_size);
        while let Some(item) = batch.next().await {
            match item {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!("Failed to receive contract message: {}", e),
            }
        }

        Ok(messages)
    }

    pub async fn publish_contract_message(&self, message: &ContractMessage) -> Result<()> {
        let bytes = message.to_vec()?;

        let mut headers = async_nats::HeaderMap::new();
        headers.insert("message-type", message.message_type.as_str());
        if let Some(msg_id) = follow_up_msg_id(message) {
            headers.insert("Nats-Msg-Id", msg_id.as_str());
        }

        self.jetstream
            .publish_with_headers(self.queue_subject.clone(), headers, bytes.into())
            .await
            .map_err(|e| {
                SiteContractError::NatsPublish(format!(
                    "Failed to publish {}: {}",
                    message.message_type, e
                ))
            })?
            .await
            .map_err(|e| SiteContractError::NatsPublish(format!("Publish ack failed: {}", e)))?;

        Ok(())
    }

    pub async fn publish_dead_letter(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| {
                SiteContractError::NatsPublish(format!(
                    "Failed to publish dead letter to {}: {}",
                    subject, e
                ))
            })
    }
}

/// Dedup id for an `update_contract` item: one per (address, CID) pair.
fn follow_up_msg_id(message: &ContractMessage) -> Option<String> {
    match (&message.contract_address, &message.cid) {
        (Some(address), Some(cid)) => Some(format!(
            "{}:{}:{}",
            message.message_type, address, cid
        )),
        _ => None,
    }
}

/// Create the durable contract consumer, or bind to it when it already exists
/// (a restarted worker finds its own consumer on the stream).
async fn ensure_durable_consumer<T, CreateErr, GetErr, CreateFut, GetFut, CreateFn, GetFn>(
    name: &str,
    create: CreateFn,
    bind: GetFn,
) -> Result<T>
where
    CreateFn: FnOnce() -> CreateFut,
    GetFn: FnOnce() -> GetFut,
    CreateFut: std::future::Future<Output = std::result::Result<T, CreateErr>>,
    GetFut: std::future::Future<Output = std::result::Result<T, GetErr>>,
    CreateErr: std::fmt::Display,
    GetErr: std::fmt::Display,
{
    let create_err = match create().await {
        Ok(consumer) => {
            info!(consumer = name, "Created contract queue consumer");
            return Ok(consumer);
        }
        Err(e) => e,
    };

    debug!(consumer = name, error = %create_err, "Consumer create refused, binding to existing");

    bind().await.map_err(|bind_err| {
        SiteContractError::Configuration(format!(
            "Contract consumer {} unavailable: create failed ({}), bind failed ({})",
            name, create_err, bind_err
        ))
    })
}

#[async_trait]
impl ContractQueuePublisher for NatsClient {
    async fn publish_contract_message(&self, message: &ContractMessage) -> Result<()> {
        NatsClient::publish_contract_message(self, message).await
    }

    async fn publish_dead_letter(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        NatsClient::publish_dead_letter(self, subject, payload).await
    }
}
