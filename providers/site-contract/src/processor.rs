//! Batch processing for contract queue messages.
//!
//! Messages are handled strictly one after another and every message is
//! acknowledged exactly once, whatever the outcome. A failed message is never
//! redelivered; when a dead letter subject is configured a copy of it is
//! published there before the ack.

use crate::handler::{ContractMessageHandler, MessageOutcome};
use crate::nats_client::ContractQueuePublisher;
use crate::SiteContractError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use site_contract_common::{dead_letter_subject, ContractMessage};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A message pulled from the queue that can be acknowledged.
#[async_trait]
pub trait QueueMessage: Send + Sync {
    fn payload(&self) -> &[u8];

    async fn ack(&self) -> std::result::Result<(), String>;
}

#[async_trait]
impl QueueMessage for async_nats::jetstream::Message {
    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    async fn ack(&self) -> std::result::Result<(), String> {
        async_nats::jetstream::Message::ack(self)
            .await
            .map_err(|e| e.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Copy of a failed work item.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub message_type: String,
    pub payload: serde_json::Value,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    fn new(payload: &[u8], message_type: Option<&str>, error: &str) -> Self {
        // Undecodable payloads are kept as text.
        let payload = serde_json::from_slice(payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(payload).into_owned())
        });

        Self {
            message_type: message_type.unwrap_or("unknown").to_string(),
            payload,
            error: error.to_string(),
            failed_at: Utc::now(),
        }
    }
}

pub struct BatchProcessor {
    handler: Arc<ContractMessageHandler>,
    publisher: Arc<dyn ContractQueuePublisher>,
    dead_letter_subject: Option<String>,
}

impl BatchProcessor {
    pub fn new(
        handler: Arc<ContractMessageHandler>,
        publisher: Arc<dyn ContractQueuePublisher>,
        dead_letter_subject: Option<String>,
    ) -> Self {
        Self {
            handler,
            publisher,
            dead_letter_subject,
        }
    }

    pub async fn process_batch<M, I>(&self, messages: I) -> BatchSummary
    where
        M: QueueMessage,
        I: IntoIterator<Item = M>,
    {
        let mut summary = BatchSummary::default();

        for msg in messages {
            summary.processed += 1;
            if self.process_message(&msg).await {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }

            if let Err(e) = msg.ack().await {
                warn!("Failed to ack contract message: {}", e);
            }
        }

        if summary.processed > 0 {
            info!(
                processed = summary.processed,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Contract batch processed"
            );
        }

        summary
    }

    /// Returns whether the message was handled successfully. Never acks.
    async fn process_message<M: QueueMessage>(&self, msg: &M) -> bool {
        let message = match ContractMessage::from_slice(msg.payload()) {
            Ok(message) => message,
            Err(e) => {
                let err = SiteContractError::Serialization(e);
                error!(error = %err, "Dropping undecodable contract message");
                self.dead_letter(msg.payload(), None, &err).await;
                return false;
            }
        };

        let message_type = message.message_type.as_str();

        match self.handler.handle(&message).await {
            Ok(MessageOutcome::ContractCreated {
                address,
                site_link,
                follow_up_enqueued,
            }) => {
                info!(
                    message_type,
                    contract = %address,
                    site_link = ?site_link,
                    follow_up_enqueued,
                    "Contract message handled"
                );
                true
            }
            Ok(MessageOutcome::CidWritten { address, tx_hash }) => {
                info!(
                    message_type,
                    contract = %address,
                    tx_hash = %tx_hash,
                    "Contract message handled"
                );
                true
            }
            Err(e) => {
                error!(
                    message_type,
                    site_id = ?message.site_id,
                    domain = ?message.domain,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Contract message failed"
                );
                self.dead_letter(msg.payload(), Some(message_type), &e).await;
                false
            }
        }
    }

    async fn dead_letter(
        &self,
        payload: &[u8],
        message_type: Option<&str>,
        err: &SiteContractError,
    ) {
        let Some(prefix) = &self.dead_letter_subject else {
            return;
        };

        let letter = DeadLetter::new(payload, message_type, &err.to_string());
        let subject = dead_letter_subject(prefix, &letter.message_type);

        let bytes = match serde_json::to_vec(&letter) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize dead letter: {}", e);
                return;
            }
        };

        if let Err(e) = self.publisher.publish_dead_letter(&subject, bytes).await {
            warn!(subject = %subject, error = %e, "Failed to publish dead letter");
        }
    }
}
