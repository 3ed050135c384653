use crate::{
    BatchProcessor, ContractMessageHandler, EvmSiteContractClient, NatsClient,
    RedisContractAddressCache, Result, SiteContractConfig, SiteContractError, SupabaseSiteStore,
};
use async_nats::jetstream::consumer::PullConsumer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wasmcloud_provider_sdk::Provider;

/// Site Contract Provider (wasmCloud capability provider)
pub struct SiteContractProvider {
    _config: SiteContractConfig,
    shutdown_tx: Arc<watch::Sender<bool>>,
    consumer_task: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl SiteContractProvider {
    pub async fn from_host_data(host_data: wasmcloud_provider_sdk::HostData) -> Result<Self> {
        let config = if !host_data.config.is_empty() {
            SiteContractConfig::from_properties(&host_data.config)
                .map_err(|e| SiteContractError::Configuration(format!("Config error: {}", e)))?
        } else {
            SiteContractConfig::from_env()
                .map_err(|e| SiteContractError::Configuration(format!("Config error: {}", e)))?
        };

        Self::new(config).await
    }

    pub async fn new(config: SiteContractConfig) -> Result<Self> {
        info!("Initializing Site Contract Provider");
        config.validate()?;

        let chain = Arc::new(EvmSiteContractClient::new(&config).await?);
        let sites = Arc::new(SupabaseSiteStore::new(&config)?);
        let cache = Arc::new(
            RedisContractAddressCache::new(&config.redis_url, config.site_contract_key_prefix.clone())
                .await?,
        );
        let nats = Arc::new(NatsClient::new(&config).await?);

        let handler = Arc::new(ContractMessageHandler::new(
            config.clone(),
            chain,
            sites,
            cache,
            nats.clone(),
        ));
        let processor = BatchProcessor::new(handler, nats.clone(), config.dead_letter_subject.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let provider = Self {
            _config: config.clone(),
            shutdown_tx: Arc::new(shutdown_tx),
            consumer_task: Arc::new(RwLock::new(None)),
        };

        provider
            .start_contract_consumer(config, nats, processor, shutdown_rx)
            .await?;

        Ok(provider)
    }

    async fn start_contract_consumer(
        &self,
        config: SiteContractConfig,
        nats: Arc<NatsClient>,
        processor: BatchProcessor,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let consumer = nats.contract_consumer(&config).await?;

        let handle = tokio::spawn(run_consumer_loop(
            consumer,
            processor,
            config.batch_size,
            Duration::from_secs(config.batch_expiry_secs),
            shutdown_rx,
        ));

        *self.consumer_task.write().await = Some(handle);

        let signal_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping contract consumer");
                let _ = signal_tx.send(true);
            }
        });

        Ok(())
    }
}

/// Pull and process batches until shutdown is signalled. The flag is checked
/// between batches only, so a pulled batch is always processed and acked.
async fn run_consumer_loop(
    consumer: PullConsumer,
    processor: BatchProcessor,
    batch_size: usize,
    batch_expiry: Duration,
    shutdown_rx: watch::Receiver<bool>,
) {
    info!(batch_size, "Contract queue consumer started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match NatsClient::fetch_batch(&consumer, batch_size, batch_expiry).await {
            Ok(messages) => {
                processor.process_batch(messages).await;
            }
            Err(e) => {
                warn!("Failed to pull contract batch: {}", e);
                tokio::time::sleep(batch_expiry).await;
            }
        }
    }

    info!("Contract queue consumer stopped");
}

impl Provider for SiteContractProvider {
    fn shutdown(&self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send {
        async move {
            info!("Shutting down Site Contract Provider");
            let _ = self.shutdown_tx.send(true);

            if let Some(handle) = self.consumer_task.write().await.take() {
                if let Err(e) = handle.await {
                    warn!("Contract consumer task ended abnormally: {}", e);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmcloud_provider_sdk::Provider;

    #[test]
    fn test_provider_traits() {
        fn assert_provider<T: Provider>() {}
        assert_provider::<SiteContractProvider>();
    }
}
