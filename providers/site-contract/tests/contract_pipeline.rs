//! End-to-end batch processing against a mocked Supabase REST API.

use alloy::primitives::{address, Address, B256};
use async_trait::async_trait;
use serde_json::json;
use site_contract_common::ContractMessage;
use site_contract_provider::chain::{ChainResult, CidUpdated, SiteContractCreated};
use site_contract_provider::{
    BatchProcessor, BatchSummary, ContractAddressCache, ContractMessageHandler,
    ContractQueuePublisher, QueueMessage, Result, SiteContractChain, SiteContractConfig,
    SupabaseSiteStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTRACT: Address = address!("00000000000000000000000000000000000000aa");

struct Delivery {
    payload: Vec<u8>,
    acks: AtomicUsize,
}

impl Delivery {
    fn json(value: serde_json::Value) -> Self {
        Self {
            payload: serde_json::to_vec(&value).unwrap(),
            acks: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<'a> QueueMessage for &'a Delivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(&self) -> std::result::Result<(), String> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingChain {
    cid_writes: Arc<Mutex<Vec<(Address, String)>>>,
}

#[async_trait]
impl SiteContractChain for RecordingChain {
    async fn create_site_contract(&self) -> ChainResult<SiteContractCreated> {
        Ok(SiteContractCreated {
            clone_address: CONTRACT,
            tx_hash: B256::repeat_byte(0x01),
            block_number: Some(100),
        })
    }

    async fn write_cid(&self, contract_address: Address, cid: &str) -> ChainResult<CidUpdated> {
        self.cid_writes
            .lock()
            .await
            .push((contract_address, cid.to_string()));
        Ok(CidUpdated {
            tx_hash: B256::repeat_byte(0x02),
            block_number: Some(101),
        })
    }
}

#[derive(Clone, Default)]
struct MemoryCache {
    entries: Arc<Mutex<Vec<(String, Address)>>>,
}

#[async_trait]
impl ContractAddressCache for MemoryCache {
    async fn put(&self, domain: &str, contract_address: Address) -> Result<()> {
        self.entries
            .lock()
            .await
            .push((domain.to_string(), contract_address));
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MemoryQueue {
    messages: Arc<Mutex<Vec<ContractMessage>>>,
}

#[async_trait]
impl ContractQueuePublisher for MemoryQueue {
    async fn publish_contract_message(&self, message: &ContractMessage) -> Result<()> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }

    async fn publish_dead_letter(&self, _subject: &str, _payload: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

struct Pipeline {
    chain: RecordingChain,
    cache: MemoryCache,
    queue: MemoryQueue,
    processor: BatchProcessor,
}

fn pipeline(server: &MockServer) -> Pipeline {
    let config = SiteContractConfig {
        supabase_url: server.uri(),
        supabase_service_role_key: "service-role".to_string(),
        ..Default::default()
    };

    let chain = RecordingChain::default();
    let cache = MemoryCache::default();
    let queue = MemoryQueue::default();
    let sites = SupabaseSiteStore::new(&config).unwrap();

    let handler = ContractMessageHandler::new(
        config,
        Arc::new(chain.clone()),
        Arc::new(sites),
        Arc::new(cache.clone()),
        Arc::new(queue.clone()),
    );
    let processor = BatchProcessor::new(Arc::new(handler), Arc::new(queue.clone()), None);

    Pipeline {
        chain,
        cache,
        queue,
        processor,
    }
}

#[tokio::test]
async fn create_by_domain_then_follow_up_writes_cid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sites"))
        .and(query_param("domain", "eq.foo.orbiter.website"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "site-7" }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/sites"))
        .and(query_param("id", "eq.site-7"))
        .and(body_json(json!({ "site_contract": CONTRACT.to_checksum(None) })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let p = pipeline(&server);

    let create = Delivery::json(json!({
        "type": "create_contract",
        "domain": "foo",
        "cid": "bafyfoo",
        "userId": "u1",
        "orgId": "o1"
    }));
    let summary = p.processor.process_batch([&create]).await;

    assert_eq!(
        summary,
        BatchSummary {
            processed: 1,
            succeeded: 1,
            failed: 0,
        }
    );
    assert_eq!(create.acks.load(Ordering::SeqCst), 1);
    assert_eq!(
        *p.cache.entries.lock().await,
        vec![("foo".to_string(), CONTRACT)]
    );

    // Feed the enqueued follow-up back through the processor.
    let follow_ups = p.queue.messages.lock().await.clone();
    assert_eq!(follow_ups.len(), 1);
    let follow_up = Delivery {
        payload: follow_ups[0].to_vec().unwrap(),
        acks: AtomicUsize::new(0),
    };

    let summary = p.processor.process_batch([&follow_up]).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(follow_up.acks.load(Ordering::SeqCst), 1);
    assert_eq!(
        *p.chain.cid_writes.lock().await,
        vec![(CONTRACT, "bafyfoo".to_string())]
    );
}

#[tokio::test]
async fn datastore_rejection_with_site_id_is_acked_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/sites"))
        .and(query_param("id", "eq.s1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .expect(1)
        .mount(&server)
        .await;

    let p = pipeline(&server);

    let create = Delivery::json(json!({
        "type": "create_contract",
        "siteId": "s1",
        "cid": "bafy"
    }));
    let summary = p.processor.process_batch([&create]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(create.acks.load(Ordering::SeqCst), 1);
    assert!(p.queue.messages.lock().await.is_empty());
}
