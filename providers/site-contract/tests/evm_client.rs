//! EVM client against a mocked JSON-RPC endpoint.

use alloy::primitives::{address, Address, B256};
use serde_json::{json, Value};
use site_contract_provider::chain::{ChainFailure, EvmSiteContractClient, SiteContractChain};
use site_contract_provider::{SiteContractConfig, SiteContractError};
use wiremock::{Match, Mock, MockServer, Request, Respond, ResponseTemplate};

// anvil account #1
const SIGNER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const SIGNER: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
const FACTORY: Address = address!("0000000000000000000000000000000000000fac");
const SITE: Address = address!("00000000000000000000000000000000000000aa");
const BASE_CHAIN_ID: &str = "0x2105";

/// Matches a JSON-RPC request by method name.
struct RpcMethod(&'static str);

impl Match for RpcMethod {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .map(|body| body["method"] == self.0)
            .unwrap_or(false)
    }
}

/// Replies with a fixed `result` or `error`, echoing the request id.
struct RpcReply(Value);

impl RpcReply {
    fn result(result: Value) -> Self {
        Self(json!({ "result": result }))
    }

    fn error(code: i64, message: &str) -> Self {
        Self(json!({ "error": { "code": code, "message": message, "data": "0x" } }))
    }
}

impl Respond for RpcReply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = serde_json::from_slice::<Value>(&request.body)
            .map(|body| body["id"].clone())
            .unwrap_or(Value::Null);

        let mut reply = json!({ "jsonrpc": "2.0", "id": id });
        if let (Some(reply), Some(fields)) = (reply.as_object_mut(), self.0.as_object()) {
            for (key, value) in fields {
                reply.insert(key.clone(), value.clone());
            }
        }

        ResponseTemplate::new(200).set_body_json(reply)
    }
}

async fn mount_rpc(server: &MockServer, method: &'static str, reply: RpcReply) {
    Mock::given(RpcMethod(method))
        .respond_with(reply)
        .mount(server)
        .await;
}

/// Everything the signing provider asks for while filling a transaction.
async fn mount_chain_basics(server: &MockServer) {
    mount_rpc(server, "eth_chainId", RpcReply::result(json!(BASE_CHAIN_ID))).await;
    mount_rpc(server, "eth_blockNumber", RpcReply::result(json!("0x10"))).await;
    mount_rpc(server, "eth_getTransactionCount", RpcReply::result(json!("0x0"))).await;
    mount_rpc(server, "eth_estimateGas", RpcReply::result(json!("0x186a0"))).await;
    mount_rpc(server, "eth_gasPrice", RpcReply::result(json!("0x3b9aca00"))).await;
    mount_rpc(server, "eth_maxPriorityFeePerGas", RpcReply::result(json!("0x3b9aca00"))).await;
    mount_rpc(
        server,
        "eth_feeHistory",
        RpcReply::result(json!({
            "oldestBlock": "0xf",
            "baseFeePerGas": ["0x3b9aca00", "0x3b9aca00"],
            "gasUsedRatio": [0.5],
            "reward": [["0x3b9aca00"]]
        })),
    )
    .await;
}

fn config_for(server: &MockServer) -> SiteContractConfig {
    SiteContractConfig {
        private_key: SIGNER_KEY.to_string(),
        factory_address: FACTORY.to_string(),
        rpc_url: server.uri(),
        ..Default::default()
    }
}

fn receipt(tx_hash: B256, status: &str) -> Value {
    json!({
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0x11),
        "blockNumber": "0x10",
        "from": SIGNER,
        "to": SITE,
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "type": "0x2",
        "status": status
    })
}

#[tokio::test]
async fn chain_id_mismatch_is_a_configuration_error() {
    let server = MockServer::start().await;
    mount_rpc(&server, "eth_chainId", RpcReply::result(json!("0x1"))).await;

    match EvmSiteContractClient::new(&config_for(&server)).await {
        Err(SiteContractError::Configuration(message)) => {
            assert!(message.contains("chain 1"), "{}", message);
            assert!(message.contains("8453"), "{}", message);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("client accepted a foreign chain"),
    }
}

#[tokio::test]
async fn reverted_simulation_is_never_submitted() {
    let server = MockServer::start().await;
    mount_chain_basics(&server).await;
    mount_rpc(
        &server,
        "eth_call",
        RpcReply::error(3, "execution reverted: caller is not the owner"),
    )
    .await;
    Mock::given(RpcMethod("eth_sendRawTransaction"))
        .respond_with(RpcReply::result(json!(B256::repeat_byte(0x22))))
        .expect(0)
        .mount(&server)
        .await;

    let client = EvmSiteContractClient::new(&config_for(&server)).await.unwrap();
    let result = client.write_cid(SITE, "bafycid").await;

    match result {
        Err(ChainFailure::Simulation { function, reason }) => {
            assert_eq!(function, "updateMapping");
            assert!(reason.contains("not the owner"), "{}", reason);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn failed_receipt_status_is_reported_as_reverted() {
    let tx_hash = B256::repeat_byte(0x22);

    let server = MockServer::start().await;
    mount_chain_basics(&server).await;
    mount_rpc(&server, "eth_call", RpcReply::result(json!("0x"))).await;
    Mock::given(RpcMethod("eth_sendRawTransaction"))
        .respond_with(RpcReply::result(json!(tx_hash)))
        .expect(1)
        .mount(&server)
        .await;
    mount_rpc(
        &server,
        "eth_getTransactionReceipt",
        RpcReply::result(receipt(tx_hash, "0x0")),
    )
    .await;

    let client = EvmSiteContractClient::new(&config_for(&server)).await.unwrap();
    let result = client.write_cid(SITE, "bafycid").await;

    assert!(
        matches!(result, Err(ChainFailure::Reverted { .. })),
        "unexpected result: {:?}",
        result
    );
}
