//! # Chain Client
//!
//! Thin transaction-signing and contract-call wrapper over a JSON-RPC
//! endpoint. Two independent registry contracts are involved:
//!
//! - the **bootstrap-peer registry** (read-only here): resolves a peer
//!   identifier to its canonical multi-address;
//! - the **storage-node registry** (state-changing): node registration and
//!   liveness checkpoints.
//!
//! Writes sign a canonical payload (`method|contract|args|nonce`) with the
//! node's Ed25519 credential, submit it, and then poll for the transaction
//! receipt until a bounded confirmation window elapses. A reverted execution
//! or a missing receipt is an error.
//!
//! ## No Implicit Retry
//!
//! None of the three operations retries internally. The discovery path
//! tolerates per-candidate read failures, and the liveness controller
//! tolerates write failures tick by tick — retry policy belongs to those
//! callers, not to the transport.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::NodeConfig;
use crate::error::{ChainReadError, ChainWriteError};

/// Interval between receipt polls after a write submission.
pub const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long to wait for a submitted transaction to confirm.
pub const CONFIRM_WINDOW: Duration = Duration::from_secs(90);

// ════════════════════════════════════════════════════════════════════════════
// RECEIPT
// ════════════════════════════════════════════════════════════════════════════

/// Confirmation of an executed state-changing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash assigned at submission.
    pub tx_hash: String,
    /// Block in which the transaction executed.
    pub block_number: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// CLIENT TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// On-chain registry operations used by discovery and the liveness
/// controller. Object-safe so callers can hold `Arc<dyn ChainClient>` and
/// tests can substitute [`MockChainClient`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Resolve a peer identifier to its registered multi-address via the
    /// bootstrap-peer registry. An empty or absent entry is
    /// [`ChainReadError::UnknownPeer`] — the caller skips that candidate.
    async fn bootstrap_node(&self, peer_id: &str) -> Result<String, ChainReadError>;

    /// Announce this node's identifier and multi-address in the
    /// storage-node registry. Waits for on-chain confirmation.
    async fn register_node(
        &self,
        peer_id: &str,
        multiaddr: &str,
    ) -> Result<TxReceipt, ChainWriteError>;

    /// Record a liveness checkpoint for the given peer identifier.
    /// Waits for on-chain confirmation.
    async fn record_checkpoint(&self, peer_id: &str) -> Result<TxReceipt, ChainWriteError>;
}

// ════════════════════════════════════════════════════════════════════════════
// JSON-RPC WIRE TYPES
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, serde::Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    #[serde(default)]
    jsonrpc: String,
    #[allow(dead_code)]
    #[serde(default)]
    id: u64,
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Receipt body returned by `destra_transactionReceipt`.
#[derive(Debug, Deserialize)]
struct ReceiptResult {
    #[serde(rename = "blockNumber")]
    block_number: u64,
    /// `true` for successful execution, `false` for a revert.
    status: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// JSON-RPC CLIENT
// ════════════════════════════════════════════════════════════════════════════

/// Production [`ChainClient`] over a JSON-RPC HTTP endpoint.
pub struct JsonRpcChainClient {
    rpc_url: String,
    bootstrap_contract: String,
    storage_contract: String,
    signer: SigningKey,
    client: reqwest::Client,
    confirm_window: Duration,
}

impl JsonRpcChainClient {
    /// Build a client with an explicit per-call timeout.
    pub fn new(
        rpc_url: impl Into<String>,
        bootstrap_contract: impl Into<String>,
        storage_contract: impl Into<String>,
        private_key: [u8; 32],
        timeout: Duration,
    ) -> Result<Self, ChainWriteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainWriteError::Rpc(format!("http client: {}", e)))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            bootstrap_contract: bootstrap_contract.into(),
            storage_contract: storage_contract.into(),
            signer: SigningKey::from_bytes(&private_key),
            client,
            confirm_window: CONFIRM_WINDOW,
        })
    }

    /// Build a client from the agent configuration.
    pub fn from_config(config: &NodeConfig) -> Result<Self, ChainWriteError> {
        Self::new(
            config.rpc_url.clone(),
            config.bootstrap_contract.clone(),
            config.storage_contract.clone(),
            config.private_key,
            config.chain_timeout,
        )
    }

    /// Override the confirmation window (tests use a short one).
    pub fn with_confirm_window(mut self, window: Duration) -> Self {
        self.confirm_window = window;
        self
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        params: Vec<serde_json::Value>,
    ) -> Result<JsonRpcResponse<T>, RpcTransportError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcTransportError::Timeout
                } else {
                    RpcTransportError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcTransportError::Transport(format!("HTTP {}", status)));
        }

        response
            .json::<JsonRpcResponse<T>>()
            .await
            .map_err(|e| RpcTransportError::Decode(e.to_string()))
    }

    /// Sign and submit a state-changing call, returning the tx hash.
    async fn submit_signed(
        &self,
        method: &'static str,
        args: &[&str],
    ) -> Result<String, ChainWriteError> {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let payload = format!(
            "{}|{}|{}|{}",
            method,
            self.storage_contract,
            args.join(","),
            nonce
        );
        let signature = self.signer.sign(payload.as_bytes());
        let signer_pub = hex::encode(self.signer.verifying_key().as_bytes());

        let mut params: Vec<serde_json::Value> =
            vec![json!(self.storage_contract)];
        params.extend(args.iter().map(|a| json!(a)));
        params.push(json!(signer_pub));
        params.push(json!(hex::encode(signature.to_bytes())));
        params.push(json!(nonce));

        let response: JsonRpcResponse<String> = self
            .call(method, params)
            .await
            .map_err(RpcTransportError::into_write)?;

        if let Some(err) = response.error {
            return Err(ChainWriteError::Rpc(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        response
            .result
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| ChainWriteError::Response("missing tx hash".to_string()))
    }

    /// Poll for the receipt of a submitted transaction until it confirms
    /// or the confirmation window elapses.
    async fn wait_for_receipt(&self, tx_hash: String) -> Result<TxReceipt, ChainWriteError> {
        let deadline = Instant::now() + self.confirm_window;

        loop {
            let response: JsonRpcResponse<ReceiptResult> = self
                .call("destra_transactionReceipt", vec![json!(tx_hash)])
                .await
                .map_err(RpcTransportError::into_write)?;

            if let Some(err) = response.error {
                return Err(ChainWriteError::Rpc(format!(
                    "RPC error {}: {}",
                    err.code, err.message
                )));
            }

            if let Some(receipt) = response.result {
                if !receipt.status {
                    return Err(ChainWriteError::Reverted { tx_hash });
                }
                debug!(
                    tx_hash = %tx_hash,
                    block = receipt.block_number,
                    "transaction confirmed"
                );
                return Ok(TxReceipt {
                    tx_hash,
                    block_number: receipt.block_number,
                });
            }

            if Instant::now() >= deadline {
                return Err(ChainWriteError::Unconfirmed {
                    tx_hash,
                    window: self.confirm_window,
                });
            }

            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn bootstrap_node(&self, peer_id: &str) -> Result<String, ChainReadError> {
        let response: JsonRpcResponse<String> = self
            .call(
                "destra_bootstrapNode",
                vec![json!(self.bootstrap_contract), json!(peer_id)],
            )
            .await
            .map_err(RpcTransportError::into_read)?;

        if let Some(err) = response.error {
            return Err(ChainReadError::Rpc(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        match response.result {
            Some(addr) if !addr.is_empty() => Ok(addr),
            // Empty/default address means the registry does not know this
            // peer; the caller drops the candidate.
            _ => Err(ChainReadError::UnknownPeer(peer_id.to_string())),
        }
    }

    async fn register_node(
        &self,
        peer_id: &str,
        multiaddr: &str,
    ) -> Result<TxReceipt, ChainWriteError> {
        let tx_hash = self
            .submit_signed("destra_registerNode", &[peer_id, multiaddr])
            .await?;
        self.wait_for_receipt(tx_hash).await
    }

    async fn record_checkpoint(&self, peer_id: &str) -> Result<TxReceipt, ChainWriteError> {
        let tx_hash = self
            .submit_signed("destra_recordCheckpoint", &[peer_id])
            .await?;
        self.wait_for_receipt(tx_hash).await
    }
}

/// Transport-level failure shared by the read and write paths before it is
/// mapped into the caller-facing taxonomy.
#[derive(Debug)]
enum RpcTransportError {
    Timeout,
    Transport(String),
    Decode(String),
}

impl RpcTransportError {
    fn into_read(self) -> ChainReadError {
        match self {
            RpcTransportError::Timeout => ChainReadError::Timeout,
            RpcTransportError::Transport(msg) => ChainReadError::Rpc(msg),
            RpcTransportError::Decode(msg) => ChainReadError::Response(msg),
        }
    }

    fn into_write(self) -> ChainWriteError {
        match self {
            RpcTransportError::Timeout => ChainWriteError::Timeout,
            RpcTransportError::Transport(msg) => ChainWriteError::Rpc(msg),
            RpcTransportError::Decode(msg) => ChainWriteError::Response(msg),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK CLIENT
// ════════════════════════════════════════════════════════════════════════════

/// Scripted [`ChainClient`] for tests.
///
/// Reads resolve from a pre-loaded peer map; writes pop scripted results in
/// FIFO order (an empty queue yields a synthetic success). Every write call
/// is recorded with its arguments so tests can assert exactly what went
/// on-chain.
#[derive(Default)]
pub struct MockChainClient {
    addresses: Mutex<HashMap<String, String>>,
    failing_reads: Mutex<HashMap<String, String>>,
    write_results: Mutex<Vec<Result<TxReceipt, ChainWriteError>>>,
    registrations: Mutex<Vec<(String, String)>>,
    checkpoints: Mutex<Vec<String>>,
    /// Artificial latency applied to every write, for overlap tests.
    write_delay: Mutex<Option<Duration>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolvable peer address.
    pub fn insert_address(&self, peer_id: &str, multiaddr: &str) {
        self.addresses
            .lock()
            .insert(peer_id.to_string(), multiaddr.to_string());
    }

    /// Make reads for this peer fail with an RPC error.
    pub fn fail_read(&self, peer_id: &str, reason: &str) {
        self.failing_reads
            .lock()
            .insert(peer_id.to_string(), reason.to_string());
    }

    /// Queue the next write result (FIFO).
    pub fn push_write_result(&self, result: Result<TxReceipt, ChainWriteError>) {
        self.write_results.lock().push(result);
    }

    /// Apply an artificial delay to every write.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// Recorded `register_node` calls, in order.
    pub fn registrations(&self) -> Vec<(String, String)> {
        self.registrations.lock().clone()
    }

    /// Recorded `record_checkpoint` calls, in order.
    pub fn checkpoints(&self) -> Vec<String> {
        self.checkpoints.lock().clone()
    }

    async fn next_write_result(&self) -> Result<TxReceipt, ChainWriteError> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut queue = self.write_results.lock();
        if queue.is_empty() {
            Ok(TxReceipt {
                tx_hash: format!("0xmock{}", self.registrations.lock().len()
                    + self.checkpoints.lock().len()),
                block_number: 1,
            })
        } else {
            queue.remove(0)
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn bootstrap_node(&self, peer_id: &str) -> Result<String, ChainReadError> {
        if let Some(reason) = self.failing_reads.lock().get(peer_id) {
            return Err(ChainReadError::Rpc(reason.clone()));
        }
        match self.addresses.lock().get(peer_id) {
            Some(addr) => Ok(addr.clone()),
            None => Err(ChainReadError::UnknownPeer(peer_id.to_string())),
        }
    }

    async fn register_node(
        &self,
        peer_id: &str,
        multiaddr: &str,
    ) -> Result<TxReceipt, ChainWriteError> {
        self.registrations
            .lock()
            .push((peer_id.to_string(), multiaddr.to_string()));
        self.next_write_result().await
    }

    async fn record_checkpoint(&self, peer_id: &str) -> Result<TxReceipt, ChainWriteError> {
        self.checkpoints.lock().push(peer_id.to_string());
        self.next_write_result().await
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn test_client(url: &str) -> JsonRpcChainClient {
        JsonRpcChainClient::new(
            url,
            "0xbootstrap",
            "0xstorage",
            [3u8; 32],
            Duration::from_secs(5),
        )
        .unwrap()
        .with_confirm_window(Duration::from_secs(2))
    }

    fn rpc_result(result: &str) -> String {
        format!(r#"{{"jsonrpc":"2.0","id":1,"result":{}}}"#, result)
    }

    #[tokio::test]
    async fn bootstrap_node_resolves_address() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rpc_result(r#""/ip4/10.0.0.1/tcp/4001""#)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let addr = client.bootstrap_node("peer-a").await.unwrap();
        assert_eq!(addr, "/ip4/10.0.0.1/tcp/4001");
    }

    #[tokio::test]
    async fn bootstrap_node_empty_address_is_unknown_peer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rpc_result(r#""""#)))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.bootstrap_node("peer-a").await.unwrap_err();
        assert!(matches!(err, ChainReadError::UnknownPeer(id) if id == "peer-a"));
    }

    #[tokio::test]
    async fn bootstrap_node_null_result_is_unknown_peer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rpc_result("null")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(matches!(
            client.bootstrap_node("peer-a").await,
            Err(ChainReadError::UnknownPeer(_))
        ));
    }

    #[tokio::test]
    async fn bootstrap_node_rpc_error_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"no state"}}"#,
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.bootstrap_node("peer-a").await.unwrap_err();
        match err {
            ChainReadError::Rpc(msg) => assert!(msg.contains("no state")),
            other => panic!("expected Rpc, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn register_node_confirms_via_receipt() {
        let server = MockServer::start().await;
        // First call: submission returns a tx hash. Second call onwards:
        // receipt poll returns a confirmed receipt.
        Mock::given(method("POST"))
            .respond_with(move |req: &Request| {
                let body = String::from_utf8_lossy(&req.body);
                if body.contains("destra_registerNode") {
                    ResponseTemplate::new(200).set_body_string(rpc_result(r#""0xfeed""#))
                } else {
                    ResponseTemplate::new(200).set_body_string(rpc_result(
                        r#"{"blockNumber":42,"status":true}"#,
                    ))
                }
            })
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let receipt = client
            .register_node("peer-a", "/ip4/1.2.3.4/tcp/4001")
            .await
            .unwrap();
        assert_eq!(receipt.tx_hash, "0xfeed");
        assert_eq!(receipt.block_number, 42);
    }

    #[tokio::test]
    async fn reverted_execution_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(move |req: &Request| {
                let body = String::from_utf8_lossy(&req.body);
                if body.contains("destra_recordCheckpoint") {
                    ResponseTemplate::new(200).set_body_string(rpc_result(r#""0xdead""#))
                } else {
                    ResponseTemplate::new(200).set_body_string(rpc_result(
                        r#"{"blockNumber":7,"status":false}"#,
                    ))
                }
            })
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.record_checkpoint("peer-a").await.unwrap_err();
        assert!(matches!(err, ChainWriteError::Reverted { tx_hash } if tx_hash == "0xdead"));
    }

    #[tokio::test]
    async fn unconfirmed_transaction_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(move |req: &Request| {
                let body = String::from_utf8_lossy(&req.body);
                if body.contains("destra_registerNode") {
                    ResponseTemplate::new(200).set_body_string(rpc_result(r#""0x1234""#))
                } else {
                    // Receipt never appears.
                    ResponseTemplate::new(200).set_body_string(rpc_result("null"))
                }
            })
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .register_node("peer-a", "/ip4/1.2.3.4/tcp/4001")
            .await
            .unwrap_err();
        assert!(matches!(err, ChainWriteError::Unconfirmed { .. }));
    }

    #[tokio::test]
    async fn submission_includes_signature_material() {
        let server = MockServer::start().await;
        let received = std::sync::Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = received.clone();
        Mock::given(method("POST"))
            .respond_with(move |req: &Request| {
                let body = String::from_utf8_lossy(&req.body).to_string();
                let is_submit = body.contains("destra_registerNode");
                sink.lock().push(body);
                if is_submit {
                    ResponseTemplate::new(200).set_body_string(rpc_result(r#""0xaa""#))
                } else {
                    ResponseTemplate::new(200).set_body_string(rpc_result(
                        r#"{"blockNumber":1,"status":true}"#,
                    ))
                }
            })
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client
            .register_node("peer-a", "/ip4/1.2.3.4/tcp/4001")
            .await
            .unwrap();

        let bodies = received.lock();
        let submit = bodies
            .iter()
            .find(|b| b.contains("destra_registerNode"))
            .expect("submission request");
        // Contract, args, and the hex-encoded signer key must all ride along.
        assert!(submit.contains("0xstorage"));
        assert!(submit.contains("peer-a"));
        assert!(submit.contains("/ip4/1.2.3.4/tcp/4001"));
        let expected_pub =
            hex::encode(SigningKey::from_bytes(&[3u8; 32]).verifying_key().as_bytes());
        assert!(submit.contains(&expected_pub));
    }

    #[tokio::test]
    async fn mock_client_records_calls_and_scripts_results() {
        let mock = MockChainClient::new();
        mock.insert_address("peer-a", "/ip4/10.0.0.1/tcp/4001");
        mock.push_write_result(Err(ChainWriteError::Reverted {
            tx_hash: "0x1".to_string(),
        }));

        assert_eq!(
            mock.bootstrap_node("peer-a").await.unwrap(),
            "/ip4/10.0.0.1/tcp/4001"
        );
        assert!(matches!(
            mock.bootstrap_node("peer-b").await,
            Err(ChainReadError::UnknownPeer(_))
        ));

        // Scripted failure first, synthetic success afterwards.
        assert!(mock.register_node("peer-a", "/ip4/1.1.1.1/tcp/1").await.is_err());
        assert!(mock.record_checkpoint("peer-a").await.is_ok());

        assert_eq!(mock.registrations().len(), 1);
        assert_eq!(mock.checkpoints(), vec!["peer-a".to_string()]);
    }
}
