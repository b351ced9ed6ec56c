//! # Bootstrap Discovery
//!
//! Builds the list of bootstrap multi-addresses used to join the network.
//! Candidate peer identifiers come from the indexing subgraph; for each one
//! the canonical multi-address is read from the on-chain bootstrap-peer
//! registry, and `"/p2p/<peer-id>"` is appended to form a full dialable
//! address.
//!
//! The subgraph is trusted for *which* peers exist; the chain is
//! authoritative for *where* they live. A candidate whose on-chain lookup
//! fails is skipped with a warning rather than failing the whole pass, so
//! one stale registry entry cannot block startup. A subgraph failure, on
//! the other hand, leaves us with no candidates at all and is fatal to the
//! caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chain::ChainClient;
use crate::error::DiscoveryError;
use crate::subgraph::{SubgraphClient, PEER_QUERY_BATCH};

/// Fetch bootstrap addresses: subgraph candidates resolved through the
/// on-chain registry, in subgraph order. May legitimately return an empty
/// list (first node on a fresh network).
pub async fn fetch_bootstrap_addrs(
    subgraph: &SubgraphClient,
    chain: &Arc<dyn ChainClient>,
) -> Result<Vec<String>, DiscoveryError> {
    let records = subgraph.recent_peer_registrations(PEER_QUERY_BATCH).await?;
    debug!(candidates = records.len(), "subgraph peer candidates");

    let mut addrs = Vec::with_capacity(records.len());
    for record in &records {
        match chain.bootstrap_node(&record.peer_id).await {
            Ok(onchain_addr) => {
                if onchain_addr != record.location_multi_addr {
                    // The chain wins; the subgraph copy may lag behind a
                    // re-registration.
                    debug!(
                        peer_id = %record.peer_id,
                        subgraph_addr = %record.location_multi_addr,
                        onchain_addr = %onchain_addr,
                        "subgraph address differs from on-chain registry"
                    );
                }
                addrs.push(format!("{}/p2p/{}", onchain_addr, record.peer_id));
            }
            Err(e) => {
                warn!(peer_id = %record.peer_id, error = %e, "skipping bootstrap candidate");
            }
        }
    }

    info!(resolved = addrs.len(), of = records.len(), "bootstrap discovery complete");
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn subgraph_with_peers(peers: &[(&str, &str)]) -> (MockServer, SubgraphClient) {
        let server = MockServer::start().await;
        let records: Vec<_> = peers
            .iter()
            .map(|(id, addr)| json!({"peerId": id, "locationMultiAddr": addr}))
            .collect();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"peerRegistereds": records}
            })))
            .mount(&server)
            .await;
        let client = SubgraphClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn resolves_candidates_in_subgraph_order() {
        let (_server, subgraph) = subgraph_with_peers(&[
            ("peer-a", "/ip4/10.0.0.1/tcp/4001"),
            ("peer-b", "/ip4/10.0.0.2/tcp/4001"),
        ])
        .await;

        let mock = MockChainClient::new();
        mock.insert_address("peer-a", "/ip4/10.0.0.1/tcp/4001");
        mock.insert_address("peer-b", "/ip4/10.0.0.2/tcp/4001");
        let chain: Arc<dyn ChainClient> = Arc::new(mock);

        let addrs = fetch_bootstrap_addrs(&subgraph, &chain).await.unwrap();
        assert_eq!(
            addrs,
            vec![
                "/ip4/10.0.0.1/tcp/4001/p2p/peer-a".to_string(),
                "/ip4/10.0.0.2/tcp/4001/p2p/peer-b".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn on_chain_address_overrides_subgraph_copy() {
        let (_server, subgraph) =
            subgraph_with_peers(&[("peer-a", "/ip4/203.0.113.9/tcp/4001")]).await;

        let mock = MockChainClient::new();
        // Peer re-registered under a new address; the subgraph lags.
        mock.insert_address("peer-a", "/ip4/10.9.9.9/tcp/4002");
        let chain: Arc<dyn ChainClient> = Arc::new(mock);

        let addrs = fetch_bootstrap_addrs(&subgraph, &chain).await.unwrap();
        assert_eq!(addrs, vec!["/ip4/10.9.9.9/tcp/4002/p2p/peer-a".to_string()]);
    }

    #[tokio::test]
    async fn failed_lookup_skips_only_that_candidate() {
        let (_server, subgraph) = subgraph_with_peers(&[
            ("peer-a", "/ip4/10.0.0.1/tcp/4001"),
            ("peer-b", "/ip4/10.0.0.2/tcp/4001"),
            ("peer-c", "/ip4/10.0.0.3/tcp/4001"),
        ])
        .await;

        let mock = MockChainClient::new();
        mock.insert_address("peer-a", "/ip4/10.0.0.1/tcp/4001");
        mock.fail_read("peer-b", "connection reset");
        // peer-c absent from the registry entirely.
        let chain: Arc<dyn ChainClient> = Arc::new(mock);

        let addrs = fetch_bootstrap_addrs(&subgraph, &chain).await.unwrap();
        assert_eq!(addrs, vec!["/ip4/10.0.0.1/tcp/4001/p2p/peer-a".to_string()]);
    }

    #[tokio::test]
    async fn empty_subgraph_yields_empty_list() {
        let (_server, subgraph) = subgraph_with_peers(&[]).await;
        let chain: Arc<dyn ChainClient> = Arc::new(MockChainClient::new());

        let addrs = fetch_bootstrap_addrs(&subgraph, &chain).await.unwrap();
        assert!(addrs.is_empty());
    }

    #[tokio::test]
    async fn subgraph_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let subgraph = SubgraphClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let chain: Arc<dyn ChainClient> = Arc::new(MockChainClient::new());

        let err = fetch_bootstrap_addrs(&subgraph, &chain).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Unavailable(_)));
    }
}
