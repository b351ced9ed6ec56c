//! # Indexed Data Service Client
//!
//! The subgraph is an off-chain service exposing queryable views over
//! on-chain event history. This agent uses exactly one query: the most
//! recently registered peers, as `{ peerId, locationMultiAddr }` pairs.
//!
//! The service is a read-only, best-effort directory. Any failure of the
//! query itself is [`DiscoveryError`] and fatal to startup — without a peer
//! directory there is no bootstrap set.

use std::time::Duration;

use serde::Deserialize;

use crate::error::DiscoveryError;

/// How many recent peer registrations to request per startup.
pub const PEER_QUERY_BATCH: usize = 8;

/// One peer registration event from the indexed data service.
///
/// `peer_id` is an opaque network identity string; `location_multi_addr`
/// is the address the peer announced at registration time. Note the
/// announced address is informational only — the canonical address is
/// resolved on-chain (see the discovery module).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub peer_id: String,
    pub location_multi_addr: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PeerRegistrationsData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct PeerRegistrationsData {
    #[serde(rename = "peerRegistereds")]
    peer_registereds: Vec<PeerRecord>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// HTTP client for the indexed data service.
#[derive(Clone)]
pub struct SubgraphClient {
    url: String,
    client: reqwest::Client,
}

impl SubgraphClient {
    /// Build a client for the given endpoint with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Fetch up to `limit` of the most recently registered peers,
    /// in the order the service returns them.
    pub async fn recent_peer_registrations(
        &self,
        limit: usize,
    ) -> Result<Vec<PeerRecord>, DiscoveryError> {
        let query = format!(
            "query GetBootstrapNodes {{ peerRegistereds(first: {}) {{ peerId locationMultiAddr }} }}",
            limit
        );
        let body = serde_json::json!({ "query": query });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::Unavailable("request timed out".to_string())
                } else {
                    DiscoveryError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Unavailable(format!("HTTP {}", status)));
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Response(e.to_string()))?;

        if let Some(errors) = parsed.errors {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DiscoveryError::Response(format!("query errors: {}", joined)));
        }

        match parsed.data {
            Some(data) => Ok(data.peer_registereds),
            None => Err(DiscoveryError::Response("missing data field".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registrations_body(records: &[(&str, &str)]) -> String {
        let entries: Vec<String> = records
            .iter()
            .map(|(id, addr)| {
                format!(r#"{{"peerId":"{}","locationMultiAddr":"{}"}}"#, id, addr)
            })
            .collect();
        format!(
            r#"{{"data":{{"peerRegistereds":[{}]}}}}"#,
            entries.join(",")
        )
    }

    #[tokio::test]
    async fn fetches_records_in_response_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(registrations_body(&[
                ("peer-a", "/ip4/10.0.0.1/tcp/4001"),
                ("peer-b", "/ip4/10.0.0.2/tcp/4001"),
            ])))
            .mount(&server)
            .await;

        let client = SubgraphClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let records = client.recent_peer_registrations(8).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].peer_id, "peer-a");
        assert_eq!(records[1].peer_id, "peer-b");
        assert_eq!(records[0].location_multi_addr, "/ip4/10.0.0.1/tcp/4001");
    }

    #[tokio::test]
    async fn empty_batch_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(registrations_body(&[])))
            .mount(&server)
            .await;

        let client = SubgraphClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let records = client.recent_peer_registrations(8).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn http_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = SubgraphClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.recent_peer_registrations(8).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn graphql_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data":null,"errors":[{"message":"indexer lagging"}]}"#,
            ))
            .mount(&server)
            .await;

        let client = SubgraphClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.recent_peer_registrations(8).await.unwrap_err();
        match err {
            DiscoveryError::Response(msg) => assert!(msg.contains("indexer lagging")),
            other => panic!("expected Response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) is virtually never listening on loopback.
        let client =
            SubgraphClient::new("http://127.0.0.1:9/subgraph", Duration::from_millis(500))
                .unwrap();
        let err = client.recent_peer_registrations(8).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Unavailable(_)));
    }
}
