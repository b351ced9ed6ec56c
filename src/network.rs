//! # Network Stack
//!
//! Seam between the agent and the p2p transport. The agent only needs
//! three things from the stack, captured by [`NetworkStack`] and
//! [`NetworkNode`]:
//!
//! 1. **Activation**: bind the listen socket (fatal if it fails) and dial
//!    the discovered bootstrap addresses (best effort — a node with zero
//!    reachable bootstrap peers still comes up and waits to be dialed).
//! 2. **Identity**: the peer identifier the stack actually runs under.
//!    Registration and checkpoints must use this value verbatim, never a
//!    recomputed one.
//! 3. **Shutdown**: stop accepting and release the socket.
//!
//! [`TcpNetworkStack`] is the production implementation;
//! [`MockNetworkStack`] scripts activations for tests and for running the
//! agent without a transport (`USE_MOCK_P2P=true`).

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::NetworkError;
use crate::identity::NodeIdentity;

/// Upper bound on a single bootstrap dial attempt.
pub const DIAL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ════════════════════════════════════════════════════════════════════════════
// TRAITS
// ════════════════════════════════════════════════════════════════════════════

/// Builds a running [`NetworkNode`] from an identity, a listen port, and a
/// discovered bootstrap set.
#[async_trait]
pub trait NetworkStack: Send + Sync {
    /// Bring the stack up. A bind failure is fatal; bootstrap dial
    /// failures are not.
    async fn activate(
        &self,
        identity: &NodeIdentity,
        listen_port: u16,
        bootstrap_addrs: &[String],
    ) -> Result<Box<dyn NetworkNode>, NetworkError>;
}

/// A live network endpoint.
#[async_trait]
pub trait NetworkNode: Send + Sync {
    /// The identifier this node runs under on the wire. Authoritative for
    /// all subsequent on-chain bookkeeping.
    fn peer_id(&self) -> &str;

    /// The bound listen address.
    fn listen_addr(&self) -> SocketAddr;

    /// How many bootstrap peers answered the initial dial.
    fn connected_bootstrap_count(&self) -> usize;

    /// Stop accepting connections and release the socket.
    async fn shutdown(&self);
}

impl std::fmt::Debug for dyn NetworkNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkNode")
            .field("peer_id", &self.peer_id())
            .finish_non_exhaustive()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TCP IMPLEMENTATION
// ════════════════════════════════════════════════════════════════════════════

/// Production stack: a TCP listener plus best-effort bootstrap dials.
#[derive(Default)]
pub struct TcpNetworkStack;

impl TcpNetworkStack {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NetworkStack for TcpNetworkStack {
    async fn activate(
        &self,
        identity: &NodeIdentity,
        listen_port: u16,
        bootstrap_addrs: &[String],
    ) -> Result<Box<dyn NetworkNode>, NetworkError> {
        let bind_addr = format!("0.0.0.0:{}", listen_port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| NetworkError::Bind {
                addr: bind_addr.clone(),
                source: e,
            })?;
        let listen_addr = listener.local_addr().map_err(|e| NetworkError::Bind {
            addr: bind_addr,
            source: e,
        })?;
        info!(addr = %listen_addr, "network listener bound");

        let mut connected = 0usize;
        for addr in bootstrap_addrs {
            match dial_bootstrap(addr).await {
                Ok(peer) => {
                    info!(addr = %addr, peer = %peer, "bootstrap peer reachable");
                    connected += 1;
                }
                Err(reason) => {
                    warn!(addr = %addr, reason = %reason, "bootstrap dial failed");
                }
            }
        }
        if bootstrap_addrs.is_empty() {
            info!("no bootstrap peers, starting as first node");
        }

        let stop = Arc::new(Notify::new());
        let accept_stop = stop.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((_stream, remote)) => {
                            debug!(remote = %remote, "inbound connection");
                        }
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                        }
                    },
                    _ = accept_stop.notified() => break,
                }
            }
        });

        Ok(Box::new(TcpNetworkNode {
            peer_id: identity.peer_id().to_string(),
            listen_addr,
            connected,
            stop,
            accept_task: parking_lot::Mutex::new(Some(accept_task)),
        }))
    }
}

struct TcpNetworkNode {
    peer_id: String,
    listen_addr: SocketAddr,
    connected: usize,
    stop: Arc<Notify>,
    accept_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl NetworkNode for TcpNetworkNode {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    fn connected_bootstrap_count(&self) -> usize {
        self.connected
    }

    async fn shutdown(&self) {
        self.stop.notify_one();
        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Dial one bootstrap multi-address. Returns the candidate's peer id on
/// success, or a loggable reason on failure.
async fn dial_bootstrap(multiaddr: &str) -> Result<String, String> {
    let (addr, peer_id) =
        parse_multiaddr(multiaddr).ok_or_else(|| format!("malformed multiaddr {}", multiaddr))?;

    match tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => Ok(peer_id),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("dial timed out after {:?}", DIAL_TIMEOUT)),
    }
}

/// Parse `/ip4/<host>/tcp/<port>/p2p/<peer-id>` into a socket address and
/// peer id. Anything else is rejected.
fn parse_multiaddr(multiaddr: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = multiaddr.split('/').collect();
    // Leading slash yields an empty first element.
    if parts.len() != 7 || !parts[0].is_empty() {
        return None;
    }
    if parts[1] != "ip4" || parts[3] != "tcp" || parts[5] != "p2p" {
        return None;
    }
    let host = parts[2];
    let port: u16 = parts[4].parse().ok()?;
    let peer_id = parts[6];
    if host.is_empty() || peer_id.is_empty() {
        return None;
    }
    Some((format!("{}:{}", host, port), peer_id.to_string()))
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK IMPLEMENTATION
// ════════════════════════════════════════════════════════════════════════════

/// Scripted stack for tests and transportless runs.
///
/// The assigned peer id defaults to the identity's own, but can be
/// overridden to verify that callers take the stack's identity verbatim.
#[derive(Default)]
pub struct MockNetworkStack {
    assigned_peer_id: Option<String>,
    fail_activation: bool,
    activations: parking_lot::Mutex<Vec<(u16, Vec<String>)>>,
}

impl MockNetworkStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a specific wire identity, regardless of the key material.
    pub fn with_assigned_peer_id(mut self, peer_id: impl Into<String>) -> Self {
        self.assigned_peer_id = Some(peer_id.into());
        self
    }

    /// Make the next activation fail with a construction error.
    pub fn failing(mut self) -> Self {
        self.fail_activation = true;
        self
    }

    /// Recorded `(listen_port, bootstrap_addrs)` activation arguments.
    pub fn activations(&self) -> Vec<(u16, Vec<String>)> {
        self.activations.lock().clone()
    }
}

#[async_trait]
impl NetworkStack for MockNetworkStack {
    async fn activate(
        &self,
        identity: &NodeIdentity,
        listen_port: u16,
        bootstrap_addrs: &[String],
    ) -> Result<Box<dyn NetworkNode>, NetworkError> {
        self.activations
            .lock()
            .push((listen_port, bootstrap_addrs.to_vec()));

        if self.fail_activation {
            return Err(NetworkError::Construction("scripted failure".to_string()));
        }

        let peer_id = self
            .assigned_peer_id
            .clone()
            .unwrap_or_else(|| identity.peer_id().to_string());

        Ok(Box::new(MockNetworkNode {
            peer_id,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], listen_port)),
            connected: bootstrap_addrs.len(),
        }))
    }
}

struct MockNetworkNode {
    peer_id: String,
    listen_addr: SocketAddr,
    connected: usize,
}

#[async_trait]
impl NetworkNode for MockNetworkNode {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    fn connected_bootstrap_count(&self) -> usize {
        self.connected
    }

    async fn shutdown(&self) {}
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════
