//! # Node Lifecycle
//!
//! Startup orchestration: config in, a running [`StorageNode`] out.
//!
//! The startup sequence is strictly ordered, and each step's failure
//! classification follows the error taxonomy:
//!
//! 1. Load or generate the persistent node identity (fatal).
//! 2. Discover bootstrap addresses via subgraph + on-chain registry
//!    (subgraph failure fatal; individual candidates skippable; an empty
//!    result is survivable).
//! 3. Activate the network stack (fatal).
//! 4. Register on-chain under the stack's wire identity (failure logged
//!    and swallowed).
//! 5. Arm the hourly checkpoint loop.
//!
//! After step 3 nothing terminates the process; shutdown happens only via
//! [`StorageNode::shutdown`].

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::chain::ChainClient;
use crate::config::NodeConfig;
use crate::controller::{CheckpointHandle, LivenessController, RegistrationState};
use crate::discovery::fetch_bootstrap_addrs;
use crate::error::StartupError;
use crate::identity::NodeIdentity;
use crate::network::{NetworkNode, NetworkStack};
use crate::subgraph::SubgraphClient;

/// A fully started storage node: live network endpoint, registration
/// outcome, and an armed checkpoint loop.
pub struct StorageNode {
    node: Box<dyn NetworkNode>,
    controller: Arc<LivenessController>,
    checkpoint: CheckpointHandle,
}

impl std::fmt::Debug for StorageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageNode")
            .field("peer_id", &self.node.peer_id())
            .finish_non_exhaustive()
    }
}

impl StorageNode {
    /// The wire identity the node runs under.
    pub fn peer_id(&self) -> &str {
        self.node.peer_id()
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.controller.registration_state()
    }

    /// Liveness counters and registration state, for observability.
    pub fn controller(&self) -> &Arc<LivenessController> {
        &self.controller
    }

    /// Stop the checkpoint loop, then the network stack. Awaited fully;
    /// nothing is left running afterwards.
    pub async fn shutdown(self) {
        self.checkpoint.stop().await;
        self.node.shutdown().await;
        info!("storage node stopped");
    }
}

/// Bring a storage node online. Any error here is startup-fatal; the caller
/// is expected to log it and exit non-zero.
pub async fn create_storage_node(
    config: &NodeConfig,
    chain: Arc<dyn ChainClient>,
    stack: &dyn NetworkStack,
) -> Result<StorageNode, StartupError> {
    let identity = NodeIdentity::load_or_generate(Path::new(&config.blockstore_dir))?;

    let subgraph = SubgraphClient::new(config.subgraph_url.clone(), config.chain_timeout)?;
    let bootstrap_addrs = fetch_bootstrap_addrs(&subgraph, &chain).await?;

    let node = stack
        .activate(&identity, config.node_port, &bootstrap_addrs)
        .await?;
    info!(
        peer_id = %node.peer_id(),
        listen = %node.listen_addr(),
        bootstrap_connected = node.connected_bootstrap_count(),
        "network stack online"
    );

    // Registration and checkpoints use the identity the stack actually
    // runs under, never one recomputed from the key material.
    let controller = LivenessController::new(
        chain,
        node.peer_id().to_string(),
        config.advertised_multiaddr(),
    );
    controller.register().await;

    let checkpoint = controller.spawn_checkpoint_loop(config.checkpoint_interval);
    info!(
        period_secs = config.checkpoint_interval.as_secs(),
        "checkpoint loop armed"
    );

    Ok(StorageNode {
        node,
        controller,
        checkpoint,
    })
}
