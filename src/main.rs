//! # Destra Storage Node Entry Point
//!
//! ## Configuration
//!
//! Environment variables (optionally via a `.env` file, or the file named
//! by `DESTRA_ENV_FILE`):
//!
//! Required:
//! - `RPC_URL`: JSON-RPC chain endpoint
//! - `PRIVATE_KEY`: 64-char hex Ed25519 signing credential
//! - `BOOTSTRAP_CONTRACT_ADDRESS`: bootstrap-peer registry contract
//! - `STORAGE_NODE_CONTRACT_ADDRESS`: storage-node registry contract
//! - `SUBGRAPH_URL`: indexed peer-registration service
//! - `NODE_PORT`: local listen port
//! - `BLOCKSTORE_DIRECTORY`: blockstore and identity directory
//! - `PUBLIC_IP`: publicly advertised IP
//!
//! Optional:
//! - `CHECKPOINT_INTERVAL_SECS`: liveness period (default 3600)
//! - `CHAIN_TIMEOUT_MS`: per-call RPC timeout (default 30000)
//! - `USE_MOCK_P2P`: run without a real transport (development)
//!
//! ## Initialization Flow
//! 1. Load env file and parse configuration
//! 2. Validate configuration
//! 3. Build the chain client
//! 4. Start the node (identity, discovery, network, registration,
//!    checkpoint loop)
//! 5. Run until SIGINT, then shut down gracefully

use std::sync::Arc;

use tracing::{error, info, Level};

use destra_storage_node::{
    create_storage_node, ChainClient, JsonRpcChainClient, MockNetworkStack, NetworkStack,
    NodeConfig, TcpNetworkStack,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    destra_storage_node::config::load_env_file();

    let config = match NodeConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("═══════════════════════════════════════════════════════════════");
    info!("                  Destra Storage Node                          ");
    info!("═══════════════════════════════════════════════════════════════");
    info!("RPC Endpoint:   {}", config.rpc_url);
    info!("Subgraph:       {}", config.subgraph_url);
    info!("Listen Port:    {}", config.node_port);
    info!("Advertised:     {}", config.advertised_multiaddr());
    info!("Blockstore:     {}", config.blockstore_dir);
    info!("Checkpoint:     every {}s", config.checkpoint_interval.as_secs());
    info!("═══════════════════════════════════════════════════════════════");

    let chain: Arc<dyn ChainClient> = match JsonRpcChainClient::from_config(&config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to build chain client: {}", e);
            std::process::exit(1);
        }
    };

    let stack: Box<dyn NetworkStack> = if config.use_mock_p2p {
        info!("Using mock network stack (USE_MOCK_P2P)");
        Box::new(MockNetworkStack::new())
    } else {
        Box::new(TcpNetworkStack::new())
    };

    let node = match create_storage_node(&config, chain, stack.as_ref()).await {
        Ok(node) => node,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    info!(peer_id = %node.peer_id(), "storage node online");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    node.shutdown().await;
}
