//! # Process Configuration
//!
//! All configuration is environment-sourced. Every endpoint and credential
//! the agent needs is required; absence of any is a startup-fatal
//! [`ConfigError`]. An optional dotenv pass runs before parsing so local
//! deployments can keep their variables in a file.
//!
//! Required variables:
//! - `RPC_URL` — JSON-RPC endpoint for both registry contracts
//! - `PRIVATE_KEY` — 64-char hex Ed25519 signing credential
//! - `BOOTSTRAP_CONTRACT_ADDRESS` — bootstrap-peer registry
//! - `STORAGE_NODE_CONTRACT_ADDRESS` — storage-node registry
//! - `SUBGRAPH_URL` — indexed data service endpoint
//! - `NODE_PORT` — local P2P listen port
//! - `BLOCKSTORE_DIRECTORY` — blockstore and identity directory
//! - `PUBLIC_IP` — publicly advertised IP
//!
//! Optional:
//! - `CHECKPOINT_INTERVAL_SECS` — liveness checkpoint period (default 3600)
//! - `CHAIN_TIMEOUT_MS` — per-call RPC timeout (default 30000)
//! - `USE_MOCK_P2P` — substitute the mock network stack (development)

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Default liveness checkpoint period: one hour.
pub const DEFAULT_CHECKPOINT_INTERVAL_SECS: u64 = 3600;

/// Default per-call chain RPC timeout in milliseconds.
pub const DEFAULT_CHAIN_TIMEOUT_MS: u64 = 30_000;

/// Complete agent configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// Ed25519 signing credential, raw 32 bytes.
    pub private_key: [u8; 32],
    /// Bootstrap-peer registry contract address.
    pub bootstrap_contract: String,
    /// Storage-node registry contract address.
    pub storage_contract: String,
    /// Indexed data service endpoint URL.
    pub subgraph_url: String,
    /// Local P2P listen port.
    pub node_port: u16,
    /// Blockstore directory path (also holds the node identity key).
    pub blockstore_dir: String,
    /// Publicly advertised IP address.
    pub public_ip: String,
    /// Liveness checkpoint period.
    pub checkpoint_interval: Duration,
    /// Per-call chain RPC timeout.
    pub chain_timeout: Duration,
    /// Use the mock network stack instead of the TCP stack.
    pub use_mock_p2p: bool,
}

impl NodeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_url = require("RPC_URL")?;
        let private_key = parse_private_key(&require("PRIVATE_KEY")?)?;
        let bootstrap_contract = require("BOOTSTRAP_CONTRACT_ADDRESS")?;
        let storage_contract = require("STORAGE_NODE_CONTRACT_ADDRESS")?;
        let subgraph_url = require("SUBGRAPH_URL")?;

        let node_port: u16 = require("NODE_PORT")?.parse().map_err(|_| {
            ConfigError::Invalid {
                var: "NODE_PORT",
                reason: "must be a valid port number".to_string(),
            }
        })?;

        let blockstore_dir = require("BLOCKSTORE_DIRECTORY")?;
        let public_ip = require("PUBLIC_IP")?;

        let checkpoint_interval = Duration::from_secs(optional_parse(
            "CHECKPOINT_INTERVAL_SECS",
            DEFAULT_CHECKPOINT_INTERVAL_SECS,
        )?);

        let chain_timeout = Duration::from_millis(optional_parse(
            "CHAIN_TIMEOUT_MS",
            DEFAULT_CHAIN_TIMEOUT_MS,
        )?);

        let use_mock_p2p = env::var("USE_MOCK_P2P")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let config = Self {
            rpc_url,
            private_key,
            bootstrap_contract,
            storage_contract,
            subgraph_url,
            node_port,
            blockstore_dir,
            public_ip,
            checkpoint_interval,
            chain_timeout,
            use_mock_p2p,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate field contents beyond basic parsing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "RPC_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        if !self.subgraph_url.starts_with("http://") && !self.subgraph_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                var: "SUBGRAPH_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        if self.node_port == 0 {
            return Err(ConfigError::Invalid {
                var: "NODE_PORT",
                reason: "port cannot be 0".to_string(),
            });
        }

        if self.blockstore_dir.is_empty() {
            return Err(ConfigError::Invalid {
                var: "BLOCKSTORE_DIRECTORY",
                reason: "path cannot be empty".to_string(),
            });
        }

        if self.public_ip.is_empty() {
            return Err(ConfigError::Invalid {
                var: "PUBLIC_IP",
                reason: "address cannot be empty".to_string(),
            });
        }

        if self.bootstrap_contract.is_empty() || self.storage_contract.is_empty() {
            return Err(ConfigError::Invalid {
                var: "BOOTSTRAP_CONTRACT_ADDRESS",
                reason: "contract addresses cannot be empty".to_string(),
            });
        }

        if self.checkpoint_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "CHECKPOINT_INTERVAL_SECS",
                reason: "interval cannot be 0".to_string(),
            });
        }

        Ok(())
    }

    /// The multi-address this node advertises to the registry:
    /// `/ip4/{public_ip}/tcp/{node_port}`.
    pub fn advertised_multiaddr(&self) -> String {
        format!("/ip4/{}/tcp/{}", self.public_ip, self.node_port)
    }
}

/// Load an env file before reading configuration.
///
/// Priority: `DESTRA_ENV_FILE` (explicit path) > `.env`. A missing file is
/// not an error — production deployments typically inject variables
/// directly.
pub fn load_env_file() {
    let env_file = env::var("DESTRA_ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    match dotenvy::from_filename(&env_file) {
        Ok(_) => {}
        Err(e) => {
            if !matches!(e, dotenvy::Error::Io(_)) {
                eprintln!("warning: failed to load {}: {}", env_file, e);
            }
        }
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn optional_parse<T: std::str::FromStr>(
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("cannot parse '{}'", v),
        }),
        _ => Ok(default),
    }
}

fn parse_private_key(hex_str: &str) -> Result<[u8; 32], ConfigError> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(stripped).map_err(|_| ConfigError::Invalid {
        var: "PRIVATE_KEY",
        reason: "must be valid hex".to_string(),
    })?;
    let key: [u8; 32] = bytes.try_into().map_err(|_| ConfigError::Invalid {
        var: "PRIVATE_KEY",
        reason: "must decode to exactly 32 bytes".to_string(),
    })?;
    Ok(key)
}
