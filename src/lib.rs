//! # Destra Storage Node
//!
//! Long-running agent that joins the Destra storage network and keeps its
//! on-chain liveness bookkeeping current.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        StorageNode                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌───────────────┐      ┌────────────────────────────────┐  │
//! │  │ SubgraphClient│─────▶│    fetch_bootstrap_addrs       │  │
//! │  │ (peer index)  │      │  subgraph candidates resolved  │  │
//! │  └───────────────┘      │  through the on-chain registry │  │
//! │                         └───────────────┬────────────────┘  │
//! │  ┌───────────────┐                      ▼                   │
//! │  │ NodeIdentity  │      ┌────────────────────────────────┐  │
//! │  │ (persisted    │─────▶│      NetworkStack::activate    │  │
//! │  │  Ed25519 key) │      │  bind listener, dial bootstrap │  │
//! │  └───────────────┘      └───────────────┬────────────────┘  │
//! │                                         ▼                   │
//! │  ┌───────────────┐      ┌────────────────────────────────┐  │
//! │  │  ChainClient  │◀─────│      LivenessController        │  │
//! │  │ (two registry │      │  one-shot register_node, then  │  │
//! │  │  contracts)   │      │  hourly record_checkpoint loop │  │
//! │  └───────────────┘      └────────────────────────────────┘  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | Environment configuration, validation, dotenv loading |
//! | [`error`] | Error taxonomy (fatal startup vs isolated call failures) |
//! | [`subgraph`] | GraphQL peer-registration directory client |
//! | [`chain`] | JSON-RPC chain client for both registry contracts |
//! | [`discovery`] | Bootstrap address derivation (subgraph + chain) |
//! | [`identity`] | Persistent Ed25519 node identity |
//! | [`network`] | Network stack activation seam (TCP + mock) |
//! | [`controller`] | Registration state machine and checkpoint loop |
//! | [`probe`] | Standalone TCP reachability probe |
//! | [`node`] | Startup orchestration and graceful shutdown |
//!
//! # Failure Philosophy
//!
//! Startup is all-or-nothing: configuration, peer discovery, identity, and
//! the network bind must all succeed or the process exits non-zero. Once
//! online, the node never exits on its own — registration and checkpoint
//! failures are logged, counted, and swallowed.

pub mod chain;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod network;
pub mod node;
pub mod probe;
pub mod subgraph;

pub use chain::{ChainClient, JsonRpcChainClient, MockChainClient, TxReceipt};
pub use config::NodeConfig;
pub use controller::{CheckpointHandle, LivenessController, RegistrationState};
pub use discovery::fetch_bootstrap_addrs;
pub use error::{
    ChainReadError, ChainWriteError, ConfigError, DiscoveryError, IdentityError, NetworkError,
    ProbeError, StartupError,
};
pub use identity::NodeIdentity;
pub use network::{MockNetworkStack, NetworkNode, NetworkStack, TcpNetworkStack};
pub use node::{create_storage_node, StorageNode};
pub use probe::ping_host;
pub use subgraph::{PeerRecord, SubgraphClient};
