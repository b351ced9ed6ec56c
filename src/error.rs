//! # Error Taxonomy
//!
//! Every failure mode in the agent falls into one of two buckets:
//!
//! - **Fatal at startup**: [`ConfigError`], [`DiscoveryError`],
//!   [`IdentityError`], [`NetworkError`]. There is no functioning node
//!   without configuration, a stable keypair, a bootstrap directory, or a
//!   bound network stack, so these abort the
//!   process with a non-zero exit status before the node is usable.
//!
//! - **Non-fatal, isolated per call**: [`ChainReadError`] (one unresolvable
//!   bootstrap candidate is skipped), [`ChainWriteError`] (a failed
//!   registration or checkpoint is logged and swallowed — on-chain
//!   bookkeeping failures must never take down an otherwise functioning
//!   storage node), [`ProbeError`] (reachability probe only).
//!
//! [`StartupError`] aggregates the fatal family for the startup path.

use std::time::Duration;

use thiserror::Error;

/// Configuration errors. Always fatal at process start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    /// An environment variable is set but cannot be used.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        var: &'static str,
        reason: String,
    },
}

/// The indexed data service could not produce a peer directory.
///
/// Fatal: without the directory there is no bootstrap set and no
/// self-bootstrapped network.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Transport-level failure reaching the subgraph endpoint.
    #[error("subgraph query failed: {0}")]
    Unavailable(String),

    /// The subgraph answered but the response could not be decoded,
    /// or it reported query errors.
    #[error("subgraph response invalid: {0}")]
    Response(String),
}

/// Read-only chain call failures. Non-fatal: the affected bootstrap
/// candidate is skipped and discovery continues.
#[derive(Debug, Error)]
pub enum ChainReadError {
    /// Transport-level RPC failure.
    #[error("chain read failed: {0}")]
    Rpc(String),

    /// The RPC transport timed out.
    #[error("chain read timed out")]
    Timeout,

    /// The registry holds no address for this peer (empty or absent entry).
    #[error("peer {0} has no registered address")]
    UnknownPeer(String),

    /// The endpoint answered with something that is not a valid response.
    #[error("malformed chain response: {0}")]
    Response(String),
}

/// State-changing chain submission failures. Never fatal: registration and
/// checkpoint failures are isolated at their call site.
#[derive(Debug, Error)]
pub enum ChainWriteError {
    /// Transport-level RPC failure.
    #[error("chain write failed: {0}")]
    Rpc(String),

    /// The RPC transport timed out.
    #[error("chain write timed out")]
    Timeout,

    /// The transaction was accepted but execution reverted on-chain.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    /// The transaction was submitted but no receipt appeared within the
    /// confirmation window.
    #[error("transaction {tx_hash} unconfirmed after {window:?}")]
    Unconfirmed { tx_hash: String, window: Duration },

    /// The endpoint answered with something that is not a valid response.
    #[error("malformed chain response: {0}")]
    Response(String),
}

/// Node identity persistence failures. Fatal: without a stable keypair the
/// node cannot present a consistent peer identifier across restarts.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity key file exists but cannot be read.
    #[error("failed to read identity key {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A freshly generated key could not be persisted.
    #[error("failed to write identity key {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The key file exists but does not hold a 32-byte Ed25519 secret.
    #[error("identity key {path} is corrupt: expected 32 bytes, found {len}")]
    Corrupt { path: String, len: usize },
}

/// Network stack activation failures. Fatal: there is no node without it.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The listen socket could not be bound.
    #[error("failed to bind listen address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The stack could not be constructed.
    #[error("network stack construction failed: {0}")]
    Construction(String),
}

/// Reachability probe failures.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No connection within the configured timeout.
    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// The connection attempt failed outright.
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Unrecoverable startup failure. Terminates the process with non-zero
/// status; once startup has succeeded, nothing produces this type again.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
