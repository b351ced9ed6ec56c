//! # Reachability Probe
//!
//! One-shot TCP connect check: can `host:port` be reached from here within
//! a bound? Useful for verifying that an advertised address is actually
//! dialable (NAT and firewall misconfiguration are the usual culprits when a
//! node registers but never receives traffic). Not wired into the main
//! startup flow; operators call it from tooling.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::ProbeError;

/// Default bound on the connect attempt.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempt a TCP connection to `host:port` within `timeout`. The socket is
/// closed immediately on success; only reachability is reported.
pub async fn ping_host(host: &str, port: u16, timeout: Duration) -> Result<(), ProbeError> {
    let addr = format!("{}:{}", host, port);

    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => {
            debug!(addr = %addr, "probe connected");
            drop(stream);
            Ok(())
        }
        Ok(Err(e)) => Err(ProbeError::Connect { addr, source: e }),
        Err(_) => Err(ProbeError::ConnectTimeout { addr, timeout }),
    }
}
