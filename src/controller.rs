//! # Registration & Liveness Controller
//!
//! On-chain bookkeeping for a running node:
//!
//! - **Registration** runs once after the network stack is up. Failure is
//!   logged and swallowed; an unregistered node keeps serving and keeps
//!   attempting checkpoints, because on-chain bookkeeping must never take
//!   down a functioning storage node.
//! - **Checkpoint loop**: one `record_checkpoint` attempt per period
//!   (default one hour). Each tick is isolated; a failed write only bumps a
//!   counter. The submission is awaited inline and the ticker skips missed
//!   ticks, so two checkpoint transactions for this node are never in
//!   flight at once — a slow submission costs a skipped tick, not an
//!   overlap.
//!
//! The loop is an owned task behind [`CheckpointHandle`]; `stop()` is
//! awaited during graceful shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::chain::ChainClient;

/// Default period between liveness checkpoints.
pub const DEFAULT_CHECKPOINT_PERIOD: Duration = Duration::from_secs(3600);

/// Where this node stands with the storage-node registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    /// Confirmed on-chain in the carried transaction.
    Registered { tx_hash: String },
    /// The one-shot attempt failed; the node runs on unregistered.
    RegistrationFailed,
}

/// One node's registration state, checkpoint loop, and liveness counters.
pub struct LivenessController {
    chain: Arc<dyn ChainClient>,
    peer_id: String,
    multiaddr: String,
    state: RwLock<RegistrationState>,
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl LivenessController {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        peer_id: impl Into<String>,
        multiaddr: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            chain,
            peer_id: peer_id.into(),
            multiaddr: multiaddr.into(),
            state: RwLock::new(RegistrationState::Unregistered),
            ticks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// One-shot registration. Never returns an error: the outcome lands in
    /// [`RegistrationState`] and the log.
    pub async fn register(&self) {
        *self.state.write() = RegistrationState::Registering;

        match self
            .chain
            .register_node(&self.peer_id, &self.multiaddr)
            .await
        {
            Ok(receipt) => {
                info!(
                    peer_id = %self.peer_id,
                    multiaddr = %self.multiaddr,
                    tx_hash = %receipt.tx_hash,
                    "node registered on-chain"
                );
                *self.state.write() = RegistrationState::Registered {
                    tx_hash: receipt.tx_hash,
                };
            }
            Err(e) => {
                warn!(peer_id = %self.peer_id, error = %e, "node registration failed");
                *self.state.write() = RegistrationState::RegistrationFailed;
            }
        }
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.state.read().clone()
    }

    /// Checkpoint ticks attempted so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Checkpoint ticks that failed.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    async fn checkpoint_once(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);

        match self.chain.record_checkpoint(&self.peer_id).await {
            Ok(receipt) => {
                info!(
                    peer_id = %self.peer_id,
                    tx_hash = %receipt.tx_hash,
                    block = receipt.block_number,
                    "checkpoint recorded"
                );
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(peer_id = %self.peer_id, error = %e, "checkpoint failed");
            }
        }
    }

    /// Arm the checkpoint loop. The first tick fires one full period after
    /// the call. Submissions are awaited inline and missed ticks are
    /// skipped, which keeps at most one checkpoint in flight.
    pub fn spawn_checkpoint_loop(self: &Arc<Self>, period: Duration) -> CheckpointHandle {
        let controller = Arc::clone(self);
        let stop = Arc::new(Notify::new());
        let loop_stop = stop.clone();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => controller.checkpoint_once().await,
                    _ = loop_stop.notified() => break,
                }
            }
            info!(peer_id = %controller.peer_id, "checkpoint loop stopped");
        });

        CheckpointHandle {
            stop,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Owned handle to a running checkpoint loop.
pub struct CheckpointHandle {
    stop: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CheckpointHandle {
    /// Signal the loop and wait for it to finish. Idempotent.
    pub async fn stop(&self) {
        self.stop.notify_one();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
