//! Shared node state for cross-task communication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::commands::NodeCommand;
use crate::storage::RocksStore;

/// Shared state for the running node, accessible from HTTP handlers.
pub struct NodeState {
    /// When the node started.
    pub start_time: Instant,
    /// Identifier of the settlement gateway in use.
    pub gateway_id: String,
    /// Persistent store, for reads and admin writes that bypass the event loop.
    pub store: Arc<RocksStore>,
    /// Channel to send commands to the event loop.
    pub command_tx: mpsc::Sender<NodeCommand>,
    forges_settled: AtomicU64,
    forges_failed: AtomicU64,
    versions_forged: AtomicU64,
}

impl NodeState {
    pub fn new(
        gateway_id: impl Into<String>,
        store: Arc<RocksStore>,
        command_tx: mpsc::Sender<NodeCommand>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            gateway_id: gateway_id.into(),
            store,
            command_tx,
            forges_settled: AtomicU64::new(0),
            forges_failed: AtomicU64::new(0),
            versions_forged: AtomicU64::new(0),
        }
    }

    pub fn record_forge(&self, settled: bool) {
        let counter = if settled {
            &self.forges_settled
        } else {
            &self.forges_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_version(&self) {
        self.versions_forged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forges_settled(&self) -> u64 {
        self.forges_settled.load(Ordering::Relaxed)
    }

    pub fn forges_failed(&self) -> u64 {
        self.forges_failed.load(Ordering::Relaxed)
    }

    pub fn versions_forged(&self) -> u64 {
        self.versions_forged.load(Ordering::Relaxed)
    }
}
