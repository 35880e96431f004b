//! The SolarForge node orchestrator.
//!
//! Opens the store, wires the forge and rollup engines to the configured
//! settlement gateway, runs the HTTP API and serves forge commands.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use solarforge_crypto::EvmAddressDeriver;
use solarforge_settlement::adapters::{HttpGateway, LocalGateway};
use solarforge_settlement::{ForgeEngine, ForgeStores, RollupEngine, SettlementGateway};

use crate::commands::NodeCommand;
use crate::config::{GatewayMode, SolarForgeConfig};
use crate::state::NodeState;
use crate::storage::RocksStore;

/// The SolarForge node.
pub struct SolarForgeNode {
    /// Node configuration.
    config: SolarForgeConfig,
    /// Persistent storage.
    storage: Option<Arc<RocksStore>>,
    /// Per-issue forge engine.
    forge: Option<Arc<ForgeEngine>>,
    /// Version rollup engine.
    rollup: Option<Arc<RollupEngine>>,
    /// Shared state accessible from HTTP handlers.
    node_state: Option<Arc<NodeState>>,
    /// Receives commands from the HTTP API.
    command_rx: Option<mpsc::Receiver<NodeCommand>>,
}

impl SolarForgeNode {
    /// Create a new node with the given config.
    pub fn new(config: SolarForgeConfig) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            credits_per_reward = config.forge.credits_per_reward,
            gateway_mode = ?config.gateway.mode,
            gateway = config.gateway.url.as_deref().unwrap_or("-"),
            "SolarForge node created"
        );

        Ok(Self {
            config,
            storage: None,
            forge: None,
            rollup: None,
            node_state: None,
            command_rx: None,
        })
    }

    /// Initialize and start the node: storage, engines, HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting SolarForge node");

        // Initialize storage
        let storage = Arc::new(RocksStore::open(&self.config.storage.data_dir)?);
        tracing::info!(path = %self.config.storage.data_dir.display(), "storage initialized");

        let gateway = self.build_gateway()?;
        let gateway_id = gateway.gateway_id().to_string();

        let forge_config = self.config.forge_config();
        let forge = Arc::new(
            ForgeEngine::new(
                ForgeStores::shared(storage.clone()),
                gateway,
                Arc::new(EvmAddressDeriver::new()),
            )
            .with_policy(Arc::new(forge_config.conversion()?))
            .with_gateway_timeout(forge_config.gateway_timeout()),
        );
        let rollup = Arc::new(RollupEngine::new(forge.clone(), storage.clone()));

        // Nothing is in flight yet, so every reservation left in the store
        // belongs to a forge that died with a previous run.
        let released = forge.release_stale(Duration::ZERO).await?;
        if !released.is_empty() {
            tracing::warn!(count = released.len(), "released reservations left by a previous run");
        }

        // Create the NodeCommand channel (HTTP API → main event loop)
        let (command_tx, command_rx) = mpsc::channel::<NodeCommand>(256);

        // Create shared state
        let node_state = Arc::new(NodeState::new(gateway_id, storage.clone(), command_tx));

        // Spawn the HTTP API server
        let api_addr: SocketAddr =
            format!("{}:{}", self.config.api.listen_addr, self.config.api.port).parse()?;

        let api_state = node_state.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(api_addr, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        });

        // Store handles
        self.storage = Some(storage);
        self.forge = Some(forge);
        self.rollup = Some(rollup);
        self.node_state = Some(node_state);
        self.command_rx = Some(command_rx);

        Ok(())
    }

    /// Run the node's main event loop: serves API commands until the channel
    /// closes.
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let node_state = self
            .node_state
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let forge = self
            .forge
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let rollup = self
            .rollup
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;

        tracing::info!("entering main event loop");

        let max_age = forge.stale_reservation_age();
        let mut sweep = tokio::time::interval(max_age.max(Duration::from_secs(1)));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = command_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    tracing::debug!(command = cmd.name(), "API command received");
                    let state = node_state.clone();
                    let forge = forge.clone();
                    let rollup = rollup.clone();
                    tokio::spawn(async move {
                        Self::handle_api_command(cmd, &state, &forge, &rollup).await;
                    });
                }
                _ = sweep.tick() => {
                    if let Err(e) = forge.release_stale(max_age).await {
                        tracing::warn!(error = %e, "stale reservation sweep failed");
                    }
                }
            }
        }

        tracing::info!("API command channel closed");
        Ok(())
    }

    /// Gracefully shut down the node.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down SolarForge node");

        self.node_state = None;
        self.rollup = None;
        self.forge = None;

        if let Some(storage) = self.storage.take() {
            drop(storage);
            tracing::info!("storage closed");
        }

        tracing::info!("SolarForge node shut down");
        Ok(())
    }

    /// Get the node configuration.
    pub fn config(&self) -> &SolarForgeConfig {
        &self.config
    }

    /// Get the forge engine, once started.
    pub fn forge_engine(&self) -> Option<&Arc<ForgeEngine>> {
        self.forge.as_ref()
    }

    fn build_gateway(&self) -> Result<Arc<dyn SettlementGateway>> {
        match self.config.gateway.mode {
            GatewayMode::Http => {
                let url = self
                    .config
                    .gateway
                    .url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("[gateway] url is required in http mode"))?;
                let gateway =
                    HttpGateway::new(url.clone(), self.config.forge_config().gateway_timeout())?;
                tracing::info!(%url, "using HTTP settlement gateway");
                Ok(Arc::new(gateway))
            }
            GatewayMode::Local => {
                tracing::warn!("local gateway mode: forges settle in-process, nothing reaches a ledger");
                Ok(Arc::new(LocalGateway::new()))
            }
        }
    }

    /// Handle a command from the HTTP API.
    async fn handle_api_command(
        cmd: NodeCommand,
        state: &Arc<NodeState>,
        forge: &Arc<ForgeEngine>,
        rollup: &Arc<RollupEngine>,
    ) {
        match cmd {
            NodeCommand::ForgeIssue { issue_id, reply } => {
                let result = forge.forge_issue(&issue_id).await;
                state.record_forge(result.is_ok());
                if reply.send(result).is_err() {
                    tracing::debug!(issue_id = %issue_id, "forge caller went away");
                }
            }
            NodeCommand::ForgeVersion { version_id, reply } => {
                let rollup = rollup.forge_version(&version_id).await;
                state.record_version();
                if reply.send(rollup).is_err() {
                    tracing::debug!(version_id = %version_id, "rollup caller went away");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarforge_settlement::IssueStore;

    fn temp_config() -> (SolarForgeConfig, std::path::PathBuf) {
        let dir =
            std::env::temp_dir().join(format!("solarforge-node-test-{}", rand::random::<u64>()));
        let mut config = local_config();
        config.storage.data_dir = dir.clone();
        config.api.port = 0;
        (config, dir)
    }

    fn local_config() -> SolarForgeConfig {
        let mut config = SolarForgeConfig::default();
        config.gateway.mode = GatewayMode::Local;
        config
    }

    #[test]
    fn test_node_creation() {
        let node = SolarForgeNode::new(local_config());
        assert!(node.is_ok());
    }

    #[test]
    fn test_node_requires_gateway_url() {
        assert!(SolarForgeNode::new(SolarForgeConfig::default()).is_err());

        let mut config = SolarForgeConfig::default();
        config.gateway.url = Some("http://127.0.0.1:7000/settle".into());
        assert!(SolarForgeNode::new(config).is_ok());
    }

    #[test]
    fn test_node_rejects_zero_conversion() {
        let mut config = local_config();
        config.forge.credits_per_reward = 0;
        assert!(SolarForgeNode::new(config).is_err());
    }

    #[tokio::test]
    async fn test_run_before_start_fails() {
        let mut node = SolarForgeNode::new(local_config()).unwrap();
        assert!(node.run().await.is_err());
    }

    #[tokio::test]
    async fn test_node_start_and_shutdown() {
        let (config, dir) = temp_config();
        let mut node = SolarForgeNode::new(config).unwrap();
        node.start().await.expect("start failed");
        assert!(node.forge_engine().is_some());
        node.shutdown().await.expect("shutdown failed");
        assert!(node.forge_engine().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_start_releases_abandoned_reservations() {
        let (config, dir) = temp_config();
        {
            let store = RocksStore::open(&dir).unwrap();
            let mut issue = solarforge_core::Issue::new("i-1".into());
            issue.credits = 720;
            store.upsert_issue(issue).unwrap();
            assert!(store.apply_forge(&"i-1".into(), 2, 720).await.unwrap());
        }

        let mut node = SolarForgeNode::new(config).unwrap();
        node.start().await.unwrap();
        let state = node.node_state.clone().unwrap();
        let issue = state.store.get_issue(&"i-1".into()).await.unwrap().unwrap();
        assert_eq!(issue.credits, 720);
        assert_eq!(issue.rewards, 0);
        assert!(issue.reservation.is_none());

        drop(state);
        node.shutdown().await.unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_forge_command_round_trip() {
        let (config, dir) = temp_config();
        let mut node = SolarForgeNode::new(config).unwrap();
        node.start().await.unwrap();
        let state = node.node_state.clone().unwrap();

        let mut node_task = node;
        let handle = tokio::spawn(async move {
            node_task.run().await.ok();
            node_task
        });

        let (tx, rx) = tokio::sync::oneshot::channel();
        state
            .command_tx
            .send(NodeCommand::ForgeIssue {
                issue_id: "missing".into(),
                reply: tx,
            })
            .await
            .unwrap();
        let result = rx.await.unwrap();
        assert_eq!(result, Err(solarforge_settlement::ForgeError::NotFound));
        assert_eq!(state.forges_failed(), 1);

        handle.abort();
        std::fs::remove_dir_all(&dir).ok();
    }
}
