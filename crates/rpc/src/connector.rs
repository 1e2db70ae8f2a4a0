use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use l2scope_common::config::RpcSettings;
use l2scope_common::networks::NetworkConfig;
use tracing::{info, warn};

use crate::client::{ChainClient, EthClient};
use crate::error::ChainClientError;
use crate::rpc::{RpcClient, RpcConfig};
use crate::signer::Signer;

/// Opens a [`ChainClient`] for a resolved network.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    async fn connect(
        &self,
        network: &NetworkConfig,
    ) -> Result<Arc<dyn ChainClient>, ChainClientError>;
}

/// Connects [`EthClient`]s signing with a single key.
#[derive(Debug, Clone)]
pub struct EthClientConnector {
    signer: Signer,
    settings: RpcSettings,
}

impl EthClientConnector {
    pub fn new(signer: Signer, settings: RpcSettings) -> Self {
        Self { signer, settings }
    }
}

#[async_trait]
impl ChainConnector for EthClientConnector {
    async fn connect(
        &self,
        network: &NetworkConfig,
    ) -> Result<Arc<dyn ChainClient>, ChainClientError> {
        let rpc = RpcClient::with_config(network.rpc_url.clone(), RpcConfig::from(&self.settings));
        let chain_id = EthClient::fetch_chain_id(&rpc).await?;
        if chain_id != network.chain_id {
            // Signing must use what the node enforces.
            warn!(
                network = %network.network,
                expected = network.chain_id,
                reported = chain_id,
                "Node reports a different chain id"
            );
        }
        info!(network = %network.network, url = %network.rpc_url, chain_id, "Connected");
        let client = EthClient::new(rpc, self.signer.clone(), chain_id).with_receipt_wait(
            Duration::from_secs(self.settings.receipt_timeout_secs),
            Duration::from_millis(self.settings.receipt_poll_interval_ms),
        );
        Ok(Arc::new(client))
    }
}
