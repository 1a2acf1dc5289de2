//! Chain client
//!
//! The node-facing operations the pipeline needs: sequence-number lookup,
//! fee estimate, network identification, raw broadcast and receipt lookup.
//! `RpcChainClient` implements them over an alloy provider; tests substitute
//! an in-memory client.

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, TxHash};
use alloy::providers::{DynProvider, Provider};
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::{ConfigError, SubmissionError};
use crate::types::Network;

/// Minimal receipt view for the receipt watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub block_number: Option<u64>,
    pub success: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next nonce for `address`, counting pending transactions
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    /// eth_gasPrice, in wei
    async fn gas_price(&self) -> Result<u128>;

    async fn chain_id(&self) -> Result<u64>;

    /// Broadcast a signed, EIP-2718 encoded transaction to the public pool
    async fn send_raw_transaction(&self, raw: &[u8]) -> std::result::Result<TxHash, SubmissionError>;

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptInfo>>;
}

/// Confirm the node serves the configured network. Returns the chain id.
pub async fn verify_network(chain: &dyn ChainClient, network: Network) -> Result<u64> {
    let chain_id = chain.chain_id().await?;
    if !network.matches_chain_id(chain_id) {
        return Err(ConfigError::NetworkMismatch { network: network.to_string(), chain_id }.into());
    }
    Ok(chain_id)
}

/// ChainClient over an alloy provider
#[derive(Clone)]
pub struct RpcChainClient {
    provider: DynProvider,
}

impl RpcChainClient {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .with_context(|| format!("get_transaction_count({:?})", address))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider.get_gas_price().await.context("eth_gasPrice")
    }

    async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.context("eth_chainId")
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> std::result::Result<TxHash, SubmissionError> {
        match self.provider.send_raw_transaction(raw).await {
            Ok(pending) => Ok(*pending.tx_hash()),
            Err(e) => match e.as_error_resp() {
                // The node answered and refused the transaction
                Some(payload) => Err(SubmissionError::Rejected(payload.message.to_string())),
                None => Err(SubmissionError::Transport(e.to_string())),
            },
        }
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptInfo>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .with_context(|| format!("get_transaction_receipt({:?})", hash))?;

        Ok(receipt.map(|r| ReceiptInfo { block_number: r.block_number(), success: r.status() }))
    }
}
