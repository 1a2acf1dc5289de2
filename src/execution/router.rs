//! Submission Router
//!
//! Signs a candidate as a legacy (type 0) transaction and dispatches it down
//! exactly one path, fixed at startup by network:
//!     mainnet → private relay, never the public pool
//!     testnet → eth_sendRawTransaction to the connected node
//!
//! The router reports what happened and never rebuilds on its own; retrying
//! with a fresh nonce/fee is the pipeline's call. Receipt tracking is spawned
//! off so the caller is released as soon as the dispatch is acknowledged.

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::TxHash;
use alloy::rpc::types::TransactionRequest;
use anyhow::{bail, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::ChainClient;
use crate::error::SubmissionError;
use crate::types::{CandidateTransaction, Network, SubmissionResult};

use super::receipts::ReceiptWatcher;
use super::relay::PrivateRelay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    PrivateRelay,
    DirectBroadcast,
}

impl DispatchMode {
    pub fn for_network(network: Network) -> Self {
        if network.is_mainnet() {
            DispatchMode::PrivateRelay
        } else {
            DispatchMode::DirectBroadcast
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DispatchMode::PrivateRelay => write!(f, "private-relay"),
            DispatchMode::DirectBroadcast => write!(f, "direct-broadcast"),
        }
    }
}

/// A signed candidate ready for dispatch
#[derive(Debug, Clone)]
pub struct SignedCandidate {
    pub hash: TxHash,
    pub raw: Vec<u8>,
}

pub struct SubmissionRouter {
    mode: DispatchMode,
    wallet: EthereumWallet,
    chain_id: u64,
    chain: Arc<dyn ChainClient>,
    relay: Option<Arc<dyn PrivateRelay>>,
    receipts: Option<ReceiptWatcher>,
    dry_run: bool,
}

impl SubmissionRouter {
    /// Relay mode requires a relay client; direct mode ignores one.
    pub fn new(
        mode: DispatchMode,
        wallet: EthereumWallet,
        chain_id: u64,
        chain: Arc<dyn ChainClient>,
        relay: Option<Arc<dyn PrivateRelay>>,
    ) -> Result<Self> {
        let relay = match mode {
            DispatchMode::PrivateRelay if relay.is_none() => {
                bail!("private-relay dispatch needs a relay client")
            }
            DispatchMode::PrivateRelay => relay,
            DispatchMode::DirectBroadcast => None,
        };

        Ok(Self { mode, wallet, chain_id, chain, relay, receipts: None, dry_run: false })
    }

    /// Follow every sent candidate with a detached receipt watcher.
    pub fn with_receipts(mut self, watcher: ReceiptWatcher) -> Self {
        self.receipts = Some(watcher);
        self
    }

    /// Sign but never dispatch.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        if dry_run {
            warn!("Submission router in DRY RUN mode, candidates will be signed but not sent");
        }
        self.dry_run = dry_run;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Sign `candidate` as a legacy transaction with gasPrice = fee bid.
    pub async fn sign(&self, candidate: &CandidateTransaction) -> Result<SignedCandidate, SubmissionError> {
        let mut request = TransactionRequest::default()
            .with_from(candidate.from)
            .with_to(candidate.to)
            .with_nonce(candidate.nonce)
            .with_gas_limit(candidate.gas_limit)
            .with_gas_price(candidate.fee_bid)
            .with_chain_id(self.chain_id)
            .with_input(candidate.input.clone());
        if let Some(value) = candidate.value {
            request = request.with_value(value);
        }

        let envelope: TxEnvelope = request
            .build(&self.wallet)
            .await
            .map_err(|e| SubmissionError::Signing(e.to_string()))?;

        Ok(SignedCandidate { hash: *envelope.tx_hash(), raw: envelope.encoded_2718() })
    }

    /// Sign and dispatch. Never panics, never retries.
    pub async fn submit(&self, candidate: &CandidateTransaction) -> SubmissionResult {
        let signed = match self.sign(candidate).await {
            Ok(signed) => signed,
            Err(e) => return SubmissionResult::error(None, e.to_string()),
        };

        if self.dry_run {
            info!(
                "[submit] 🧪 DRY RUN: would send {:?} (nonce {}, gas price {}) via {}",
                signed.hash, candidate.nonce, candidate.fee_bid, self.mode
            );
            return SubmissionResult::dry_run(signed.hash);
        }

        match self.dispatch(&signed).await {
            Ok(hash) => {
                info!(
                    "[submit] 📤 Sent {:?} via {} (front-running {:?}, nonce {})",
                    hash, self.mode, candidate.observed_hash, candidate.nonce
                );
                if let Some(receipts) = &self.receipts {
                    receipts.spawn(hash, candidate.nonce);
                }
                SubmissionResult::sent(hash)
            }
            Err(e @ SubmissionError::Rejected(_)) => {
                warn!("[submit] 🚫 {} refused {:?}: {}", self.mode, signed.hash, e);
                SubmissionResult::rejected(Some(signed.hash), e.to_string())
            }
            Err(e) => {
                warn!("[submit] ❌ Dispatch of {:?} via {} failed: {}", signed.hash, self.mode, e);
                SubmissionResult::error(Some(signed.hash), e.to_string())
            }
        }
    }

    async fn dispatch(&self, signed: &SignedCandidate) -> Result<TxHash, SubmissionError> {
        match (self.mode, &self.relay) {
            (DispatchMode::PrivateRelay, Some(relay)) => relay.send_private_transaction(&signed.raw).await,
            (DispatchMode::PrivateRelay, None) => {
                Err(SubmissionError::Transport("no relay client configured".to_string()))
            }
            (DispatchMode::DirectBroadcast, _) => self.chain.send_raw_transaction(&signed.raw).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ReceiptInfo;
    use crate::error::ExternalServiceError;
    use crate::execution::relay::RelayStatus;
    use crate::types::{SubmissionStatus, GWEI};
    use alloy::consensus::Transaction;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{Address, Bytes, U256};
    use alloy::signers::local::PrivateKeySigner;
    use std::sync::Mutex;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[derive(Default)]
    struct RecordingNode {
        sent: Mutex<Vec<Vec<u8>>>,
        reject_with: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl ChainClient for RecordingNode {
        async fn pending_nonce(&self, _address: Address) -> anyhow::Result<u64> {
            Ok(0)
        }
        async fn gas_price(&self) -> anyhow::Result<u128> {
            Ok(GWEI)
        }
        async fn chain_id(&self) -> anyhow::Result<u64> {
            Ok(11155111)
        }
        async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, SubmissionError> {
            if let Some(msg) = self.reject_with {
                return Err(SubmissionError::Rejected(msg.to_string()));
            }
            self.sent.lock().unwrap().push(raw.to_vec());
            let tx = TxEnvelope::decode_2718(&mut &raw[..]).unwrap();
            Ok(*tx.tx_hash())
        }
        async fn receipt(&self, _hash: TxHash) -> anyhow::Result<Option<ReceiptInfo>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingRelay {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl PrivateRelay for RecordingRelay {
        async fn send_private_transaction(&self, raw: &[u8]) -> Result<TxHash, SubmissionError> {
            self.sent.lock().unwrap().push(raw.to_vec());
            let tx = TxEnvelope::decode_2718(&mut &raw[..]).unwrap();
            Ok(*tx.tx_hash())
        }
        async fn status(&self, _hash: TxHash) -> Result<RelayStatus, ExternalServiceError> {
            Ok(RelayStatus::Pending)
        }
    }

    fn wallet() -> (Address, EthereumWallet) {
        let signer: PrivateKeySigner = KEY.parse().unwrap();
        (signer.address(), EthereumWallet::from(signer))
    }

    fn candidate(from: Address, value: Option<U256>) -> CandidateTransaction {
        CandidateTransaction {
            observed_hash: TxHash::repeat_byte(0x01),
            from,
            to: Address::repeat_byte(0xaa),
            nonce: 4,
            gas_limit: 21_000,
            fee_bid: 6 * GWEI,
            input: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            value,
        }
    }

    #[test]
    fn test_mode_per_network() {
        assert_eq!(DispatchMode::for_network(Network::Mainnet), DispatchMode::PrivateRelay);
        assert_eq!(DispatchMode::for_network(Network::Testnet), DispatchMode::DirectBroadcast);
    }

    #[test]
    fn test_relay_mode_requires_relay() {
        let (_, wallet) = wallet();
        let node = Arc::new(RecordingNode::default());
        assert!(SubmissionRouter::new(DispatchMode::PrivateRelay, wallet, 1, node, None).is_err());
    }

    #[tokio::test]
    async fn test_signed_transaction_is_legacy_with_fee_bid() {
        let (from, wallet) = wallet();
        let node = Arc::new(RecordingNode::default());
        let router =
            SubmissionRouter::new(DispatchMode::DirectBroadcast, wallet, 11155111, node, None).unwrap();

        let signed = router.sign(&candidate(from, None)).await.unwrap();
        let tx = TxEnvelope::decode_2718(&mut signed.raw.as_slice()).unwrap();

        assert!(tx.is_legacy());
        assert_eq!(tx.gas_price(), Some(6 * GWEI));
        assert_eq!(tx.nonce(), 4);
        assert_eq!(tx.gas_limit(), 21_000);
        assert_eq!(tx.to(), Some(Address::repeat_byte(0xaa)));
        assert_eq!(tx.value(), U256::ZERO);
        assert_eq!(tx.input().as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(tx.chain_id(), Some(11155111));
        assert_eq!(*tx.tx_hash(), signed.hash);
    }

    #[tokio::test]
    async fn test_direct_broadcast_goes_to_node_only() {
        let (from, wallet) = wallet();
        let node = Arc::new(RecordingNode::default());
        let relay = Arc::new(RecordingRelay::default());
        let router = SubmissionRouter::new(
            DispatchMode::DirectBroadcast,
            wallet,
            11155111,
            node.clone(),
            Some(relay.clone()),
        )
        .unwrap();

        let result = router.submit(&candidate(from, Some(U256::from(7)))).await;
        assert_eq!(result.status, SubmissionStatus::Sent);
        assert_eq!(node.sent.lock().unwrap().len(), 1);
        assert!(relay.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_relay_never_touches_public_pool() {
        let (from, wallet) = wallet();
        let node = Arc::new(RecordingNode::default());
        let relay = Arc::new(RecordingRelay::default());
        let router =
            SubmissionRouter::new(DispatchMode::PrivateRelay, wallet, 1, node.clone(), Some(relay.clone()))
                .unwrap();

        let result = router.submit(&candidate(from, None)).await;
        assert!(result.is_sent());
        assert_eq!(relay.sent.lock().unwrap().len(), 1);
        assert!(node.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_reported() {
        let (from, wallet) = wallet();
        let node = Arc::new(RecordingNode { reject_with: Some("nonce too low"), ..Default::default() });
        let router =
            SubmissionRouter::new(DispatchMode::DirectBroadcast, wallet, 11155111, node, None).unwrap();

        let result = router.submit(&candidate(from, None)).await;
        assert_eq!(result.status, SubmissionStatus::Rejected);
        assert!(result.tx_hash.is_some());
        assert!(result.error.unwrap().contains("nonce too low"));
    }

    #[tokio::test]
    async fn test_dry_run_dispatches_nothing() {
        let (from, wallet) = wallet();
        let node = Arc::new(RecordingNode::default());
        let router = SubmissionRouter::new(DispatchMode::DirectBroadcast, wallet, 11155111, node.clone(), None)
            .unwrap()
            .with_dry_run(true);

        let result = router.submit(&candidate(from, None)).await;
        assert_eq!(result.status, SubmissionStatus::DryRun);
        assert!(node.sent.lock().unwrap().is_empty());
    }
}
