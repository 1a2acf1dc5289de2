//! Core data structures
//!
//! Network selector, observed pending transactions, fee quotes, candidate
//! transactions and submission results shared by every pipeline stage.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// 1 gwei in wei
pub const GWEI: u128 = 1_000_000_000;

/// Target network. Selects the submission path and the default premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Premium added to the reference fee when PREMIUM_WEI is not configured
    pub fn default_premium_wei(&self) -> u128 {
        match self {
            Network::Mainnet => 2 * GWEI,
            Network::Testnet => 5 * GWEI,
        }
    }

    /// Etherscan-compatible API base (metadata lookup + gas tracker)
    pub fn default_etherscan_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.etherscan.io/api",
            Network::Testnet => "https://api-sepolia.etherscan.io/api",
        }
    }

    /// Alchemy WebSocket endpoint for the given API key
    pub fn alchemy_ws_url(&self, api_key: &str) -> String {
        match self {
            Network::Mainnet => format!("wss://eth-mainnet.g.alchemy.com/v2/{}", api_key),
            Network::Testnet => format!("wss://eth-sepolia.g.alchemy.com/v2/{}", api_key),
        }
    }

    /// Mainnet is chain id 1; anything else is treated as a test network.
    pub fn matches_chain_id(&self, chain_id: u64) -> bool {
        match self {
            Network::Mainnet => chain_id == 1,
            Network::Testnet => chain_id != 1,
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(ConfigError::Invalid {
                key: "NETWORK",
                reason: format!("'{}' (expected mainnet or testnet)", other),
            }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Fee fields of an observed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeFields {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeFields {
    /// The most the observed sender is willing to pay per gas.
    /// Legacy: gasPrice. EIP-1559: maxFeePerGas.
    pub fn reference_fee(&self) -> u128 {
        match self {
            FeeFields::Legacy { gas_price } => *gas_price,
            FeeFields::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }
}

/// A pending transaction delivered by the feed, validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransaction {
    pub hash: TxHash,
    pub from: Address,
    /// None for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub fee: FeeFields,
}

/// Where a fee quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    /// Remote gas tracker "fast" tier
    GasTracker,
    /// eth_gasPrice from the chain client
    Node,
}

impl fmt::Display for FeeSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeeSource::GasTracker => write!(f, "gas-tracker"),
            FeeSource::Node => write!(f, "node"),
        }
    }
}

/// Current competitive fee, in wei per gas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub wei: u128,
    pub source: FeeSource,
}

/// Outgoing transaction assembled from an observed one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTransaction {
    /// Hash of the transaction this candidate competes with
    pub observed_hash: TxHash,
    /// Bot's own sending identity
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    /// Copied from the observed transaction
    pub gas_limit: u64,
    /// Reference fee + premium, used as the legacy gasPrice
    pub fee_bid: u128,
    /// Copied verbatim from the observed transaction
    pub input: Bytes,
    /// None when the observed value was zero
    pub value: Option<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Sent,
    Rejected,
    Error,
    /// Built and signed, not dispatched (DRY_RUN)
    DryRun,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SubmissionStatus::Sent => write!(f, "sent"),
            SubmissionStatus::Rejected => write!(f, "rejected"),
            SubmissionStatus::Error => write!(f, "error"),
            SubmissionStatus::DryRun => write!(f, "dry_run"),
        }
    }
}

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub status: SubmissionStatus,
    /// Transaction hash, also the receipt-polling handle on the relay path
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
    /// When the outcome was known (dispatch acknowledged or refused)
    pub at: DateTime<Utc>,
}

impl SubmissionResult {
    pub fn sent(tx_hash: TxHash) -> Self {
        Self { status: SubmissionStatus::Sent, tx_hash: Some(tx_hash), error: None, at: Utc::now() }
    }

    pub fn dry_run(tx_hash: TxHash) -> Self {
        Self { status: SubmissionStatus::DryRun, tx_hash: Some(tx_hash), error: None, at: Utc::now() }
    }

    pub fn rejected(tx_hash: Option<TxHash>, reason: impl Into<String>) -> Self {
        Self { status: SubmissionStatus::Rejected, tx_hash, error: Some(reason.into()), at: Utc::now() }
    }

    pub fn error(tx_hash: Option<TxHash>, reason: impl Into<String>) -> Self {
        Self { status: SubmissionStatus::Error, tx_hash, error: Some(reason.into()), at: Utc::now() }
    }

    pub fn is_sent(&self) -> bool {
        self.status == SubmissionStatus::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!(" Testnet ".parse::<Network>().unwrap(), Network::Testnet);
        assert!("goerli".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_chain_id_check() {
        assert!(Network::Mainnet.matches_chain_id(1));
        assert!(!Network::Mainnet.matches_chain_id(11155111));
        assert!(Network::Testnet.matches_chain_id(11155111));
        assert!(!Network::Testnet.matches_chain_id(1));
    }

    #[test]
    fn test_submission_result_constructors() {
        let hash = TxHash::repeat_byte(0x01);
        assert!(SubmissionResult::sent(hash).is_sent());
        assert!(!SubmissionResult::dry_run(hash).is_sent());

        let rejected = SubmissionResult::rejected(Some(hash), "nonce too low");
        assert_eq!(rejected.status, SubmissionStatus::Rejected);
        assert_eq!(rejected.error.as_deref(), Some("nonce too low"));
        assert!(SubmissionResult::error(None, "timeout").tx_hash.is_none());
    }

    #[test]
    fn test_reference_fee() {
        let legacy = FeeFields::Legacy { gas_price: 42 };
        assert_eq!(legacy.reference_fee(), 42);

        let eip1559 = FeeFields::Eip1559 { max_fee_per_gas: 100, max_priority_fee_per_gas: 2 };
        assert_eq!(eip1559.reference_fee(), 100);
    }
}
