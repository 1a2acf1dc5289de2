//! Fee Oracle
//!
//! Produces the current competitive fee: the gas tracker's "fast" tier first,
//! eth_gasPrice from the chain client on any tracker failure (timeout,
//! malformed payload, non-success status). A fresh quote is fetched for every
//! candidate; nothing is cached.
//!
//! Gas tracker values are gwei decimal strings ("23.418") and are converted
//! to integer wei with rust_decimal, truncating sub-wei digits.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::chain::ChainClient;
use crate::error::{BuildError, ExternalServiceError};
use crate::types::{FeeQuote, FeeSource, GWEI};

/// Remote fee-tracking service
#[async_trait]
pub trait GasTracker: Send + Sync {
    /// "fast" tier, in wei per gas
    async fn fast_fee(&self) -> Result<u128, ExternalServiceError>;
}

#[derive(Debug, Deserialize)]
struct GasOracleResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GasOracleTiers {
    #[allow(dead_code)]
    safe_gas_price: Option<String>,
    #[allow(dead_code)]
    propose_gas_price: Option<String>,
    fast_gas_price: String,
}

/// Etherscan gas tracker (`module=gastracker&action=gasoracle`)
pub struct EtherscanGasTracker {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EtherscanGasTracker {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExternalServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into(), api_key: api_key.into() })
    }
}

#[async_trait]
impl GasTracker for EtherscanGasTracker {
    async fn fast_fee(&self) -> Result<u128, ExternalServiceError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "gastracker"),
                ("action", "gasoracle"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExternalServiceError::Status(response.status()));
        }

        let body = response.text().await?;
        parse_gasoracle_response(&body)
    }
}

/// Parse a gasoracle response and return the fast tier in wei.
pub fn parse_gasoracle_response(body: &str) -> Result<u128, ExternalServiceError> {
    let envelope: GasOracleResponse =
        serde_json::from_str(body).map_err(|e| ExternalServiceError::Malformed(e.to_string()))?;

    if envelope.status != "1" {
        return Err(ExternalServiceError::NoResult(format!(
            "{}: {}",
            envelope.message, envelope.result
        )));
    }

    let tiers: GasOracleTiers = serde_json::from_value(envelope.result)
        .map_err(|e| ExternalServiceError::Malformed(format!("gas tiers: {}", e)))?;

    gwei_str_to_wei(&tiers.fast_gas_price)
}

/// "23.418" gwei → 23418000000 wei
pub fn gwei_str_to_wei(gwei: &str) -> Result<u128, ExternalServiceError> {
    let value = Decimal::from_str(gwei.trim())
        .map_err(|e| ExternalServiceError::Malformed(format!("fee '{}': {}", gwei, e)))?;

    if value.is_sign_negative() {
        return Err(ExternalServiceError::Malformed(format!("negative fee '{}'", gwei)));
    }

    let wei = value
        .checked_mul(Decimal::from(GWEI as u64))
        .ok_or_else(|| ExternalServiceError::Malformed(format!("fee '{}' overflows", gwei)))?;

    wei.trunc()
        .to_u128()
        .ok_or_else(|| ExternalServiceError::Malformed(format!("fee '{}' out of range", gwei)))
}

/// Gas tracker first, node fallback
pub struct FeeOracle {
    tracker: Option<Arc<dyn GasTracker>>,
    chain: Arc<dyn ChainClient>,
    tracker_timeout: Duration,
}

impl FeeOracle {
    pub fn new(
        tracker: Option<Arc<dyn GasTracker>>,
        chain: Arc<dyn ChainClient>,
        tracker_timeout: Duration,
    ) -> Self {
        Self { tracker, chain, tracker_timeout }
    }

    /// Current fast fee. Tracker failures are absorbed; only a failing node
    /// on top of a failing tracker yields an error.
    pub async fn quote(&self) -> Result<FeeQuote, BuildError> {
        if let Some(tracker) = &self.tracker {
            match tokio::time::timeout(self.tracker_timeout, tracker.fast_fee()).await {
                Ok(Ok(wei)) => {
                    debug!("Fee quote: {} wei (gas tracker fast tier)", wei);
                    return Ok(FeeQuote { wei, source: FeeSource::GasTracker });
                }
                Ok(Err(e)) => warn!("Gas tracker unavailable, using node fee: {}", e),
                Err(_) => warn!(
                    "Gas tracker timed out after {}ms, using node fee",
                    self.tracker_timeout.as_millis()
                ),
            }
        }

        let wei = self
            .chain
            .gas_price()
            .await
            .map_err(|e| BuildError::FeeUnavailable(format!("{:#}", e)))?;
        debug!("Fee quote: {} wei (node)", wei);
        Ok(FeeQuote { wei, source: FeeSource::Node })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ReceiptInfo;
    use crate::error::SubmissionError;
    use alloy::primitives::{Address, TxHash};
    use anyhow::anyhow;
    use rust_decimal_macros::dec;

    struct FixedTracker(Result<u128, &'static str>, Duration);

    #[async_trait]
    impl GasTracker for FixedTracker {
        async fn fast_fee(&self) -> Result<u128, ExternalServiceError> {
            tokio::time::sleep(self.1).await;
            self.0.map_err(|m| ExternalServiceError::NoResult(m.to_string()))
        }
    }

    struct NodeFee(Option<u128>);

    #[async_trait]
    impl ChainClient for NodeFee {
        async fn pending_nonce(&self, _address: Address) -> anyhow::Result<u64> {
            Ok(0)
        }
        async fn gas_price(&self) -> anyhow::Result<u128> {
            self.0.ok_or_else(|| anyhow!("node down"))
        }
        async fn chain_id(&self) -> anyhow::Result<u64> {
            Ok(11155111)
        }
        async fn send_raw_transaction(&self, _raw: &[u8]) -> Result<TxHash, SubmissionError> {
            Err(SubmissionError::Transport("unused".to_string()))
        }
        async fn receipt(&self, _hash: TxHash) -> anyhow::Result<Option<ReceiptInfo>> {
            Ok(None)
        }
    }

    fn oracle(tracker: Option<FixedTracker>, node: Option<u128>) -> FeeOracle {
        FeeOracle::new(
            tracker.map(|t| Arc::new(t) as Arc<dyn GasTracker>),
            Arc::new(NodeFee(node)),
            Duration::from_millis(50),
        )
    }

    #[test]
    fn test_gwei_conversion() {
        assert_eq!(gwei_str_to_wei("1").unwrap(), 1_000_000_000);
        assert_eq!(gwei_str_to_wei("23.418").unwrap(), 23_418_000_000);
        assert_eq!(gwei_str_to_wei("0.5000000001").unwrap(), 500_000_000);
        assert!(gwei_str_to_wei("-1").is_err());
        assert!(gwei_str_to_wei("fast").is_err());
        assert_eq!(
            Decimal::from_str("23.418").unwrap() * Decimal::from(GWEI as u64),
            dec!(23418000000)
        );
    }

    #[test]
    fn test_parse_gasoracle_fast_tier() {
        let body = r#"{"status":"1","message":"OK","result":{"LastBlock":"19000000","SafeGasPrice":"20","ProposeGasPrice":"21","FastGasPrice":"25.5","suggestBaseFee":"19.8","gasUsedRatio":"0.4"}}"#;
        assert_eq!(parse_gasoracle_response(body).unwrap(), 25_500_000_000);
    }

    #[test]
    fn test_parse_gasoracle_failure_status() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#;
        assert!(matches!(parse_gasoracle_response(body), Err(ExternalServiceError::NoResult(_))));
        assert!(matches!(parse_gasoracle_response("{}"), Err(ExternalServiceError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_quote_prefers_tracker() {
        let quote = oracle(Some(FixedTracker(Ok(30 * GWEI), Duration::ZERO)), Some(GWEI))
            .quote()
            .await
            .unwrap();
        assert_eq!(quote, FeeQuote { wei: 30 * GWEI, source: FeeSource::GasTracker });
    }

    #[tokio::test]
    async fn test_quote_falls_back_on_tracker_error() {
        let quote = oracle(Some(FixedTracker(Err("bad key"), Duration::ZERO)), Some(7 * GWEI))
            .quote()
            .await
            .unwrap();
        assert_eq!(quote, FeeQuote { wei: 7 * GWEI, source: FeeSource::Node });
    }

    #[tokio::test]
    async fn test_quote_falls_back_on_tracker_timeout() {
        let slow = FixedTracker(Ok(30 * GWEI), Duration::from_millis(500));
        let quote = oracle(Some(slow), Some(7 * GWEI)).quote().await.unwrap();
        assert_eq!(quote.source, FeeSource::Node);
    }

    #[tokio::test]
    async fn test_quote_fails_only_when_both_fail() {
        let result = oracle(Some(FixedTracker(Err("down"), Duration::ZERO)), None).quote().await;
        assert!(matches!(result, Err(BuildError::FeeUnavailable(_))));

        let quote = oracle(None, Some(3)).quote().await.unwrap();
        assert_eq!(quote.wei, 3);
    }
}
