//! Mempool Feed — Type Definitions
//!
//! Purpose:
//!     Wire-level parsing of pending transaction objects delivered by the
//!     alchemy_pendingTransactions subscription, and the reconnect policy of
//!     the feed subscriber.
//!
//! Notes:
//!     - Payloads are validated here; nothing partial crosses into the pipeline
//!     - Quantities arrive as 0x-hex strings, but decimal strings and plain
//!       JSON numbers are accepted too (some relays re-encode)
//!     - `to` absent, null or empty means contract creation

use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FeedError;
use crate::types::{FeeFields, ObservedTransaction};

/// Bounded exponential backoff for the feed subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts before the subscriber gives up
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): base × 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u64 << exp;
        let ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(ms.min(self.max_delay.as_millis() as u64))
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

/// Raw pending transaction as delivered by the feed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedTransaction {
    hash: TxHash,
    from: Address,
    #[serde(default, deserialize_with = "deserialize_optional_address")]
    to: Option<Address>,
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    value: Option<U256>,
    #[serde(default, alias = "data")]
    input: Option<Bytes>,
    #[serde(deserialize_with = "deserialize_quantity")]
    gas: U256,
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    gas_price: Option<U256>,
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    max_fee_per_gas: Option<U256>,
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    max_priority_fee_per_gas: Option<U256>,
}

impl ObservedTransaction {
    /// Validate one feed notification into an ObservedTransaction.
    pub fn from_feed_value(value: &Value) -> Result<Self, FeedError> {
        let raw: FeedTransaction = serde_json::from_value(value.clone())
            .map_err(|e| FeedError::Malformed(e.to_string()))?;
        raw.try_into()
    }
}

impl TryFrom<FeedTransaction> for ObservedTransaction {
    type Error = FeedError;

    fn try_from(raw: FeedTransaction) -> Result<Self, Self::Error> {
        let gas_limit: u64 = raw
            .gas
            .try_into()
            .map_err(|_| FeedError::Malformed(format!("gas {} exceeds u64", raw.gas)))?;

        let fee = match (raw.max_fee_per_gas, raw.gas_price) {
            (Some(max_fee), _) => FeeFields::Eip1559 {
                max_fee_per_gas: to_u128("maxFeePerGas", max_fee)?,
                max_priority_fee_per_gas: raw
                    .max_priority_fee_per_gas
                    .map(|v| to_u128("maxPriorityFeePerGas", v))
                    .transpose()?
                    .unwrap_or(0),
            },
            (None, Some(gas_price)) => FeeFields::Legacy { gas_price: to_u128("gasPrice", gas_price)? },
            (None, None) => {
                return Err(FeedError::Malformed(format!(
                    "{:?}: neither gasPrice nor maxFeePerGas present",
                    raw.hash
                )))
            }
        };

        Ok(ObservedTransaction {
            hash: raw.hash,
            from: raw.from,
            to: raw.to,
            value: raw.value.unwrap_or(U256::ZERO),
            input: raw.input.unwrap_or_default(),
            gas_limit,
            fee,
        })
    }
}

fn to_u128(field: &str, v: U256) -> Result<u128, FeedError> {
    v.try_into()
        .map_err(|_| FeedError::Malformed(format!("{} {} exceeds fee precision", field, v)))
}

fn parse_quantity(s: &str) -> Result<U256, String> {
    let s = s.trim();
    if s.is_empty() || s == "0x" {
        return Ok(U256::ZERO);
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        U256::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        U256::from_str(s).map_err(|e| e.to_string())
    }
}

fn quantity_from_value(v: Value) -> Result<Option<U256>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => parse_quantity(&s).map(Some),
        Value::Number(n) => n
            .as_u64()
            .map(|n| Some(U256::from(n)))
            .ok_or_else(|| format!("invalid quantity {}", n)),
        other => Err(format!("expected quantity, got {}", other)),
    }
}

fn deserialize_quantity<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    quantity_from_value(Value::deserialize(deserializer)?)
        .map_err(de::Error::custom)?
        .ok_or_else(|| de::Error::custom("quantity is null"))
}

fn deserialize_optional_quantity<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    quantity_from_value(Value::deserialize(deserializer)?).map_err(de::Error::custom)
}

fn deserialize_optional_address<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => {
            if s.is_empty() || s == "0x" {
                Ok(None)
            } else {
                Address::from_str(&s.to_lowercase()).map(Some).map_err(de::Error::custom)
            }
        }
        Value::Null => Ok(None),
        _ => Err(de::Error::custom("expected a hexadecimal address string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

    #[test]
    fn test_parse_legacy_hex_payload() {
        let payload = json!({
            "hash": HASH,
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "value": "0xde0b6b3a7640000",
            "input": "0xdeadbeef",
            "gas": "0x5208",
            "gasPrice": "0x3b9aca00",
            "nonce": "0x1"
        });

        let tx = ObservedTransaction::from_feed_value(&payload).unwrap();
        assert_eq!(tx.gas_limit, 21_000);
        assert_eq!(tx.fee, FeeFields::Legacy { gas_price: 1_000_000_000 });
        assert_eq!(tx.value, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(tx.input.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            tx.to,
            Some("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap())
        );
    }

    #[test]
    fn test_parse_decimal_and_numeric_quantities() {
        let payload = json!({
            "hash": HASH,
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "value": "0",
            "input": "0xdeadbeef",
            "gas": 21000,
            "gasPrice": "1000000000"
        });

        let tx = ObservedTransaction::from_feed_value(&payload).unwrap();
        assert_eq!(tx.gas_limit, 21_000);
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.fee.reference_fee(), 1_000_000_000);
    }

    #[test]
    fn test_parse_eip1559_prefers_fee_cap() {
        let payload = json!({
            "hash": HASH,
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "value": "0x0",
            "input": "0x",
            "gas": "0x30d40",
            "gasPrice": "0x77359400",
            "maxFeePerGas": "0xba43b7400",
            "maxPriorityFeePerGas": "0x3b9aca00"
        });

        let tx = ObservedTransaction::from_feed_value(&payload).unwrap();
        assert_eq!(
            tx.fee,
            FeeFields::Eip1559 {
                max_fee_per_gas: 50_000_000_000,
                max_priority_fee_per_gas: 1_000_000_000
            }
        );
        assert!(tx.input.is_empty());
    }

    #[test]
    fn test_contract_creation_has_no_recipient() {
        for to in [json!(null), json!(""), json!("0x")] {
            let payload = json!({
                "hash": HASH,
                "from": "0x1111111111111111111111111111111111111111",
                "to": to,
                "value": "0x0",
                "input": "0x6080",
                "gas": "0x5208",
                "gasPrice": "0x1"
            });
            let tx = ObservedTransaction::from_feed_value(&payload).unwrap();
            assert!(tx.to.is_none());
        }
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        // hash-only notification
        assert!(ObservedTransaction::from_feed_value(&json!(HASH)).is_err());

        // no fee fields
        let payload = json!({
            "hash": HASH,
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "gas": "0x5208"
        });
        assert!(matches!(
            ObservedTransaction::from_feed_value(&payload),
            Err(FeedError::Malformed(_))
        ));

        // bad sender
        let payload = json!({
            "hash": HASH,
            "from": "not-an-address",
            "gas": "0x5208",
            "gasPrice": "0x1"
        });
        assert!(ObservedTransaction::from_feed_value(&payload).is_err());
    }

    #[test]
    fn test_reconnect_backoff_is_bounded() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            max_attempts: 5,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(4000));
        assert!(!policy.exhausted(5));
        assert!(policy.exhausted(6));
    }
}
