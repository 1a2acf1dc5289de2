//! Fee pricing
//!
//! `FeeOracle` supplies the current fast fee. `FeeReferenceMode` decides what
//! the premium is added to: the oracle quote, the observed transaction's own
//! fee, or whichever is higher.

pub mod oracle;

pub use oracle::{parse_gasoracle_response, EtherscanGasTracker, FeeOracle, GasTracker};

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// What the premium is added to when pricing a candidate (FEE_REFERENCE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeeReferenceMode {
    /// Fee oracle quote
    #[default]
    Oracle,
    /// The observed transaction's own gasPrice / maxFeePerGas; no oracle call
    Observed,
    /// max(oracle quote, observed fee)
    Highest,
}

impl FeeReferenceMode {
    pub fn needs_oracle(&self) -> bool {
        !matches!(self, FeeReferenceMode::Observed)
    }

    /// Pick the reference fee given an oracle quote (if one was fetched)
    /// and the observed transaction's fee.
    pub fn select(&self, oracle_wei: Option<u128>, observed_wei: u128) -> u128 {
        match (self, oracle_wei) {
            (FeeReferenceMode::Observed, _) | (_, None) => observed_wei,
            (FeeReferenceMode::Oracle, Some(quote)) => quote,
            (FeeReferenceMode::Highest, Some(quote)) => quote.max(observed_wei),
        }
    }
}

impl FromStr for FeeReferenceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oracle" => Ok(FeeReferenceMode::Oracle),
            "observed" => Ok(FeeReferenceMode::Observed),
            "highest" => Ok(FeeReferenceMode::Highest),
            other => Err(ConfigError::Invalid {
                key: "FEE_REFERENCE",
                reason: format!("'{}' (expected oracle, observed or highest)", other),
            }),
        }
    }
}

impl fmt::Display for FeeReferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeeReferenceMode::Oracle => write!(f, "oracle"),
            FeeReferenceMode::Observed => write!(f, "observed"),
            FeeReferenceMode::Highest => write!(f, "highest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("oracle".parse::<FeeReferenceMode>().unwrap(), FeeReferenceMode::Oracle);
        assert_eq!("HIGHEST".parse::<FeeReferenceMode>().unwrap(), FeeReferenceMode::Highest);
        assert!("median".parse::<FeeReferenceMode>().is_err());
    }

    #[test]
    fn test_select_reference() {
        assert_eq!(FeeReferenceMode::Oracle.select(Some(10), 30), 10);
        assert_eq!(FeeReferenceMode::Observed.select(Some(10), 30), 30);
        assert_eq!(FeeReferenceMode::Highest.select(Some(10), 30), 30);
        assert_eq!(FeeReferenceMode::Highest.select(Some(50), 30), 50);
        assert!(!FeeReferenceMode::Observed.needs_oracle());
    }
}
