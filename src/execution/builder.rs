//! Transaction Builder
//!
//! Turns an observed transaction into a candidate that competes with it:
//! same recipient, same calldata, same gas limit, a fee bid of
//! `reference + premium`, and a nonce reserved as late as possible.

use alloy::primitives::U256;
use std::sync::Arc;
use tracing::debug;

use crate::error::BuildError;
use crate::types::{CandidateTransaction, ObservedTransaction};

use super::nonce::NonceSequencer;

/// `reference + premium`, failing instead of wrapping
pub fn fee_bid(reference: u128, premium: u128) -> Result<u128, BuildError> {
    reference.checked_add(premium).ok_or(BuildError::FeeOverflow { reference, premium })
}

pub struct CandidateBuilder {
    sequencer: Arc<NonceSequencer>,
    premium_wei: u128,
}

impl CandidateBuilder {
    pub fn new(sequencer: Arc<NonceSequencer>, premium_wei: u128) -> Self {
        Self { sequencer, premium_wei }
    }

    pub fn premium_wei(&self) -> u128 {
        self.premium_wei
    }

    pub fn sequencer(&self) -> &Arc<NonceSequencer> {
        &self.sequencer
    }

    /// Assemble a candidate against `fee_reference` (wei per gas).
    pub async fn build(
        &self,
        observed: &ObservedTransaction,
        fee_reference: u128,
    ) -> Result<CandidateTransaction, BuildError> {
        let to = observed.to.ok_or(BuildError::NoRecipient)?;
        let fee_bid = fee_bid(fee_reference, self.premium_wei)?;

        // Zero value is omitted rather than sent as an explicit transfer
        let value = (observed.value != U256::ZERO).then_some(observed.value);

        // Last step before signing, to keep the nonce window small
        let nonce = self.sequencer.reserve().await?;

        debug!(
            "Built candidate for {:?}: nonce={} fee_bid={} gas_limit={}",
            observed.hash, nonce, fee_bid, observed.gas_limit
        );

        Ok(CandidateTransaction {
            observed_hash: observed.hash,
            from: self.sequencer.address(),
            to,
            nonce,
            gas_limit: observed.gas_limit,
            fee_bid,
            input: observed.input.clone(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainClient, ReceiptInfo};
    use crate::error::SubmissionError;
    use crate::types::{FeeFields, GWEI};
    use alloy::primitives::{Address, Bytes, TxHash};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNode {
        nonce_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainClient for CountingNode {
        async fn pending_nonce(&self, _address: Address) -> anyhow::Result<u64> {
            self.nonce_calls.fetch_add(1, Ordering::SeqCst);
            Ok(12)
        }
        async fn gas_price(&self) -> anyhow::Result<u128> {
            Ok(GWEI)
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

    fn builder(premium: u128) -> (Arc<CountingNode>, CandidateBuilder) {
        let node = Arc::new(CountingNode { nonce_calls: AtomicUsize::new(0) });
        let seq = Arc::new(NonceSequencer::new(node.clone(), Address::repeat_byte(0xb0)));
        (node, CandidateBuilder::new(seq, premium))
    }

    fn observed(value: u64) -> ObservedTransaction {
        ObservedTransaction {
            hash: TxHash::repeat_byte(0x01),
            from: Address::repeat_byte(0x5e),
            to: Some(Address::repeat_byte(0xaa)),
            value: U256::from(value),
            input: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            gas_limit: 21_000,
            fee: FeeFields::Legacy { gas_price: GWEI },
        }
    }

    #[tokio::test]
    async fn test_build_copies_observed_fields() {
        let (_, builder) = builder(5 * GWEI);
        let tx = observed(0);
        let candidate = builder.build(&tx, GWEI).await.unwrap();

        assert_eq!(candidate.from, Address::repeat_byte(0xb0));
        assert_eq!(candidate.to, Address::repeat_byte(0xaa));
        assert_eq!(candidate.nonce, 12);
        assert_eq!(candidate.gas_limit, 21_000);
        assert_eq!(candidate.fee_bid, 6 * GWEI);
        assert_eq!(candidate.input, tx.input);
        assert_eq!(candidate.value, None);
        assert_eq!(candidate.observed_hash, tx.hash);
    }

    #[tokio::test]
    async fn test_nonzero_value_is_copied() {
        let (_, builder) = builder(1);
        let candidate = builder.build(&observed(42), GWEI).await.unwrap();
        assert_eq!(candidate.value, Some(U256::from(42)));
    }

    #[tokio::test]
    async fn test_fee_bid_at_least_reference_plus_premium() {
        let (_, builder) = builder(1);
        for reference in [0u128, 1, GWEI, 37 * GWEI + 3] {
            let candidate = builder.build(&observed(0), reference).await.unwrap();
            assert!(candidate.fee_bid > reference);
            assert_eq!(candidate.fee_bid, reference + 1);
        }
    }

    #[tokio::test]
    async fn test_fee_overflow_reserves_no_nonce() {
        let (node, builder) = builder(2);
        let result = builder.build(&observed(0), u128::MAX).await;
        assert!(matches!(result, Err(BuildError::FeeOverflow { .. })));
        assert_eq!(node.nonce_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_contract_creation_rejected() {
        let (_, builder) = builder(2);
        let mut tx = observed(0);
        tx.to = None;
        assert!(matches!(builder.build(&tx, GWEI).await, Err(BuildError::NoRecipient)));
    }
}
