//! Nonce Sequencer
//!
//! Hands out sequence numbers for the bot's address. Fetch and reserve are
//! serialized behind one async lock, and every reservation stays in flight
//! until the chain moves past it or its owner gives it back.
//!
//! A reservation takes the lowest nonce at or above the node's pending count
//! that is not in flight. Two candidates built concurrently therefore never
//! share a nonce, and a nonce that was refused, dropped by the relay, or
//! never confirmed is reissued instead of leaving a gap behind it.

use alloy::primitives::Address;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::chain::ChainClient;
use crate::error::BuildError;

pub struct NonceSequencer {
    chain: Arc<dyn ChainClient>,
    address: Address,
    /// Reserved nonces the chain has not consumed yet
    in_flight: Mutex<BTreeSet<u64>>,
}

impl NonceSequencer {
    pub fn new(chain: Arc<dyn ChainClient>, address: Address) -> Self {
        Self { chain, address, in_flight: Mutex::new(BTreeSet::new()) }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reserve the next nonce.
    pub async fn reserve(&self) -> Result<u64, BuildError> {
        let mut in_flight = self.in_flight.lock().await;

        let fetched = self
            .chain
            .pending_nonce(self.address)
            .await
            .map_err(|e| BuildError::SequenceFetch(format!("{:#}", e)))?;

        // Everything below the pending count has been consumed on chain
        *in_flight = in_flight.split_off(&fetched);

        let mut nonce = fetched;
        while in_flight.contains(&nonce) {
            nonce += 1;
        }
        if nonce != fetched {
            debug!("Nonce {} ahead of node pending count {} ({} in flight)", nonce, fetched, in_flight.len());
        }

        in_flight.insert(nonce);
        Ok(nonce)
    }

    /// Give back a reservation that will not land: refused, dropped, or
    /// never confirmed. The next `reserve` may hand it out again.
    pub async fn release(&self, nonce: u64) {
        if self.in_flight.lock().await.remove(&nonce) {
            debug!("Released nonce {}", nonce);
        }
    }

    /// Reservations not yet consumed on chain or released
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}
