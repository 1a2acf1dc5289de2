//! Receipt watcher
//!
//! Follows a dispatched candidate until it lands, is dropped, or the watch
//! times out. Runs detached from the reaction task; only logs.
//!
//! Relay path: relay status first, chain receipt once the relay reports
//! INCLUDED. Direct path: chain receipt only.
//!
//! The relay answers UNKNOWN until it has indexed a transaction, so UNKNOWN
//! only counts as dropped once the grace period is over. A candidate that is
//! dropped or never confirmed gives its nonce back to the sequencer.

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chain::ChainClient;

use super::nonce::NonceSequencer;
use super::relay::{PrivateRelay, RelayStatus};

/// How long an UNKNOWN relay status is read as "not indexed yet"
pub const DEFAULT_UNKNOWN_GRACE: Duration = Duration::from_secs(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Included { block_number: Option<u64>, success: bool },
    /// Relay gave up on it (cancelled, failed, unknown)
    Dropped(RelayStatus),
    TimedOut,
}

#[derive(Clone)]
pub struct ReceiptWatcher {
    chain: Arc<dyn ChainClient>,
    relay: Option<Arc<dyn PrivateRelay>>,
    sequencer: Option<Arc<NonceSequencer>>,
    poll_interval: Duration,
    timeout: Duration,
    unknown_grace: Duration,
}

impl ReceiptWatcher {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        relay: Option<Arc<dyn PrivateRelay>>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            chain,
            relay,
            sequencer: None,
            poll_interval,
            timeout,
            unknown_grace: DEFAULT_UNKNOWN_GRACE,
        }
    }

    /// Release the nonce of every candidate that does not land.
    pub fn with_sequencer(mut self, sequencer: Arc<NonceSequencer>) -> Self {
        self.sequencer = Some(sequencer);
        self
    }

    pub fn with_unknown_grace(mut self, grace: Duration) -> Self {
        self.unknown_grace = grace;
        self
    }

    /// Poll until a final outcome or the deadline.
    pub async fn watch(&self, hash: TxHash) -> ReceiptOutcome {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut relay_included = self.relay.is_none();

        loop {
            if !relay_included {
                if let Some(relay) = &self.relay {
                    match relay.status(hash).await {
                        Ok(RelayStatus::Included) => relay_included = true,
                        Ok(RelayStatus::Pending) => {}
                        Ok(RelayStatus::Unknown) if started.elapsed() < self.unknown_grace => {
                            debug!("[receipt] Relay has not indexed {:?} yet", hash);
                        }
                        Ok(status) => {
                            warn!("[receipt] ❌ Relay dropped {:?}: {:?}", hash, status);
                            return ReceiptOutcome::Dropped(status);
                        }
                        Err(e) => debug!("[receipt] Relay status for {:?} unavailable: {}", hash, e),
                    }
                }
            }

            if relay_included {
                match self.chain.receipt(hash).await {
                    Ok(Some(receipt)) => {
                        if receipt.success {
                            info!("[receipt] ✅ {:?} included in block {:?}", hash, receipt.block_number);
                        } else {
                            warn!("[receipt] ⚠️ {:?} included in block {:?} but reverted", hash, receipt.block_number);
                        }
                        return ReceiptOutcome::Included {
                            block_number: receipt.block_number,
                            success: receipt.success,
                        };
                    }
                    Ok(None) => {}
                    Err(e) => debug!("[receipt] Receipt lookup for {:?} failed: {:#}", hash, e),
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                warn!("[receipt] ⏰ No receipt for {:?} after {}s", hash, self.timeout.as_secs());
                return ReceiptOutcome::TimedOut;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Watch `hash`, then give `nonce` back if the candidate did not land.
    pub async fn follow(&self, hash: TxHash, nonce: u64) -> ReceiptOutcome {
        let outcome = self.watch(hash).await;
        if let Some(sequencer) = &self.sequencer {
            match outcome {
                ReceiptOutcome::Included { .. } => {}
                ReceiptOutcome::Dropped(_) | ReceiptOutcome::TimedOut => {
                    info!("[receipt] ♻️ Nonce {} of {:?} is free again", nonce, hash);
                    sequencer.release(nonce).await;
                }
            }
        }
        outcome
    }

    /// Spawn `follow` on the runtime and forget it.
    pub fn spawn(&self, hash: TxHash, nonce: u64) {
        let watcher = self.clone();
        tokio::spawn(async move {
            watcher.follow(hash, nonce).await;
        });
    }
}
