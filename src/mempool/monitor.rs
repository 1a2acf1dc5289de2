//! Mempool Feed — Subscription Loop
//!
//! Purpose:
//!     Subscribe to pending transactions sent by the watched account via
//!     Alchemy's alchemy_pendingTransactions WebSocket subscription (filtered
//!     by fromAddress, full objects). Validate each notification and push it
//!     into the bounded pipeline channel in arrival order.
//!
//! Notes:
//!     - The fromAddress filter is a coarse server-side pre-filter only; the
//!       address filter still checks every event
//!     - No filtering, reordering or deduplication happens here
//!     - Reconnects with bounded exponential backoff; exhausting the backoff
//!       is fatal (the caller exits non-zero)

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::types::ObservedTransaction;

use super::types::ReconnectPolicy;

/// How a single WS session ended without error
enum SessionEnd {
    /// Pipeline side hung up (shutdown)
    ReceiverClosed,
}

/// Drives the pending-transaction subscription for one account
pub struct FeedSubscriber {
    ws_url: String,
    sender: Address,
    reconnect: ReconnectPolicy,
}

impl FeedSubscriber {
    pub fn new(ws_url: impl Into<String>, sender: Address, reconnect: ReconnectPolicy) -> Self {
        Self { ws_url: ws_url.into(), sender, reconnect }
    }

    /// Subscription params for alchemy_pendingTransactions scoped to the sender
    pub fn subscription_params(&self) -> Value {
        serde_json::json!([
            "alchemy_pendingTransactions",
            {
                "fromAddress": format!("{:?}", self.sender),
                "hashesOnly": false
            }
        ])
    }

    /// Run until the receiver is dropped. Returns Err once reconnects are exhausted.
    pub async fn run(self, tx: mpsc::Sender<ObservedTransaction>) -> Result<()> {
        info!("Mempool feed starting | sender={:?}", self.sender);

        // Consecutive failed attempts; reset whenever a subscription goes live
        let mut failures = 0u32;

        loop {
            let mut established = false;
            match self.run_session(&tx, &mut established).await {
                Ok(SessionEnd::ReceiverClosed) => {
                    info!("Mempool feed stopped: pipeline receiver closed");
                    return Ok(());
                }
                Err(e) => {
                    if established {
                        failures = 0;
                    }
                    failures += 1;
                    if self.reconnect.exhausted(failures) {
                        error!(
                            "Mempool feed: {} reconnects exhausted, giving up: {:#}",
                            self.reconnect.max_attempts, e
                        );
                        return Err(e.context("feed subscription failed after exhausting backoff"));
                    }
                    let delay = self.reconnect.delay_for(failures);
                    warn!(
                        "Mempool feed error (reconnect {}/{}): {:#}, retrying in {:?}",
                        failures, self.reconnect.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One WS session. Returns Err on connection failure or stream end (caller retries).
    async fn run_session(
        &self,
        tx: &mpsc::Sender<ObservedTransaction>,
        established: &mut bool,
    ) -> Result<SessionEnd> {
        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(self.ws_url.clone()))
            .await
            .context("Mempool WS connect failed")?;

        let subscription = provider
            .subscribe::<_, Value>(self.subscription_params())
            .await
            .context("alchemy_pendingTransactions subscription failed")?;

        *established = true;
        info!("Mempool: alchemy_pendingTransactions subscription active (from={:?})", self.sender);

        let mut stream = subscription.into_stream();
        let mut delivered = 0u64;
        let mut malformed = 0u64;

        while let Some(payload) = stream.next().await {
            match ObservedTransaction::from_feed_value(&payload) {
                Ok(observed) => {
                    delivered += 1;
                    debug!("PENDING: {:?} | to={:?}", observed.hash, observed.to);
                    if tx.send(observed).await.is_err() {
                        return Ok(SessionEnd::ReceiverClosed);
                    }
                }
                Err(e) => {
                    malformed += 1;
                    warn!("Mempool: dropping notification: {}", e);
                }
            }
        }

        warn!(
            "Mempool pending stream ended (delivered={} malformed={})",
            delivered, malformed
        );
        Err(anyhow!("Pending stream ended"))
    }
}
