//! Recipient Watch-List Filter
//!
//! Decides whether an observed transaction triggers a reaction.
//! Recipients are evaluated in configured order, first match wins, so one
//! observed transaction triggers at most one reaction. Contract creations
//! (no `to`) never match.
//!
//! The feed is scoped server-side to the watched sender, but that scope is
//! only a coarse pre-filter: events from any other sender are rejected here.

use alloy::primitives::Address;
use tracing::trace;

use crate::config::WatchConfig;
use crate::types::ObservedTransaction;

/// Result of evaluating one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Matched the recipient at this index of the watch-list
    Match { index: usize, recipient: Address },
    NoMatch(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ContractCreation,
    ForeignSender,
    RecipientNotWatched,
}

/// Watch-list filter built from the immutable WatchConfig
#[derive(Debug, Clone)]
pub struct AddressFilter {
    sender: Address,
    /// Normalised lowercase hex, in configured order
    recipients: Vec<(String, Address)>,
}

impl AddressFilter {
    pub fn new(watch: &WatchConfig) -> Self {
        let recipients = watch
            .recipient_addresses
            .iter()
            .map(|a| (normalize(a), *a))
            .collect();
        Self { sender: watch.sender_address, recipients }
    }

    /// First matching watch-list entry, or the reason there is none.
    pub fn evaluate(&self, tx: &ObservedTransaction) -> FilterDecision {
        let to = match tx.to {
            Some(to) => to,
            None => return FilterDecision::NoMatch(RejectReason::ContractCreation),
        };

        if normalize(&tx.from) != normalize(&self.sender) {
            trace!("{:?}: sender {:?} is not the watched account", tx.hash, tx.from);
            return FilterDecision::NoMatch(RejectReason::ForeignSender);
        }

        let to_norm = normalize(&to);
        for (index, (norm, recipient)) in self.recipients.iter().enumerate() {
            if *norm == to_norm {
                return FilterDecision::Match { index, recipient: *recipient };
            }
        }

        FilterDecision::NoMatch(RejectReason::RecipientNotWatched)
    }

    /// Convenience: the matched recipient, if any
    pub fn matches(&self, tx: &ObservedTransaction) -> Option<Address> {
        match self.evaluate(tx) {
            FilterDecision::Match { recipient, .. } => Some(recipient),
            FilterDecision::NoMatch(_) => None,
        }
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }
}

fn normalize(addr: &Address) -> String {
    format!("{:?}", addr).to_lowercase()
}
