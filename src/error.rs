//! Error taxonomy
//!
//! ConfigError          fatal at startup, process exits non-zero
//! FeedError            one feed payload could not be validated, dropped
//! ExternalServiceError metadata lookup / gas tracker, recovered by fallback
//! BuildError           one observed event cannot be turned into a candidate
//! SubmissionError      relay or node refused the candidate, never auto-retried
//!                      unless SUBMISSION_RETRIES says otherwise

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("network {network} does not match node chain id {chain_id}")]
    NetworkMismatch { network: String, chain_id: u64 },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed feed payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("non-success status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("lookup returned no result: {0}")]
    NoResult(String),
    #[error("timed out after {0}ms")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("sequence number fetch failed: {0}")]
    SequenceFetch(String),
    #[error("no fee quote available: {0}")]
    FeeUnavailable(String),
    #[error("fee bid overflows: reference {reference} + premium {premium}")]
    FeeOverflow { reference: u128, premium: u128 },
    #[error("observed transaction has no recipient")]
    NoRecipient,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a submission was rejected, as far as the message tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// nonce too low / already known / replacement issues
    StaleSequence,
    /// fee below what the pool or relay accepts
    Underpriced,
    Other,
}

impl RejectionKind {
    /// Classify a node or relay error message.
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("nonce too low")
            || msg.contains("nonce too high")
            || msg.contains("already known")
            || msg.contains("invalid nonce")
        {
            RejectionKind::StaleSequence
        } else if msg.contains("underpriced")
            || msg.contains("fee too low")
            || msg.contains("max fee per gas less than block base fee")
            || msg.contains("insufficient fee")
        {
            RejectionKind::Underpriced
        } else {
            RejectionKind::Other
        }
    }

    /// Only stale-sequence and underpriced rejections can be fixed by
    /// rebuilding with a fresh nonce and fee.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RejectionKind::Other)
    }
}

impl SubmissionError {
    pub fn rejection_kind(&self) -> RejectionKind {
        match self {
            SubmissionError::Rejected(msg) => RejectionKind::classify(msg),
            _ => RejectionKind::Other,
        }
    }
}
