//! Private relay
//!
//! Submits signed transactions to a Flashbots-compatible relay over
//! `eth_sendPrivateTransaction`, keeping them out of the public pool until
//! inclusion. Requests carry an `X-Flashbots-Signature` header: the relay
//! auth key's address and its EIP-191 signature over keccak256(body).
//!
//! Status is polled from the relay's transaction status API
//! (`{status_url}/{hash}` → PENDING | INCLUDED | FAILED | CANCELLED | UNKNOWN).

use alloy::hex;
use alloy::primitives::{keccak256, TxHash};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::{ExternalServiceError, SubmissionError};

/// Relay-side view of a privately submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayStatus {
    Pending,
    Included,
    Failed,
    Cancelled,
    Unknown,
}

impl RelayStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, RelayStatus::Pending)
    }
}

#[async_trait]
pub trait PrivateRelay: Send + Sync {
    /// Submit a signed, EIP-2718 encoded transaction. Returns the hash the
    /// relay tracks it under.
    async fn send_private_transaction(&self, raw: &[u8]) -> Result<TxHash, SubmissionError>;

    async fn status(&self, hash: TxHash) -> Result<RelayStatus, ExternalServiceError>;
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RelayRpcResponse {
    result: Option<TxHash>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RelayStatusResponse {
    status: RelayStatus,
}

pub struct FlashbotsRelay {
    client: Client,
    relay_url: String,
    status_url: String,
    auth: PrivateKeySigner,
}

impl FlashbotsRelay {
    pub fn new(
        relay_url: impl Into<String>,
        status_url: impl Into<String>,
        auth: PrivateKeySigner,
        timeout: Duration,
    ) -> Result<Self, ExternalServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
            status_url: status_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// `{address}:{signature}` over the hex-encoded keccak256 of `body`
    pub async fn signature_header(&self, body: &str) -> Result<String, SubmissionError> {
        let digest = format!("{:?}", keccak256(body.as_bytes()));
        let signature = self
            .auth
            .sign_message(digest.as_bytes())
            .await
            .map_err(|e| SubmissionError::Signing(e.to_string()))?;
        Ok(format!("{:?}:{}", self.auth.address(), hex::encode_prefixed(signature.as_bytes())))
    }
}

/// JSON-RPC body for `eth_sendPrivateTransaction`
pub fn private_transaction_body(raw: &[u8]) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_sendPrivateTransaction",
        "params": [{
            "tx": hex::encode_prefixed(raw),
            "preferences": { "fast": true }
        }]
    })
    .to_string()
}

/// Relay answer to `eth_sendPrivateTransaction`: a hash, or a rejection
pub fn parse_relay_response(body: &str) -> Result<TxHash, SubmissionError> {
    let response: RelayRpcResponse = serde_json::from_str(body)
        .map_err(|e| SubmissionError::Transport(format!("unreadable relay response: {}", e)))?;

    match (response.result, response.error) {
        (_, Some(err)) => Err(SubmissionError::Rejected(format!("{} (code {})", err.message, err.code))),
        (Some(hash), None) => Ok(hash),
        (None, None) => Err(SubmissionError::Transport("relay response has no result".to_string())),
    }
}

#[async_trait]
impl PrivateRelay for FlashbotsRelay {
    async fn send_private_transaction(&self, raw: &[u8]) -> Result<TxHash, SubmissionError> {
        let body = private_transaction_body(raw);
        let signature = self.signature_header(&body).await?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-Flashbots-Signature",
            HeaderValue::from_str(&signature).map_err(|e| SubmissionError::Signing(e.to_string()))?,
        );

        let response = self
            .client
            .post(&self.relay_url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(format!("relay unreachable: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SubmissionError::Transport(format!("relay response: {}", e)))?;
        debug!("Relay answered {}: {}", status, text);

        // Relays report JSON-RPC errors with 4xx statuses too; the body decides
        match parse_relay_response(&text) {
            Err(SubmissionError::Transport(_)) if !status.is_success() => {
                Err(SubmissionError::Transport(format!("relay returned {}", status)))
            }
            other => other,
        }
    }

    async fn status(&self, hash: TxHash) -> Result<RelayStatus, ExternalServiceError> {
        let url = format!("{}/{:?}", self.status_url, hash);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ExternalServiceError::Status(response.status()));
        }
        let body = response.text().await?;
        parse_status_response(&body)
    }
}

pub fn parse_status_response(body: &str) -> Result<RelayStatus, ExternalServiceError> {
    serde_json::from_str::<RelayStatusResponse>(body)
        .map(|r| r.status)
        .map_err(|e| ExternalServiceError::Malformed(e.to_string()))
}
