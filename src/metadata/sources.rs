//! Contract schema sources
//!
//! LocalAbiDir     — pre-seeded `{abi_dir}/{address}.json` files (lowercase hex)
//! EtherscanClient — `module=contract&action=getabi` remote lookup
//!
//! Both return the parsed JSON ABI or an ExternalServiceError; the resolver
//! turns every error into "absent".

use alloy::json_abi::JsonAbi;
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ExternalServiceError;

/// Somewhere a contract's call-interface schema can be found
#[async_trait]
pub trait SchemaSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, address: Address) -> Result<JsonAbi, ExternalServiceError>;
}

/// Pre-seeded ABI files on disk
pub struct LocalAbiDir {
    dir: PathBuf,
}

impl LocalAbiDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, address: Address) -> PathBuf {
        self.dir.join(format!("{}.json", format!("{:?}", address).to_lowercase()))
    }
}

#[async_trait]
impl SchemaSource for LocalAbiDir {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, address: Address) -> Result<JsonAbi, ExternalServiceError> {
        let path = self.path_for(address);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ExternalServiceError::NoResult(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ExternalServiceError::Malformed(format!("{}: {}", path.display(), e)))
    }
}

/// Etherscan-style envelope: `{"status":"1","message":"OK","result":"<abi json>"}`
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

/// Remote ABI lookup (Etherscan API)
pub struct EtherscanClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EtherscanClient {
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
impl SchemaSource for EtherscanClient {
    fn name(&self) -> &'static str {
        "etherscan"
    }

    async fn fetch(&self, address: Address) -> Result<JsonAbi, ExternalServiceError> {
        let address = format!("{:?}", address).to_lowercase();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .header("accept", "*/*")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExternalServiceError::Status(response.status()));
        }

        let body = response.text().await?;
        parse_getabi_response(&body)
    }
}

/// Parse a getabi response body. status != "1" means the lookup has no result
/// (unverified contract, rate limit, bad key).
pub fn parse_getabi_response(body: &str) -> Result<JsonAbi, ExternalServiceError> {
    let envelope: EtherscanResponse =
        serde_json::from_str(body).map_err(|e| ExternalServiceError::Malformed(e.to_string()))?;

    if envelope.status != "1" {
        let detail = match &envelope.result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ExternalServiceError::NoResult(format!("{}: {}", envelope.message, detail)));
    }

    match envelope.result {
        serde_json::Value::String(abi_json) => serde_json::from_str(&abi_json)
            .map_err(|e| ExternalServiceError::Malformed(format!("abi payload: {}", e))),
        other => Err(ExternalServiceError::Malformed(format!(
            "expected JSON-encoded schema string, got {}",
            other
        ))),
    }
}
