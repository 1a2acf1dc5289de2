//! Configuration management
//!
//! Load settings from a .env file plus the process environment, once, into an
//! immutable BotConfig. Components receive what they need via constructors;
//! nothing reads the environment after startup.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::gas::FeeReferenceMode;
use crate::mempool::ReconnectPolicy;
use crate::types::Network;

const DEFAULT_RELAY_URL: &str = "https://relay.flashbots.net";
const DEFAULT_RELAY_STATUS_URL: &str = "https://protect.flashbots.net/tx";

/// What to watch. Created once at startup, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Account whose pending transactions are monitored
    pub sender_address: Address,
    /// Ordered, de-duplicated watch-list
    pub recipient_addresses: Vec<Address>,
    pub network: Network,
}

impl WatchConfig {
    pub fn new(sender_address: Address, recipients: Vec<Address>, network: Network) -> Self {
        let mut recipient_addresses: Vec<Address> = Vec::with_capacity(recipients.len());
        for addr in recipients {
            if !recipient_addresses.contains(&addr) {
                recipient_addresses.push(addr);
            }
        }
        Self { sender_address, recipient_addresses, network }
    }
}

/// Full bot configuration
#[derive(Clone)]
pub struct BotConfig {
    pub watch: WatchConfig,
    /// Sending identity
    pub signer: PrivateKeySigner,
    /// Relay reputation identity (mainnet only)
    pub relay_auth: Option<PrivateKeySigner>,

    pub rpc_ws_url: String,
    pub etherscan_url: String,
    pub etherscan_api_key: String,
    pub gas_api_key: String,
    pub relay_url: String,
    pub relay_status_url: String,

    pub premium_wei: u128,
    pub fee_reference: FeeReferenceMode,

    pub abi_dir: PathBuf,
    pub metadata_timeout: Duration,
    pub gas_api_timeout: Duration,

    pub feed_channel_size: usize,
    pub reconnect: ReconnectPolicy,
    pub dedupe_window: Duration,

    pub submission_retries: u32,
    pub receipt_timeout: Duration,
    pub dry_run: bool,
}

/// Values given on the command line win over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub network: Option<Network>,
    pub dry_run: bool,
}

/// Load .env (explicit path or ./.env) then read the process environment.
pub fn load_config_from_file(
    env_file: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<BotConfig, ConfigError> {
    match env_file {
        Some(path) => {
            dotenv::from_path(path).map_err(|e| ConfigError::Invalid {
                key: "--env-file",
                reason: format!("{}: {}", path.display(), e),
            })?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    BotConfig::from_lookup(|key| std::env::var(key).ok(), overrides)
}

impl BotConfig {
    /// Build from an arbitrary key lookup (environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F, overrides: &CliOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let network = match overrides.network {
            Some(n) => n,
            None => get("NETWORK").ok_or(ConfigError::Missing("NETWORK"))?.parse()?,
        };

        let signer = get("PRIVATE_KEY")
            .ok_or(ConfigError::Missing("PRIVATE_KEY"))
            .and_then(|k| parse_signer("PRIVATE_KEY", &k))?;

        let sender_address = parse_address(
            "SENDER_ADDRESS",
            &get("SENDER_ADDRESS").ok_or(ConfigError::Missing("SENDER_ADDRESS"))?,
        )?;

        let recipients_raw =
            get("RECIPIENT_ADDRESSES").ok_or(ConfigError::Missing("RECIPIENT_ADDRESSES"))?;
        let recipients = recipients_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_address("RECIPIENT_ADDRESSES", s))
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(ConfigError::Missing("RECIPIENT_ADDRESSES"));
        }

        let rpc_ws_url = match (get("RPC_WS_URL"), get("ALCHEMY_API_KEY")) {
            (Some(url), _) => url,
            (None, Some(key)) => network.alchemy_ws_url(&key),
            (None, None) => return Err(ConfigError::Missing("ALCHEMY_API_KEY")),
        };

        // Fee-estimation credential: fatal when absent
        let gas_api_key = get("GAS_API_KEY")
            .or_else(|| get("ETHERSCAN_API_KEY"))
            .ok_or(ConfigError::Missing("ETHERSCAN_API_KEY"))?;
        let etherscan_api_key = get("ETHERSCAN_API_KEY").unwrap_or_else(|| gas_api_key.clone());

        let relay_auth = match get("RELAY_AUTH_KEY") {
            Some(k) => Some(parse_signer("RELAY_AUTH_KEY", &k)?),
            None if network.is_mainnet() => return Err(ConfigError::Missing("RELAY_AUTH_KEY")),
            None => None,
        };

        let premium_wei = match get("PREMIUM_WEI") {
            Some(v) => parse_num::<u128>("PREMIUM_WEI", &v)?,
            None => network.default_premium_wei(),
        };
        if premium_wei == 0 {
            return Err(ConfigError::Invalid {
                key: "PREMIUM_WEI",
                reason: "must be at least 1 wei to outbid the reference fee".to_string(),
            });
        }

        let fee_reference = match get("FEE_REFERENCE") {
            Some(v) => v.parse()?,
            None => FeeReferenceMode::Oracle,
        };

        let reconnect = ReconnectPolicy {
            base_delay: Duration::from_millis(num_or("RECONNECT_BASE_MS", &get, 500)?),
            max_delay: Duration::from_millis(num_or("RECONNECT_MAX_MS", &get, 30_000)?),
            max_attempts: num_or("MAX_RECONNECTS", &get, 10)?,
        };

        let dry_run = overrides.dry_run
            || get("DRY_RUN")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false);

        Ok(BotConfig {
            watch: WatchConfig::new(sender_address, recipients, network),
            signer,
            relay_auth,
            rpc_ws_url,
            etherscan_url: get("ETHERSCAN_URL")
                .unwrap_or_else(|| network.default_etherscan_url().to_string()),
            etherscan_api_key,
            gas_api_key,
            relay_url: get("RELAY_URL").unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()),
            relay_status_url: get("RELAY_STATUS_URL")
                .unwrap_or_else(|| DEFAULT_RELAY_STATUS_URL.to_string()),
            premium_wei,
            fee_reference,
            abi_dir: PathBuf::from(get("ABI_DIR").unwrap_or_else(|| "abi".to_string())),
            metadata_timeout: Duration::from_millis(num_or("METADATA_TIMEOUT_MS", &get, 750)?),
            gas_api_timeout: Duration::from_millis(num_or("GAS_API_TIMEOUT_MS", &get, 1500)?),
            feed_channel_size: num_or("FEED_CHANNEL_SIZE", &get, 256usize)?.max(1),
            reconnect,
            dedupe_window: Duration::from_secs(num_or("DEDUPE_WINDOW_SECS", &get, 120)?),
            submission_retries: num_or("SUBMISSION_RETRIES", &get, 0)?,
            receipt_timeout: Duration::from_secs(num_or("RECEIPT_TIMEOUT_SECS", &get, 300)?),
            dry_run,
        })
    }

    /// The bot's own address
    pub fn bot_address(&self) -> Address {
        self.signer.address()
    }

    /// Log the non-secret parts of the configuration
    pub fn log_summary(&self) {
        info!("Network: {}", self.watch.network);
        info!("Watching sender: {:?}", self.watch.sender_address);
        info!(
            "Recipients ({}): {}",
            self.watch.recipient_addresses.len(),
            self.watch
                .recipient_addresses
                .iter()
                .map(|a| format!("{:?}", a))
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("Bot wallet: {:?}", self.bot_address());
        info!("RPC URL: {}", redact_rpc_url(&self.rpc_ws_url));
        info!(
            "Fee policy: reference={} premium={} wei | retries={}",
            self.fee_reference, self.premium_wei, self.submission_retries
        );
        if self.dry_run {
            warn!("DRY RUN: candidates are built and signed but never dispatched");
        }
    }
}

/// Node URL safe to log: the Alchemy key after `/v2/` is masked and
/// anything else is cut to a prefix.
fn redact_rpc_url(url: &str) -> String {
    const SHOWN_CHARS: usize = 40;

    if let Some(idx) = url.find("/v2/") {
        return format!("{}/v2/***", &url[..idx]);
    }
    let mut shown: String = url.chars().take(SHOWN_CHARS).collect();
    if shown.len() < url.len() {
        shown.push_str("...");
    }
    shown
}

fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(&value.trim().to_lowercase()).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{}': {}", value, e),
    })
}

fn parse_signer(key: &'static str, value: &str) -> Result<PrivateKeySigner, ConfigError> {
    value
        .trim()
        .trim_start_matches("0x")
        .parse::<PrivateKeySigner>()
        .map_err(|e| ConfigError::Invalid { key, reason: e.to_string() })
}

fn parse_num<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::Invalid { key, reason: format!("'{}': {}", value, e) })
}

fn num_or<T, G>(key: &'static str, get: &G, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => parse_num(key, &v),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const AUTH: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn base_env() -> HashMap<&'static str, String> {
        let mut env = HashMap::new();
        env.insert("NETWORK", "testnet".to_string());
        env.insert("PRIVATE_KEY", KEY.to_string());
        env.insert("SENDER_ADDRESS", "0x1111111111111111111111111111111111111111".to_string());
        env.insert(
            "RECIPIENT_ADDRESSES",
            "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA, 0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb,0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
                .to_string(),
        );
        env.insert("ALCHEMY_API_KEY", "alchemy-key".to_string());
        env.insert("ETHERSCAN_API_KEY", "etherscan-key".to_string());
        env
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<BotConfig, ConfigError> {
        BotConfig::from_lookup(|k| env.get(k).cloned(), &CliOverrides::default())
    }

    #[test]
    fn test_minimal_testnet_config() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.watch.network, Network::Testnet);
        // Mixed-case duplicate collapsed, order kept
        assert_eq!(config.watch.recipient_addresses.len(), 2);
        assert_eq!(
            config.watch.recipient_addresses[0],
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse::<Address>().unwrap()
        );
        assert_eq!(config.premium_wei, 5_000_000_000);
        assert_eq!(config.gas_api_key, "etherscan-key");
        assert_eq!(config.rpc_ws_url, "wss://eth-sepolia.g.alchemy.com/v2/alchemy-key");
        assert_eq!(config.fee_reference, FeeReferenceMode::Oracle);
        assert_eq!(config.submission_retries, 0);
        assert!(config.relay_auth.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn test_missing_gas_credential_is_fatal() {
        let mut env = base_env();
        env.remove("ETHERSCAN_API_KEY");
        assert!(matches!(load(&env), Err(ConfigError::Missing("ETHERSCAN_API_KEY"))));
    }

    #[test]
    fn test_missing_node_credential_is_fatal() {
        let mut env = base_env();
        env.remove("ALCHEMY_API_KEY");
        assert!(matches!(load(&env), Err(ConfigError::Missing("ALCHEMY_API_KEY"))));

        env.insert("RPC_WS_URL", "ws://localhost:8546".to_string());
        assert_eq!(load(&env).unwrap().rpc_ws_url, "ws://localhost:8546");
    }

    #[test]
    fn test_mainnet_requires_relay_auth() {
        let mut env = base_env();
        env.insert("NETWORK", "mainnet".to_string());
        assert!(matches!(load(&env), Err(ConfigError::Missing("RELAY_AUTH_KEY"))));

        env.insert("RELAY_AUTH_KEY", AUTH.to_string());
        let config = load(&env).unwrap();
        assert!(config.relay_auth.is_some());
        assert_eq!(config.premium_wei, 2_000_000_000);
    }

    #[test]
    fn test_zero_premium_rejected() {
        let mut env = base_env();
        env.insert("PREMIUM_WEI", "0".to_string());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { key: "PREMIUM_WEI", .. })));
    }

    #[test]
    fn test_cli_overrides_win() {
        let env = base_env();
        let overrides = CliOverrides { network: Some(Network::Mainnet), dry_run: true };
        let mut env_with_auth = env.clone();
        env_with_auth.insert("RELAY_AUTH_KEY", AUTH.to_string());
        let config =
            BotConfig::from_lookup(|k| env_with_auth.get(k).cloned(), &overrides).unwrap();
        assert_eq!(config.watch.network, Network::Mainnet);
        assert!(config.dry_run);
    }

    #[test]
    fn test_bad_recipient_rejected() {
        let mut env = base_env();
        env.insert("RECIPIENT_ADDRESSES", "0x1234".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { key: "RECIPIENT_ADDRESSES", .. })
        ));
    }

    #[test]
    fn test_rpc_url_redaction() {
        assert_eq!(
            redact_rpc_url("wss://eth-mainnet.g.alchemy.com/v2/secret-key"),
            "wss://eth-mainnet.g.alchemy.com/v2/***"
        );
        assert_eq!(redact_rpc_url("ws://localhost:8546"), "ws://localhost:8546");

        // Multi-byte characters straddling the cut must not panic
        let url = format!("ws://{}", "é".repeat(40));
        let shown = redact_rpc_url(&url);
        assert_eq!(shown.chars().count(), 43);
        assert!(shown.ends_with("..."));
    }
}
