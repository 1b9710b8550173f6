//! Configuration schema types.
//!
//! These types are deserialized from the optional YAML configuration file.
//! Every field has a default, so an empty mapping is a complete
//! configuration targeting Sepolia and the deployed game contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Address;
use crate::wallet::{ChainParams, NativeCurrency, NetworkTarget};

/// Address of the deployed game contract on Sepolia.
pub const DEFAULT_CONTRACT: Address = Address::new([
    0x4e, 0xc9, 0x98, 0x67, 0x25, 0x0a, 0x37, 0x7b, 0x4c, 0xc0, 0x7a, 0x69, 0x89, 0xcc, 0xc6,
    0x64, 0xae, 0xa9, 0x35, 0xd3,
]);

/// Sepolia chain id.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Chain and endpoint settings
    pub network: NetworkConfig,

    /// Game contract settings
    pub contract: ContractConfig,

    /// Polling and transaction settings
    pub client: ClientSettings,
}

impl ClientConfig {
    /// Chain the client must be connected to, with the parameters used to
    /// add it to a wallet that does not know it.
    #[must_use]
    pub fn network_target(&self) -> NetworkTarget {
        let network = &self.network;
        NetworkTarget {
            chain_id: network.chain_id,
            params: ChainParams {
                chain_id: crate::types::format_quantity(network.chain_id),
                chain_name: network.chain_name.clone(),
                native_currency: network.native_currency.clone(),
                rpc_urls: vec![network.rpc_url.clone()],
                block_explorer_urls: network.explorer_url.iter().cloned().collect(),
            },
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Chain and endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the wallet or signing node
    pub rpc_url: String,

    /// Expected chain id
    pub chain_id: u64,

    /// Human-readable chain name, used when adding the chain
    pub chain_name: String,

    /// Block explorer base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,

    /// Native currency, used when adding the chain
    pub native_currency: NativeCurrency,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: SEPOLIA_CHAIN_ID,
            chain_name: "Sepolia Test Network".to_string(),
            explorer_url: Some("https://sepolia.etherscan.io/".to_string()),
            native_currency: NativeCurrency::default(),
        }
    }
}

/// Game contract settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractConfig {
    /// Contract address
    pub address: Address,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_CONTRACT,
        }
    }
}

/// Polling and transaction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSettings {
    /// State refresh period
    #[serde(with = "humantime_duration")]
    pub poll_interval: Duration,

    /// Log watcher period
    #[serde(with = "humantime_duration")]
    pub event_poll_interval: Duration,

    /// Receipt polling period while a transaction is pending
    #[serde(with = "humantime_duration")]
    pub receipt_poll_interval: Duration,

    /// How long to wait for a transaction to be included
    #[serde(with = "humantime_duration")]
    pub tx_timeout: Duration,

    /// Per-request JSON-RPC timeout
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    /// Account to use when the endpoint exposes several
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,

    /// Whether `watch` follows contract events between polls
    pub watch_events: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            event_poll_interval: Duration::from_secs(2),
            receipt_poll_interval: Duration::from_secs(1),
            tx_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(10),
            account: None,
            watch_events: true,
        }
    }
}

/// Serde adapter for human-readable durations (`1s`, `2m 30s`).
pub mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes as a humantime string.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    /// Deserializes from a humantime string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
