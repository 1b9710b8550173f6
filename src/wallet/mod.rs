//! Wallet capability.
//!
//! [`WalletProvider`] is the narrow surface the client needs from a wallet:
//! account discovery, chain selection, read calls, transaction submission
//! and receipt/log queries. The transaction signer lives behind the provider,
//! so nothing here handles keys. Tests substitute an in-memory provider.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConnectError, ProviderError};
use crate::types::{Address, Log, TxHash, TxReceipt, hex_bytes, opt_quantity, quantity};

/// EIP-1193 code for a request the user declined in the wallet.
pub const USER_REJECTED: i64 = 4001;

/// EIP-1193 code for a provider that does not support the method.
pub const UNSUPPORTED_METHOD: i64 = 4200;

/// Code returned by `wallet_switchEthereumChain` for an unknown chain.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A read-only `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    /// Caller, for calls whose result depends on `msg.sender`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Contract address
    pub to: Address,
    /// Calldata
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// A state-changing transaction for the wallet to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    /// Sending account
    pub from: Address,
    /// Contract address
    pub to: Address,
    /// Calldata
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl From<&TransactionRequest> for CallRequest {
    fn from(tx: &TransactionRequest) -> Self {
        Self {
            from: Some(tx.from),
            to: tx.to,
            data: tx.data.clone(),
        }
    }
}

/// `eth_getLogs` filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    /// Emitting contract
    pub address: Address,
    /// First block, inclusive
    #[serde(with = "quantity")]
    pub from_block: u64,
    /// Last block, inclusive; `None` for latest
    #[serde(with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
}

/// Native currency description for `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self {
            name: "ETH".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

/// Chain description for `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    /// Hex chain id, e.g. `0xaa36a7`
    pub chain_id: String,
    /// Display name
    pub chain_name: String,
    /// Native currency
    pub native_currency: NativeCurrency,
    /// RPC endpoints
    pub rpc_urls: Vec<String>,
    /// Block explorer URLs
    pub block_explorer_urls: Vec<String>,
}

/// Wallet and chain access.
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the wallet for its accounts, prompting if needed.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Returns the chain id the wallet is on.
    async fn chain_id(&self) -> Result<u64>;

    /// Asks the wallet to switch chains.
    async fn switch_chain(&self, chain_id: u64) -> Result<()>;

    /// Asks the wallet to add a chain it does not know.
    async fn add_chain(&self, params: &ChainParams) -> Result<()>;

    /// Executes a read-only call against the latest block.
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>>;

    /// Submits a transaction for signing and broadcast.
    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash>;

    /// Returns the receipt, or `None` while the transaction is pending.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>>;

    /// Returns the latest block number.
    async fn block_number(&self) -> Result<u64>;

    /// Returns logs matching the filter.
    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;
}

/// Target network for [`connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTarget {
    /// Required chain id
    pub chain_id: u64,
    /// Parameters offered to the wallet if it does not know the chain
    pub params: ChainParams,
}

/// Outcome of a successful [`connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Account used for state-changing calls
    pub account: Address,
    /// Chain the wallet is on
    pub chain_id: u64,
}

/// Connects to the wallet: picks an account and makes sure the wallet is on
/// the target chain.
///
/// A `preferred` account is used if the wallet exposes it; otherwise the
/// first account is used.
///
/// # Errors
///
/// Returns [`ConnectError::NoAccounts`] if the wallet exposes no accounts,
/// [`ConnectError::ChainMismatch`] if the wallet stays on another chain, or
/// the underlying provider error.
pub async fn connect(
    provider: &dyn WalletProvider,
    network: &NetworkTarget,
    preferred: Option<Address>,
) -> std::result::Result<Connection, ConnectError> {
    let accounts = provider.request_accounts().await?;
    let account = match preferred {
        Some(wanted) if accounts.contains(&wanted) => wanted,
        Some(wanted) => {
            warn!(account = %wanted, "configured account not exposed by wallet, using first account");
            *accounts.first().ok_or(ConnectError::NoAccounts)?
        }
        None => *accounts.first().ok_or(ConnectError::NoAccounts)?,
    };

    let chain_id = ensure_chain(provider, network).await?;
    info!(account = %account, chain_id, "wallet connected");
    Ok(Connection { account, chain_id })
}

/// Makes sure the wallet is on `network.chain_id`, switching (and adding the
/// chain if the wallet does not know it) when necessary.
///
/// # Errors
///
/// Returns [`ConnectError::ChainMismatch`] if the wallet is still on another
/// chain afterwards, or the provider error from switching.
pub async fn ensure_chain(
    provider: &dyn WalletProvider,
    network: &NetworkTarget,
) -> std::result::Result<u64, ConnectError> {
    let current = provider.chain_id().await?;
    if current == network.chain_id {
        return Ok(current);
    }

    debug!(current, expected = network.chain_id, "switching chain");
    match provider.switch_chain(network.chain_id).await {
        Ok(()) => {}
        Err(e) if e.rpc_code() == Some(UNRECOGNIZED_CHAIN) => {
            info!(chain = %network.params.chain_name, "wallet does not know chain, adding it");
            provider.add_chain(&network.params).await?;
            provider.switch_chain(network.chain_id).await?;
        }
        Err(e) => return Err(e.into()),
    }

    let actual = provider.chain_id().await?;
    if actual == network.chain_id {
        Ok(actual)
    } else {
        Err(ConnectError::ChainMismatch {
            expected: network.chain_id,
            actual,
        })
    }
}
