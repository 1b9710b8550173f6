//! HTTP JSON-RPC provider.
//!
//! Implements [`WalletProvider`] by POSTing JSON-RPC 2.0 requests to a node
//! or wallet endpoint with `reqwest`. The endpoint signs transactions itself
//! (`eth_sendTransaction`), so this client never touches private keys.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::redirect;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse, error_codes};
use crate::error::ProviderError;
use crate::types::{Address, Log, TxHash, TxReceipt, decode_hex, format_quantity, parse_quantity};
use crate::wallet::{
    CallRequest, ChainParams, LogFilter, Result, TransactionRequest, UNSUPPORTED_METHOD,
    WalletProvider,
};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted response body size (4 MB).
pub const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

/// JSON-RPC over HTTP.
#[derive(Debug)]
pub struct HttpProvider {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpProvider {
    /// Creates a provider for `url`.
    ///
    /// Redirects are not followed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ConnectionFailed`] if the HTTP client cannot
    /// be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> std::result::Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one request and returns the raw result value.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] on network failure, non-2xx status,
    /// timeout, an unparseable body or a JSON-RPC error object.
    pub async fn request_raw(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        trace!(id, method, "sending JSON-RPC request");

        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(&self.url).json(&request).send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout(method.to_string()))?
        .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }

        let bytes = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| ProviderError::Timeout(method.to_string()))?
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(ProviderError::InvalidResponse(format!(
                "response body exceeds {MAX_RESPONSE_SIZE} byte limit"
            )));
        }

        let response: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let result = response.into_result();
        if let Err(ref e) = result {
            debug!(id, method, error = %e, "JSON-RPC request failed");
        }
        result
    }

    /// Sends one request and decodes the result into `T`.
    ///
    /// # Errors
    ///
    /// As [`request_raw`](Self::request_raw), plus
    /// [`ProviderError::InvalidResponse`] if the result does not decode.
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.request_raw(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("{method}: {e}")))
    }

    async fn quantity(&self, method: &str) -> Result<u64> {
        let hex: String = self.request(method, json!([])).await?;
        parse_quantity(&hex).map_err(|e| ProviderError::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait::async_trait]
impl WalletProvider for HttpProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        match self.request("eth_requestAccounts", json!([])).await {
            Err(e)
                if matches!(
                    e.rpc_code(),
                    Some(error_codes::METHOD_NOT_FOUND | UNSUPPORTED_METHOD)
                ) =>
            {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.request("eth_accounts", json!([])).await
            }
            other => other,
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        self.quantity("eth_chainId").await
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        self.request_raw(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format_quantity(chain_id) }]),
        )
        .await
        .map(|_| ())
    }

    async fn add_chain(&self, params: &ChainParams) -> Result<()> {
        self.request_raw("wallet_addEthereumChain", json!([params]))
            .await
            .map(|_| ())
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>> {
        let hex: String = self.request("eth_call", json!([request, "latest"])).await?;
        decode_hex(&hex).map_err(|e| ProviderError::InvalidResponse(format!("eth_call: {e}")))
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash> {
        self.request("eth_sendTransaction", json!([request])).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }

    async fn block_number(&self) -> Result<u64> {
        self.quantity("eth_blockNumber").await
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        self.request("eth_getLogs", json!([filter])).await
    }
}
