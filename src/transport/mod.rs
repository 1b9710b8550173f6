//! JSON-RPC transport to the chain.
//!
//! [`HttpProvider`] is the production [`WalletProvider`](crate::wallet::WalletProvider):
//! JSON-RPC 2.0 over HTTP POST against a node or wallet endpoint.

pub mod http;
pub mod jsonrpc;

pub use http::HttpProvider;
pub use jsonrpc::{JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
