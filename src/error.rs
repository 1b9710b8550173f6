//! Error types for `fheguess`
//!
//! One enum per layer (configuration, provider transport, wallet connection,
//! contract calls, reconciliation) plus a top-level error that maps every
//! failure onto a process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::gate::{ActionKind, GateDenial};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `fheguess` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (RPC endpoint unreachable, wallet declined, timeout)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// The contract rejected the request
    pub const REMOTE_REJECTED: i32 = 5;

    /// The action was refused locally before contacting the contract
    pub const ACTION_DENIED: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `fheguess` operations.
#[derive(Debug, Error)]
pub enum FheGuessError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// JSON-RPC provider error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Wallet connection error
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Contract call error
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// State refresh error
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Action submission error
    #[error(transparent)]
    Action(#[from] ActionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid invocation
    #[error("usage error: {0}")]
    Usage(String),
}

impl FheGuessError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Provider(_) | Self::Connect(_) | Self::Refresh(_) => ExitCode::TRANSPORT_ERROR,
            Self::Contract(ContractError::Reverted(_)) => ExitCode::REMOTE_REJECTED,
            Self::Contract(_) => ExitCode::TRANSPORT_ERROR,
            Self::Action(err) => err.exit_code(),
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file (or `<command line>`)
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message supplied with `${VAR:?message}`
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "client.poll_interval")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Informational; the configuration still loads
    Warning,
}

// ============================================================================
// Provider Errors
// ============================================================================

/// Errors from the JSON-RPC endpoint standing in for the wallet.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The endpoint answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC or EIP-1193 error code
        code: i64,
        /// Error message
        message: String,
        /// Optional error data (revert data for reverted calls)
        data: Option<serde_json::Value>,
    },

    /// Could not reach the endpoint
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint answered with a non-2xx status
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The request did not complete in time
    #[error("timeout: {0}")]
    Timeout(String),

    /// The response could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Returns the JSON-RPC error code, if this is an RPC error.
    #[must_use]
    pub const fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Extracts raw revert data from the error payload.
    ///
    /// Nodes disagree on the shape: geth puts a hex string directly in
    /// `data`, others nest it as `data.data`.
    #[must_use]
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        let Self::Rpc {
            data: Some(data), ..
        } = self
        else {
            return None;
        };
        let hex = data
            .as_str()
            .or_else(|| data.get("data").and_then(serde_json::Value::as_str))?;
        crate::types::decode_hex(hex).ok()
    }
}

/// Wallet connection errors.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The wallet exposed no accounts
    #[error("wallet returned no accounts")]
    NoAccounts,

    /// The wallet stayed on the wrong chain
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    ChainMismatch {
        /// Configured chain id
        expected: u64,
        /// Chain id reported by the wallet
        actual: u64,
    },

    /// Underlying provider failure
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

// ============================================================================
// Contract Errors
// ============================================================================

/// ABI decoding errors for contract return data and logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    /// Return data shorter than the expected number of words
    #[error("return data too short: expected {expected} bytes, got {actual}")]
    ShortData {
        /// Minimum length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// A `bool` word was neither 0 nor 1
    #[error("word {0} is not a canonical bool")]
    InvalidBool(usize),

    /// An integer word does not fit the target type
    #[error("word {index} overflows {ty}")]
    Overflow {
        /// Word index
        index: usize,
        /// Target type name
        ty: &'static str,
    },

    /// An address word has non-zero padding
    #[error("word {0} is not a valid address")]
    InvalidAddress(usize),

    /// A log has fewer topics than its event signature requires
    #[error("log has {actual} topics, expected {expected}")]
    MissingTopics {
        /// Required topic count
        expected: usize,
        /// Actual topic count
        actual: usize,
    },
}

/// Errors from calls against the game contract.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The contract's own validation declined the call
    #[error("reverted: {0}")]
    Reverted(String),

    /// The call could not be completed or confirmed
    #[error("transport failure: {0}")]
    Transport(String),

    /// The contract answered with data that could not be decoded
    #[error("decode failure: {0}")]
    Decode(String),

    /// A state-changing call was attempted without a connected account
    #[error("no account connected")]
    NoAccount,
}

impl From<AbiError> for ContractError {
    fn from(err: AbiError) -> Self {
        Self::Decode(err.to_string())
    }
}

// ============================================================================
// Reconciler Errors
// ============================================================================

/// Failure of a `refresh()` round trip.
///
/// On any variant the previously applied snapshot stays in place.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// One of the reads failed
    #[error("refresh failed: {0}")]
    Remote(#[from] ContractError),

    /// The reconciler was shut down before the result arrived
    #[error("refresh discarded: reconciler shut down")]
    Cancelled,
}

/// Failure of a `submit()` call.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The advisory gate refused the action; nothing was sent
    #[error("{action} not permitted: {reason}")]
    NotPermittedLocally {
        /// The refused action
        action: ActionKind,
        /// Why the gate refused it
        reason: GateDenial,
    },

    /// Another action from this client is still pending
    #[error("another action is already in progress")]
    AlreadyInProgress,

    /// The contract declined the action
    #[error("rejected by contract: {0}")]
    RemoteRejected(String),

    /// The action could not be sent or confirmed
    #[error("transaction failed: {0}")]
    TransportFailed(String),

    /// The reconciler was shut down while the action was pending
    #[error("client shut down before the action completed")]
    Cancelled,
}

impl ActionError {
    /// Returns the exit code for this action failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotPermittedLocally { .. } | Self::AlreadyInProgress => ExitCode::ACTION_DENIED,
            Self::RemoteRejected(_) => ExitCode::REMOTE_REJECTED,
            Self::TransportFailed(_) => ExitCode::TRANSPORT_ERROR,
            Self::Cancelled => ExitCode::INTERRUPTED,
        }
    }

    /// Returns `true` when the failure was decided without a remote call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::NotPermittedLocally { .. } | Self::AlreadyInProgress)
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `fheguess` operations.
pub type Result<T> = std::result::Result<T, FheGuessError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::GamePhase;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::TRANSPORT_ERROR, 4);
        assert_eq!(ExitCode::REMOTE_REJECTED, 5);
        assert_eq!(ExitCode::ACTION_DENIED, 6);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_local_action_errors_map_to_denied() {
        let err: FheGuessError = ActionError::AlreadyInProgress.into();
        assert_eq!(err.exit_code(), ExitCode::ACTION_DENIED);

        let err: FheGuessError = ActionError::NotPermittedLocally {
            action: ActionKind::RevealResult,
            reason: GateDenial::WrongWindow {
                required: GamePhase::EvenRevealWindow,
            },
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::ACTION_DENIED);
    }

    #[test]
    fn test_remote_rejection_exit_code() {
        let err: FheGuessError = ActionError::RemoteRejected("out of range".into()).into();
        assert_eq!(err.exit_code(), ExitCode::REMOTE_REJECTED);

        let err: FheGuessError = ContractError::Reverted("Already guessed".into()).into();
        assert_eq!(err.exit_code(), ExitCode::REMOTE_REJECTED);
    }

    #[test]
    fn test_transport_exit_codes() {
        let err: FheGuessError = ProviderError::Timeout("eth_call".into()).into();
        assert_eq!(err.exit_code(), ExitCode::TRANSPORT_ERROR);

        let err: FheGuessError = RefreshError::Remote(ContractError::Transport("down".into())).into();
        assert_eq!(err.exit_code(), ExitCode::TRANSPORT_ERROR);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: FheGuessError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_action_error_locality() {
        assert!(ActionError::AlreadyInProgress.is_local());
        assert!(!ActionError::RemoteRejected("x".into()).is_local());
        assert!(!ActionError::TransportFailed("x".into()).is_local());
    }

    #[test]
    fn test_revert_data_flat_and_nested() {
        let flat = ProviderError::Rpc {
            code: 3,
            message: "execution reverted".into(),
            data: Some(serde_json::json!("0x08c379a0")),
        };
        assert_eq!(flat.revert_data(), Some(vec![0x08, 0xc3, 0x79, 0xa0]));

        let nested = ProviderError::Rpc {
            code: -32603,
            message: "internal".into(),
            data: Some(serde_json::json!({ "data": "0xdead" })),
        };
        assert_eq!(nested.revert_data(), Some(vec![0xde, 0xad]));

        assert_eq!(ProviderError::HttpStatus(502).revert_data(), None);
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "client.poll_interval".to_string(),
            message: "must be greater than zero".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: must be greater than zero at client.poll_interval"
        );
    }

    #[test]
    fn test_config_error_env_var_display() {
        let err = ConfigError::EnvVarNotSet {
            var: "FHEGUESS_RPC_URL".to_string(),
            location: "rpc endpoint required".to_string(),
        };
        assert!(err.to_string().contains("FHEGUESS_RPC_URL"));
        assert!(err.to_string().contains("rpc endpoint required"));
    }
}
