//! Configuration validation.
//!
//! Runs on the fully deserialized [`ClientConfig`] and collects every
//! issue instead of stopping at the first one.

use std::time::Duration;

use crate::config::schema::ClientConfig;
use crate::error::{Severity, ValidationIssue};

/// Refresh periods below this hammer the endpoint.
const MIN_SENSIBLE_POLL: Duration = Duration::from_millis(250);

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(&mut self, config: &ClientConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_network(config);
        self.validate_contract(config);
        self.validate_client(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_network(&mut self, config: &ClientConfig) {
        let network = &config.network;
        match reqwest::Url::parse(&network.rpc_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => self.add_error(
                "network.rpc_url",
                &format!("unsupported scheme '{}', expected http or https", url.scheme()),
            ),
            Err(e) => self.add_error("network.rpc_url", &format!("invalid URL: {e}")),
        }

        if network.chain_id == 0 {
            self.add_error("network.chain_id", "chain id must be non-zero");
        }
        if network.chain_name.trim().is_empty() {
            self.add_warning(
                "network.chain_name",
                "empty chain name; wallets may refuse to add the chain",
            );
        }
        if let Some(explorer) = &network.explorer_url {
            if reqwest::Url::parse(explorer).is_err() {
                self.add_error("network.explorer_url", "invalid URL");
            }
        }
        if network.native_currency.symbol.is_empty() {
            self.add_warning("network.native_currency.symbol", "empty currency symbol");
        }
    }

    fn validate_contract(&mut self, config: &ClientConfig) {
        if config.contract.address.is_zero() {
            self.add_error("contract.address", "contract address is the zero address");
        }
    }

    fn validate_client(&mut self, config: &ClientConfig) {
        let client = &config.client;
        let durations = [
            ("client.poll_interval", client.poll_interval),
            ("client.event_poll_interval", client.event_poll_interval),
            ("client.receipt_poll_interval", client.receipt_poll_interval),
            ("client.tx_timeout", client.tx_timeout),
            ("client.request_timeout", client.request_timeout),
        ];
        for (path, value) in durations {
            if value.is_zero() {
                self.add_error(path, "must be greater than zero");
            }
        }

        if !client.poll_interval.is_zero() && client.poll_interval < MIN_SENSIBLE_POLL {
            self.add_warning(
                "client.poll_interval",
                "refreshing more than four times a second issues many RPC calls",
            );
        }
        if !client.tx_timeout.is_zero() && client.tx_timeout < client.receipt_poll_interval {
            self.add_error(
                "client.tx_timeout",
                "must be at least client.receipt_poll_interval",
            );
        }
        if client.account.is_some_and(|a| a.is_zero()) {
            self.add_error("client.account", "account is the zero address");
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
