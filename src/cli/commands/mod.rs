//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod action;
pub mod clock;
pub mod completions;
pub mod history;
pub mod status;
pub mod validate;
pub mod version;
pub mod watch;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, ConnectionArgs, OutputFormat};
use crate::clock::SystemClock;
use crate::config::{ClientConfig, ConfigLoader, LoaderOptions};
use crate::contract::{FheGuessContract, ReceiptPolicy};
use crate::error::{ConnectError, FheGuessError};
use crate::gate::Action;
use crate::reconciler::Reconciler;
use crate::transport::HttpProvider;
use crate::types::Address;
use crate::wallet::{self, WalletProvider};

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), FheGuessError> {
    let connection = cli.connection;
    match cli.command {
        Commands::Status(args) => status::run(&connection, &args).await,
        Commands::Watch(args) => watch::run(&connection, &args, cancel).await,
        Commands::Guess(args) => {
            action::run(&connection, Action::SubmitGuess(args.number), args.format, cancel).await
        }
        Commands::StartRound(args) => {
            action::run(&connection, Action::StartRound, args.format, cancel).await
        }
        Commands::Reveal(args) => {
            action::run(&connection, Action::RevealResult, args.format, cancel).await
        }
        Commands::History(args) => history::run(&connection, &args).await,
        Commands::Clock(args) => clock::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Whether a command can run without a wallet account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountMode {
    /// Read-only commands fall back to no account.
    Optional,
    /// State-changing commands fail without one.
    Required,
}

/// Everything a contract-facing command needs.
pub struct Session {
    /// Effective configuration
    pub config: Arc<ClientConfig>,
    /// JSON-RPC endpoint
    pub provider: Arc<dyn WalletProvider>,
    /// Contract binding
    pub contract: Arc<FheGuessContract>,
    /// Connected account
    pub account: Option<Address>,
}

impl Session {
    /// Loads configuration, connects the wallet and binds the contract.
    ///
    /// # Errors
    ///
    /// Returns a config error, a provider error, or a connection error. With
    /// [`AccountMode::Optional`] a wallet that exposes no accounts is not an
    /// error.
    pub async fn open(args: &ConnectionArgs, mode: AccountMode) -> Result<Self, FheGuessError> {
        let config = load_config(args)?;

        let provider: Arc<dyn WalletProvider> = Arc::new(HttpProvider::new(
            config.network.rpc_url.clone(),
            config.client.request_timeout,
        )?);

        let target = config.network_target();
        let account = match wallet::connect(provider.as_ref(), &target, config.client.account).await
        {
            Ok(connection) => Some(connection.account),
            Err(ConnectError::NoAccounts) if mode == AccountMode::Optional => {
                tracing::info!("wallet exposes no accounts, continuing read-only");
                wallet::ensure_chain(provider.as_ref(), &target).await?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        let contract = FheGuessContract::new(Arc::clone(&provider), config.contract.address, account)
            .with_receipt_policy(ReceiptPolicy {
                poll_interval: config.client.receipt_poll_interval,
                timeout: config.client.tx_timeout,
            });

        Ok(Self {
            config,
            provider,
            contract: Arc::new(contract),
            account,
        })
    }

    /// Builds a reconciler over this session's contract and the system clock.
    #[must_use]
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.contract) as Arc<dyn crate::contract::GameContract>,
            Arc::new(SystemClock),
            self.account,
        )
    }
}

/// Loads the configuration named by `--config` (or defaults) with the
/// command-line overrides applied, logging any warnings.
///
/// # Errors
///
/// Returns the loader's error.
pub fn load_config(args: &ConnectionArgs) -> Result<Arc<ClientConfig>, FheGuessError> {
    let loader = ConfigLoader::new(LoaderOptions {
        overrides: args.overrides(),
        ..LoaderOptions::default()
    });
    if let Some(path) = &args.config {
        tracing::info!(config = %path.display(), "loading configuration");
    }
    let load_result = loader.load_or_default(args.config.as_deref())?;

    for warning in &load_result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(load_result.config)
}

/// Prints a serializable value as pretty JSON on stdout.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), FheGuessError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints `human` or the JSON form of `value`, depending on `format`.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn emit<T: serde::Serialize>(
    format: OutputFormat,
    human: impl FnOnce() -> String,
    value: &T,
) -> Result<(), FheGuessError> {
    match format {
        OutputFormat::Human => {
            print!("{}", human());
            Ok(())
        }
        OutputFormat::Json => print_json(value),
    }
}
