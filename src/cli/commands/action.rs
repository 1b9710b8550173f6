//! `guess`, `start-round` and `reveal`.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{ConnectionArgs, OutputFormat};
use crate::cli::commands::{AccountMode, Session, print_json};
use crate::error::{ActionError, FheGuessError};
use crate::gate::{Action, ActionKind};
use crate::render::{action_message, status_message};
use crate::snapshot::GameSnapshot;
use crate::types::TxHash;

#[derive(Debug, Serialize)]
struct ActionReport {
    action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    guess: Option<u8>,
    outcome: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<GameSnapshot>,
}

fn outcome(result: &Result<crate::reconciler::Accepted, ActionError>) -> &'static str {
    match result {
        Ok(_) => "accepted",
        Err(ActionError::NotPermittedLocally { .. }) => "not_permitted",
        Err(ActionError::AlreadyInProgress) => "already_in_progress",
        Err(ActionError::RemoteRejected(_)) => "remote_rejected",
        Err(ActionError::TransportFailed(_)) => "transport_failed",
        Err(ActionError::Cancelled) => "cancelled",
    }
}

/// Loads the current state, then submits `action` through the reconciler.
///
/// The gate sees a fresh snapshot, so a locally refused action never
/// reaches the wallet.
///
/// # Errors
///
/// Returns the action error (mapped to its exit code) or a session/refresh
/// error.
pub async fn run(
    connection: &ConnectionArgs,
    action: Action,
    format: OutputFormat,
    cancel: CancellationToken,
) -> Result<(), FheGuessError> {
    let session = Session::open(connection, AccountMode::Required).await?;
    let reconciler = session.reconciler().with_cancellation(cancel);
    reconciler.refresh().await?;

    let result = reconciler.submit(action).await;
    let message = action_message(action, &result);

    let report = ActionReport {
        action: action.kind(),
        guess: action.guess(),
        outcome: outcome(&result),
        message: message.clone(),
        tx_hash: result.as_ref().ok().map(|a| a.receipt.transaction_hash),
        block_number: result.as_ref().ok().map(|a| a.receipt.block_number),
        snapshot: reconciler.snapshot().map(|s| *s),
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Human => {
            println!("{message}");
            if let Some(hash) = report.tx_hash {
                println!("> Transaction: {hash}");
            }
            if result.is_ok() {
                let snapshot = reconciler.snapshot();
                println!(
                    "> Status: {}",
                    status_message(
                        reconciler.reading().phase,
                        snapshot.as_deref(),
                        reconciler.account().is_some()
                    )
                );
            }
        }
    }

    result.map(|_| ()).map_err(FheGuessError::from)
}
