//! `status`: one refresh, rendered once.

use tracing::warn;

use crate::cli::args::{ConnectionArgs, StatusArgs};
use crate::cli::commands::{AccountMode, Session, emit};
use crate::contract::GameContract;
use crate::error::FheGuessError;
use crate::render::StatusReport;

/// Refreshes the game state and prints the status panel.
///
/// Also reads the contract's own hour so a disagreement with the local
/// clock is visible.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the refresh fails.
pub async fn run(connection: &ConnectionArgs, args: &StatusArgs) -> Result<(), FheGuessError> {
    let session = Session::open(connection, AccountMode::Optional).await?;
    let reconciler = session.reconciler();

    let (snapshot, contract_hour) =
        tokio::join!(reconciler.refresh(), session.contract.current_hour());
    let snapshot = snapshot?;
    let contract_hour = contract_hour
        .inspect_err(|e| warn!(error = %e, "could not read contract hour"))
        .ok();

    let report = StatusReport::new(
        reconciler.reading(),
        session.contract.address(),
        session.account,
        Some(&snapshot),
        contract_hour,
    );
    if report.hour_mismatch() {
        warn!(
            local = report.clock.hour,
            contract = ?report.contract_hour,
            "contract hour differs from local UTC+3 hour"
        );
    }
    emit(args.format, || report.render(), &report)
}
