//! `history`: look up a finished (or running) round.

use crate::cli::args::{ConnectionArgs, HistoryArgs};
use crate::cli::commands::{AccountMode, Session, emit};
use crate::contract::GameContract;
use crate::error::FheGuessError;
use crate::render::render_round_record;

/// Prints the record for the requested round, or the current one.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the lookup fails.
pub async fn run(connection: &ConnectionArgs, args: &HistoryArgs) -> Result<(), FheGuessError> {
    let session = Session::open(connection, AccountMode::Optional).await?;
    let round = match args.round {
        Some(round) => round,
        None => session.contract.current_round().await?,
    };
    let record = session.contract.round_history(round).await?;
    emit(args.format, || render_round_record(&record), &record)
}
