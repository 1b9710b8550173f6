//! `clock`: the game clock without any network access.

use chrono::Utc;

use crate::cli::args::ClockArgs;
use crate::cli::commands::emit;
use crate::clock::ClockReading;
use crate::error::FheGuessError;

/// Prints the UTC+3 time, the active window and the countdown.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn run(args: &ClockArgs) -> Result<(), FheGuessError> {
    let reading = args
        .at
        .map_or_else(|| ClockReading::at(&Utc::now()), |at| ClockReading::at(&at));
    emit(
        args.format,
        || {
            format!(
                "> Current UTC+3 Time: {}\n> Current Hour: {}:00 ({})\n> Time until next hour: {}\n",
                reading.at.format("%Y-%m-%d %H:%M:%S"),
                reading.hour,
                reading.phase.label(),
                reading.remaining_display()
            )
        },
        &reading,
    )
}
