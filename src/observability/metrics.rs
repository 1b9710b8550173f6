//! Prometheus metrics for `fheguess`.
//!
//! Labels only ever take values from closed sets (action kinds, outcomes,
//! event names), so cardinality is bounded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::FheGuessError;
use crate::gate::ActionKind;
use crate::snapshot::GameSnapshot;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `FheGuessError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), FheGuessError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| FheGuessError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "fheguess_refreshes_total",
        "State refreshes by result (applied, unchanged, failed, discarded)"
    );
    describe_histogram!(
        "fheguess_refresh_duration_ms",
        "Refresh round-trip duration in milliseconds"
    );
    describe_counter!(
        "fheguess_actions_total",
        "Actions by kind and outcome"
    );
    describe_histogram!(
        "fheguess_action_duration_ms",
        "Time from submission to outcome in milliseconds"
    );
    describe_counter!(
        "fheguess_contract_events_total",
        "Contract events observed by the log watcher"
    );
    describe_gauge!("fheguess_round_id", "Current round number");
    describe_gauge!("fheguess_round_players", "Guesses received in the current round");
    describe_gauge!(
        "fheguess_round_open",
        "1 while the current round has a secret and has not ended"
    );
}

/// Records a refresh result.
pub fn record_refresh(result: &'static str, duration: Duration) {
    counter!("fheguess_refreshes_total", "result" => result).increment(1);
    histogram!("fheguess_refresh_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Records an action outcome.
pub fn record_action(kind: ActionKind, outcome: &'static str, duration: Duration) {
    counter!(
        "fheguess_actions_total",
        "action" => kind.as_str(),
        "outcome" => outcome,
    )
    .increment(1);
    histogram!("fheguess_action_duration_ms", "action" => kind.as_str())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Records an observed contract event.
pub fn record_contract_event(name: &'static str) {
    counter!("fheguess_contract_events_total", "event" => name).increment(1);
}

/// Updates the round gauges from a freshly applied snapshot.
#[allow(clippy::cast_precision_loss)]
pub fn set_round_gauges(snapshot: &GameSnapshot) {
    gauge!("fheguess_round_id").set(f64::from(snapshot.round.round_id));
    gauge!("fheguess_round_players").set(snapshot.round.player_count as f64);
    gauge!("fheguess_round_open").set(if snapshot.round.is_open() { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RoundSnapshot, WindowFlags};

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_refresh("applied", Duration::from_millis(42));
        record_action(ActionKind::SubmitGuess, "accepted", Duration::from_secs(3));
        record_contract_event("RoundStarted");
        set_round_gauges(&GameSnapshot {
            round: RoundSnapshot {
                round_id: 1,
                number_generated: true,
                round_ended: false,
                start_time: 0,
                player_count: 2,
            },
            player: None,
            flags: WindowFlags::default(),
        });
    }
}
