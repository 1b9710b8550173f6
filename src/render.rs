//! Terminal rendering of the game view.
//!
//! Everything here is a pure function of a clock reading, a snapshot and
//! the gate's output; nothing reads the network or the clock itself.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::{ClockReading, GamePhase};
use crate::error::ActionError;
use crate::gate::{Action, ActionKind, GateDenial, GateInputs, PermittedActions};
use crate::reconciler::Accepted;
use crate::snapshot::{GameSnapshot, RoundRecord};
use crate::types::Address;

/// Shown when no wallet account is connected.
pub const MSG_CONNECT: &str = "Connect wallet to start playing!";
/// Odd window, no secret yet.
pub const MSG_ODD_START: &str = "Odd hour! New round can be started!";
/// Odd window, contract accepting guesses.
pub const MSG_GUESS_TIME: &str = "Guess time! Submit your prediction!";
/// Even window, contract accepting reveals.
pub const MSG_REVEAL_TIME: &str = "Even hour! Results can be revealed!";
/// Round closed.
pub const MSG_ROUND_ENDED: &str = "Round ended! Waiting for next odd hour...";
/// Nothing else applies.
pub const MSG_WAITING: &str = "Waiting for next round...";

/// One-line status for the panel. The first matching rule wins.
#[must_use]
pub fn status_message(
    phase: GamePhase,
    snapshot: Option<&GameSnapshot>,
    connected: bool,
) -> &'static str {
    if !connected {
        return MSG_CONNECT;
    }
    let Some(snapshot) = snapshot else {
        return MSG_WAITING;
    };
    if phase.is_odd() && !snapshot.round.number_generated {
        MSG_ODD_START
    } else if phase.is_odd() && snapshot.flags.guess_active {
        MSG_GUESS_TIME
    } else if !phase.is_odd() && snapshot.flags.reveal_active {
        MSG_REVEAL_TIME
    } else if snapshot.round.round_ended {
        MSG_ROUND_ENDED
    } else {
        MSG_WAITING
    }
}

/// User-facing message for the outcome of an action.
#[must_use]
pub fn action_message(action: Action, result: &Result<Accepted, ActionError>) -> String {
    match (result, action) {
        (Ok(_), Action::SubmitGuess(n)) => format!("Guess {n} submitted successfully!"),
        (Ok(_), Action::StartRound) => "New round started!".to_string(),
        (Ok(_), Action::RevealResult) => {
            "Result reveal requested! Wait for decryption oracle...".to_string()
        }
        (Err(ActionError::AlreadyInProgress), _) => {
            "Another transaction is still pending, wait for it to finish.".to_string()
        }
        (Err(ActionError::NotPermittedLocally { reason, .. }), _) => denial_message(action, *reason),
        (Err(ActionError::RemoteRejected(reason)), _) => {
            format!("{} rejected by contract: {reason}", verb(action.kind()))
        }
        (Err(ActionError::TransportFailed(detail)), _) => {
            format!("Failed to {}: {detail}", verb(action.kind()).to_lowercase())
        }
        (Err(ActionError::Cancelled), _) => "Cancelled before the transaction completed.".to_string(),
    }
}

fn verb(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::StartRound => "Start round",
        ActionKind::SubmitGuess => "Submit guess",
        ActionKind::RevealResult => "Reveal result",
    }
}

fn denial_message(action: Action, reason: GateDenial) -> String {
    match (action.kind(), reason) {
        (_, GateDenial::NotConnected) => "Please connect wallet first!".to_string(),
        (ActionKind::SubmitGuess, GateDenial::AlreadyGuessed) => {
            "You already guessed this round!".to_string()
        }
        (ActionKind::SubmitGuess, GateDenial::WrongWindow { .. } | GateDenial::ClosedRemotely) => {
            "Guess time is not active!".to_string()
        }
        (ActionKind::RevealResult, GateDenial::WrongWindow { .. } | GateDenial::ClosedRemotely) => {
            "Reveal time is not active!".to_string()
        }
        (kind, reason) => format!("{} not available: {reason}", verb(kind)),
    }
}

/// Everything `status` shows, in a form that serializes to JSON.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Derived clock state
    pub clock: ClockReading,
    /// Game contract
    pub contract: Address,
    /// Connected account
    pub account: Option<Address>,
    /// Latest snapshot
    pub snapshot: Option<GameSnapshot>,
    /// Actions the gate offers
    pub permitted: PermittedActions,
    /// Status line
    pub status: &'static str,
    /// Hour reported by `getCurrentHourUTC3()`, when fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_hour: Option<u32>,
}

impl StatusReport {
    /// Builds a report from its inputs.
    #[must_use]
    pub fn new(
        clock: ClockReading,
        contract: Address,
        account: Option<Address>,
        snapshot: Option<&GameSnapshot>,
        contract_hour: Option<u32>,
    ) -> Self {
        let connected = account.is_some();
        let permitted = crate::gate::evaluate(&GateInputs {
            phase: clock.phase,
            snapshot,
            connected,
        });
        Self {
            clock,
            contract,
            account,
            snapshot: snapshot.copied(),
            permitted,
            status: status_message(clock.phase, snapshot, connected),
            contract_hour,
        }
    }

    /// Returns `true` when the contract's hour disagrees with the local clock.
    #[must_use]
    pub fn hour_mismatch(&self) -> bool {
        self.contract_hour.is_some_and(|h| h != self.clock.hour)
    }

    /// Renders the terminal panel.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "> Contract: {}", self.contract.short());
        let _ = writeln!(
            out,
            "> Current UTC+3 Time: {}",
            self.clock.at.format("%H:%M:%S")
        );
        let _ = writeln!(
            out,
            "> Current Hour: {}:00 ({})",
            self.clock.hour,
            self.clock.phase.label()
        );
        if let Some(hour) = self.contract_hour {
            if self.hour_mismatch() {
                let _ = writeln!(out, "> Contract Hour: {hour}:00 (differs from local clock!)");
            }
        }
        let _ = writeln!(
            out,
            "> Time until next hour: {}",
            self.clock.remaining_display()
        );

        if let Some(snapshot) = &self.snapshot {
            let _ = writeln!(out, "> Current Round: #{}", snapshot.round.round_id);
            let _ = writeln!(out, "> Players: {}", snapshot.round.player_count);
        }
        let _ = writeln!(out, "> Status: {}", self.status);
        if self.snapshot.is_some_and(|s| s.has_guessed()) {
            let _ = writeln!(out, "> Your Status: Guess Submitted");
        }

        match self.account {
            Some(account) => {
                let _ = writeln!(out, "> Account: {}", account.short());
            }
            None => {
                let _ = writeln!(out, "> Account: not connected");
            }
        }

        let offered = self.permitted.kinds();
        if offered.is_empty() {
            let _ = writeln!(out, "> Available: none");
        } else {
            let names: Vec<&str> = offered.iter().map(|k| k.as_str()).collect();
            let _ = writeln!(out, "> Available: {}", names.join(", "));
        }
        out
    }
}

/// Renders one round from the history lookup.
#[must_use]
pub fn render_round_record(record: &RoundRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "> Round: #{}", record.round_id);
    let _ = writeln!(
        out,
        "> Ended: {}",
        if record.ended { "yes" } else { "no" }
    );
    if record.ended {
        match record.winner {
            Some(winner) => {
                let _ = writeln!(out, "> Winner: {winner}");
            }
            None => {
                let _ = writeln!(out, "> Winner: none");
            }
        }
        let _ = writeln!(out, "> Winning Number: {}", record.winning_number);
    }
    let _ = writeln!(out, "> Started: {}", format_unix(record.start_time));
    if record.end_time != 0 {
        let _ = writeln!(out, "> Ended At: {}", format_unix(record.end_time));
    }
    let _ = writeln!(out, "> Players: {}", record.player_count);
    out
}

fn format_unix(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .filter(|s| *s != 0)
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map_or_else(
            || "-".to_string(),
            |t| {
                crate::clock::to_target_offset(&t)
                    .format("%Y-%m-%d %H:%M:%S UTC+3")
                    .to_string()
            },
        )
}
