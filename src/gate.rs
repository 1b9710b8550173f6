//! Advisory action gate.
//!
//! Decides which actions are worth offering given the current window, the
//! latest snapshot and whether a wallet is connected. The gate is derived on
//! demand and never stored. It is advisory only: the contract makes the
//! authoritative accept/reject decision, so a permitted action can still be
//! rejected remotely and the gate must never be treated as a security check.

use std::fmt;

use serde::Serialize;

use crate::clock::GamePhase;
use crate::snapshot::GameSnapshot;

/// The three state-changing calls a player can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// `startNewRound()`
    StartRound,
    /// `submitGuess(uint8)`
    SubmitGuess,
    /// `revealResult()`
    RevealResult,
}

impl ActionKind {
    /// All action kinds, in panel order.
    pub const ALL: [Self; 3] = [Self::StartRound, Self::SubmitGuess, Self::RevealResult];

    /// Contract-facing name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartRound => "startRound",
            Self::SubmitGuess => "submitGuess",
            Self::RevealResult => "revealResult",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Start a new round.
    StartRound,
    /// Submit a guess. Values above 100 are not rejected here; the contract
    /// decides.
    SubmitGuess(u8),
    /// Reveal the current round's result.
    RevealResult,
}

impl Action {
    /// Kind of this action.
    #[must_use]
    pub const fn kind(self) -> ActionKind {
        match self {
            Self::StartRound => ActionKind::StartRound,
            Self::SubmitGuess(_) => ActionKind::SubmitGuess,
            Self::RevealResult => ActionKind::RevealResult,
        }
    }

    /// The guess value, for `SubmitGuess`.
    #[must_use]
    pub const fn guess(self) -> Option<u8> {
        match self {
            Self::SubmitGuess(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmitGuess(n) => write!(f, "submitGuess({n})"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Why the gate refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum GateDenial {
    /// No wallet account is connected.
    NotConnected,
    /// No snapshot has been loaded yet.
    StateNotLoaded,
    /// The current window does not allow this action.
    WrongWindow {
        /// Window in which the action is offered
        required: GamePhase,
    },
    /// A round is already running.
    RoundInProgress,
    /// There is no open round to act on.
    NoOpenRound,
    /// The connected player already guessed this round.
    AlreadyGuessed,
    /// The contract reports the window as closed.
    ClosedRemotely,
}

impl fmt::Display for GateDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => f.write_str("no wallet connected"),
            Self::StateNotLoaded => f.write_str("game state not loaded yet"),
            Self::WrongWindow { required } => write!(f, "only offered during the {required} window"),
            Self::RoundInProgress => f.write_str("a round is already in progress"),
            Self::NoOpenRound => f.write_str("no open round"),
            Self::AlreadyGuessed => f.write_str("already guessed this round"),
            Self::ClosedRemotely => f.write_str("the contract reports this window as closed"),
        }
    }
}

/// Everything the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs<'a> {
    /// Locally derived window
    pub phase: GamePhase,
    /// Latest applied snapshot
    pub snapshot: Option<&'a GameSnapshot>,
    /// Whether a wallet account is connected
    pub connected: bool,
}

/// Which actions may be offered right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PermittedActions {
    /// `startRound` may be offered
    pub start_round: bool,
    /// `submitGuess` may be offered
    pub submit_guess: bool,
    /// `revealResult` may be offered
    pub reveal_result: bool,
}

impl PermittedActions {
    /// Returns whether `kind` is permitted.
    #[must_use]
    pub const fn allows(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::StartRound => self.start_round,
            ActionKind::SubmitGuess => self.submit_guess,
            ActionKind::RevealResult => self.reveal_result,
        }
    }

    /// Permitted kinds, in panel order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|k| self.allows(*k))
            .collect()
    }

    /// Returns `true` if nothing is permitted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.start_round && !self.submit_guess && !self.reveal_result
    }
}

/// Checks a single action against the gate.
///
/// # Errors
///
/// Returns the first [`GateDenial`] that applies.
pub fn check(kind: ActionKind, inputs: &GateInputs<'_>) -> Result<(), GateDenial> {
    if !inputs.connected {
        return Err(GateDenial::NotConnected);
    }
    let Some(snapshot) = inputs.snapshot else {
        return Err(GateDenial::StateNotLoaded);
    };
    let round = &snapshot.round;

    match kind {
        ActionKind::StartRound => {
            require_window(inputs.phase, GamePhase::OddRoundWindow)?;
            if round.is_open() {
                return Err(GateDenial::RoundInProgress);
            }
        }
        ActionKind::SubmitGuess => {
            require_window(inputs.phase, GamePhase::OddRoundWindow)?;
            if !round.is_open() {
                return Err(GateDenial::NoOpenRound);
            }
            if snapshot.player.is_none() {
                return Err(GateDenial::NotConnected);
            }
            if snapshot.has_guessed() {
                return Err(GateDenial::AlreadyGuessed);
            }
            if !snapshot.flags.guess_active {
                return Err(GateDenial::ClosedRemotely);
            }
        }
        ActionKind::RevealResult => {
            require_window(inputs.phase, GamePhase::EvenRevealWindow)?;
            if !round.is_open() {
                return Err(GateDenial::NoOpenRound);
            }
            if !snapshot.flags.reveal_active {
                return Err(GateDenial::ClosedRemotely);
            }
        }
    }
    Ok(())
}

fn require_window(phase: GamePhase, required: GamePhase) -> Result<(), GateDenial> {
    if phase == required {
        Ok(())
    } else {
        Err(GateDenial::WrongWindow { required })
    }
}

/// Evaluates all three actions at once.
#[must_use]
pub fn evaluate(inputs: &GateInputs<'_>) -> PermittedActions {
    PermittedActions {
        start_round: check(ActionKind::StartRound, inputs).is_ok(),
        submit_guess: check(ActionKind::SubmitGuess, inputs).is_ok(),
        reveal_result: check(ActionKind::RevealResult, inputs).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{PlayerSnapshot, RoundSnapshot, WindowFlags};

    fn snapshot(number_generated: bool, round_ended: bool, has_guessed: bool) -> GameSnapshot {
        GameSnapshot {
            round: RoundSnapshot {
                round_id: 3,
                number_generated,
                round_ended,
                start_time: 1_700_000_000,
                player_count: 2,
            },
            player: Some(PlayerSnapshot {
                has_guessed,
                timestamp: 0,
            }),
            flags: WindowFlags {
                odd_hour: true,
                even_hour: false,
                guess_active: true,
                reveal_active: false,
            },
        }
    }

    fn reveal_flags(mut s: GameSnapshot) -> GameSnapshot {
        s.flags = WindowFlags {
            odd_hour: false,
            even_hour: true,
            guess_active: false,
            reveal_active: true,
        };
        s
    }

    fn inputs(phase: GamePhase, snapshot: &GameSnapshot) -> GateInputs<'_> {
        GateInputs {
            phase,
            snapshot: Some(snapshot),
            connected: true,
        }
    }

    #[test]
    fn nothing_offered_when_disconnected() {
        let s = snapshot(false, false, false);
        let gate = GateInputs {
            connected: false,
            ..inputs(GamePhase::OddRoundWindow, &s)
        };
        assert!(evaluate(&gate).is_empty());
        assert_eq!(
            check(ActionKind::StartRound, &gate),
            Err(GateDenial::NotConnected)
        );
    }

    #[test]
    fn nothing_offered_before_first_snapshot() {
        let gate = GateInputs {
            phase: GamePhase::OddRoundWindow,
            snapshot: None,
            connected: true,
        };
        assert!(evaluate(&gate).is_empty());
        assert_eq!(
            check(ActionKind::SubmitGuess, &gate),
            Err(GateDenial::StateNotLoaded)
        );
    }

    #[test]
    fn odd_hour_without_secret_offers_start_only() {
        let s = snapshot(false, false, false);
        let permitted = evaluate(&inputs(GamePhase::OddRoundWindow, &s));
        assert_eq!(permitted.kinds(), vec![ActionKind::StartRound]);
    }

    #[test]
    fn odd_hour_after_round_ended_offers_start() {
        let s = snapshot(true, true, false);
        let permitted = evaluate(&inputs(GamePhase::OddRoundWindow, &s));
        assert!(permitted.start_round);
        assert!(!permitted.submit_guess);
    }

    #[test]
    fn odd_hour_open_round_offers_guess() {
        let s = snapshot(true, false, false);
        let permitted = evaluate(&inputs(GamePhase::OddRoundWindow, &s));
        assert_eq!(permitted.kinds(), vec![ActionKind::SubmitGuess]);
        assert_eq!(
            check(ActionKind::StartRound, &inputs(GamePhase::OddRoundWindow, &s)),
            Err(GateDenial::RoundInProgress)
        );
    }

    #[test]
    fn guess_closed_after_player_guessed() {
        let s = snapshot(true, false, true);
        assert_eq!(
            check(ActionKind::SubmitGuess, &inputs(GamePhase::OddRoundWindow, &s)),
            Err(GateDenial::AlreadyGuessed)
        );
    }

    #[test]
    fn guess_requires_player_snapshot() {
        let mut s = snapshot(true, false, false);
        s.player = None;
        assert_eq!(
            check(ActionKind::SubmitGuess, &inputs(GamePhase::OddRoundWindow, &s)),
            Err(GateDenial::NotConnected)
        );
    }

    #[test]
    fn even_hour_open_round_offers_reveal_not_guess() {
        let s = reveal_flags(snapshot(true, false, false));
        let gate = inputs(GamePhase::EvenRevealWindow, &s);
        let permitted = evaluate(&gate);
        assert!(permitted.reveal_result);
        assert!(!permitted.submit_guess);
        assert!(!permitted.start_round);
        assert_eq!(
            check(ActionKind::SubmitGuess, &gate),
            Err(GateDenial::WrongWindow {
                required: GamePhase::OddRoundWindow
            })
        );
    }

    #[test]
    fn remote_flags_only_narrow() {
        // local window says even, contract disagrees
        let s = snapshot(true, false, false);
        assert_eq!(
            check(
                ActionKind::RevealResult,
                &inputs(GamePhase::EvenRevealWindow, &s)
            ),
            Err(GateDenial::ClosedRemotely)
        );

        // contract says reveal is open, local window is odd
        let s = reveal_flags(snapshot(true, false, false));
        assert_eq!(
            check(ActionKind::RevealResult, &inputs(GamePhase::OddRoundWindow, &s)),
            Err(GateDenial::WrongWindow {
                required: GamePhase::EvenRevealWindow
            })
        );
    }

    #[test]
    fn out_of_range_guess_is_not_checked_locally() {
        let action = Action::SubmitGuess(101);
        let s = snapshot(true, false, false);
        assert!(check(action.kind(), &inputs(GamePhase::OddRoundWindow, &s)).is_ok());
        assert_eq!(action.guess(), Some(101));
        assert_eq!(action.to_string(), "submitGuess(101)");
    }

    #[test]
    fn denial_messages() {
        let denial = GateDenial::WrongWindow {
            required: GamePhase::EvenRevealWindow,
        };
        assert_eq!(denial.to_string(), "only offered during the even-hour window");
        assert_eq!(ActionKind::RevealResult.to_string(), "revealResult");
    }
}
