//! Read-only projections of contract state.
//!
//! Snapshots are replaced wholesale on every successful refresh and are never
//! mutated in place. Equality is by value, so two refreshes against an
//! unchanged contract compare equal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Address;

/// Current round as reported by `getCurrentRoundInfo()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RoundSnapshot {
    /// Round number
    pub round_id: u8,
    /// Whether the encrypted secret for this round exists
    pub number_generated: bool,
    /// Whether the round has been closed
    pub round_ended: bool,
    /// Round start, seconds since the Unix epoch (0 if never started)
    pub start_time: u64,
    /// Number of guesses received
    pub player_count: u64,
}

impl RoundSnapshot {
    /// Returns `true` while the round has a secret and is not yet closed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.number_generated && !self.round_ended
    }

    /// Round start as a timestamp.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        unix_time(self.start_time)
    }
}

/// The connected player's standing in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerSnapshot {
    /// Whether the player already submitted a guess
    pub has_guessed: bool,
    /// When the guess was submitted, seconds since the Unix epoch
    pub timestamp: u64,
}

impl PlayerSnapshot {
    /// Guess time as a timestamp.
    #[must_use]
    pub fn guessed_at(&self) -> Option<DateTime<Utc>> {
        unix_time(self.timestamp)
    }
}

/// Window flags computed by the contract from its own block time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct WindowFlags {
    /// `isOddHour()`
    pub odd_hour: bool,
    /// `isEvenHour()`
    pub even_hour: bool,
    /// `isGuessTimeActive()`
    pub guess_active: bool,
    /// `isRevealTimeActive()`
    pub reveal_active: bool,
}

impl WindowFlags {
    /// Exactly one of odd/even holds and guessing never overlaps revealing.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.odd_hour != self.even_hour && !(self.guess_active && self.reveal_active)
    }
}

/// One complete view of the remote game, fetched in a single refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GameSnapshot {
    /// Current round
    pub round: RoundSnapshot,
    /// Connected player's status; `None` without an account
    pub player: Option<PlayerSnapshot>,
    /// Contract-side window flags
    pub flags: WindowFlags,
}

impl GameSnapshot {
    /// Returns `true` if the connected player already guessed this round.
    #[must_use]
    pub fn has_guessed(&self) -> bool {
        self.player.is_some_and(|p| p.has_guessed)
    }
}

/// A finished (or in-progress) round from `getRoundHistory(uint8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundRecord {
    /// Round number that was queried
    pub round_id: u8,
    /// Whether the round has ended
    pub ended: bool,
    /// Winning player, `None` when nobody won (zero address)
    pub winner: Option<Address>,
    /// The revealed secret number
    pub winning_number: u8,
    /// Round start, seconds since the Unix epoch
    pub start_time: u64,
    /// Round end, seconds since the Unix epoch
    pub end_time: u64,
    /// Number of guesses received
    pub player_count: u64,
}

fn unix_time(secs: u64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
}
