//! Round clock derivation.
//!
//! The game schedule is defined against a fixed UTC+3 wall clock: odd hours
//! start rounds and accept guesses, even hours reveal results. Everything in
//! this module is a pure function of an instant and no "current phase" is
//! ever stored. Callers re-derive a [`ClockReading`] on every tick,
//! so a process that was suspended across an hour boundary picks up the new
//! window on its first tick after resuming.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Timelike, Utc};
use serde::{Serialize, Serializer};

/// Offset of the game's reference clock from UTC, in seconds.
pub const TARGET_OFFSET_SECS: i32 = 3 * 60 * 60;

/// Length of one game window.
pub const WINDOW: Duration = Duration::from_secs(60 * 60);

const WINDOW_MILLIS: u64 = 60 * 60 * 1000;

/// The fixed UTC+3 reference offset.
#[must_use]
pub fn target_offset() -> FixedOffset {
    FixedOffset::east_opt(TARGET_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Source of wall-clock time.
///
/// The reconciler asks the clock on every tick and never caches the answer.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jumps to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            if let Ok(delta) = chrono::Duration::from_std(by) {
                *now += delta;
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|poisoned| *poisoned.into_inner(), |now| *now)
    }
}

/// The two alternating one-hour windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Odd target-offset hour: rounds start and guesses are accepted.
    OddRoundWindow,
    /// Even target-offset hour: results can be revealed.
    EvenRevealWindow,
}

impl GamePhase {
    /// Panel label, matching the hour-type banner.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OddRoundWindow => "ODD - Round Start Time!",
            Self::EvenRevealWindow => "EVEN - Reveal Time!",
        }
    }

    /// Returns `true` for the odd-hour window.
    #[must_use]
    pub const fn is_odd(self) -> bool {
        matches!(self, Self::OddRoundWindow)
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::OddRoundWindow => "odd-hour",
            Self::EvenRevealWindow => "even-hour",
        })
    }
}

/// Expresses `now` as observed on the UTC+3 reference clock.
///
/// The caller's own timezone is irrelevant: the same instant given in any
/// offset maps to the same target-offset time.
#[must_use]
pub fn to_target_offset<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<FixedOffset> {
    now.with_timezone(&target_offset())
}

/// Classifies a target-offset time into its game window.
#[must_use]
pub fn classify(t: &DateTime<FixedOffset>) -> GamePhase {
    if t.hour() % 2 == 1 {
        GamePhase::OddRoundWindow
    } else {
        GamePhase::EvenRevealWindow
    }
}

/// Time left until the top of the next hour, floored to whole seconds.
///
/// Ranges over `[0s, 3600s]`. Exactly on an hour boundary the next window
/// has just begun, so the full window length is returned rather than zero.
#[must_use]
pub fn time_remaining_in_window(t: &DateTime<FixedOffset>) -> Duration {
    // Leap-second nanos (>= 1e9) clamp to the last millisecond of the second.
    let millis_in_second = u64::from(t.nanosecond().min(999_999_999) / 1_000_000);
    let elapsed_millis =
        (u64::from(t.minute()) * 60 + u64::from(t.second())) * 1000 + millis_in_second;
    let remaining_millis = WINDOW_MILLIS.saturating_sub(elapsed_millis);
    Duration::from_secs(remaining_millis / 1000)
}

/// Formats a remaining duration as `m:ss`.
#[must_use]
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Everything derived from one instant, recomputed from scratch per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockReading {
    /// Target-offset time
    pub at: DateTime<FixedOffset>,
    /// Target-offset hour (0-23)
    pub hour: u32,
    /// Active game window
    pub phase: GamePhase,
    /// Time until the next window
    #[serde(rename = "remaining_secs", serialize_with = "serialize_secs")]
    pub remaining: Duration,
}

impl ClockReading {
    /// Derives a reading for the given instant.
    #[must_use]
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        let at = to_target_offset(instant);
        Self {
            at,
            hour: at.hour(),
            phase: classify(&at),
            remaining: time_remaining_in_window(&at),
        }
    }

    /// Derives a reading from the clock's current time.
    #[must_use]
    pub fn now(clock: &dyn Clock) -> Self {
        Self::at(&clock.now())
    }

    /// Countdown to the next window as `m:ss`.
    #[must_use]
    pub fn remaining_display(&self) -> String {
        format_remaining(self.remaining)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}
