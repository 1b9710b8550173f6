//! Contract event decoding and the log watcher.
//!
//! Events are an optional accelerant: the poll loop refreshes as soon as one
//! arrives instead of waiting for the next tick. Polling remains the ground
//! truth, so a watcher that falls behind or fails only delays updates.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::abi::{
    Decoder, GUESS_SUBMITTED_TOPIC, NO_WINNER_TOPIC, ROUND_ENDED_TOPIC, ROUND_STARTED_TOPIC,
};
use crate::error::{AbiError, ProviderError};
use crate::types::{Address, Log};
use crate::wallet::{LogFilter, WalletProvider};

/// A decoded game contract event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContractEvent {
    /// `RoundStarted(uint8 indexed round, uint256 startTime)`
    RoundStarted {
        /// Round number
        round: u8,
        /// Start time, seconds since the Unix epoch
        start_time: u64,
    },
    /// `GuessSubmitted(address indexed player, uint8 indexed round)`
    GuessSubmitted {
        /// Guessing player
        player: Address,
        /// Round number
        round: u8,
    },
    /// `RoundEnded(uint8 indexed round, address indexed winner, uint8 secretNumber)`
    RoundEnded {
        /// Round number
        round: u8,
        /// Winning player
        winner: Address,
        /// Revealed secret
        secret_number: u8,
    },
    /// `NoWinner(uint8 indexed round, uint8 secretNumber)`
    NoWinner {
        /// Round number
        round: u8,
        /// Revealed secret
        secret_number: u8,
    },
}

impl ContractEvent {
    /// Solidity event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RoundStarted { .. } => "RoundStarted",
            Self::GuessSubmitted { .. } => "GuessSubmitted",
            Self::RoundEnded { .. } => "RoundEnded",
            Self::NoWinner { .. } => "NoWinner",
        }
    }

    /// Round the event belongs to.
    #[must_use]
    pub const fn round(&self) -> u8 {
        match self {
            Self::RoundStarted { round, .. }
            | Self::GuessSubmitted { round, .. }
            | Self::RoundEnded { round, .. }
            | Self::NoWinner { round, .. } => *round,
        }
    }
}

fn topic(log: &Log, index: usize) -> Result<Decoder<'_>, AbiError> {
    let topic = log.topics.get(index).ok_or(AbiError::MissingTopics {
        expected: index + 1,
        actual: log.topics.len(),
    })?;
    Decoder::new(topic.as_bytes(), 1)
}

/// Decodes a log emitted by the game contract.
///
/// Returns `Ok(None)` for logs whose signature is not one of the four game
/// events.
///
/// # Errors
///
/// Returns an [`AbiError`] if a known event has missing topics or malformed
/// data.
pub fn decode_log(log: &Log) -> Result<Option<ContractEvent>, AbiError> {
    let Some(signature) = log.topics.first() else {
        return Ok(None);
    };

    let event = if *signature == ROUND_STARTED_TOPIC {
        ContractEvent::RoundStarted {
            round: topic(log, 1)?.u8(0)?,
            start_time: Decoder::new(&log.data, 1)?.u64(0)?,
        }
    } else if *signature == GUESS_SUBMITTED_TOPIC {
        ContractEvent::GuessSubmitted {
            player: topic(log, 1)?.address(0)?,
            round: topic(log, 2)?.u8(0)?,
        }
    } else if *signature == ROUND_ENDED_TOPIC {
        ContractEvent::RoundEnded {
            round: topic(log, 1)?.u8(0)?,
            winner: topic(log, 2)?.address(0)?,
            secret_number: Decoder::new(&log.data, 1)?.u8(0)?,
        }
    } else if *signature == NO_WINNER_TOPIC {
        ContractEvent::NoWinner {
            round: topic(log, 1)?.u8(0)?,
            secret_number: Decoder::new(&log.data, 1)?.u8(0)?,
        }
    } else {
        return Ok(None);
    };
    Ok(Some(event))
}

/// Polls `eth_getLogs` for new game events.
pub struct EventWatcher {
    provider: Arc<dyn WalletProvider>,
    address: Address,
    interval: Duration,
    next_block: Option<u64>,
}

impl EventWatcher {
    /// Creates a watcher for the contract at `address`.
    #[must_use]
    pub fn new(provider: Arc<dyn WalletProvider>, address: Address, interval: Duration) -> Self {
        Self {
            provider,
            address,
            interval,
            next_block: None,
        }
    }

    /// Next block that will be scanned, once the cursor is set.
    #[must_use]
    pub const fn next_block(&self) -> Option<u64> {
        self.next_block
    }

    /// Fetches events emitted since the last poll.
    ///
    /// The first poll only places the cursor after the latest block; history
    /// is not replayed. Undecodable logs are skipped.
    ///
    /// # Errors
    ///
    /// Returns the provider error; the cursor does not move on failure.
    pub async fn poll(&mut self) -> Result<Vec<ContractEvent>, ProviderError> {
        let latest = self.provider.block_number().await?;
        let Some(from_block) = self.next_block else {
            self.next_block = Some(latest.saturating_add(1));
            return Ok(Vec::new());
        };
        if from_block > latest {
            return Ok(Vec::new());
        }

        let logs = self
            .provider
            .logs(&LogFilter {
                address: self.address,
                from_block,
                to_block: Some(latest),
            })
            .await?;
        self.next_block = Some(latest.saturating_add(1));

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match decode_log(log) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => trace!(block = ?log.block_number, "ignoring unknown log"),
                Err(e) => warn!(block = ?log.block_number, error = %e, "malformed game event"),
            }
        }
        Ok(events)
    }

    /// Runs the watcher until `cancel` fires or the receiver is dropped.
    pub fn spawn(
        mut self,
        events: mpsc::Sender<ContractEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("event watcher cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.poll().await {
                            Ok(batch) => {
                                for event in batch {
                                    if events.send(event).await.is_err() {
                                        debug!("event receiver dropped, stopping watcher");
                                        return;
                                    }
                                }
                            }
                            Err(e) => debug!(error = %e, "event poll failed, retrying next tick"),
                        }
                    }
                }
            }
        })
    }
}
