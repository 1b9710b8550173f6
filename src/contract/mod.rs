//! The game contract as seen by the client.
//!
//! [`GameContract`] is the collaborator interface the reconciler talks to.
//! [`FheGuessContract`] implements it on top of any
//! [`WalletProvider`](crate::wallet::WalletProvider); tests implement it
//! directly with in-memory stubs.

pub mod abi;
pub mod binding;
pub mod events;

pub use binding::{FheGuessContract, ReceiptPolicy, classify_provider_error};
pub use events::{ContractEvent, EventWatcher, decode_log};

use crate::error::ContractError;
use crate::snapshot::{PlayerSnapshot, RoundRecord, RoundSnapshot, WindowFlags};
use crate::types::{Address, TxReceipt};

/// Result type alias for contract calls.
pub type Result<T> = std::result::Result<T, ContractError>;

/// Read and write access to the game contract.
///
/// Writes resolve only once the transaction has been observed as included.
#[async_trait::async_trait]
pub trait GameContract: Send + Sync {
    /// `getCurrentRoundInfo()`
    async fn round_info(&self) -> Result<RoundSnapshot>;

    /// `getPlayerGuessStatus(player)`
    async fn player_status(&self, player: Address) -> Result<PlayerSnapshot>;

    /// The four window flags (`isOddHour`, `isEvenHour`, `isGuessTimeActive`,
    /// `isRevealTimeActive`).
    async fn window_flags(&self) -> Result<WindowFlags>;

    /// `getCurrentHourUTC3()`
    async fn current_hour(&self) -> Result<u32>;

    /// `currentRound()`
    async fn current_round(&self) -> Result<u8>;

    /// `getRoundHistory(round)`
    async fn round_history(&self, round: u8) -> Result<RoundRecord>;

    /// `submitGuess(guess)`
    async fn submit_guess(&self, guess: u8) -> Result<TxReceipt>;

    /// `startNewRound()`
    async fn start_new_round(&self) -> Result<TxReceipt>;

    /// `revealResult()`
    async fn reveal_result(&self) -> Result<TxReceipt>;
}
