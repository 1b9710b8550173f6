//! [`GameContract`] over a [`WalletProvider`].
//!
//! Reads are `eth_call`s decoded with the strict word codec in
//! [`abi`](super::abi). Writes go through `eth_sendTransaction` and then
//! poll for the receipt, so a write only resolves once the transaction is
//! included. A mined transaction with status 0 is replayed with `eth_call`
//! to recover the revert reason.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::abi::{self, Decoder, Selector};
use super::{GameContract, Result};
use crate::error::{ContractError, ProviderError};
use crate::snapshot::{PlayerSnapshot, RoundRecord, RoundSnapshot, WindowFlags};
use crate::types::{Address, TxHash, TxReceipt};
use crate::wallet::{CallRequest, TransactionRequest, USER_REJECTED, WalletProvider};

const FALLBACK_REVERT_REASON: &str = "transaction reverted";

/// How long and how often to wait for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    /// Delay between `eth_getTransactionReceipt` polls
    pub poll_interval: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

/// The deployed game contract.
pub struct FheGuessContract {
    provider: Arc<dyn WalletProvider>,
    address: Address,
    account: Option<Address>,
    receipts: ReceiptPolicy,
}

impl std::fmt::Debug for FheGuessContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FheGuessContract")
            .field("address", &self.address)
            .field("account", &self.account)
            .field("receipts", &self.receipts)
            .finish_non_exhaustive()
    }
}

impl FheGuessContract {
    /// Binds the contract at `address`. Writes need `account`.
    #[must_use]
    pub fn new(provider: Arc<dyn WalletProvider>, address: Address, account: Option<Address>) -> Self {
        Self {
            provider,
            address,
            account,
            receipts: ReceiptPolicy::default(),
        }
    }

    /// Overrides the receipt polling policy.
    #[must_use]
    pub const fn with_receipt_policy(mut self, receipts: ReceiptPolicy) -> Self {
        self.receipts = receipts;
        self
    }

    /// Contract address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Account used for writes.
    #[must_use]
    pub const fn account(&self) -> Option<Address> {
        self.account
    }

    async fn read(&self, selector: Selector, args: &[[u8; abi::WORD]]) -> Result<Vec<u8>> {
        let request = CallRequest {
            from: self.account,
            to: self.address,
            data: abi::encode_call(selector, args),
        };
        self.provider
            .call(&request)
            .await
            .map_err(classify_provider_error)
    }

    async fn read_bool(&self, selector: Selector) -> Result<bool> {
        let data = self.read(selector, &[]).await?;
        Ok(Decoder::new(&data, 1)?.bool(0)?)
    }

    async fn write(
        &self,
        method: &'static str,
        selector: Selector,
        args: &[[u8; abi::WORD]],
    ) -> Result<TxReceipt> {
        let from = self.account.ok_or(ContractError::NoAccount)?;
        let tx = TransactionRequest {
            from,
            to: self.address,
            data: abi::encode_call(selector, args),
        };

        let hash = self
            .provider
            .send_transaction(&tx)
            .await
            .map_err(classify_provider_error)?;
        info!(method, tx = %hash, "transaction submitted");

        let receipt = self.wait_for_receipt(hash).await?;
        if receipt.status {
            debug!(method, tx = %hash, block = receipt.block_number, "transaction included");
            return Ok(receipt);
        }

        let reason = self.replay_revert_reason(&tx).await;
        warn!(method, tx = %hash, reason = %reason, "transaction reverted");
        Err(ContractError::Reverted(reason))
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        let deadline = tokio::time::Instant::now() + self.receipts.timeout;
        loop {
            match self.provider.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => debug!(tx = %hash, error = %e, "receipt poll failed, retrying"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ContractError::Transport(format!(
                    "transaction {hash} not confirmed within {}",
                    humantime::format_duration(self.receipts.timeout)
                )));
            }
            tokio::time::sleep(self.receipts.poll_interval).await;
        }
    }

    async fn replay_revert_reason(&self, tx: &TransactionRequest) -> String {
        match self.provider.call(&CallRequest::from(tx)).await {
            Err(e) => match classify_provider_error(e) {
                ContractError::Reverted(reason) => reason,
                _ => FALLBACK_REVERT_REASON.to_string(),
            },
            Ok(_) => FALLBACK_REVERT_REASON.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl GameContract for FheGuessContract {
    async fn round_info(&self) -> Result<RoundSnapshot> {
        let data = self.read(abi::GET_CURRENT_ROUND_INFO, &[]).await?;
        let d = Decoder::new(&data, 5)?;
        Ok(RoundSnapshot {
            round_id: d.u8(0)?,
            number_generated: d.bool(1)?,
            round_ended: d.bool(2)?,
            start_time: d.u64(3)?,
            player_count: d.u64(4)?,
        })
    }

    async fn player_status(&self, player: Address) -> Result<PlayerSnapshot> {
        let data = self
            .read(abi::GET_PLAYER_GUESS_STATUS, &[abi::address_word(player)])
            .await?;
        let d = Decoder::new(&data, 2)?;
        Ok(PlayerSnapshot {
            has_guessed: d.bool(0)?,
            timestamp: d.u64(1)?,
        })
    }

    async fn window_flags(&self) -> Result<WindowFlags> {
        let (odd_hour, even_hour, guess_active, reveal_active) = tokio::try_join!(
            self.read_bool(abi::IS_ODD_HOUR),
            self.read_bool(abi::IS_EVEN_HOUR),
            self.read_bool(abi::IS_GUESS_TIME_ACTIVE),
            self.read_bool(abi::IS_REVEAL_TIME_ACTIVE),
        )?;
        Ok(WindowFlags {
            odd_hour,
            even_hour,
            guess_active,
            reveal_active,
        })
    }

    async fn current_hour(&self) -> Result<u32> {
        let data = self.read(abi::GET_CURRENT_HOUR_UTC3, &[]).await?;
        let hour = Decoder::new(&data, 1)?.u64(0)?;
        u32::try_from(hour)
            .ok()
            .filter(|h| *h < 24)
            .ok_or_else(|| ContractError::Decode(format!("hour {hour} out of range")))
    }

    async fn current_round(&self) -> Result<u8> {
        let data = self.read(abi::CURRENT_ROUND, &[]).await?;
        Ok(Decoder::new(&data, 1)?.u8(0)?)
    }

    async fn round_history(&self, round: u8) -> Result<RoundRecord> {
        let data = self
            .read(abi::GET_ROUND_HISTORY, &[abi::uint_word(u64::from(round))])
            .await?;
        let d = Decoder::new(&data, 6)?;
        let winner = d.address(1)?;
        Ok(RoundRecord {
            round_id: round,
            ended: d.bool(0)?,
            winner: (!winner.is_zero()).then_some(winner),
            winning_number: d.u8(2)?,
            start_time: d.u64(3)?,
            end_time: d.u64(4)?,
            player_count: d.u64(5)?,
        })
    }

    async fn submit_guess(&self, guess: u8) -> Result<TxReceipt> {
        self.write("submitGuess", abi::SUBMIT_GUESS, &[abi::uint_word(u64::from(guess))])
            .await
    }

    async fn start_new_round(&self) -> Result<TxReceipt> {
        self.write("startNewRound", abi::START_NEW_ROUND, &[]).await
    }

    async fn reveal_result(&self) -> Result<TxReceipt> {
        self.write("revealResult", abi::REVEAL_RESULT, &[]).await
    }
}

/// Maps a provider failure onto the contract error taxonomy.
///
/// A declined wallet prompt is a transport failure. Anything carrying revert
/// data or mentioning a revert is the contract's own rejection.
#[must_use]
pub fn classify_provider_error(err: ProviderError) -> ContractError {
    if err.rpc_code() == Some(USER_REJECTED) {
        return ContractError::Transport("request declined in wallet".to_string());
    }
    if let Some(reason) = err
        .revert_data()
        .as_deref()
        .and_then(abi::decode_revert_reason)
    {
        return ContractError::Reverted(reason);
    }
    match err {
        ProviderError::Rpc { message, .. } if message.to_ascii_lowercase().contains("revert") => {
            ContractError::Reverted(revert_message(&message))
        }
        ProviderError::InvalidResponse(message) => ContractError::Decode(message),
        other => ContractError::Transport(other.to_string()),
    }
}

fn revert_message(message: &str) -> String {
    const REASON_STRING: &str = "reverted with reason string '";
    if let Some(idx) = message.find(REASON_STRING) {
        let rest = &message[idx + REASON_STRING.len()..];
        return rest.rsplit_once('\'').map_or(rest, |(reason, _)| reason).to_string();
    }
    let reason = message
        .strip_prefix("execution reverted:")
        .map_or(message, str::trim);
    if reason.is_empty() {
        "execution reverted".to_string()
    } else {
        reason.to_string()
    }
}
