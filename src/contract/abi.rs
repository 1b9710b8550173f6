//! Minimal Solidity ABI codec for the game contract.
//!
//! Only static types appear in the contract's interface (`uint8`, `uint256`,
//! `bool`, `address`), so every argument and return value is one 32-byte
//! word. Decoding is strict: non-canonical booleans, integers that overflow
//! their Rust type and dirty address padding are errors.

use crate::error::AbiError;
use crate::types::{Address, H256};

/// Length of one ABI word.
pub const WORD: usize = 32;

/// A 4-byte function selector.
pub type Selector = [u8; 4];

/// `submitGuess(uint8)`
pub const SUBMIT_GUESS: Selector = [0x90, 0xe9, 0xba, 0xbf];
/// `startNewRound()`
pub const START_NEW_ROUND: Selector = [0xbd, 0x85, 0x94, 0x8c];
/// `revealResult()`
pub const REVEAL_RESULT: Selector = [0x5d, 0xbc, 0x19, 0xf4];
/// `getCurrentRoundInfo()`
pub const GET_CURRENT_ROUND_INFO: Selector = [0x74, 0x7d, 0xff, 0x42];
/// `getPlayerGuessStatus(address)`
pub const GET_PLAYER_GUESS_STATUS: Selector = [0xbc, 0x44, 0x52, 0x94];
/// `getCurrentHourUTC3()`
pub const GET_CURRENT_HOUR_UTC3: Selector = [0xca, 0xc0, 0x2b, 0x68];
/// `isOddHour()`
pub const IS_ODD_HOUR: Selector = [0x19, 0x1a, 0x36, 0x0b];
/// `isEvenHour()`
pub const IS_EVEN_HOUR: Selector = [0x82, 0x74, 0xdb, 0xea];
/// `isGuessTimeActive()`
pub const IS_GUESS_TIME_ACTIVE: Selector = [0xdd, 0x9f, 0x73, 0x31];
/// `isRevealTimeActive()`
pub const IS_REVEAL_TIME_ACTIVE: Selector = [0x6c, 0x5e, 0x87, 0x31];
/// `getRoundHistory(uint8)`
pub const GET_ROUND_HISTORY: Selector = [0x4a, 0x85, 0x9e, 0x65];
/// `currentRound()`
pub const CURRENT_ROUND: Selector = [0x8a, 0x19, 0xc8, 0xbc];

/// `Error(string)` revert payload
pub const ERROR_STRING: Selector = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)` revert payload
pub const PANIC_UINT: Selector = [0x4e, 0x48, 0x7b, 0x71];

/// `RoundStarted(uint8,uint256)`
pub const ROUND_STARTED_TOPIC: H256 = H256::new([
    0xf7, 0x10, 0x4e, 0xc8, 0xd7, 0x0c, 0xbe, 0xe7, //
    0xbb, 0x54, 0xda, 0x17, 0x84, 0x3a, 0xa3, 0x2c, //
    0x11, 0xb7, 0x7c, 0x11, 0xc6, 0x19, 0x7f, 0x00, //
    0x5e, 0xc8, 0xb2, 0xb4, 0xf5, 0xde, 0x69, 0x58,
]);

/// `GuessSubmitted(address,uint8)`
pub const GUESS_SUBMITTED_TOPIC: H256 = H256::new([
    0x17, 0xf5, 0x32, 0xdd, 0x23, 0x5d, 0xed, 0xa5, //
    0xaf, 0x44, 0xa6, 0xb9, 0x20, 0x10, 0xfc, 0x36, //
    0x3a, 0x16, 0xf9, 0xcb, 0xce, 0xe3, 0x86, 0x38, //
    0x5d, 0x11, 0x91, 0x36, 0x3f, 0x40, 0xf2, 0x0c,
]);

/// `RoundEnded(uint8,address,uint8)`
pub const ROUND_ENDED_TOPIC: H256 = H256::new([
    0xb7, 0x0d, 0x10, 0x32, 0x24, 0x35, 0xbd, 0x9b, //
    0x0c, 0xa7, 0x25, 0xf8, 0xe1, 0x09, 0x1a, 0xff, //
    0x8d, 0xb4, 0xb8, 0xb8, 0x80, 0x52, 0xe9, 0x8f, //
    0xbd, 0x19, 0x22, 0xa2, 0xc8, 0xf0, 0x53, 0x71,
]);

/// `NoWinner(uint8,uint8)`
pub const NO_WINNER_TOPIC: H256 = H256::new([
    0xf8, 0x06, 0x12, 0xb6, 0xf5, 0xa4, 0x61, 0x19, //
    0x33, 0x79, 0x82, 0x02, 0x9a, 0x0b, 0x23, 0xc0, //
    0x22, 0x68, 0x55, 0x3e, 0x7d, 0x90, 0x61, 0x73, //
    0x8c, 0xdd, 0xe7, 0xc4, 0xe2, 0xb0, 0xa4, 0xd1,
]);

/// Builds calldata from a selector and pre-encoded argument words.
#[must_use]
pub fn encode_call(selector: Selector, args: &[[u8; WORD]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + args.len() * WORD);
    out.extend_from_slice(&selector);
    for word in args {
        out.extend_from_slice(word);
    }
    out
}

/// Left-pads an unsigned integer into a word.
#[must_use]
pub fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Left-pads an address into a word.
#[must_use]
pub fn address_word(address: Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 20..].copy_from_slice(address.as_bytes());
    word
}

/// Reads static words out of return data or log data.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Wraps `data`, requiring at least `words` full words.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::ShortData`] if the data is too short.
    pub const fn new(data: &'a [u8], words: usize) -> Result<Self, AbiError> {
        if data.len() < words * WORD {
            return Err(AbiError::ShortData {
                expected: words * WORD,
                actual: data.len(),
            });
        }
        Ok(Self { data })
    }

    fn word(&self, index: usize) -> Result<&'a [u8], AbiError> {
        let start = index * WORD;
        self.data
            .get(start..start + WORD)
            .ok_or(AbiError::ShortData {
                expected: start + WORD,
                actual: self.data.len(),
            })
    }

    /// Decodes word `index` as `bool`.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::InvalidBool`] unless the word is exactly 0 or 1.
    pub fn bool(&self, index: usize) -> Result<bool, AbiError> {
        match self.u64_checked(index, "bool") {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            Ok(_) | Err(AbiError::Overflow { .. }) => Err(AbiError::InvalidBool(index)),
            Err(e) => Err(e),
        }
    }

    /// Decodes word `index` as an unsigned integer that must fit in `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::Overflow`] if any of the high 24 bytes are set.
    pub fn u64(&self, index: usize) -> Result<u64, AbiError> {
        self.u64_checked(index, "u64")
    }

    /// Decodes word `index` as `uint8`.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::Overflow`] if the value exceeds 255.
    pub fn u8(&self, index: usize) -> Result<u8, AbiError> {
        let value = self.u64_checked(index, "u8")?;
        u8::try_from(value).map_err(|_| AbiError::Overflow { index, ty: "u8" })
    }

    /// Decodes word `index` as `address`.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::InvalidAddress`] if the 12 padding bytes are not zero.
    pub fn address(&self, index: usize) -> Result<Address, AbiError> {
        let word = self.word(index)?;
        if word[..WORD - 20].iter().any(|b| *b != 0) {
            return Err(AbiError::InvalidAddress(index));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[WORD - 20..]);
        Ok(Address::new(bytes))
    }

    fn u64_checked(&self, index: usize, ty: &'static str) -> Result<u64, AbiError> {
        let word = self.word(index)?;
        if word[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(AbiError::Overflow { index, ty });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&word[WORD - 8..]);
        Ok(u64::from_be_bytes(bytes))
    }
}

/// Decodes a revert payload into a human-readable reason.
///
/// Handles `Error(string)` and `Panic(uint256)`; anything else yields `None`.
#[must_use]
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let (selector, body) = data.split_at_checked(4)?;
    if selector == ERROR_STRING {
        let decoder = Decoder::new(body, 2).ok()?;
        let offset = usize::try_from(decoder.u64(0).ok()?).ok()?;
        let start = offset.checked_add(WORD)?;
        let len_word = body.get(offset..start)?;
        let len = usize::try_from(Decoder::new(len_word, 1).ok()?.u64(0).ok()?).ok()?;
        let bytes = body.get(start..start.checked_add(len)?)?;
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }
    if selector == PANIC_UINT {
        let code = Decoder::new(body, 1).ok()?.u64(0).ok()?;
        return Some(format!("panic code {code:#x}"));
    }
    None
}
