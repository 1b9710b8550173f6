//! Chain primitive types.
//!
//! Addresses, 32-byte hashes, receipts and logs as they appear on the
//! JSON-RPC wire: `0x`-prefixed hex strings for byte data and hex
//! quantities (`"0x1a"`) for integers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a hex-encoded fixed-size value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HexParseError {
    /// Wrong number of hex digits
    #[error("expected {expected} hex digits, got {actual}")]
    InvalidLength {
        /// Expected digit count
        expected: usize,
        /// Actual digit count
        actual: usize,
    },

    /// Non-hex character
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn parse_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexParseError> {
    let digits = strip_0x(s.trim());
    if digits.len() != N * 2 {
        return Err(HexParseError::InvalidLength {
            expected: N * 2,
            actual: digits.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| HexParseError::InvalidHex(e.to_string()))?;
    Ok(out)
}

/// Decodes `0x`-prefixed hex into bytes. An empty payload (`"0x"`) is valid.
///
/// # Errors
///
/// Returns [`HexParseError::InvalidHex`] for odd-length or non-hex input.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, HexParseError> {
    hex::decode(strip_0x(s.trim())).map_err(|e| HexParseError::InvalidHex(e.to_string()))
}

/// Encodes bytes as `0x`-prefixed lowercase hex.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a JSON-RPC hex quantity such as `"0x1a"`.
///
/// # Errors
///
/// Returns [`HexParseError::InvalidHex`] if the value is not a hex integer
/// that fits in a `u64`.
pub fn parse_quantity(s: &str) -> Result<u64, HexParseError> {
    let digits = strip_0x(s.trim());
    if digits.is_empty() {
        return Err(HexParseError::InvalidHex(s.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|e| HexParseError::InvalidHex(format!("{s}: {e}")))
}

/// Formats a `u64` as a JSON-RPC hex quantity (`0` → `"0x0"`).
#[must_use]
pub fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}

// ============================================================================
// Address
// ============================================================================

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Wraps raw address bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns `true` for the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Shortened display form, e.g. `0x4ec9...35d3`.
    #[must_use]
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed::<20>(s).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// H256
// ============================================================================

/// A 32-byte hash (transaction hash or log topic).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct H256([u8; 32]);

/// Transaction hash.
pub type TxHash = H256;

impl H256 {
    /// Wraps raw hash bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for H256 {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed::<32>(s).map(Self)
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for H256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Serde helpers for wire encodings
// ============================================================================

/// Serde adapter for `u64` hex quantities.
pub mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes as `"0x.."`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_quantity(*value))
    }

    /// Deserializes from `"0x.."`.
    ///
    /// # Errors
    ///
    /// Fails if the string is not a hex quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_quantity(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<u64>` hex quantities (`null` for pending).
pub mod opt_quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes as `"0x.."` or `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&super::format_quantity(*v)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes from `"0x.."` or `null`.
    ///
    /// # Errors
    ///
    /// Fails if a present string is not a hex quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::parse_quantity(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Serde adapter for byte payloads as `0x` hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes as `"0x.."`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_hex(value))
    }

    /// Deserializes from `"0x.."`.
    ///
    /// # Errors
    ///
    /// Fails on non-hex input.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Receipts and logs
// ============================================================================

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Hash of the transaction
    pub transaction_hash: TxHash,

    /// Block the transaction was included in
    #[serde(with = "quantity")]
    pub block_number: u64,

    /// `true` when execution succeeded (`status == 0x1`)
    #[serde(with = "status_flag")]
    pub status: bool,
}

mod status_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "0x1" } else { "0x0" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let s = String::deserialize(deserializer)?;
        match super::parse_quantity(&s).map_err(serde::de::Error::custom)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(serde::de::Error::custom(format!(
                "invalid receipt status {other}"
            ))),
        }
    }
}

/// An event log emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract
    pub address: Address,

    /// Indexed topics; `topics[0]` is the event signature hash
    pub topics: Vec<H256>,

    /// Non-indexed event data
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,

    /// Block number, `None` for pending logs
    #[serde(default, with = "opt_quantity")]
    pub block_number: Option<u64>,
}
