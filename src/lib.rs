//! `fheguess` - terminal client for the hourly encrypted number-guessing game
//!
//! The game rules (round lifecycle, encrypted guesses, winner selection) live
//! in an on-chain contract. This library keeps a local view of that contract
//! consistent with its hour-based clock: it derives the current game window
//! from wall-clock time, polls the contract for round and player state, and
//! decides which actions are worth offering before forwarding them.

pub mod cli;
pub mod clock;
pub mod config;
pub mod contract;
pub mod error;
pub mod gate;
pub mod observability;
pub mod reconciler;
pub mod render;
pub mod snapshot;
pub mod transport;
pub mod types;
pub mod wallet;
