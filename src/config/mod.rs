//! Configuration module
//!
//! Loads and validates the optional YAML client configuration: network,
//! contract address and polling settings.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, LoaderOptions, Overrides};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
