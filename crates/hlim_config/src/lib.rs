//! Parsing and validation of `hlim.toml` project configuration files.
//!
//! The configuration carries simulation settings, named root clocks and
//! output paths that surrounding tooling hands to the simulator and to
//! export collaborators as plain values.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{create_clocks, load_config, load_config_from_str};
pub use types::*;
