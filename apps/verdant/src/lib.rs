//! # verdant
//!
//! The Verdant binary's library half: CLI definitions, configuration
//! resolution and log setup. `main.rs` only wires these together.

pub mod cli;
pub mod config;
pub mod logging;
