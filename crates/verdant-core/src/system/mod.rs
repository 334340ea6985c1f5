//! # System Module
//!
//! Growth stage model for plantations.
//!
//! The stage model is a pure lookup library: ordered stages, the legal
//! successor of each stage, and the fixed progress weight each stage
//! contributes to health scoring.

mod stage;

pub use stage::*;
