//! # Ports
//!
//! The two things the core is handed from outside: a clock and a store.

mod clock;
mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use store::{MemoryStore, PlantationStore};
