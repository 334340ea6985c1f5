//! # Innate Primitives
//!
//! Hardcoded constants for the Verdant CORE.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Scoring thresholds live here so the health scorer, its tests, and the CLI
//! all read the same numbers.

/// Tasks due within this many days of `now` (or overdue) count as urgent.
pub const URGENT_WINDOW_DAYS: i64 = 3;

/// A plantation updated within this many days is considered fresh.
pub const FRESH_UPDATE_DAYS: i64 = 7;

/// A plantation not updated for more than this many days is considered stale.
pub const STALE_UPDATE_DAYS: i64 = 30;

/// A plantation still growing after this many days gets an informational nudge.
pub const LONG_GROWTH_DAYS: i64 = 60;

/// Scores at or above this value are reported as healthy.
pub const HEALTHY_SCORE: u8 = 80;

/// Number of yield checkpoints that counts as a consistent history.
pub const YIELD_HISTORY_MIN: usize = 3;

/// Magic bytes for the Verdant record format header.
///
/// - Record Header = Magic Bytes ("VRDT") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"VRDT";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the record format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum encoded size of a single stored record (16 MB).
///
/// Checked before decoding so a corrupted store cannot trigger huge allocations.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Maximum length of a task or template title.
pub const MAX_TITLE_LENGTH: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"VRDT");
    }

    #[test]
    fn update_windows_are_ordered() {
        assert!(FRESH_UPDATE_DAYS < STALE_UPDATE_DAYS);
        assert!(URGENT_WINDOW_DAYS < FRESH_UPDATE_DAYS);
    }
}
