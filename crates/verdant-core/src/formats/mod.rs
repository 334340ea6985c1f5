//! # Formats
//!
//! Byte-level encoding of stored records. File and database I/O live in
//! [`crate::storage`].

mod persistence;

pub use persistence::{RecordHeader, decode_record, encode_record};
