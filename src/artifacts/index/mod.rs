//! Pieces of the staging file (`.git/index`)
//!
//! Only version 2 is read and written:
//!
//! ```text
//! "DIRC" | version (u32) | entry count (u32)
//! entry*   fixed stat block, oid, flags, NUL-terminated path, padded to 8 bytes
//! extension*   4-byte signature | size (u32) | data; skipped on read, never written
//! SHA-1 of everything above
//! ```

pub mod checksum;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;

/// Trailing SHA-1 length
pub const CHECKSUM_SIZE: usize = 20;

/// Signature, version and entry count
pub const HEADER_SIZE: usize = 12;

/// Signature and payload size of an extension block
pub const EXTENSION_HEADER_SIZE: usize = 8;

pub const SIGNATURE: &str = "DIRC";

pub const VERSION: u32 = 2;
