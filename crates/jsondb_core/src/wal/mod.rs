//! Write-ahead log (WAL) for durability and crash recovery.
//!
//! ## Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Integers are little-endian and the CRC covers every preceding byte of
//! the record.
//!
//! ## Recovery Policy
//!
//! Tolerated (clean end of log):
//!
//! - a truncated header or payload at the end of the file, left by a crash
//!   mid-write; the torn tail is cut off when the database opens.
//!
//! Fatal (open fails):
//!
//! - CRC mismatch
//! - bad magic bytes
//! - unknown record type or future format version
//!
//! ## Invariants
//!
//! - The WAL is append-only between checkpoints.
//! - A transaction's records are written in one batch ending with `Commit`
//!   and flushed before the commit is acknowledged.
//! - Recovery replays only committed transactions, in log order.

mod reader;
mod record;
mod writer;

pub use reader::WalRecordIterator;
pub(crate) use record::{write_bytes, PayloadReader};
pub use record::{compute_crc32, WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
pub use writer::{WalContents, WalManager};
