//! A durable, append-only write-ahead log.
//!
//! Stores an ordered sequence of opaque byte-payload entries, each
//! identified by a dense, monotonically increasing log serial number
//! (LSN) starting at 0, and tracks which LSNs have been committed. On
//! restart, [`Wal::recover`] lets a caller-supplied handler inspect
//! uncommitted entries and either confirm or discard them.
//!
//! The crate is built from two cooperating on-disk files -- the log
//! file (an opaque concatenation of entry payloads) and the index file
//! (a fixed header plus a densely packed offset array mapping LSN to
//! byte range) -- orchestrated by the [`Wal`] facade.

mod error;
mod file;
mod index;
mod range;
mod wal;

pub use crate::error::WalError;
pub use crate::file::{OsFile, RandomAccessFile};
pub use crate::index::IndexFile;
pub use crate::range::WalRangeIter;
pub use crate::wal::{CreateOptions, OpenOptions, Recovery, Wal, WalStats};

/// Log serial number: a dense, monotonically increasing identifier
/// assigned to entries in write order, starting at 0.
pub type Lsn = i32;

/// Sentinel `commit` value meaning "no commit yet".
pub const NO_COMMIT: Lsn = -1;
