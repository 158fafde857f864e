use thiserror::Error;

use crate::Lsn;

/// Errors produced by the write-ahead log core.
///
/// Three kinds, matching the three error categories the log distinguishes:
/// a violated local precondition, an out-of-order commit (recoverable --
/// the caller may re-drive with the expected LSN), and I/O propagated
/// verbatim from the underlying files.
#[derive(Debug, Error)]
pub enum WalError {
    /// A missing/invalid argument or a violated local precondition, e.g.
    /// `index out of range` or `cannot truncate a committed log entry`.
    #[error("{0}")]
    Assertion(String),

    /// `commit(lsn)` was called out of order.
    #[error("Out of order commit; expected {expected} but received {received}")]
    OutOfOrderCommit { expected: Lsn, received: Lsn },

    /// Propagated from the underlying file abstraction.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalError {
    pub(crate) fn assertion(msg: impl Into<String>) -> Self {
        WalError::Assertion(msg.into())
    }
}
