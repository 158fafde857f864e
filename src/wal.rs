//! The WAL facade: composes one log file and one index file into the
//! public write/read/readRange/commit/truncate/recover/close surface.

use std::path::{Path, PathBuf};

use crate::error::WalError;
use crate::file::{OsFile, RandomAccessFile};
use crate::index::IndexFile;
use crate::range::WalRangeIter;
use crate::Lsn;

/// Default suffix appended to the log path to derive the index path.
const INDEX_SUFFIX: &str = ".lix";

fn default_index_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(INDEX_SUFFIX);
    PathBuf::from(name)
}

/// Options for [`Wal::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub path: PathBuf,
    pub index: Option<PathBuf>,
}

impl CreateOptions {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            index: None,
        }
    }

    pub fn index<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.index = Some(path.as_ref().to_path_buf());
        self
    }
}

/// Options for [`Wal::open`] / [`Wal::open_or_create`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub path: PathBuf,
    pub index: Option<PathBuf>,
    pub writable: bool,
}

impl OpenOptions {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            index: None,
            writable: true,
        }
    }

    pub fn index<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.index = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }
}

/// The tagged variant `recover`'s decision argument takes: either reject
/// every uncommitted entry outright (the Rust rendition of the source's
/// `handler = false` sentinel), or drive a per-entry callback.
pub enum Recovery<Fh> {
    RejectAll,
    Handler(Fh),
}

/// Read-only snapshot of a WAL's position, handy for monitoring callers
/// (a replication queue, a job runner) that this crate's scope otherwise
/// treats as out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalStats {
    pub next: Lsn,
    pub commit_head: Lsn,
    pub size: u64,
    pub is_empty: bool,
}

/// A durable, append-only write-ahead log: one log file plus one index
/// file. Every mutating method takes `&mut self`, so the borrow checker
/// enforces the "no second operation may start before the first
/// completes" contract this log's concurrency model calls for.
#[derive(Debug)]
pub struct Wal {
    log: OsFile,
    index: IndexFile<OsFile>,
}

impl Wal {
    /// Creates a new log file and index file. Fails if either already
    /// exists.
    pub fn create(options: CreateOptions) -> Result<Self, WalError> {
        let index_path = options
            .index
            .clone()
            .unwrap_or_else(|| default_index_path(&options.path));

        let log = OsFile::create(&options.path)?;
        let index_file = OsFile::create(&index_path)?;
        let index = IndexFile::create(index_file, 0, 0)?;

        Ok(Self { log, index })
    }

    /// Opens an existing log file and index file. If the log file carries
    /// trailing bytes past the index's recorded write head -- a crash
    /// between writing a payload and persisting the following `increment`
    /// can leave exactly that -- the tail is reclaimed, matching
    /// `log.size = O(head)`.
    pub fn open(options: OpenOptions) -> Result<Self, WalError> {
        let index_path = options
            .index
            .clone()
            .unwrap_or_else(|| default_index_path(&options.path));

        let mut log = OsFile::open(&options.path, options.writable)?;
        let index_file = OsFile::open(&index_path, options.writable)?;
        let mut index = IndexFile::open(index_file)?;

        let expected_size = index.offset(index.head())? as u64;
        let actual_size = log.size()?;
        if actual_size > expected_size {
            if options.writable {
                eprintln!(
                    "Truncating unreachable log tail past offset {expected_size} (file was {actual_size} bytes)"
                );
                log.truncate(expected_size)?;
            } else {
                return Err(WalError::assertion(
                    "log file has unreachable trailing bytes past the index write head",
                ));
            }
        } else if actual_size < expected_size {
            return Err(WalError::assertion(
                "log file is shorter than the index write head records",
            ));
        }

        Ok(Self { log, index })
    }

    /// Tries [`Wal::open`]; on a not-found error with `writable = true`,
    /// falls back to [`Wal::create`]. Propagates any other error.
    pub fn open_or_create(options: OpenOptions) -> Result<Self, WalError> {
        match Self::open(options.clone()) {
            Ok(wal) => Ok(wal),
            Err(WalError::Io(err))
                if err.kind() == std::io::ErrorKind::NotFound && options.writable =>
            {
                Self::create(CreateOptions {
                    path: options.path,
                    index: options.index,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub fn name(&self) -> &Path {
        self.log.name()
    }

    pub fn index(&self) -> &IndexFile<OsFile> {
        &self.index
    }

    pub fn writable(&self) -> bool {
        self.log.writable()
    }

    pub fn size(&self) -> Result<u64, WalError> {
        Ok(self.log.size()?)
    }

    /// One past the last written LSN -- the LSN the next `write` will be
    /// assigned.
    pub fn next(&self) -> Lsn {
        self.index.head()
    }

    pub fn commit_head(&self) -> Lsn {
        self.index.commit_head()
    }

    /// Number of entries still live (not truncated) in the log.
    pub fn len(&self) -> u32 {
        (self.index.head() - self.index.base()) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Result<WalStats, WalError> {
        Ok(WalStats {
            next: self.next(),
            commit_head: self.commit_head(),
            size: self.size()?,
            is_empty: self.is_empty(),
        })
    }

    /// Appends `payload` as a new entry and returns its assigned LSN.
    pub fn write(&mut self, payload: &[u8]) -> Result<Lsn, WalError> {
        if payload.is_empty() {
            return Err(WalError::assertion("payload must not be empty"));
        }

        let start = self.index.offset(self.index.head())? as u64;
        self.log.write_at(start, payload)?;
        let end = start + payload.len() as u64;
        self.index.increment(end as i32)
    }

    /// Reads the payload for entry `lsn` verbatim.
    pub fn read(&mut self, lsn: Lsn) -> Result<Vec<u8>, WalError> {
        let (offset, len) = self.index.get(lsn)?;
        Ok(self.log.read_at(offset as u64, len as usize)?)
    }

    /// Returns a lazy iterator over `count` entries starting at `first`
    /// (default: all remaining entries, `next() - first`). The index is
    /// queried once for the whole range; each entry's bytes are read from
    /// the log file on demand as the caller pulls the next item.
    pub fn read_range(
        &mut self,
        first: Lsn,
        count: Option<u32>,
    ) -> Result<WalRangeIter<'_, OsFile>, WalError> {
        let count = count.unwrap_or_else(|| (self.index.head() - first).max(0) as u32);
        let slots = self.index.get_range(first, count)?;
        Ok(WalRangeIter::new(&mut self.log, first, slots))
    }

    /// `L < commit` -- preserved verbatim; see [`IndexFile::is_committed`].
    pub fn is_committed(&self, lsn: Lsn) -> bool {
        self.index.is_committed(lsn)
    }

    pub fn is_committed_or_earlier(&self, lsn: Lsn) -> bool {
        self.index.is_committed_or_earlier(lsn)
    }

    /// Out-of-order commit is a non-fatal, recoverable error; repeated
    /// commit of an already-committed LSN is idempotent success.
    pub fn commit(&mut self, lsn: Lsn) -> Result<Lsn, WalError> {
        self.index.commit(lsn)
    }

    /// Truncates the uncommitted tail from `from_lsn` onward. Returns the
    /// new log size in bytes.
    pub fn truncate(&mut self, from_lsn: Lsn) -> Result<u64, WalError> {
        let new_size = self.index.truncate(from_lsn)?;
        self.log.truncate(new_size as u64)?;
        Ok(new_size as u64)
    }

    /// Walks every uncommitted entry in LSN order, handing each to the
    /// recovery decision. [`Recovery::RejectAll`] truncates the whole
    /// uncommitted tail without reading it. [`Recovery::Handler`] reads
    /// and decides each entry in turn: accepting commits it and moves on;
    /// rejecting truncates at that LSN and stops immediately. If every
    /// uncommitted entry is accepted, the final `truncate(next())` is a
    /// no-op success (see [`IndexFile::truncate`]).
    pub fn recover<Fh>(&mut self, decision: Recovery<Fh>) -> Result<(), WalError>
    where
        Fh: FnMut(Lsn, &[u8]) -> Result<bool, WalError>,
    {
        let head = self.index.head();
        let first_uncommitted = self.index.commit_head() + 1;
        if first_uncommitted >= head {
            return Ok(());
        }

        match decision {
            Recovery::RejectAll => {
                self.truncate(first_uncommitted)?;
                Ok(())
            }
            Recovery::Handler(mut handler) => {
                let mut lsn = first_uncommitted;
                while lsn < head {
                    let payload = self.read(lsn)?;
                    if handler(lsn, &payload)? {
                        self.commit(lsn)?;
                        lsn += 1;
                    } else {
                        self.truncate(lsn)?;
                        return Ok(());
                    }
                }
                self.truncate(head)?;
                Ok(())
            }
        }
    }

    /// Closes both underlying files. Each is fsynced before its handle is
    /// dropped, so a crash immediately after `close` returns `Ok` cannot
    /// lose anything the OS page cache was still holding. Idempotent on
    /// success.
    pub fn close(mut self) -> Result<(), WalError> {
        self.log.sync()?;
        self.log.close()?;
        self.index.close()
    }
}
