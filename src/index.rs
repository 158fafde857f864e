//! Index file: fixed header plus a densely packed array of big-endian
//! byte offsets mapping LSN -> (offset, length) inside the log file.
//!
//! On-disk layout (bit-exact, big-endian throughout):
//!
//! ```text
//! offset  size  field
//! 0       4     marker  = "IDX$"
//! 4       4     base     (i32 BE; reserved for future segmentation)
//! 8       4     head     (i32 BE; next free LSN)
//! 12      4     commit   (i32 BE; last committed LSN, or -1)
//! 16      4*N   offsets  O(base) .. O(head), N = head - base + 1
//! ```

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::WalError;
use crate::file::RandomAccessFile;
use crate::{Lsn, NO_COMMIT};

pub(crate) const MARKER: [u8; 4] = *b"IDX$";
pub(crate) const HLEN: usize = 16;

/// Header + offset-array index file. No entry offsets are cached beyond
/// the 16-byte header; every lookup reads 4 or 8 bytes from disk.
#[derive(Debug)]
pub struct IndexFile<F: RandomAccessFile> {
    file: F,
    marker: [u8; 4],
    base: Lsn,
    head: Lsn,
    commit: Lsn,
}

impl<F: RandomAccessFile> IndexFile<F> {
    /// Initializes a fresh index file: header with `base`, `head = base`,
    /// `commit = -1`, plus the sentinel first offset slot `O(base) =
    /// byte_offset`. Not idempotent -- `file` must be newly created.
    pub fn create(mut file: F, base: Lsn, byte_offset: i32) -> Result<Self, WalError> {
        let head = base;
        let commit = NO_COMMIT;

        let mut header = Vec::with_capacity(HLEN);
        header.extend_from_slice(&MARKER);
        header.write_i32::<BigEndian>(base)?;
        header.write_i32::<BigEndian>(head)?;
        header.write_i32::<BigEndian>(commit)?;
        file.write_at(0, &header)?;

        let mut slot = Vec::with_capacity(4);
        slot.write_i32::<BigEndian>(byte_offset)?;
        file.write_at(HLEN as u64, &slot)?;
        file.sync()?;

        Ok(Self {
            file,
            marker: MARKER,
            base,
            head,
            commit,
        })
    }

    /// Opens an existing index file, validating the marker and minimum size.
    pub fn open(file: F) -> Result<Self, WalError> {
        let size = file.size()?;
        if size < HLEN as u64 {
            return Err(WalError::assertion("index file too small"));
        }

        let mut opened = file;
        let header = opened.read_at(0, HLEN)?;
        let mut rdr = Cursor::new(&header);
        let mut marker = [0u8; 4];
        rdr.read_exact(&mut marker)?;
        if marker != MARKER {
            return Err(WalError::assertion("invalid index marker"));
        }

        let base = rdr.read_i32::<BigEndian>()?;
        let head = rdr.read_i32::<BigEndian>()?;
        let commit = rdr.read_i32::<BigEndian>()?;

        Ok(Self {
            file: opened,
            marker,
            base,
            head,
            commit,
        })
    }

    pub fn marker(&self) -> [u8; 4] {
        self.marker
    }

    pub fn base(&self) -> Lsn {
        self.base
    }

    pub fn head(&self) -> Lsn {
        self.head
    }

    pub fn commit_head(&self) -> Lsn {
        self.commit
    }

    pub fn name(&self) -> &std::path::Path {
        self.file.name()
    }

    /// `L < commit` -- preserved verbatim: the most recently committed LSN
    /// reports as *not* committed. See [`Self::is_committed_or_earlier`].
    pub fn is_committed(&self, lsn: Lsn) -> bool {
        lsn < self.commit
    }

    /// The correctly-inclusive counterpart to [`Self::is_committed`].
    pub fn is_committed_or_earlier(&self, lsn: Lsn) -> bool {
        lsn <= self.commit
    }

    fn slot_offset(&self, lsn: Lsn) -> u64 {
        HLEN as u64 + (lsn - self.base) as u64 * 4
    }

    /// Reads `O(lsn)` for any `lsn` in `[base, head]`.
    pub fn offset(&mut self, lsn: Lsn) -> Result<i32, WalError> {
        if lsn < self.base || lsn > self.head {
            return Err(WalError::assertion("index out of range"));
        }
        let buf = self.file.read_at(self.slot_offset(lsn), 4)?;
        Ok(Cursor::new(&buf).read_i32::<BigEndian>()?)
    }

    /// Reads `(offset, length)` for entry `lsn`, valid for `lsn < head`.
    pub fn get(&mut self, lsn: Lsn) -> Result<(i32, i32), WalError> {
        if lsn < self.base || lsn >= self.head {
            return Err(WalError::assertion("index out of range"));
        }
        let buf = self.file.read_at(self.slot_offset(lsn), 8)?;
        let mut rdr = Cursor::new(&buf);
        let offset = rdr.read_i32::<BigEndian>()?;
        let next = rdr.read_i32::<BigEndian>()?;
        Ok((offset, next - offset))
    }

    /// Reads `(offset, length)` for `count` consecutive entries starting at
    /// `lsn`, valid for `lsn <= head` and `count <= head - lsn`. An empty
    /// range (`count == 0`) is allowed at `lsn == head`.
    pub fn get_range(&mut self, lsn: Lsn, count: u32) -> Result<Vec<(i32, i32)>, WalError> {
        if lsn < self.base || lsn > self.head || (lsn == self.head && count > 0) {
            return Err(WalError::assertion("index out of range"));
        }
        let available = (self.head - lsn) as u32;
        if count > available {
            return Err(WalError::assertion("range exceeds available entries"));
        }

        let buf = self
            .file
            .read_at(self.slot_offset(lsn), (count as usize + 1) * 4)?;
        let mut rdr = Cursor::new(&buf);
        let mut prev = rdr.read_i32::<BigEndian>()?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count as usize {
            let next = rdr.read_i32::<BigEndian>()?;
            out.push((prev, next - prev));
            prev = next;
        }
        Ok(out)
    }

    /// Records that the caller just wrote a payload whose one-past-last
    /// byte is `next_end_offset`. Writes the new sentinel slot, bumps
    /// `head`, and returns the LSN that was just assigned (pre-bump head).
    pub fn increment(&mut self, next_end_offset: i32) -> Result<Lsn, WalError> {
        let assigned = self.head;

        let mut slot = Vec::with_capacity(4);
        slot.write_i32::<BigEndian>(next_end_offset)?;
        self.file
            .write_at(self.slot_offset(self.head + 1), &slot)?;

        self.head += 1;
        let mut hbuf = Vec::with_capacity(4);
        hbuf.write_i32::<BigEndian>(self.head)?;
        self.file.write_at(8, &hbuf)?;

        Ok(assigned)
    }

    /// `L = commit + 1` succeeds and advances `commit`; `L < commit + 1`
    /// succeeds idempotently without writing (no check that `L >= base`);
    /// `L > commit + 1` fails with [`WalError::OutOfOrderCommit`].
    pub fn commit(&mut self, lsn: Lsn) -> Result<Lsn, WalError> {
        let expected = self.commit + 1;
        if lsn < expected {
            return Ok(lsn);
        }
        if lsn != expected {
            return Err(WalError::OutOfOrderCommit {
                expected,
                received: lsn,
            });
        }

        self.commit = lsn;
        let mut buf = Vec::with_capacity(4);
        buf.write_i32::<BigEndian>(self.commit)?;
        self.file.write_at(12, &buf)?;
        self.file.sync()?;
        Ok(lsn)
    }

    /// Requires `T > commit`. `T < head` is the nominal precondition;
    /// `T == head` is accepted as a no-op success (the one deliberate
    /// softening spec.md §9 calls for, needed by `Wal::recover`'s final
    /// step). Returns the new effective end-of-log byte offset.
    pub fn truncate(&mut self, t: Lsn) -> Result<i32, WalError> {
        if t <= self.commit {
            return Err(WalError::assertion("cannot truncate a committed log entry"));
        }
        if t > self.head {
            return Err(WalError::assertion("cannot truncate past head"));
        }

        self.head = t;
        let mut hbuf = Vec::with_capacity(4);
        hbuf.write_i32::<BigEndian>(self.head)?;
        self.file.write_at(8, &hbuf)?;
        self.file
            .truncate(self.slot_offset(self.head) + 4)?;
        self.file.sync()?;

        if t == self.base {
            self.offset(self.base)
        } else {
            let (offset, len) = self.get(t - 1)?;
            Ok(offset + len)
        }
    }

    pub fn close(self) -> Result<(), WalError> {
        self.file.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::OsFile;
    use tempfile::tempdir;

    fn new_index(dir: &std::path::Path) -> IndexFile<OsFile> {
        let path = dir.join("test.lix");
        let file = OsFile::create(&path).unwrap();
        IndexFile::create(file, 0, 0).unwrap()
    }

    #[test]
    fn create_sets_sentinel_and_header() {
        let dir = tempdir().unwrap();
        let idx = new_index(dir.path());
        assert_eq!(idx.marker(), MARKER);
        assert_eq!(idx.base(), 0);
        assert_eq!(idx.head(), 0);
        assert_eq!(idx.commit_head(), NO_COMMIT);
    }

    #[test]
    fn increment_assigns_dense_lsns_and_moves_head() {
        let dir = tempdir().unwrap();
        let mut idx = new_index(dir.path());

        let lsn0 = idx.increment(34).unwrap();
        assert_eq!(lsn0, 0);
        assert_eq!(idx.head(), 1);

        let lsn1 = idx.increment(34 + 24).unwrap();
        assert_eq!(lsn1, 1);
        assert_eq!(idx.head(), 2);

        let (offset, len) = idx.get(0).unwrap();
        assert_eq!((offset, len), (0, 34));
        let (offset, len) = idx.get(1).unwrap();
        assert_eq!((offset, len), (34, 24));
    }

    #[test]
    fn is_committed_is_strictly_less_than() {
        let dir = tempdir().unwrap();
        let mut idx = new_index(dir.path());
        idx.increment(10).unwrap();
        idx.increment(20).unwrap();
        idx.commit(0).unwrap();

        assert!(idx.is_committed(-1));
        // The most recently committed LSN reports as NOT committed --
        // preserved verbatim.
        assert!(!idx.is_committed(0));
        assert!(idx.is_committed_or_earlier(0));
    }

    #[test]
    fn commit_out_of_order_fails() {
        let dir = tempdir().unwrap();
        let mut idx = new_index(dir.path());
        idx.increment(10).unwrap();
        idx.increment(20).unwrap();
        idx.increment(30).unwrap();

        let err = idx.commit(1).unwrap_err();
        match err {
            WalError::OutOfOrderCommit { expected, received } => {
                assert_eq!(expected, 0);
                assert_eq!(received, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn commit_idempotent_for_already_committed() {
        let dir = tempdir().unwrap();
        let mut idx = new_index(dir.path());
        idx.increment(10).unwrap();
        idx.increment(20).unwrap();
        idx.commit(0).unwrap();
        idx.commit(1).unwrap();

        assert_eq!(idx.commit(0).unwrap(), 0);
        assert_eq!(idx.commit_head(), 1);
    }

    #[test]
    fn truncate_requires_uncommitted_and_updates_head() {
        let dir = tempdir().unwrap();
        let mut idx = new_index(dir.path());
        idx.increment(10).unwrap();
        idx.increment(20).unwrap();
        idx.increment(30).unwrap();
        idx.commit(0).unwrap();

        assert!(idx.truncate(0).is_err());

        let new_size = idx.truncate(1).unwrap();
        assert_eq!(new_size, 10);
        assert_eq!(idx.head(), 1);
    }

    #[test]
    fn truncate_to_head_is_a_noop_success() {
        let dir = tempdir().unwrap();
        let mut idx = new_index(dir.path());
        idx.increment(10).unwrap();
        idx.commit(0).unwrap();

        let size = idx.truncate(1).unwrap();
        assert_eq!(size, 10);
        assert_eq!(idx.head(), 1);
    }

    #[test]
    fn index_byte_length_matches_invariant() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.lix");
        let file = OsFile::create(&path).unwrap();
        let mut idx = IndexFile::create(file, 0, 0).unwrap();
        idx.increment(10).unwrap();
        idx.increment(25).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let expected = HLEN as u64 + (idx.head() - idx.base() + 1) as u64 * 4;
        assert_eq!(len, expected);
    }

    #[test]
    fn truncate_shrinks_index_file_to_match_invariant() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.lix");
        let file = OsFile::create(&path).unwrap();
        let mut idx = IndexFile::create(file, 0, 0).unwrap();
        idx.increment(10).unwrap();
        idx.increment(20).unwrap();
        idx.increment(30).unwrap();
        idx.commit(0).unwrap();

        idx.truncate(1).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let expected = HLEN as u64 + (idx.head() - idx.base() + 1) as u64 * 4;
        assert_eq!(len, expected);
    }

    #[test]
    fn reopen_preserves_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.lix");
        {
            let file = OsFile::create(&path).unwrap();
            let mut idx = IndexFile::create(file, 0, 0).unwrap();
            idx.increment(10).unwrap();
            idx.commit(0).unwrap();
        }

        let file = OsFile::open(&path, true).unwrap();
        let idx = IndexFile::open(file).unwrap();
        assert_eq!(idx.head(), 1);
        assert_eq!(idx.commit_head(), 0);
    }

    #[test]
    fn open_rejects_bad_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.lix");
        std::fs::write(&path, [0u8; 20]).unwrap();
        let file = OsFile::open(&path, true).unwrap();
        assert!(IndexFile::open(file).is_err());
    }
}
