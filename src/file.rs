//! Byte-addressable random-access file abstraction.
//!
//! Single-owner: concurrent use of one handle is the caller's
//! responsibility (in this crate, the caller is always `Wal` or
//! `IndexFile`, which hold it behind `&mut self`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Contract a WAL needs from an underlying file: byte-addressable
/// read/write, truncate, fsync, close, and a handful of identifying
/// properties.
pub trait RandomAccessFile {
    fn read_at(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()>;
    fn truncate(&mut self, new_len: u64) -> std::io::Result<()>;
    fn sync(&mut self) -> std::io::Result<()>;
    fn close(self) -> std::io::Result<()>;
    fn size(&self) -> std::io::Result<u64>;
    fn name(&self) -> &Path;
    fn writable(&self) -> bool;
}

/// An on-disk `RandomAccessFile` backed by `std::fs::File`.
#[derive(Debug)]
pub struct OsFile {
    path: PathBuf,
    file: File,
    writable: bool,
}

impl OsFile {
    /// Creates a new file at `path`. Fails if a file already exists there.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self {
            path,
            file,
            writable: true,
        })
    }

    /// Opens an existing file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&path)?;
        Ok(Self {
            path,
            file,
            writable,
        })
    }
}

impl RandomAccessFile for OsFile {
    fn read_at(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> std::io::Result<()> {
        self.file.set_len(new_len)
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_all()
    }

    fn close(self) -> std::io::Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> std::io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn name(&self) -> &Path {
        &self.path
    }

    fn writable(&self) -> bool {
        self.writable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let mut f = OsFile::create(&path).unwrap();

        f.write_at(0, b"hello").unwrap();
        assert_eq!(f.size().unwrap(), 5);
        assert_eq!(f.read_at(0, 5).unwrap(), b"hello");

        f.write_at(5, b" world").unwrap();
        assert_eq!(f.read_at(0, 11).unwrap(), b"hello world");
    }

    #[test]
    fn create_twice_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        OsFile::create(&path).unwrap();
        assert!(OsFile::create(&path).is_err());
    }

    #[test]
    fn open_missing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        assert!(OsFile::open(&path, true).is_err());
    }

    #[test]
    fn truncate_shrinks_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let mut f = OsFile::create(&path).unwrap();
        f.write_at(0, b"0123456789").unwrap();
        f.truncate(4).unwrap();
        assert_eq!(f.size().unwrap(), 4);
        assert_eq!(f.read_at(0, 4).unwrap(), b"0123");
    }

    #[test]
    fn close_syncs_and_consumes_the_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let mut f = OsFile::create(&path).unwrap();
        f.write_at(0, b"durable").unwrap();
        f.close().unwrap();

        let mut reopened = OsFile::open(&path, false).unwrap();
        assert_eq!(reopened.read_at(0, 7).unwrap(), b"durable");
    }
}
