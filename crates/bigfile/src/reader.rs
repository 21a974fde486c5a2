//! Random-access reads from a packed archive

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::config::BigfileConfig;
use crate::error::{BigfileError, Result};
use crate::toc::TocEntry;

/// Reader over one archive file.
///
/// Every read is checked against the archive length before touching the file.
#[derive(Debug)]
pub struct BigfileReader {
    file: Option<BufReader<File>>,
    path: Option<PathBuf>,
    len: u64,
    buffer_size: usize,
}

impl BigfileReader {
    /// Create a closed reader using the configured buffer size
    pub fn new(config: &BigfileConfig) -> Self {
        Self {
            file: None,
            path: None,
            len: 0,
            buffer_size: config.read_buffer_size,
        }
    }

    /// Open `path` for reading, closing any previously opened archive
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.close();

        let file = File::open(path).map_err(|source| {
            error!("Failed to open archive {}: {}", path.display(), source);
            BigfileError::Archive {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.len = file.metadata()?.len();
        self.file = Some(BufReader::with_capacity(self.buffer_size, file));
        self.path = Some(path.to_path_buf());
        debug!("Opened archive {} ({} bytes)", path.display(), self.len);
        Ok(())
    }

    /// Release the file handle
    pub fn close(&mut self) {
        self.file = None;
        self.path = None;
        self.len = 0;
    }

    /// Whether an archive is open
    pub const fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Length of the open archive in bytes
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the open archive is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the open archive
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read `size` bytes starting at `offset`
    pub fn read(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let len = usize::try_from(size).map_err(|_| BigfileError::OutOfBounds {
            offset,
            size,
            len: self.len,
        })?;
        let mut data = vec![0u8; len];
        self.read_into(offset, &mut data)?;
        Ok(data)
    }

    /// Fill `buf` with the bytes starting at `offset`
    pub fn read_into(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = self.seek_checked(offset, buf.len() as u64)?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Read the payload of a TOC entry from its primary offset
    pub fn read_entry(&mut self, entry: &TocEntry) -> Result<Vec<u8>> {
        match entry.offset().get() {
            Some(offset) => self.read(offset, u64::from(entry.size)),
            None if entry.size == 0 => Ok(Vec::new()),
            None => Err(BigfileError::InvalidFormat(format!(
                "entry {} has {} bytes but no offset",
                entry.file_id, entry.size
            ))),
        }
    }

    /// Stream `size` bytes at `offset` into `dest` in buffer-sized chunks.
    ///
    /// Returns the number of bytes copied.
    pub fn copy_to<W: Write>(
        &mut self,
        offset: u64,
        size: u64,
        dest: &mut W,
        buffer: &mut [u8],
    ) -> Result<u64> {
        if buffer.is_empty() {
            return Err(BigfileError::InvalidState(
                "copy buffer must not be empty".to_string(),
            ));
        }
        let file = self.seek_checked(offset, size)?;

        let mut remaining = size;
        while remaining > 0 {
            let chunk = usize::try_from(remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
            let buf = &mut buffer[..chunk];
            file.read_exact(buf)?;
            dest.write_all(buf)?;
            remaining -= chunk as u64;
        }

        Ok(size)
    }

    fn seek_checked(&mut self, offset: u64, size: u64) -> Result<&mut BufReader<File>> {
        let len = self.len;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BigfileError::InvalidState("archive is not open".to_string()))?;

        match offset.checked_add(size) {
            Some(end) if end <= len => {}
            _ => return Err(BigfileError::OutOfBounds { offset, size, len }),
        }

        file.seek(SeekFrom::Start(offset))?;
        Ok(file)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn archive_with(data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("Game.gda");
        std::fs::write(&path, data).expect("write archive");
        (dir, path)
    }

    #[test]
    fn test_read_ranges() {
        let (_dir, path) = archive_with(b"0123456789");
        let mut reader = BigfileReader::new(&BigfileConfig::default());
        reader.open(&path).expect("open");

        assert!(reader.is_open());
        assert_eq!(reader.len(), 10);
        assert_eq!(reader.read(2, 3).expect("read"), b"234");
        assert_eq!(reader.read(0, 10).expect("read"), b"0123456789");
        assert_eq!(reader.read(10, 0).expect("read"), b"");
    }

    #[test]
    fn test_out_of_bounds() {
        let (_dir, path) = archive_with(b"0123456789");
        let mut reader = BigfileReader::new(&BigfileConfig::default());
        reader.open(&path).expect("open");

        assert!(matches!(
            reader.read(8, 3),
            Err(BigfileError::OutOfBounds { offset: 8, size: 3, len: 10 })
        ));
        assert!(matches!(
            reader.read(u64::MAX, 1),
            Err(BigfileError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_closed_reader() {
        let mut reader = BigfileReader::new(&BigfileConfig::default());
        assert!(matches!(reader.read(0, 1), Err(BigfileError::InvalidState(_))));

        let dir = tempdir().expect("tempdir");
        let err = reader.open(dir.path().join("missing.gda")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_copy_to_small_buffer() {
        let (_dir, path) = archive_with(b"abcdefghijklmnop");
        let mut reader = BigfileReader::new(&BigfileConfig::default());
        reader.open(&path).expect("open");

        let mut out = Vec::new();
        let mut buffer = [0u8; 3];
        let copied = reader.copy_to(4, 10, &mut out, &mut buffer).expect("copy");
        assert_eq!(copied, 10);
        assert_eq!(out, b"efghijklmn");
    }
}
