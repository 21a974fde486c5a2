//! Archive writers
//!
//! Payloads are appended at the current position and followed by zero bytes
//! up to the next multiple of the configured alignment:
//!
//! ```text
//! [payload 0][zeros][payload 1][zeros]...
//!  ^ 0               ^ align_up(size0, alignment)
//! ```
//!
//! [`BigfileWriterSimulator`] performs the same bookkeeping using only file
//! metadata, so the final archive size is known before any byte is written.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::align::align_up;
use crate::config::BigfileConfig;
use crate::error::{BigfileError, Result};
use crate::hash::{ContentHash, ContentHasher};
use crate::offset::StreamOffset;
use crate::reader::BigfileReader;

static ZEROS: [u8; 4096] = [0u8; 4096];

/// Placement of one payload written to an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenFile {
    /// Start of the payload
    pub offset: StreamOffset,
    /// Payload size in bytes
    pub size: u64,
    /// Digest of the payload, when hashing is enabled
    pub hash: Option<ContentHash>,
}

/// Sequential aligned writer over an archive
pub trait ArchiveWriter {
    /// Start a new archive at `path`, reserving `reserve_size` bytes
    fn open(&mut self, path: &Path, reserve_size: u64) -> Result<()>;

    /// Append the contents of `source`
    fn write_file(&mut self, source: &Path) -> Result<WrittenFile>;

    /// Append `size` bytes copied from `reader` at `offset`
    fn write_range(
        &mut self,
        reader: &mut BigfileReader,
        offset: u64,
        size: u64,
    ) -> Result<WrittenFile>;

    /// Finish the archive
    fn close(&mut self) -> Result<()>;

    /// Position the next payload would start at
    fn position(&self) -> u64;
}

fn source_error(path: &Path, source: std::io::Error) -> BigfileError {
    warn!("Unable to read source file {}: {}", path.display(), source);
    BigfileError::Source {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn write_zeros<W: Write>(out: &mut W, mut count: u64) -> std::io::Result<()> {
    while count > 0 {
        let chunk = usize::try_from(count).map_or(ZEROS.len(), |c| c.min(ZEROS.len()));
        out.write_all(&ZEROS[..chunk])?;
        count -= chunk as u64;
    }
    Ok(())
}

/// Writer producing a real archive file
#[derive(Debug)]
pub struct BigfileWriter {
    alignment: u64,
    write_buffer_size: usize,
    hash_contents: bool,
    out: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    position: u64,
    buffer: Vec<u8>,
}

impl BigfileWriter {
    /// Create a closed writer
    pub fn new(config: &BigfileConfig) -> Self {
        Self {
            alignment: config.file_alignment,
            write_buffer_size: config.write_buffer_size,
            hash_contents: config.hash_contents,
            out: None,
            path: None,
            position: 0,
            buffer: vec![0u8; config.read_buffer_size],
        }
    }

    /// Whether an archive is open
    pub const fn is_open(&self) -> bool {
        self.out.is_some()
    }

    fn pad(out: &mut BufWriter<File>, position: u64, alignment: u64) -> Result<u64> {
        let end = align_up(position, alignment);
        write_zeros(out, end - position)?;
        Ok(end)
    }
}

impl ArchiveWriter for BigfileWriter {
    fn open(&mut self, path: &Path, reserve_size: u64) -> Result<()> {
        if self.out.is_some() {
            return Err(BigfileError::InvalidState(
                "writer already has an open archive".to_string(),
            ));
        }

        let archive_error = |source: std::io::Error| {
            error!("Failed to create archive {}: {}", path.display(), source);
            BigfileError::Archive {
                path: path.to_path_buf(),
                source,
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(archive_error)?;
        }
        let file = File::create(path).map_err(archive_error)?;
        file.set_len(reserve_size).map_err(archive_error)?;

        debug!(
            "Opened archive {} reserving {} bytes",
            path.display(),
            reserve_size
        );
        self.out = Some(BufWriter::with_capacity(self.write_buffer_size, file));
        self.path = Some(path.to_path_buf());
        self.position = 0;
        Ok(())
    }

    fn write_file(&mut self, source: &Path) -> Result<WrittenFile> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| BigfileError::InvalidState("archive is not open".to_string()))?;
        let mut src = File::open(source).map_err(|e| source_error(source, e))?;

        let offset = self.position;
        let mut hasher = self.hash_contents.then(ContentHasher::new);
        let mut size = 0u64;
        loop {
            let n = src
                .read(&mut self.buffer)
                .map_err(|e| source_error(source, e))?;
            if n == 0 {
                break;
            }
            let chunk = &self.buffer[..n];
            out.write_all(chunk)?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(chunk);
            }
            size += n as u64;
        }

        self.position = Self::pad(out, offset + size, self.alignment)?;
        debug!("Wrote {} ({} bytes) at {:#x}", source.display(), size, offset);

        Ok(WrittenFile {
            offset: StreamOffset::new(offset),
            size,
            hash: hasher.map(ContentHasher::finish),
        })
    }

    fn write_range(
        &mut self,
        reader: &mut BigfileReader,
        offset: u64,
        size: u64,
    ) -> Result<WrittenFile> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| BigfileError::InvalidState("archive is not open".to_string()))?;

        let start = self.position;
        reader.copy_to(offset, size, out, &mut self.buffer)?;
        self.position = Self::pad(out, start + size, self.alignment)?;

        Ok(WrittenFile {
            offset: StreamOffset::new(start),
            size,
            hash: None,
        })
    }

    fn close(&mut self) -> Result<()> {
        let Some(out) = self.out.take() else {
            return Ok(());
        };
        let path = self.path.take().unwrap_or_default();

        let file = out.into_inner().map_err(|e| BigfileError::Archive {
            path: path.clone(),
            source: e.into_error(),
        })?;
        // Drop whatever part of the reservation was not used.
        file.set_len(self.position)?;
        file.sync_all()?;

        debug!("Closed archive {} at {} bytes", path.display(), self.position);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// Writer that only tracks offsets and never touches payload bytes
#[derive(Debug, Clone)]
pub struct BigfileWriterSimulator {
    alignment: u64,
    position: u64,
    open: bool,
    final_size: u64,
}

impl BigfileWriterSimulator {
    /// Create a closed simulator
    pub const fn new(config: &BigfileConfig) -> Self {
        Self {
            alignment: config.file_alignment,
            position: 0,
            open: false,
            final_size: 0,
        }
    }

    /// Archive size recorded by the last `close`
    pub const fn final_size(&self) -> u64 {
        self.final_size
    }

    /// Account for a payload of `size` bytes
    pub fn reserve(&mut self, size: u64) -> Result<WrittenFile> {
        if !self.open {
            return Err(BigfileError::InvalidState("archive is not open".to_string()));
        }
        let offset = self.position;
        self.position = align_up(offset + size, self.alignment);
        Ok(WrittenFile {
            offset: StreamOffset::new(offset),
            size,
            hash: None,
        })
    }
}

impl ArchiveWriter for BigfileWriterSimulator {
    fn open(&mut self, _path: &Path, _reserve_size: u64) -> Result<()> {
        self.open = true;
        self.position = 0;
        self.final_size = 0;
        Ok(())
    }

    fn write_file(&mut self, source: &Path) -> Result<WrittenFile> {
        let size = fs::metadata(source)
            .map_err(|e| source_error(source, e))?
            .len();
        self.reserve(size)
    }

    fn write_range(
        &mut self,
        _reader: &mut BigfileReader,
        _offset: u64,
        size: u64,
    ) -> Result<WrittenFile> {
        self.reserve(size)
    }

    fn close(&mut self) -> Result<()> {
        self.final_size = self.position;
        self.open = false;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}
