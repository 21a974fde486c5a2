//! Filename database contexts
//!
//! ```text
//! i32 count
//! count x i32 nameOffset
//! per entry, 4-byte aligned: i32 len, len bytes UTF-8, 0u8
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite, Endian};

use crate::align::align_up;
use crate::error::{BigfileError, Result};
use crate::toc::TocEntry;
use crate::toc::context::{ReadContext, WriteContext};
use crate::writer::write_zeros;

const NAME_ALIGNMENT: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FdbWritePhase {
    ComputeOffsets,
    WriteOffsets,
    WriteNames,
}

/// Writes the FDB in three passes: name offsets, offset table, names
#[derive(Debug)]
pub struct FdbWriter {
    phase: FdbWritePhase,
    cursor: u64,
    name_offsets: Vec<i32>,
}

impl Default for FdbWriter {
    fn default() -> Self {
        Self {
            phase: FdbWritePhase::ComputeOffsets,
            cursor: 0,
            name_offsets: Vec::new(),
        }
    }
}

impl FdbWriter {
    /// Create a writer positioned at its first phase
    pub fn new() -> Self {
        Self::default()
    }

    fn compute_offset(&mut self, index: usize, entry: &TocEntry) -> Result<()> {
        self.cursor = align_up(self.cursor, NAME_ALIGNMENT);
        self.name_offsets[index] =
            i32::try_from(self.cursor).map_err(|_| BigfileError::OffsetOverflow(self.cursor))?;
        self.cursor += 4 + entry.filename.len() as u64 + 1;
        Ok(())
    }

    fn write_name<W: Write + Seek>(
        &self,
        index: usize,
        entry: &TocEntry,
        writer: &mut W,
        endian: Endian,
    ) -> Result<()> {
        let position = writer.stream_position()?;
        let start = align_up(position, NAME_ALIGNMENT);
        write_zeros(writer, start - position)?;

        if start != self.name_offsets[index] as u64 {
            return Err(BigfileError::InvalidFormat(format!(
                "name of entry {} at {start}, computed {}",
                entry.file_id, self.name_offsets[index]
            )));
        }

        let len = i32::try_from(entry.filename.len())
            .map_err(|_| BigfileError::InvalidFormat("filename too long".to_string()))?;
        len.write_options(writer, endian, ())?;
        writer.write_all(entry.filename.as_bytes())?;
        writer.write_all(&[0])?;
        Ok(())
    }
}

impl WriteContext for FdbWriter {
    fn begin(&mut self, entries: &[TocEntry]) -> Result<()> {
        self.phase = FdbWritePhase::ComputeOffsets;
        self.cursor = 4 + 4 * entries.len() as u64;
        self.name_offsets = vec![0; entries.len()];
        Ok(())
    }

    fn write<W: Write + Seek>(
        &mut self,
        index: usize,
        entry: &TocEntry,
        writer: &mut W,
        endian: Endian,
    ) -> Result<()> {
        match self.phase {
            FdbWritePhase::ComputeOffsets => self.compute_offset(index, entry),
            FdbWritePhase::WriteOffsets => {
                self.name_offsets[index].write_options(writer, endian, ())?;
                Ok(())
            }
            FdbWritePhase::WriteNames => self.write_name(index, entry, writer, endian),
        }
    }

    fn next(&mut self) -> bool {
        self.phase = match self.phase {
            FdbWritePhase::ComputeOffsets => FdbWritePhase::WriteOffsets,
            FdbWritePhase::WriteOffsets => FdbWritePhase::WriteNames,
            FdbWritePhase::WriteNames => return false,
        };
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FdbReadPhase {
    ReadOffsets,
    ReadNames,
}

/// Reads the FDB in two passes: skip the offset table, then read names
#[derive(Debug)]
pub struct FdbReader {
    phase: FdbReadPhase,
    stream_len: u64,
}

impl Default for FdbReader {
    fn default() -> Self {
        Self {
            phase: FdbReadPhase::ReadOffsets,
            stream_len: 0,
        }
    }
}

impl FdbReader {
    /// Create a reader positioned at its first phase
    pub fn new() -> Self {
        Self::default()
    }

    fn read_name<R: Read + Seek>(
        &self,
        entry: &mut TocEntry,
        reader: &mut R,
        endian: Endian,
    ) -> Result<()> {
        let position = reader.stream_position()?;
        reader.seek(SeekFrom::Start(align_up(position, NAME_ALIGNMENT)))?;

        let raw_len = i32::read_options(reader, endian, ())?;
        let start = reader.stream_position()?;
        let len = usize::try_from(raw_len)
            .ok()
            .filter(|&len| start + len as u64 + 1 <= self.stream_len)
            .ok_or_else(|| {
                BigfileError::InvalidFormat(format!(
                    "entry {}: invalid filename length {raw_len}",
                    entry.file_id
                ))
            })?;

        let mut bytes = vec![0u8; len + 1];
        reader.read_exact(&mut bytes)?;
        if bytes.pop() != Some(0) {
            return Err(BigfileError::InvalidFormat(format!(
                "entry {}: filename is not NUL terminated",
                entry.file_id
            )));
        }
        entry.filename = String::from_utf8(bytes).map_err(|e| {
            BigfileError::InvalidFormat(format!("entry {}: filename: {e}", entry.file_id))
        })?;
        Ok(())
    }
}

impl ReadContext for FdbReader {
    fn record_size(&self) -> u64 {
        4
    }

    fn begin(&mut self, _count: usize, stream_len: u64) -> Result<()> {
        self.phase = FdbReadPhase::ReadOffsets;
        self.stream_len = stream_len;
        Ok(())
    }

    fn read<R: Read + Seek>(
        &mut self,
        _index: usize,
        entry: &mut TocEntry,
        reader: &mut R,
        endian: Endian,
    ) -> Result<()> {
        match self.phase {
            // Names are laid out sequentially; the table is only needed for random access.
            FdbReadPhase::ReadOffsets => {
                i32::read_options(reader, endian, ())?;
                Ok(())
            }
            FdbReadPhase::ReadNames => self.read_name(entry, reader, endian),
        }
    }

    fn next(&mut self) -> bool {
        match self.phase {
            FdbReadPhase::ReadOffsets => {
                self.phase = FdbReadPhase::ReadNames;
                true
            }
            FdbReadPhase::ReadNames => false,
        }
    }
}
