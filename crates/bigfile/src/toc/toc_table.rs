//! TOC table contexts
//!
//! Layout:
//!
//! ```text
//! i32 count
//! count x (u32 offsetField, i32 sizeField)
//! aux blocks, in entry order, for indirect entries:
//!     i32 instancesNum, instancesNum x u32 (offset >> 5)
//!     [i32 childCount, childCount x u64 childId]   when has-children is set
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite, Endian};

use crate::error::{BigfileError, Result};
use crate::toc::TocEntry;
use crate::toc::context::{ReadContext, WriteContext};
use crate::toc::wire::{MAX_AUX_POSITION, OffsetField, SizeField, decode_offset, encode_offset};

/// Size of one fixed record
pub const RECORD_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TocWritePhase {
    ComputeOffsets,
    WriteRecords,
    WriteAux,
}

/// Writes the TOC in three passes: aux positions, fixed records, aux blocks
#[derive(Debug)]
pub struct TocWriter {
    phase: TocWritePhase,
    cursor: u64,
    aux_positions: Vec<Option<u32>>,
}

impl Default for TocWriter {
    fn default() -> Self {
        Self {
            phase: TocWritePhase::ComputeOffsets,
            cursor: 0,
            aux_positions: Vec::new(),
        }
    }
}

impl TocWriter {
    /// Create a writer positioned at its first phase
    pub fn new() -> Self {
        Self::default()
    }

    fn compute_offset(&mut self, index: usize, entry: &TocEntry) -> Result<()> {
        if !entry.is_indirect() {
            return Ok(());
        }
        if self.cursor > MAX_AUX_POSITION {
            return Err(BigfileError::OffsetOverflow(self.cursor));
        }
        self.aux_positions[index] = Some(self.cursor as u32);
        self.cursor += entry.aux_size();
        Ok(())
    }

    fn write_record<W: Write + Seek>(
        &self,
        index: usize,
        entry: &TocEntry,
        writer: &mut W,
        endian: Endian,
    ) -> Result<()> {
        let size = SizeField::new(
            entry.file_id,
            u64::from(entry.size),
            entry.compressed,
            !entry.children.is_empty(),
        )?;
        let offset = match self.aux_positions[index] {
            Some(position) => OffsetField::Indirect(position),
            None => OffsetField::Literal(entry.offset()),
        };

        offset.encode()?.write_options(writer, endian, ())?;
        size.encode().write_options(writer, endian, ())?;
        Ok(())
    }

    fn write_aux<W: Write + Seek>(
        &self,
        index: usize,
        entry: &TocEntry,
        writer: &mut W,
        endian: Endian,
    ) -> Result<()> {
        let Some(expected) = self.aux_positions[index] else {
            return Ok(());
        };
        let position = writer.stream_position()?;
        if position != u64::from(expected) {
            return Err(BigfileError::InvalidFormat(format!(
                "aux block of entry {} at {position}, computed {expected}",
                entry.file_id
            )));
        }

        count_field(entry.offsets.len())?.write_options(writer, endian, ())?;
        for offset in &entry.offsets {
            encode_offset(*offset)?.write_options(writer, endian, ())?;
        }
        if !entry.children.is_empty() {
            count_field(entry.children.len())?.write_options(writer, endian, ())?;
            for child in &entry.children {
                child.write_options(writer, endian, ())?;
            }
        }
        Ok(())
    }
}

fn count_field(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| BigfileError::TooManyEntries(len))
}

impl WriteContext for TocWriter {
    fn begin(&mut self, entries: &[TocEntry]) -> Result<()> {
        self.phase = TocWritePhase::ComputeOffsets;
        self.cursor = 4 + RECORD_SIZE * entries.len() as u64;
        self.aux_positions = vec![None; entries.len()];
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
            TocWritePhase::ComputeOffsets => self.compute_offset(index, entry),
            TocWritePhase::WriteRecords => self.write_record(index, entry, writer, endian),
            TocWritePhase::WriteAux => self.write_aux(index, entry, writer, endian),
        }
    }

    fn next(&mut self) -> bool {
        self.phase = match self.phase {
            TocWritePhase::ComputeOffsets => TocWritePhase::WriteRecords,
            TocWritePhase::WriteRecords => TocWritePhase::WriteAux,
            TocWritePhase::WriteAux => return false,
        };
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TocReadPhase {
    ReadRecords,
    Resolve,
}

/// Reads the TOC in two passes: fixed records, then aux blocks
#[derive(Debug)]
pub struct TocReader {
    phase: TocReadPhase,
    table_end: u64,
    stream_len: u64,
    raw_offsets: Vec<u32>,
    has_children: Vec<bool>,
}

impl Default for TocReader {
    fn default() -> Self {
        Self {
            phase: TocReadPhase::ReadRecords,
            table_end: 0,
            stream_len: 0,
            raw_offsets: Vec::new(),
            has_children: Vec::new(),
        }
    }
}

impl TocReader {
    /// Create a reader positioned at its first phase
    pub fn new() -> Self {
        Self::default()
    }

    fn read_record<R: Read + Seek>(
        &mut self,
        entry: &mut TocEntry,
        reader: &mut R,
        endian: Endian,
    ) -> Result<()> {
        let raw_offset = u32::read_options(reader, endian, ())?;
        let size = SizeField::decode(u32::read_options(reader, endian, ())?);

        entry.size = size.size;
        entry.compressed = size.compressed;
        self.raw_offsets.push(raw_offset);
        self.has_children.push(size.has_children);
        Ok(())
    }

    fn read_count<R: Read + Seek>(
        &self,
        entry: &TocEntry,
        reader: &mut R,
        endian: Endian,
        item_size: u64,
    ) -> Result<usize> {
        let raw = i32::read_options(reader, endian, ())?;
        let position = reader.stream_position()?;
        let count = usize::try_from(raw).ok().filter(|&count| {
            (count as u64)
                .checked_mul(item_size)
                .and_then(|bytes| bytes.checked_add(position))
                .is_some_and(|end| end <= self.stream_len)
        });
        count.ok_or_else(|| {
            BigfileError::InvalidFormat(format!(
                "entry {}: invalid aux count {raw} at {position}",
                entry.file_id
            ))
        })
    }

    fn resolve<R: Read + Seek>(
        &self,
        index: usize,
        entry: &mut TocEntry,
        reader: &mut R,
        endian: Endian,
    ) -> Result<()> {
        let has_children = self.has_children[index];
        match OffsetField::decode(self.raw_offsets[index]) {
            OffsetField::Literal(offset) => {
                if has_children {
                    return Err(BigfileError::InvalidFormat(format!(
                        "entry {} has children but no aux block",
                        entry.file_id
                    )));
                }
                entry.offsets = vec![offset];
                entry.children.clear();
            }
            OffsetField::Indirect(position) => {
                let position = u64::from(position);
                if position < self.table_end || position + 4 > self.stream_len {
                    return Err(BigfileError::InvalidFormat(format!(
                        "entry {}: aux block position {position} outside TOC",
                        entry.file_id
                    )));
                }
                reader.seek(SeekFrom::Start(position))?;

                let instances = self.read_count(entry, reader, endian, 4)?;
                entry.offsets = (0..instances)
                    .map(|_| u32::read_options(reader, endian, ()).map(decode_offset))
                    .collect::<binrw::BinResult<_>>()?;

                entry.children.clear();
                if has_children {
                    let count = self.read_count(entry, reader, endian, 8)?;
                    entry.children = (0..count)
                        .map(|_| u64::read_options(reader, endian, ()))
                        .collect::<binrw::BinResult<_>>()?;
                }
            }
        }
        Ok(())
    }
}

impl ReadContext for TocReader {
    fn record_size(&self) -> u64 {
        RECORD_SIZE
    }

    fn begin(&mut self, count: usize, stream_len: u64) -> Result<()> {
        self.phase = TocReadPhase::ReadRecords;
        self.table_end = 4 + RECORD_SIZE * count as u64;
        self.stream_len = stream_len;
        self.raw_offsets = Vec::with_capacity(count);
        self.has_children = Vec::with_capacity(count);
        Ok(())
    }

    fn read<R: Read + Seek>(
        &mut self,
        index: usize,
        entry: &mut TocEntry,
        reader: &mut R,
        endian: Endian,
    ) -> Result<()> {
        match self.phase {
            TocReadPhase::ReadRecords => self.read_record(entry, reader, endian),
            TocReadPhase::Resolve => self.resolve(index, entry, reader, endian),
        }
    }

    fn next(&mut self) -> bool {
        match self.phase {
            TocReadPhase::ReadRecords => {
                self.phase = TocReadPhase::Resolve;
                true
            }
            TocReadPhase::Resolve => false,
        }
    }
}
