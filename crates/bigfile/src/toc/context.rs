//! Multi-pass table drivers
//!
//! Every table file starts with an `i32` entry count. After that, a context
//! sees each entry once per pass, in index order, until it reports that it
//! has no further phase. A pass is always a complete scan of the table.

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite, Endian};
use tracing::trace;

use crate::error::{BigfileError, Result};
use crate::toc::TocEntry;

/// Serializer state for one table file
pub trait WriteContext {
    /// Prepare for the first pass
    fn begin(&mut self, entries: &[TocEntry]) -> Result<()>;

    /// Handle one entry in the current phase
    fn write<W: Write + Seek>(
        &mut self,
        index: usize,
        entry: &TocEntry,
        writer: &mut W,
        endian: Endian,
    ) -> Result<()>;

    /// Advance to the next phase; `false` when finished
    fn next(&mut self) -> bool;
}

/// Deserializer state for one table file
pub trait ReadContext {
    /// Smallest number of bytes each entry occupies after the count
    fn record_size(&self) -> u64;

    /// Prepare for the first pass
    fn begin(&mut self, count: usize, stream_len: u64) -> Result<()>;

    /// Handle one entry in the current phase
    fn read<R: Read + Seek>(
        &mut self,
        index: usize,
        entry: &mut TocEntry,
        reader: &mut R,
        endian: Endian,
    ) -> Result<()>;

    /// Advance to the next phase; `false` when finished
    fn next(&mut self) -> bool;
}

/// Write `entries` through `context`
pub fn write_table<W, C>(
    context: &mut C,
    entries: &[TocEntry],
    writer: &mut W,
    endian: Endian,
) -> Result<()>
where
    W: Write + Seek,
    C: WriteContext,
{
    let count =
        i32::try_from(entries.len()).map_err(|_| BigfileError::TooManyEntries(entries.len()))?;
    count.write_options(writer, endian, ())?;

    context.begin(entries)?;
    let mut pass = 0;
    loop {
        trace!("write pass {}", pass);
        for (index, entry) in entries.iter().enumerate() {
            context.write(index, entry, writer, endian)?;
        }
        if !context.next() {
            break;
        }
        pass += 1;
    }
    Ok(())
}

/// Read a table into `entries` through `context`.
///
/// With `primary` set the table sizes `entries` and assigns ids by index;
/// otherwise it must report the count already in `entries`.
pub fn read_table<R, C>(
    context: &mut C,
    entries: &mut Vec<TocEntry>,
    reader: &mut R,
    endian: Endian,
    table: &'static str,
    primary: bool,
) -> Result<()>
where
    R: Read + Seek,
    C: ReadContext,
{
    let stream_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let raw_count = i32::read_options(reader, endian, ())?;
    let count = usize::try_from(raw_count)
        .map_err(|_| BigfileError::InvalidFormat(format!("{table}: negative count {raw_count}")))?;

    let needed = 4 + context.record_size() * count as u64;
    if needed > stream_len {
        return Err(BigfileError::InvalidFormat(format!(
            "{table}: {count} entries need {needed} bytes, stream has {stream_len}"
        )));
    }

    if primary {
        entries.clear();
        entries.extend((0..count).map(|i| TocEntry::new(i as u64)));
    } else if entries.len() != count {
        return Err(BigfileError::EntryCountMismatch {
            toc: entries.len(),
            table,
            other: count,
        });
    }

    context.begin(count, stream_len)?;
    let mut pass = 0;
    loop {
        trace!("{} read pass {}", table, pass);
        for (index, entry) in entries.iter_mut().enumerate() {
            context.read(index, entry, reader, endian)?;
        }
        if !context.next() {
            break;
        }
        pass += 1;
    }
    Ok(())
}
