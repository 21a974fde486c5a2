//! Hash database contexts: `i32 count` followed by one 20-byte digest per entry

use std::io::{Read, Seek, Write};

use binrw::Endian;

use crate::error::Result;
use crate::hash::{CONTENT_HASH_SIZE, ContentHash};
use crate::toc::TocEntry;
use crate::toc::context::{ReadContext, WriteContext};

/// Writes one digest per entry in a single pass
#[derive(Debug, Default)]
pub struct HdbWriter;

impl WriteContext for HdbWriter {
    fn begin(&mut self, _entries: &[TocEntry]) -> Result<()> {
        Ok(())
    }

    fn write<W: Write + Seek>(
        &mut self,
        _index: usize,
        entry: &TocEntry,
        writer: &mut W,
        _endian: Endian,
    ) -> Result<()> {
        writer.write_all(entry.content_hash.as_bytes())?;
        Ok(())
    }

    fn next(&mut self) -> bool {
        false
    }
}

/// Reads one digest per entry in a single pass
#[derive(Debug, Default)]
pub struct HdbReader;

impl ReadContext for HdbReader {
    fn record_size(&self) -> u64 {
        CONTENT_HASH_SIZE as u64
    }

    fn begin(&mut self, _count: usize, _stream_len: u64) -> Result<()> {
        Ok(())
    }

    fn read<R: Read + Seek>(
        &mut self,
        _index: usize,
        entry: &mut TocEntry,
        reader: &mut R,
        _endian: Endian,
    ) -> Result<()> {
        let mut digest = [0u8; CONTENT_HASH_SIZE];
        reader.read_exact(&mut digest)?;
        entry.content_hash = ContentHash(digest);
        Ok(())
    }

    fn next(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::toc::context::{read_table, write_table};
    use std::io::Cursor;

    #[test]
    fn test_layout() {
        let mut entries: Vec<TocEntry> = (0..2).map(TocEntry::new).collect();
        entries[1].content_hash = ContentHash::compute(b"payload");

        let mut out = Cursor::new(Vec::new());
        write_table(&mut HdbWriter, &entries, &mut out, Endian::Big).expect("write");
        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 4 + 2 * CONTENT_HASH_SIZE);
        assert_eq!(&bytes[0..4], &2i32.to_be_bytes());
        assert!(bytes[4..24].iter().all(|&b| b == 0));

        let mut decoded: Vec<TocEntry> = (0..2).map(TocEntry::new).collect();
        read_table(
            &mut HdbReader,
            &mut decoded,
            &mut Cursor::new(bytes),
            Endian::Big,
            "HDB",
            false,
        )
        .expect("read");
        assert!(decoded[0].content_hash.is_empty());
        assert_eq!(decoded[1].content_hash, ContentHash::compute(b"payload"));
    }
}
