//! Table of contents for a Bigfile archive
//!
//! A TOC is persisted as three parallel tables sharing the entry index:
//!
//! - **TOC** (`.gdt`): offsets, sizes, flags and child lists
//! - **FDB** (`.gdf`): filenames
//! - **HDB** (`.gdh`): content hashes
//!
//! Each table is produced by a multi-pass context (see [`context`]) so that
//! forward references such as aux block positions are known before the
//! fixed records are emitted.

pub mod context;
pub mod fdb;
pub mod hdb;
pub mod toc_table;
pub mod wire;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use binrw::Endian;
use tracing::{error, info};

use crate::config::BigfileConfig;
use crate::error::{BigfileError, Result};
use crate::file::{BigfileFile, FileId};
use crate::hash::ContentHash;
use crate::offset::StreamOffset;
use crate::toc::context::{read_table, write_table};
use crate::toc::fdb::{FdbReader, FdbWriter};
use crate::toc::hdb::{HdbReader, HdbWriter};
use crate::toc::toc_table::{TocReader, TocWriter};
use crate::toc::wire::{MAX_FILE_SIZE, encode_offset};

/// One decoded TOC entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Identity of the file; equals the entry index in a saved TOC
    pub file_id: FileId,
    /// Placements of the payload; more than one for instanced entries
    pub offsets: Vec<StreamOffset>,
    /// Payload size in bytes
    pub size: u32,
    /// Payload is stored compressed
    pub compressed: bool,
    /// Relative path of the file
    pub filename: String,
    /// Digest of the payload
    pub content_hash: ContentHash,
    /// Ids of the attached files
    pub children: Vec<FileId>,
}

impl TocEntry {
    /// Create an entry with an unassigned offset
    pub fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            offsets: vec![StreamOffset::EMPTY],
            size: 0,
            compressed: false,
            filename: String::new(),
            content_hash: ContentHash::EMPTY,
            children: Vec::new(),
        }
    }

    /// Primary placement of the payload
    pub fn offset(&self) -> StreamOffset {
        self.offsets.first().copied().unwrap_or_default()
    }

    /// Whether the entry needs an aux block
    pub fn is_indirect(&self) -> bool {
        !self.children.is_empty() || self.offsets.len() != 1
    }

    /// Size of the aux block in bytes; zero for literal entries
    pub fn aux_size(&self) -> u64 {
        if !self.is_indirect() {
            return 0;
        }
        let mut size = 4 + 4 * self.offsets.len() as u64;
        if !self.children.is_empty() {
            size += 4 + 8 * self.children.len() as u64;
        }
        size
    }
}

impl TryFrom<&BigfileFile> for TocEntry {
    type Error = BigfileError;

    fn try_from(file: &BigfileFile) -> Result<Self> {
        if file.size > MAX_FILE_SIZE {
            return Err(BigfileError::FileTooLarge {
                file_id: file.file_id,
                size: file.size,
                max: MAX_FILE_SIZE,
            });
        }
        Ok(Self {
            file_id: file.file_id,
            offsets: file.offsets.clone(),
            size: file.size as u32,
            compressed: file.compressed,
            filename: file.filename().to_string_lossy().into_owned(),
            content_hash: file.content_hash.unwrap_or_default(),
            children: file.children.clone(),
        })
    }
}

/// Persisted table of contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BigfileToc {
    entries: Vec<TocEntry>,
}

impl BigfileToc {
    /// Wrap a list of entries
    pub const fn new(entries: Vec<TocEntry>) -> Self {
        Self { entries }
    }

    /// Build a TOC from packed files in id order
    pub fn from_files(files: &[BigfileFile]) -> Result<Self> {
        let entries = files
            .iter()
            .map(TocEntry::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// All entries in index order
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// Consume the TOC, returning its entries
    pub fn into_entries(self) -> Vec<TocEntry> {
        self.entries
    }

    /// Look up an entry by id
    pub fn get(&self, file_id: FileId) -> Option<&TocEntry> {
        usize::try_from(file_id)
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the TOC has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the invariants every saved TOC must satisfy
    pub fn validate(&self) -> Result<()> {
        let count = self.entries.len();
        if i32::try_from(count).is_err() {
            return Err(BigfileError::TooManyEntries(count));
        }

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.file_id != index as u64 {
                return Err(BigfileError::FileIdMismatch {
                    index,
                    file_id: entry.file_id,
                });
            }
            if u64::from(entry.size) > MAX_FILE_SIZE {
                return Err(BigfileError::FileTooLarge {
                    file_id: entry.file_id,
                    size: u64::from(entry.size),
                    max: MAX_FILE_SIZE,
                });
            }
            if let Some(&child) = entry.children.iter().find(|&&c| c >= count as u64) {
                return Err(BigfileError::ChildOutOfRange {
                    parent: entry.file_id,
                    child,
                    count,
                });
            }
            for offset in &entry.offsets {
                encode_offset(*offset)?;
            }
        }
        Ok(())
    }

    /// Serialize the three tables to arbitrary streams
    pub fn write_to<T, F, H>(&self, toc: &mut T, fdb: &mut F, hdb: &mut H, endian: Endian) -> Result<()>
    where
        T: Write + Seek,
        F: Write + Seek,
        H: Write + Seek,
    {
        self.validate()?;
        write_table(&mut TocWriter::new(), &self.entries, toc, endian)?;
        write_table(&mut FdbWriter::new(), &self.entries, fdb, endian)?;
        write_table(&mut HdbWriter, &self.entries, hdb, endian)?;
        Ok(())
    }

    /// Deserialize the three tables from arbitrary streams
    pub fn read_from<T, F, H>(toc: &mut T, fdb: &mut F, hdb: &mut H, endian: Endian) -> Result<Self>
    where
        T: Read + Seek,
        F: Read + Seek,
        H: Read + Seek,
    {
        let mut entries = Vec::new();
        read_table(&mut TocReader::new(), &mut entries, toc, endian, "TOC", true)?;
        read_table(&mut FdbReader::new(), &mut entries, fdb, endian, "FDB", false)?;
        read_table(&mut HdbReader, &mut entries, hdb, endian, "HDB", false)?;

        let count = entries.len();
        for entry in &entries {
            if let Some(&child) = entry.children.iter().find(|&&c| c >= count as u64) {
                return Err(BigfileError::ChildOutOfRange {
                    parent: entry.file_id,
                    child,
                    count,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Save the tables next to `archive`, replacing its extension
    pub fn save(&self, archive: &Path, config: &BigfileConfig) -> Result<()> {
        let toc_path = config.toc_path(archive);
        let result = self.save_tables(archive, config);

        match &result {
            Ok(()) => info!(
                "Saved TOC {} with {} entries",
                toc_path.display(),
                self.entries.len()
            ),
            Err(e) => error!("Failed to save TOC {}: {}", toc_path.display(), e),
        }
        result
    }

    /// Load the tables stored next to `archive`
    pub fn load(archive: &Path, config: &BigfileConfig) -> Result<Self> {
        let toc_path = config.toc_path(archive);
        let result = Self::load_tables(archive, config);

        match &result {
            Ok(toc) => info!(
                "Loaded TOC {} with {} entries",
                toc_path.display(),
                toc.len()
            ),
            Err(e) => error!("Failed to load TOC {}: {}", toc_path.display(), e),
        }
        result
    }

    fn save_tables(&self, archive: &Path, config: &BigfileConfig) -> Result<()> {
        let mut toc = create(&config.toc_path(archive))?;
        let mut fdb = create(&config.fdb_path(archive))?;
        let mut hdb = create(&config.hdb_path(archive))?;
        self.write_to(&mut toc, &mut fdb, &mut hdb, config.endian())?;
        toc.flush()?;
        fdb.flush()?;
        hdb.flush()?;
        Ok(())
    }

    fn load_tables(archive: &Path, config: &BigfileConfig) -> Result<Self> {
        let mut toc = open(&config.toc_path(archive))?;
        let mut fdb = open(&config.fdb_path(archive))?;
        let mut hdb = open(&config.hdb_path(archive))?;
        Self::read_from(&mut toc, &mut fdb, &mut hdb, config.endian())
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| BigfileError::Archive {
            path: path.to_path_buf(),
            source,
        })
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| BigfileError::Archive {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Endianness;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sample() -> BigfileToc {
        let mut a = TocEntry::new(0);
        a.filename = "levels/town.lvl".to_string();
        a.offsets = vec![StreamOffset::ZERO];
        a.size = 10;
        a.children = vec![2];
        a.content_hash = ContentHash::compute(b"town");

        let mut b = TocEntry::new(1);
        b.filename = "textures/wall.dds".to_string();
        b.offsets = vec![StreamOffset::new(256), StreamOffset::new(1024)];
        b.size = 200;
        b.compressed = true;

        let mut c = TocEntry::new(2);
        c.filename = "levels/town.nav".to_string();
        c.offsets = vec![StreamOffset::new(512)];
        c.size = 1;

        BigfileToc::new(vec![a, b, c, TocEntry::new(3)])
    }

    fn round_trip(toc: &BigfileToc, endian: Endian) -> Result<BigfileToc> {
        let (mut t, mut f, mut h) = (
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
        );
        toc.write_to(&mut t, &mut f, &mut h, endian)?;
        t.set_position(0);
        f.set_position(0);
        h.set_position(0);
        BigfileToc::read_from(&mut t, &mut f, &mut h, endian)
    }

    #[test]
    fn test_round_trip_streams() {
        let toc = sample();
        assert_eq!(round_trip(&toc, Endian::Little).expect("little"), toc);
        assert_eq!(round_trip(&toc, Endian::Big).expect("big"), toc);
    }

    #[test]
    fn test_save_load_files() {
        let dir = tempdir().expect("tempdir");
        let config = BigfileConfig::default().with_endianness(Endianness::Big);
        let archive = config.archive_path(dir.path());
        let toc = sample();

        toc.save(&archive, &config).expect("save");
        assert!(dir.path().join("Game.gdt").exists());
        assert!(dir.path().join("Game.gdf").exists());
        assert!(dir.path().join("Game.gdh").exists());

        let loaded = BigfileToc::load(&archive, &config).expect("load");
        assert_eq!(loaded, toc);
        assert_eq!(loaded.get(1).map(|e| e.filename.as_str()), Some("textures/wall.dds"));
    }

    #[test]
    fn test_load_missing() {
        let dir = tempdir().expect("tempdir");
        let config = BigfileConfig::default();
        let err = BigfileToc::load(&config.archive_path(dir.path()), &config).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_validate_rejects() {
        let mut toc = sample();
        toc.entries[1].file_id = 7;
        assert!(matches!(
            toc.validate(),
            Err(BigfileError::FileIdMismatch { index: 1, file_id: 7 })
        ));

        let mut toc = sample();
        toc.entries[0].children = vec![4];
        assert!(matches!(
            toc.validate(),
            Err(BigfileError::ChildOutOfRange { parent: 0, child: 4, count: 4 })
        ));

        let mut toc = sample();
        toc.entries[2].offsets = vec![StreamOffset::new(100)];
        assert!(matches!(
            toc.validate(),
            Err(BigfileError::MisalignedOffset { .. })
        ));
    }

    #[test]
    fn test_mismatched_table_counts() {
        let toc = sample();
        let short = BigfileToc::new(toc.entries()[..2].to_vec());

        let (mut t, mut f, mut h) = (
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
        );
        toc.write_to(&mut t, &mut f, &mut h, Endian::Little).expect("write");
        let mut short_fdb = Cursor::new(Vec::new());
        write_table(&mut FdbWriter::new(), short.entries(), &mut short_fdb, Endian::Little)
            .expect("write fdb");

        t.set_position(0);
        h.set_position(0);
        short_fdb.set_position(0);
        assert!(matches!(
            BigfileToc::read_from(&mut t, &mut short_fdb, &mut h, Endian::Little),
            Err(BigfileError::EntryCountMismatch { toc: 4, table: "FDB", other: 2 })
        ));
    }

    #[test]
    fn test_from_files() {
        let mut file = BigfileFile::new(0, "a.bin");
        file.size = 12;
        file.set_offset(StreamOffset::ZERO);
        let toc = BigfileToc::from_files(&[file]).expect("from files");
        assert_eq!(toc.entries()[0].filename, "a.bin");
        assert!(toc.entries()[0].content_hash.is_empty());

        let mut big = BigfileFile::new(0, "big.bin");
        big.size = MAX_FILE_SIZE + 1;
        assert!(matches!(
            BigfileToc::from_files(&[big]),
            Err(BigfileError::FileTooLarge { .. })
        ));
    }

    proptest! {
        #[test]
        fn toc_round_trips(
            specs in prop::collection::vec(
                (
                    prop::collection::vec(0u64..1_000_000, 0..4),
                    0u32..(1 << 30),
                    any::<bool>(),
                    "[a-z/]{0,12}",
                ),
                1..24,
            ),
            child_seed in prop::collection::vec(any::<u64>(), 0..6),
        ) {
            let count = specs.len() as u64;
            let entries: Vec<TocEntry> = specs
                .into_iter()
                .enumerate()
                .map(|(i, (offsets, size, compressed, filename))| TocEntry {
                    file_id: i as u64,
                    offsets: offsets.into_iter().map(|o| StreamOffset::new(o * 32)).collect(),
                    size,
                    compressed,
                    filename,
                    content_hash: ContentHash::compute(&i.to_le_bytes()),
                    children: if i == 0 {
                        child_seed.iter().map(|c| c % count).collect()
                    } else {
                        Vec::new()
                    },
                })
                .collect();
            let toc = BigfileToc::new(entries);

            let decoded = round_trip(&toc, Endian::Little)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(decoded, toc);
        }
    }
}
