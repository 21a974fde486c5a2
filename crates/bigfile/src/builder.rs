//! Bigfile builder
//!
//! Packing runs in three steps:
//!
//! 1. [`BigfileBuilder::add`] registers files by id. The first filename is
//!    the primary file, any further names become its children.
//! 2. [`BigfileBuilder::simulate`] assigns child ids and computes every
//!    offset from file metadata alone.
//! 3. [`BigfileBuilder::save`] writes the archive and its TOC.
//!
//! # Example
//!
//! ```rust,no_run
//! use bigfile::{BigfileBuilder, BigfileConfig};
//! use std::path::Path;
//!
//! # fn example() -> bigfile::Result<()> {
//! let mut builder = BigfileBuilder::new(BigfileConfig::default())?;
//! builder.add(0, &["levels/town.lvl"])?;
//! builder.add(1, &["textures/wall.dds", "textures/wall.mip"])?;
//!
//! let report = builder.simulate(Path::new("build/src"))?;
//! println!("archive will be {} bytes", report.final_size);
//!
//! let toc = builder.save(Path::new("build/pub"), true)?;
//! assert_eq!(toc.len(), 3);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::BigfileConfig;
use crate::error::{BigfileError, Result};
use crate::file::{Bigfile, BigfileFile, FileId};
use crate::offset::StreamOffset;
use crate::reorder::{ReorderLayout, reorder};
use crate::toc::wire::{MAX_FILE_SIZE, encode_offset};
use crate::toc::{BigfileToc, TocEntry};
use crate::writer::{ArchiveWriter, BigfileWriter, BigfileWriterSimulator};

/// Builder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Accepting files
    Collecting,
    /// Offsets computed, ready to save
    Simulated,
    /// Archive and TOC written
    Closed,
}

/// Outcome of a simulation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    /// Size the archive will have once written
    pub final_size: u64,
    /// Number of TOC entries, including placeholders and children
    pub file_count: usize,
    /// Ids whose source file could not be found
    pub missing: Vec<FileId>,
}

#[derive(Debug, Clone)]
struct Registration {
    file_id: FileId,
    filenames: Vec<PathBuf>,
}

/// Packs registered files into one archive
#[derive(Debug)]
pub struct BigfileBuilder {
    config: BigfileConfig,
    state: BuilderState,
    registrations: Vec<Registration>,
    registered: BTreeMap<FileId, usize>,
    compressed: BTreeSet<FileId>,
    bigfile: Bigfile,
    src_dir: PathBuf,
    missing: BTreeSet<FileId>,
    final_size: u64,
}

impl BigfileBuilder {
    /// Create a builder for one archive
    pub fn new(config: BigfileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: BuilderState::Collecting,
            registrations: Vec::new(),
            registered: BTreeMap::new(),
            compressed: BTreeSet::new(),
            bigfile: Bigfile::new(0),
            src_dir: PathBuf::new(),
            missing: BTreeSet::new(),
            final_size: 0,
        })
    }

    /// Configuration in use
    pub const fn config(&self) -> &BigfileConfig {
        &self.config
    }

    /// Current lifecycle state
    pub const fn state(&self) -> BuilderState {
        self.state
    }

    /// Archive description with the current file list
    pub const fn bigfile(&self) -> &Bigfile {
        &self.bigfile
    }

    fn require(&self, expected: BuilderState, operation: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BigfileError::InvalidState(format!(
                "{operation} requires {expected:?}, builder is {:?}",
                self.state
            )))
        }
    }

    /// Register a file under `file_id`.
    ///
    /// The first filename is the primary file; the others are attached to it
    /// as children and receive ids during [`simulate`](Self::simulate).
    pub fn add<P: AsRef<Path>>(&mut self, file_id: FileId, filenames: &[P]) -> Result<()> {
        self.require(BuilderState::Collecting, "add")?;
        if filenames.is_empty() {
            return Err(BigfileError::NoFilenames(file_id));
        }
        if self.registered.contains_key(&file_id) {
            return Err(BigfileError::DuplicateFileId(file_id));
        }

        self.registered.insert(file_id, self.registrations.len());
        self.registrations.push(Registration {
            file_id,
            filenames: filenames.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        });
        Ok(())
    }

    /// Flag a registered file as stored pre-compressed
    pub fn mark_compressed(&mut self, file_id: FileId) -> Result<()> {
        self.require(BuilderState::Collecting, "mark_compressed")?;
        if !self.registered.contains_key(&file_id) {
            return Err(BigfileError::InvalidState(format!(
                "file id {file_id} was not added"
            )));
        }
        self.compressed.insert(file_id);
        Ok(())
    }

    /// Assign child ids and compute every offset without writing payloads.
    ///
    /// Sources are resolved relative to `src_dir`. A missing source is not
    /// fatal: its entry keeps size zero and an empty offset and is listed in
    /// the report.
    pub fn simulate(&mut self, src_dir: &Path) -> Result<SimulationReport> {
        if self.state == BuilderState::Closed {
            return Err(BigfileError::InvalidState(
                "simulate called after save".to_string(),
            ));
        }

        let mut files = self.layout_files()?;

        let mut missing = BTreeSet::new();
        let mut simulator = BigfileWriterSimulator::new(&self.config);
        simulator.open(&self.config.archive_path(src_dir), 0)?;
        for file in files.iter_mut().filter(|f| !f.is_placeholder()) {
            match simulator.write_file(&src_dir.join(file.filename())) {
                Ok(written) => {
                    if written.size > MAX_FILE_SIZE {
                        return Err(BigfileError::FileTooLarge {
                            file_id: file.file_id,
                            size: written.size,
                            max: MAX_FILE_SIZE,
                        });
                    }
                    encode_offset(written.offset)?;
                    file.size = written.size;
                    file.set_offset(written.offset);
                }
                Err(BigfileError::Source { path, source }) => {
                    warn!(
                        "File id {} is missing ({}): {}",
                        file.file_id,
                        path.display(),
                        source
                    );
                    file.size = 0;
                    file.set_offset(StreamOffset::EMPTY);
                    missing.insert(file.file_id);
                }
                Err(e) => return Err(e),
            }
        }
        simulator.close()?;

        let report = SimulationReport {
            final_size: simulator.final_size(),
            file_count: files.len(),
            missing: missing.iter().copied().collect(),
        };
        info!(
            "Simulated {} entries, archive size {} bytes, {} missing",
            report.file_count,
            report.final_size,
            report.missing.len()
        );

        self.bigfile.files = files;
        self.src_dir = src_dir.to_path_buf();
        self.missing = missing;
        self.final_size = report.final_size;
        self.state = BuilderState::Simulated;
        Ok(report)
    }

    /// Build the dense id-indexed file list, assigning child ids after the
    /// highest primary id in registration order.
    fn layout_files(&self) -> Result<Vec<BigfileFile>> {
        let Some(&max_primary) = self.registered.keys().next_back() else {
            return Ok(Vec::new());
        };

        let child_count: u64 = self
            .registrations
            .iter()
            .map(|r| r.filenames.len() as u64 - 1)
            .sum();
        let total = max_primary.saturating_add(1).saturating_add(child_count);
        if i32::try_from(total).is_err() {
            return Err(BigfileError::TooManyEntries(
                usize::try_from(total).unwrap_or(usize::MAX),
            ));
        }

        let mut files: Vec<BigfileFile> = (0..total).map(BigfileFile::placeholder).collect();
        let mut next_child = max_primary + 1;
        for registration in &self.registrations {
            let (primary, attached) = registration
                .filenames
                .split_first()
                .ok_or(BigfileError::NoFilenames(registration.file_id))?;

            let mut children = Vec::with_capacity(attached.len());
            for name in attached {
                files[next_child as usize] = BigfileFile::new(next_child, name);
                debug!(
                    "Assigned child id {} to {} (parent {})",
                    next_child,
                    name.display(),
                    registration.file_id
                );
                children.push(next_child);
                next_child += 1;
            }

            let mut file = BigfileFile::new(registration.file_id, primary);
            file.children = children;
            file.compressed = self.compressed.contains(&registration.file_id);
            files[registration.file_id as usize] = file;
        }
        Ok(files)
    }

    /// Write the archive and its TOC into `pub_dir`.
    ///
    /// With `build_data` unset only the TOC is regenerated from the simulated
    /// layout.
    pub fn save(&mut self, pub_dir: &Path, build_data: bool) -> Result<BigfileToc> {
        self.require(BuilderState::Simulated, "save")?;
        let archive = self.config.archive_path(pub_dir);

        if build_data {
            self.write_payloads(&archive)?;
        } else {
            fs::create_dir_all(pub_dir).map_err(|source| BigfileError::Archive {
                path: pub_dir.to_path_buf(),
                source,
            })?;
        }

        let toc = BigfileToc::from_files(&self.bigfile.files)?;
        toc.save(&archive, &self.config)?;
        self.state = BuilderState::Closed;

        info!(
            "Saved {} with {} entries ({} bytes)",
            archive.display(),
            toc.len(),
            self.final_size
        );
        Ok(toc)
    }

    fn write_payloads(&mut self, archive: &Path) -> Result<()> {
        let mut writer = BigfileWriter::new(&self.config);
        writer.open(archive, self.final_size)?;

        for file in &mut self.bigfile.files {
            if file.is_placeholder() || self.missing.contains(&file.file_id) {
                continue;
            }
            let written = writer.write_file(&self.src_dir.join(file.filename()))?;
            if written.offset != file.offset() || written.size != file.size {
                return Err(BigfileError::InvalidState(format!(
                    "{} changed since simulation",
                    file.filename().display()
                )));
            }
            file.content_hash = written.hash;
        }

        writer.close()
    }

    /// Copy an archive into a new physical order; see [`reorder`](crate::reorder::reorder)
    pub fn reorder(
        &self,
        src_archive: &Path,
        src_entries: &[TocEntry],
        dst_archive: &Path,
        remap: &[usize],
    ) -> Result<BigfileToc> {
        reorder(
            &self.config,
            src_archive,
            src_entries,
            dst_archive,
            remap,
            ReorderLayout::Expanded,
        )
    }

    /// Like [`reorder`](Self::reorder) but keeps source ids, giving repeated
    /// entries multiple offsets
    pub fn reorder_instanced(
        &self,
        src_archive: &Path,
        src_entries: &[TocEntry],
        dst_archive: &Path,
        remap: &[usize],
    ) -> Result<BigfileToc> {
        reorder(
            &self.config,
            src_archive,
            src_entries,
            dst_archive,
            remap,
            ReorderLayout::Instanced,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn builder() -> BigfileBuilder {
        BigfileBuilder::new(BigfileConfig::default()).expect("builder")
    }

    #[test]
    fn test_add_rejects_duplicates_and_empty() {
        let mut builder = builder();
        builder.add(1, &["a.bin"]).expect("add");
        assert!(matches!(
            builder.add(1, &["b.bin"]),
            Err(BigfileError::DuplicateFileId(1))
        ));
        let empty: [&str; 0] = [];
        assert!(matches!(
            builder.add(2, &empty),
            Err(BigfileError::NoFilenames(2))
        ));
    }

    #[test]
    fn test_state_machine() {
        let dir = tempdir().expect("tempdir");
        let mut builder = builder();
        assert!(matches!(
            builder.save(dir.path(), false),
            Err(BigfileError::InvalidState(_))
        ));

        builder.add(0, &["a.bin"]).expect("add");
        builder.simulate(dir.path()).expect("simulate");
        assert_eq!(builder.state(), BuilderState::Simulated);
        assert!(builder.add(1, &["b.bin"]).is_err());

        builder.save(dir.path(), false).expect("save");
        assert_eq!(builder.state(), BuilderState::Closed);
        assert!(builder.simulate(dir.path()).is_err());
    }

    #[test]
    fn test_child_ids_follow_highest_primary() {
        let dir = tempdir().expect("tempdir");
        let mut builder = builder();
        builder.add(5, &["main.bin", "aux1.bin", "aux2.bin"]).expect("add");
        builder.add(2, &["other.bin", "other.aux"]).expect("add");

        let report = builder.simulate(dir.path()).expect("simulate");
        let files = &builder.bigfile().files;

        assert_eq!(report.file_count, 9);
        assert_eq!(files[5].children, vec![6, 7]);
        assert_eq!(files[2].children, vec![8]);
        assert_eq!(files[6].filename(), Path::new("aux1.bin"));
        assert_eq!(files[8].filename(), Path::new("other.aux"));
        assert!(files[0].is_placeholder());
        assert_eq!(report.missing, vec![2, 5, 6, 7, 8]);
    }

    #[test]
    fn test_mark_compressed() {
        let dir = tempdir().expect("tempdir");
        let mut builder = builder();
        builder.add(0, &["a.bin"]).expect("add");
        assert!(builder.mark_compressed(3).is_err());
        builder.mark_compressed(0).expect("mark");
        builder.simulate(dir.path()).expect("simulate");
        assert!(builder.bigfile().files[0].compressed);
    }

    #[test]
    fn test_empty_builder() {
        let dir = tempdir().expect("tempdir");
        let mut builder = builder();
        let report = builder.simulate(dir.path()).expect("simulate");
        assert_eq!(report, SimulationReport::default());
        let toc = builder.save(&dir.path().join("pub"), true).expect("save");
        assert!(toc.is_empty());
    }

    #[test]
    fn test_simulate_rejects_unaddressable_offsets() {
        let dir = tempdir().expect("tempdir");
        let mut builder = builder();
        // Sparse sources of just under 1 GiB each; the 65th starts at 2^36.
        for id in 0..65u64 {
            let name = format!("big{id}.bin");
            let file = fs::File::create(dir.path().join(&name)).expect("create");
            file.set_len(MAX_FILE_SIZE).expect("set_len");
            builder.add(id, &[name]).expect("add");
        }

        assert!(matches!(
            builder.simulate(dir.path()),
            Err(BigfileError::OffsetOverflow(offset)) if offset == 1 << 36
        ));
        assert_eq!(builder.state(), BuilderState::Collecting);
    }
}
