//! Rewrite an archive in a new physical order
//!
//! Payload bytes are copied verbatim from the source archive; nothing is
//! decoded. The remap lists source TOC indices in the order they should
//! appear in the destination and may repeat an index to place a payload
//! more than once.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::config::BigfileConfig;
use crate::error::{BigfileError, Result};
use crate::file::FileId;
use crate::offset::StreamOffset;
use crate::reader::BigfileReader;
use crate::toc::{BigfileToc, TocEntry};
use crate::writer::{ArchiveWriter, BigfileWriter, BigfileWriterSimulator};

/// Shape of the TOC produced by a reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReorderLayout {
    /// One entry per remap position; ids become positions
    #[default]
    Expanded,
    /// One entry per source id, holding every placement of its payload
    Instanced,
}

fn is_copyable(entry: &TocEntry) -> bool {
    entry.size > 0 && !entry.offset().is_empty()
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy `src_archive` into `dst_archive` in `remap` order and save the new TOC
/// next to the destination.
pub fn reorder(
    config: &BigfileConfig,
    src_archive: &Path,
    src_entries: &[TocEntry],
    dst_archive: &Path,
    remap: &[usize],
    layout: ReorderLayout,
) -> Result<BigfileToc> {
    config.validate()?;

    if let Some(&index) = remap.iter().find(|&&i| i >= src_entries.len()) {
        return Err(BigfileError::RemapOutOfRange {
            index: index as u64,
            count: src_entries.len(),
        });
    }
    if same_file(src_archive, dst_archive) {
        return Err(BigfileError::InvalidState(format!(
            "reorder destination {} is the source archive",
            dst_archive.display()
        )));
    }

    // Lay out the destination first so the archive can be reserved up front.
    let mut simulator = BigfileWriterSimulator::new(config);
    simulator.open(dst_archive, 0)?;
    let placements = remap
        .iter()
        .map(|&index| {
            let entry = &src_entries[index];
            if is_copyable(entry) {
                simulator.reserve(u64::from(entry.size)).map(|w| w.offset)
            } else {
                Ok(StreamOffset::EMPTY)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    simulator.close()?;

    // Child references and offsets are checked before the destination exists.
    let entries = match layout {
        ReorderLayout::Expanded => expanded_entries(src_entries, remap, &placements)?,
        ReorderLayout::Instanced => instanced_entries(src_entries, remap, &placements),
    };
    let toc = BigfileToc::new(entries);
    toc.validate()?;

    let mut reader = BigfileReader::new(config);
    reader.open(src_archive)?;
    let mut writer = BigfileWriter::new(config);
    writer.open(dst_archive, simulator.final_size())?;

    for (&index, &placement) in remap.iter().zip(&placements) {
        let entry = &src_entries[index];
        let Some(src_offset) = entry.offset().get().filter(|_| is_copyable(entry)) else {
            continue;
        };
        let written = writer.write_range(&mut reader, src_offset, u64::from(entry.size))?;
        if written.offset != placement {
            return Err(BigfileError::InvalidFormat(format!(
                "entry {} written at {}, expected {}",
                entry.file_id, written.offset, placement
            )));
        }
        debug!(
            "Moved entry {} from {:#x} to {}",
            entry.file_id, src_offset, placement
        );
    }
    writer.close()?;
    reader.close();

    toc.save(dst_archive, config)?;

    info!(
        "Reordered {} into {} ({} entries, {} bytes)",
        src_archive.display(),
        dst_archive.display(),
        toc.len(),
        simulator.final_size()
    );
    Ok(toc)
}

fn expanded_entries(
    src_entries: &[TocEntry],
    remap: &[usize],
    placements: &[StreamOffset],
) -> Result<Vec<TocEntry>> {
    let mut first_position: HashMap<usize, FileId> = HashMap::with_capacity(remap.len());
    for (position, &index) in remap.iter().enumerate() {
        first_position.entry(index).or_insert(position as FileId);
    }

    remap
        .iter()
        .zip(placements)
        .enumerate()
        .map(|(position, (&index, &placement))| {
            let mut entry = src_entries[index].clone();
            entry.file_id = position as FileId;
            entry.offsets = vec![placement];
            entry.children = entry
                .children
                .iter()
                .map(|&child| {
                    usize::try_from(child)
                        .ok()
                        .and_then(|c| first_position.get(&c).copied())
                        .ok_or_else(|| BigfileError::ChildOutOfRange {
                            parent: position as FileId,
                            child,
                            count: remap.len(),
                        })
                })
                .collect::<Result<_>>()?;
            Ok(entry)
        })
        .collect()
}

fn instanced_entries(
    src_entries: &[TocEntry],
    remap: &[usize],
    placements: &[StreamOffset],
) -> Vec<TocEntry> {
    let mut entries: Vec<TocEntry> = src_entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut entry = entry.clone();
            entry.file_id = index as FileId;
            entry.offsets.clear();
            entry
        })
        .collect();

    for (&index, &placement) in remap.iter().zip(placements) {
        if !placement.is_empty() {
            entries[index].offsets.push(placement);
        }
    }
    for entry in &mut entries {
        if entry.offsets.is_empty() {
            entry.offsets.push(StreamOffset::EMPTY);
        }
    }
    entries
}
