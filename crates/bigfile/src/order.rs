//! Access-order logs
//!
//! An order file records which files a running game touched, grouped by
//! category and two levels of ordering:
//!
//! ```text
//! Begin Category: <Boot><0><0>
//! Boot<0><0>:textures/logo.dds:12
//! Boot<0><0>:levels/menu.lvl:3
//! Begin Category: <Track><1><-1>
//! Track<1><-1>:levels/track01.lvl:40
//! Continue Category: <Boot><0><0>
//! Boot<0><0>:sounds/menu.snd:7
//! ```
//!
//! Flattening the groups yields a remap for [`reorder`](crate::reorder::reorder).
//! Files of the TOC that were never recorded are appended so that every
//! entry appears at least once.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{BigfileError, Result};
use crate::file::FileId;

const BEGIN_CATEGORY: &str = "Begin Category:";
const CONTINUE_CATEGORY: &str = "Continue Category:";
/// Category receiving files that were never recorded
pub const DEFAULT_CATEGORY: &str = "_Default";
/// Group order marking the default sub group
pub const DEFAULT_GROUP: i32 = -1;

#[derive(Debug, Clone, Default)]
struct FileGroup {
    order: i32,
    file_ids: Vec<FileId>,
    default_group: Option<Box<FileGroup>>,
    groups: Vec<FileGroup>,
}

impl FileGroup {
    const fn new(order: i32) -> Self {
        Self {
            order,
            file_ids: Vec::new(),
            default_group: None,
            groups: Vec::new(),
        }
    }

    fn group(&self, order: i32) -> Option<&Self> {
        if order == DEFAULT_GROUP {
            self.default_group.as_deref()
        } else {
            self.groups.iter().find(|g| g.order == order)
        }
    }

    fn group_mut(&mut self, order: i32) -> Option<&mut Self> {
        if order == DEFAULT_GROUP {
            self.default_group.as_deref_mut()
        } else {
            self.groups.iter_mut().find(|g| g.order == order)
        }
    }

    fn group_or_insert(&mut self, order: i32) -> &mut Self {
        if order == DEFAULT_GROUP {
            return self
                .default_group
                .get_or_insert_with(|| Box::new(Self::new(DEFAULT_GROUP)));
        }
        let existing = self.groups.iter().position(|g| g.order == order);
        let index = match existing {
            Some(index) => index,
            None => {
                self.groups.push(Self::new(order));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    /// Own ids, then the default group, then the other groups in creation order
    fn collect(&self, out: &mut Vec<FileId>) {
        out.extend_from_slice(&self.file_ids);
        if let Some(group) = &self.default_group {
            group.collect(out);
        }
        for group in &self.groups {
            group.collect(out);
        }
    }
}

#[derive(Debug, Clone)]
struct FileCategory {
    name: String,
    files: FileGroup,
}

/// Position of the group new file records are appended to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    category: usize,
    main: i32,
    sub: i32,
}

/// Parsed access-order log
#[derive(Debug, Clone, Default)]
pub struct FileOrder {
    categories: Vec<FileCategory>,
    current: Option<Cursor>,
}

/// Text inside the first `<...>` at or after `from`, with the index just
/// past the closing bracket
fn bracketed(line: &str, from: usize) -> Option<(&str, usize)> {
    let open = from + line.get(from..)?.find('<')?;
    let close = open + line[open..].find('>')?;
    (close > open + 1).then(|| (&line[open + 1..close], close + 1))
}

fn parse_order(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

/// `<name><main><sub>` from a category line
fn category_header(line: &str) -> Option<(&str, i32, i32)> {
    let (name, next) = bracketed(line, 0)?;
    let (main, next) = bracketed(line, next)?;
    let (sub, _) = bracketed(line, next)?;
    Some((name, parse_order(main)?, parse_order(sub)?))
}

/// `scope<main><sub>...:fileId` from a file record
fn file_record(line: &str) -> Option<FileId> {
    let (main, next) = bracketed(line, 0)?;
    let (sub, end) = bracketed(line, next)?;
    parse_order(main)?;
    parse_order(sub)?;
    let colon = line.rfind(':').filter(|&c| c >= end)?;
    line[colon + 1..].trim().parse().ok()
}

impl FileOrder {
    /// Create an empty order
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an order file from a string
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }

    /// Parse an order file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BigfileError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse an order file line by line
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut order = Self::new();
        let mut skip_group = false;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let number = index + 1;

            if line.contains(BEGIN_CATEGORY) {
                skip_group = !order.begin_category(&line, number);
            } else if line.contains(CONTINUE_CATEGORY) {
                order.continue_category(&line, number)?;
                skip_group = false;
            } else if line.trim().is_empty() || skip_group {
                continue;
            } else {
                let file_id = file_record(&line).ok_or_else(|| BigfileError::OrderFile {
                    line: number,
                    reason: "malformed file record".to_string(),
                })?;
                order.push_file(file_id, number)?;
            }
        }
        Ok(order)
    }

    /// Open a group; `false` when its records should be skipped
    fn begin_category(&mut self, line: &str, number: usize) -> bool {
        let Some((name, main, sub)) = category_header(line) else {
            warn!("Order file line {}: malformed category header", number);
            return false;
        };

        let existing = self.categories.iter().position(|c| c.name == name);
        let category = match existing {
            Some(category) => category,
            None => {
                self.categories.push(FileCategory {
                    name: name.to_string(),
                    files: FileGroup::new(DEFAULT_GROUP),
                });
                self.categories.len() - 1
            }
        };

        let main_group = self.categories[category].files.group_or_insert(main);
        if main_group.group(sub).is_some() {
            warn!(
                "Order file line {}: group <{}><{}><{}> already exists, skipping",
                number, name, main, sub
            );
            return false;
        }
        main_group.group_or_insert(sub);
        self.current = Some(Cursor { category, main, sub });
        true
    }

    fn continue_category(&mut self, line: &str, number: usize) -> Result<()> {
        let error = |reason: &str| BigfileError::OrderFile {
            line: number,
            reason: reason.to_string(),
        };
        let (name, main, sub) = category_header(line).ok_or_else(|| error("malformed category header"))?;

        let category = self
            .categories
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| error("unknown category"))?;
        self.categories[category]
            .files
            .group(main)
            .and_then(|g| g.group(sub))
            .ok_or_else(|| error("unknown group"))?;

        self.current = Some(Cursor { category, main, sub });
        Ok(())
    }

    fn push_file(&mut self, file_id: FileId, number: usize) -> Result<()> {
        let group = self
            .current
            .and_then(|c| {
                self.categories
                    .get_mut(c.category)?
                    .files
                    .group_mut(c.main)?
                    .group_mut(c.sub)
            })
            .ok_or_else(|| BigfileError::OrderFile {
                line: number,
                reason: "file record outside of a category".to_string(),
            })?;
        group.file_ids.push(file_id);
        Ok(())
    }

    /// Category names in first-seen order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Every recorded id in flattened order, repeats included
    pub fn recorded(&self) -> Vec<FileId> {
        let mut out = Vec::new();
        for category in &self.categories {
            category.files.collect(&mut out);
        }
        out
    }

    /// Append ids below `entry_count` that were never recorded, in TOC order,
    /// to the default category after every recorded category
    pub fn append_unrecorded(&mut self, entry_count: usize) {
        let mut seen = vec![false; entry_count];
        for id in self.recorded() {
            if let Some(flag) = usize::try_from(id).ok().and_then(|i| seen.get_mut(i)) {
                *flag = true;
            }
        }

        let unrecorded: Vec<FileId> = seen
            .iter()
            .enumerate()
            .filter(|&(_, &seen)| !seen)
            .map(|(id, _)| id as FileId)
            .collect();
        if unrecorded.is_empty() {
            return;
        }
        debug!("Appending {} unrecorded files", unrecorded.len());

        let existing = self
            .categories
            .iter()
            .position(|c| c.name == DEFAULT_CATEGORY);
        let mut category = match existing {
            Some(index) => self.categories.remove(index),
            None => FileCategory {
                name: DEFAULT_CATEGORY.to_string(),
                files: FileGroup::new(DEFAULT_GROUP),
            },
        };
        category
            .files
            .group_or_insert(DEFAULT_GROUP)
            .group_or_insert(DEFAULT_GROUP)
            .file_ids
            .extend(unrecorded);
        self.categories.push(category);
    }

    /// Complete remap for a TOC with `entry_count` entries.
    ///
    /// Every id appears at least once; ids outside the TOC are rejected.
    pub fn remap(&mut self, entry_count: usize) -> Result<Vec<usize>> {
        self.append_unrecorded(entry_count);
        self.recorded()
            .into_iter()
            .map(|id| {
                usize::try_from(id)
                    .ok()
                    .filter(|&i| i < entry_count)
                    .ok_or(BigfileError::RemapOutOfRange {
                        index: id,
                        count: entry_count,
                    })
            })
            .collect()
    }
}
