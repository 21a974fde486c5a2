//! In-memory model of packed files

use std::path::PathBuf;

use crate::hash::ContentHash;
use crate::offset::StreamOffset;

/// Stable identity of a packed file; also its index in the TOC
pub type FileId = u64;

/// One logical file packed into a Bigfile
#[derive(Debug, Clone, Default)]
pub struct BigfileFile {
    filename: PathBuf,
    /// Identity of the file
    pub file_id: FileId,
    /// Payload size in bytes
    pub size: u64,
    /// Placements of the payload in the archive; normally exactly one
    pub offsets: Vec<StreamOffset>,
    /// Digest of the payload, once computed
    pub content_hash: Option<ContentHash>,
    /// Payload was stored pre-compressed
    pub compressed: bool,
    /// Ids of the files attached to this one
    pub children: Vec<FileId>,
}

impl BigfileFile {
    /// Create an entry with an unassigned offset
    pub fn new(file_id: FileId, filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            file_id,
            offsets: vec![StreamOffset::EMPTY],
            ..Default::default()
        }
    }

    /// Placeholder for an id that no file was registered under
    pub fn placeholder(file_id: FileId) -> Self {
        Self::new(file_id, PathBuf::new())
    }

    /// Relative path of the file
    pub fn filename(&self) -> &std::path::Path {
        &self.filename
    }

    /// Primary placement of the payload
    pub fn offset(&self) -> StreamOffset {
        self.offsets.first().copied().unwrap_or_default()
    }

    /// Replace all placements with a single offset
    pub fn set_offset(&mut self, offset: StreamOffset) {
        self.offsets.clear();
        self.offsets.push(offset);
    }

    /// Whether the entry is a gap filler with no file behind it
    pub fn is_placeholder(&self) -> bool {
        self.filename.as_os_str().is_empty()
    }
}

// Identity and hash are ignored, two files are equal when they point at the same bytes.
impl PartialEq for BigfileFile {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename && self.size == other.size && self.offsets == other.offsets
    }
}

impl Eq for BigfileFile {}

/// Metadata of one physical archive and the files it holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bigfile {
    /// Which physical archive this is
    pub index: u32,
    /// Files in id order
    pub files: Vec<BigfileFile>,
}

impl Bigfile {
    /// Create an empty archive description
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            files: Vec::new(),
        }
    }

    /// Look up a file by id
    pub fn file(&self, file_id: FileId) -> Option<&BigfileFile> {
        usize::try_from(file_id)
            .ok()
            .and_then(|i| self.files.get(i))
            .filter(|f| f.file_id == file_id)
    }
}
