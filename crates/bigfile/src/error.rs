//! Error types for Bigfile operations

use std::path::PathBuf;

use thiserror::Error;

use crate::file::FileId;

/// Bigfile operation result type
pub type Result<T> = std::result::Result<T, BigfileError>;

/// Error types for packing, reading and TOC serialization
#[derive(Debug, Error)]
pub enum BigfileError {
    /// I/O error on an archive or TOC stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary encoding or decoding error
    #[error("Binary format error: {0}")]
    Binary(#[from] binrw::Error),

    /// A payload source file could not be opened or read
    #[error("Failed to read source file {}: {source}", path.display())]
    Source {
        /// Path of the source file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An archive or TOC file could not be opened or created
    #[error("Failed to open {}: {source}", path.display())]
    Archive {
        /// Path of the archive or TOC file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A file id was registered twice
    #[error("File id {0} was already added")]
    DuplicateFileId(FileId),

    /// A file was added without any filename
    #[error("File id {0} has no filenames")]
    NoFilenames(FileId),

    /// TOC entry id does not match its table position
    #[error("TOC entry at index {index} has file id {file_id}")]
    FileIdMismatch {
        /// Position in the table
        index: usize,
        /// File id stored in the entry
        file_id: FileId,
    },

    /// A child reference points outside the table
    #[error("Entry {parent} references child {child}, table has {count} entries")]
    ChildOutOfRange {
        /// Parent entry id
        parent: FileId,
        /// Referenced child id
        child: FileId,
        /// Number of entries in the table
        count: usize,
    },

    /// A remap index points outside the source table
    #[error("Remap index {index} out of range, table has {count} entries")]
    RemapOutOfRange {
        /// Offending index
        index: u64,
        /// Number of entries in the table
        count: usize,
    },

    /// File size cannot be represented in the 30-bit size field
    #[error("File id {file_id} is {size} bytes, maximum is {max}")]
    FileTooLarge {
        /// File id
        file_id: FileId,
        /// Actual size
        size: u64,
        /// Largest encodable size
        max: u64,
    },

    /// Offset cannot be represented in the TOC offset field
    #[error("Offset {0} exceeds the addressable archive range")]
    OffsetOverflow(u64),

    /// Offset is not a multiple of the encoding granularity
    #[error("Offset {offset} is not aligned to {alignment} bytes")]
    MisalignedOffset {
        /// Offending offset
        offset: u64,
        /// Required granularity
        alignment: u64,
    },

    /// Table has more entries than the count field can hold
    #[error("Too many entries: {0}")]
    TooManyEntries(usize),

    /// TOC, FDB and HDB disagree on the entry count
    #[error("Entry count mismatch: TOC has {toc}, {table} has {other}")]
    EntryCountMismatch {
        /// Count stored in the TOC
        toc: usize,
        /// Name of the disagreeing table
        table: &'static str,
        /// Count stored in that table
        other: usize,
    },

    /// Structurally invalid TOC, FDB or HDB data
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A read reaches past the end of the archive
    #[error("Read of {size} bytes at offset {offset} exceeds archive length {len}")]
    OutOfBounds {
        /// Start offset
        offset: u64,
        /// Requested size
        size: u64,
        /// Archive length
        len: u64,
    },

    /// Operation called in the wrong builder or stream state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Access-order file could not be parsed
    #[error("Order file line {line}: {reason}")]
    OrderFile {
        /// One-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },
}

impl BigfileError {
    /// Check if the error comes from the underlying file system
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Source { .. } | Self::Archive { .. }
        ) || matches!(self, Self::Binary(binrw::Error::Io(_)))
    }

    /// Check if the error signals inconsistent or unencodable data
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::DuplicateFileId(_)
                | Self::FileIdMismatch { .. }
                | Self::ChildOutOfRange { .. }
                | Self::RemapOutOfRange { .. }
                | Self::FileTooLarge { .. }
                | Self::OffsetOverflow(_)
                | Self::MisalignedOffset { .. }
                | Self::TooManyEntries(_)
                | Self::EntryCountMismatch { .. }
                | Self::InvalidFormat(_)
                | Self::OutOfBounds { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let io = BigfileError::Io(std::io::Error::other("disk"));
        assert!(io.is_io());
        assert!(!io.is_integrity());

        let dup = BigfileError::DuplicateFileId(7);
        assert!(dup.is_integrity());
        assert!(!dup.is_io());

        let state = BigfileError::InvalidState("not simulated".to_string());
        assert!(!state.is_io());
        assert!(!state.is_integrity());
    }

    #[test]
    fn test_error_display() {
        let err = BigfileError::ChildOutOfRange {
            parent: 5,
            child: 9,
            count: 8,
        };
        assert_eq!(
            err.to_string(),
            "Entry 5 references child 9, table has 8 entries"
        );

        let err = BigfileError::OrderFile {
            line: 3,
            reason: "unknown category".to_string(),
        };
        assert_eq!(err.to_string(), "Order file line 3: unknown category");
    }
}
