//! Bigfile archive packing and table-of-contents engine
//!
#![allow(clippy::cast_possible_truncation)] // Sizes are range-checked before narrowing
#![allow(clippy::cast_possible_wrap)] // Wire counts are signed
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::doc_markdown)] // Format names such as TOC, FDB, HDB
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::uninlined_format_args)] // Positional args in log macros
//! A Bigfile packs many small asset files into one large archive so a game
//! can open a single handle and issue aligned, offset-based reads. Every
//! archive is accompanied by three parallel tables sharing the entry index:
//!
//! - **TOC** (`.gdt`): offsets, sizes, compressed and has-children flags,
//!   multi-offset and child-list aux blocks
//! - **FDB** (`.gdf`): filenames
//! - **HDB** (`.gdh`): 160-bit content hashes
//!
//! # Packing
//!
//! [`BigfileBuilder`] registers files, simulates the layout to learn every
//! offset and the final archive size, then writes the archive with
//! [`BigfileWriter`] and the tables with [`BigfileToc`]. Payloads start at
//! multiples of [`BigfileConfig::file_alignment`]; gaps are zero filled.
//!
//! # Reordering
//!
//! [`reorder`](reorder::reorder) copies the payloads of an existing archive
//! into a new physical order, typically one derived from an access-order log
//! parsed by [`FileOrder`].

#![warn(missing_docs)]

/// Power-of-two alignment helpers
pub mod align;
/// Archive packing state machine
pub mod builder;
/// Packing configuration
pub mod config;
/// Error types
pub mod error;
/// In-memory file model
pub mod file;
/// Content hashing
pub mod hash;
/// Stream offsets
pub mod offset;
/// Access-order log parsing
pub mod order;
/// Random-access archive reads
pub mod reader;
/// Archive layout reordering
pub mod reorder;
/// Table of contents codec
pub mod toc;
/// Aligned archive writers
pub mod writer;

pub use align::{align_up, is_aligned};
pub use builder::{BigfileBuilder, BuilderState, SimulationReport};
pub use config::{BigfileConfig, Endianness};
pub use error::{BigfileError, Result};
pub use file::{Bigfile, BigfileFile, FileId};
pub use hash::ContentHash;
pub use offset::StreamOffset;
pub use order::FileOrder;
pub use reader::BigfileReader;
pub use reorder::ReorderLayout;
pub use toc::{BigfileToc, TocEntry};
pub use writer::{ArchiveWriter, BigfileWriter, BigfileWriterSimulator, WrittenFile};
