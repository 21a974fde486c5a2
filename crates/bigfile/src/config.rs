//! Configuration for packing and reading Bigfiles

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::align::is_valid_alignment;
use crate::error::{BigfileError, Result};
use crate::offset::OFFSET_GRANULARITY;

/// Byte order for every multi-byte integer in the TOC tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little-endian (default, matches desktop targets)
    #[default]
    Little,
    /// Big-endian (console targets)
    Big,
}

impl From<Endianness> for binrw::Endian {
    fn from(value: Endianness) -> Self {
        match value {
            Endianness::Little => Self::Little,
            Endianness::Big => Self::Big,
        }
    }
}

/// Configuration shared by the builder, writer, reader and TOC codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BigfileConfig {
    /// Stem of the archive and TOC files
    pub bigfile_name: String,

    /// Extension of the archive data file
    pub archive_extension: String,

    /// Extension of the table of contents
    pub toc_extension: String,

    /// Extension of the filename database
    pub fdb_extension: String,

    /// Extension of the hash database
    pub hdb_extension: String,

    /// Byte order of the TOC tables
    pub endianness: Endianness,

    /// Alignment of every payload start offset
    pub file_alignment: u64,

    /// Buffer size used when reading payloads
    pub read_buffer_size: usize,

    /// Buffer size used when writing archives
    pub write_buffer_size: usize,

    /// Allow callers to register identical payloads more than once
    pub allow_duplicate_files: bool,

    /// Compute content hashes while writing payloads
    pub hash_contents: bool,
}

impl Default for BigfileConfig {
    fn default() -> Self {
        Self {
            bigfile_name: "Game".to_string(),
            archive_extension: ".gda".to_string(),
            toc_extension: ".gdt".to_string(),
            fdb_extension: ".gdf".to_string(),
            hdb_extension: ".gdh".to_string(),
            endianness: Endianness::Little,
            file_alignment: 256,
            read_buffer_size: 1024 * 1024,  // 1 MiB
            write_buffer_size: 1024 * 1024, // 1 MiB
            allow_duplicate_files: false,
            hash_contents: true,
        }
    }
}

impl BigfileConfig {
    /// Create a configuration with the given archive name
    pub fn new(bigfile_name: impl Into<String>) -> Self {
        Self {
            bigfile_name: bigfile_name.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| BigfileError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| BigfileError::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the archive name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.bigfile_name = name.into();
        self
    }

    /// Set the payload alignment
    #[must_use]
    pub const fn with_alignment(mut self, alignment: u64) -> Self {
        self.file_alignment = alignment;
        self
    }

    /// Set the TOC byte order
    #[must_use]
    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Set both I/O buffer sizes
    #[must_use]
    pub const fn with_buffer_sizes(mut self, read: usize, write: usize) -> Self {
        self.read_buffer_size = read;
        self.write_buffer_size = write;
        self
    }

    /// Enable or disable content hashing
    #[must_use]
    pub const fn with_hashing(mut self, enable: bool) -> Self {
        self.hash_contents = enable;
        self
    }

    /// Enable or disable duplicate payload registration
    #[must_use]
    pub const fn with_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicate_files = allow;
        self
    }

    /// Byte order as used by the binary codec
    pub fn endian(&self) -> binrw::Endian {
        self.endianness.into()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bigfile_name.is_empty() {
            return Err(BigfileError::InvalidConfig(
                "bigfile_name must not be empty".to_string(),
            ));
        }
        if !is_valid_alignment(self.file_alignment) || self.file_alignment < OFFSET_GRANULARITY {
            return Err(BigfileError::InvalidConfig(format!(
                "file_alignment must be a power of two of at least {OFFSET_GRANULARITY}, got {}",
                self.file_alignment
            )));
        }
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(BigfileError::InvalidConfig(
                "buffer sizes must be greater than zero".to_string(),
            ));
        }
        for (name, ext) in [
            ("archive_extension", &self.archive_extension),
            ("toc_extension", &self.toc_extension),
            ("fdb_extension", &self.fdb_extension),
            ("hdb_extension", &self.hdb_extension),
        ] {
            if ext.is_empty() {
                return Err(BigfileError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Archive path for this configuration inside `dir`
    pub fn archive_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}{}", self.bigfile_name, self.archive_extension))
    }

    /// TOC path sharing the stem of `base`
    pub fn toc_path(&self, base: &Path) -> PathBuf {
        replace_extension(base, &self.toc_extension)
    }

    /// FDB path sharing the stem of `base`
    pub fn fdb_path(&self, base: &Path) -> PathBuf {
        replace_extension(base, &self.fdb_extension)
    }

    /// HDB path sharing the stem of `base`
    pub fn hdb_path(&self, base: &Path) -> PathBuf {
        replace_extension(base, &self.hdb_extension)
    }
}

/// Replace the extension of `base`, accepting extensions with or without the dot
fn replace_extension(base: &Path, ext: &str) -> PathBuf {
    base.with_extension(ext.trim_start_matches('.'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BigfileConfig::default();
        assert_eq!(config.bigfile_name, "Game");
        assert_eq!(config.file_alignment, 256);
        assert_eq!(config.endianness, Endianness::Little);
        assert_eq!(config.read_buffer_size, 1024 * 1024);
        assert!(!config.allow_duplicate_files);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_alignment() {
        assert!(BigfileConfig::default().with_alignment(32).validate().is_ok());
        assert!(BigfileConfig::default().with_alignment(2048).validate().is_ok());
        assert!(BigfileConfig::default().with_alignment(16).validate().is_err());
        assert!(BigfileConfig::default().with_alignment(300).validate().is_err());
        assert!(BigfileConfig::default().with_alignment(0).validate().is_err());
    }

    #[test]
    fn test_validate_buffers_and_names() {
        assert!(BigfileConfig::default().with_buffer_sizes(0, 16).validate().is_err());
        assert!(BigfileConfig::new("").validate().is_err());

        let mut config = BigfileConfig::default();
        config.fdb_extension.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths() {
        let config = BigfileConfig::new("Level");
        let dir = Path::new("/pub");
        let archive = config.archive_path(dir);
        assert_eq!(archive, PathBuf::from("/pub/Level.gda"));
        assert_eq!(config.toc_path(&archive), PathBuf::from("/pub/Level.gdt"));
        assert_eq!(config.fdb_path(&archive), PathBuf::from("/pub/Level.gdf"));
        assert_eq!(config.hdb_path(&archive), PathBuf::from("/pub/Level.gdh"));
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bigfile.json");
        std::fs::write(&path, r#"{"file_alignment": 2048, "endianness": "big"}"#)
            .expect("write config");

        let config = BigfileConfig::from_file(&path).expect("load config");
        assert_eq!(config.file_alignment, 2048);
        assert_eq!(config.endianness, Endianness::Big);
        assert_eq!(config.bigfile_name, "Game");
        assert_eq!(config.endian(), binrw::Endian::Big);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bigfile.json");
        std::fs::write(&path, r#"{"file_alignment": 100}"#).expect("write config");
        assert!(matches!(
            BigfileConfig::from_file(&path),
            Err(BigfileError::InvalidConfig(_))
        ));
    }
}
