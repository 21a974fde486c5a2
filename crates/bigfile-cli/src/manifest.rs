//! Pack manifests
//!
//! ```json
//! {
//!   "files": [
//!     { "id": 0, "names": ["levels/town.lvl"] },
//!     { "id": 1, "names": ["textures/wall.dds", "textures/wall.mip"], "compressed": true }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use bigfile::FileId;
use serde::{Deserialize, Serialize};

/// One file to pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// File id, also its TOC index
    pub id: FileId,
    /// Primary filename followed by attached children
    pub names: Vec<String>,
    /// Payload is already compressed
    #[serde(default)]
    pub compressed: bool,
}

/// List of files to pack into one archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Files in registration order
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    /// Read a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))
    }
}
