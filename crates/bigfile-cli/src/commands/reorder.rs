//! `bigfile reorder`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bigfile::reorder::reorder;
use bigfile::{BigfileConfig, BigfileToc, FileOrder, ReorderLayout};
use clap::Args;
use tracing::{info, warn};

/// Arguments for `bigfile reorder`
#[derive(Args, Debug)]
pub struct ReorderArgs {
    /// Archive to reorder
    pub archive: PathBuf,

    /// Access-order log
    #[arg(long)]
    pub order: PathBuf,

    /// Destination archive; the source is replaced when omitted
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Keep source ids and store repeated files as extra offsets
    /// (default when replacing the source)
    #[arg(long, conflicts_with = "expanded")]
    pub instanced: bool,

    /// Give every recorded position its own entry, renumbering ids
    /// (default when writing to `--output`)
    #[arg(long)]
    pub expanded: bool,
}

impl ReorderArgs {
    /// In-place runs keep ids unless `--expanded` is given
    fn layout(&self) -> ReorderLayout {
        if self.instanced || (self.output.is_none() && !self.expanded) {
            ReorderLayout::Instanced
        } else {
            ReorderLayout::Expanded
        }
    }
}

/// Archive and table paths sharing one stem
fn archive_set(archive: &Path, config: &BigfileConfig) -> [PathBuf; 4] {
    [
        archive.to_path_buf(),
        config.toc_path(archive),
        config.fdb_path(archive),
        config.hdb_path(archive),
    ]
}

/// Reorder an archive according to an order file
pub fn handle(args: &ReorderArgs, config: &BigfileConfig) -> Result<()> {
    let toc = BigfileToc::load(&args.archive, config)
        .with_context(|| format!("loading TOC of {}", args.archive.display()))?;
    let mut order = FileOrder::load(&args.order)
        .with_context(|| format!("parsing order file {}", args.order.display()))?;
    let remap = order.remap(toc.len())?;

    let layout = args.layout();
    if layout == ReorderLayout::Expanded && args.output.is_none() {
        warn!("Expanded reorder renumbers file ids of {}", args.archive.display());
    }

    let (dst, staging) = match &args.output {
        Some(output) => (output.clone(), None),
        None => {
            let parent = args.archive.parent().unwrap_or_else(|| Path::new("."));
            let staging = parent.join(".bigfile-reorder");
            let name = args
                .archive
                .file_name()
                .context("archive path has no file name")?;
            (staging.join(name), Some(staging))
        }
    };

    let reordered = match reorder(config, &args.archive, toc.entries(), &dst, &remap, layout) {
        Ok(toc) => toc,
        Err(e) => {
            if let Some(staging) = &staging
                && let Err(cleanup) = fs::remove_dir_all(staging)
            {
                warn!("Could not remove {}: {}", staging.display(), cleanup);
            }
            return Err(e.into());
        }
    };

    if let Some(staging) = staging {
        for (from, to) in archive_set(&dst, config)
            .into_iter()
            .zip(archive_set(&args.archive, config))
        {
            fs::rename(&from, &to)
                .with_context(|| format!("replacing {} with {}", to.display(), from.display()))?;
        }
        fs::remove_dir(&staging)?;
        info!("Replaced {} in place", args.archive.display());
    }

    println!(
        "{}: {} entries from {} recorded positions",
        args.output.as_ref().unwrap_or(&args.archive).display(),
        reordered.len(),
        remap.len()
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::extract::{self, ExtractArgs};
    use crate::commands::pack::{self, PackArgs};
    use bigfile::StreamOffset;
    use pretty_assertions::assert_eq;
    use tempfile::{TempDir, tempdir};

    /// Pack a, b and c as ids 0..3 and write an order file naming c first
    fn packed() -> (TempDir, BigfileConfig, PathBuf, PathBuf) {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let out = dir.path().join("pub");
        fs::create_dir_all(&src).expect("src dir");
        fs::write(src.join("a.bin"), b"alpha").expect("a");
        fs::write(src.join("b.bin"), b"bravo-bravo").expect("b");
        fs::write(src.join("c.bin"), b"charlie").expect("c");

        let manifest = dir.path().join("manifest.json");
        fs::write(
            &manifest,
            r#"{"files":[{"id":0,"names":["a.bin"]},{"id":1,"names":["b.bin"]},{"id":2,"names":["c.bin"]}]}"#,
        )
        .expect("manifest");

        let config = BigfileConfig::default();
        pack::handle(
            &PackArgs {
                src,
                out: out.clone(),
                manifest,
                toc_only: false,
            },
            config.clone(),
        )
        .expect("pack");

        let order = dir.path().join("access.order");
        fs::write(&order, "Begin Category: <Boot><0><0>\nBoot<0><0>:c.bin:2\n").expect("order");

        let archive = config.archive_path(&out);
        (dir, config, archive, order)
    }

    fn args(archive: &Path, order: &Path, output: Option<PathBuf>) -> ReorderArgs {
        ReorderArgs {
            archive: archive.to_path_buf(),
            order: order.to_path_buf(),
            output,
            instanced: false,
            expanded: false,
        }
    }

    fn extract_id(config: &BigfileConfig, archive: &Path, id: u64, out: &Path) -> Vec<u8> {
        extract::handle(
            &ExtractArgs {
                archive: archive.to_path_buf(),
                id,
                out: out.to_path_buf(),
            },
            config,
        )
        .expect("extract");
        fs::read(out).expect("read")
    }

    #[test]
    fn test_layout_defaults() {
        let path = PathBuf::from("Game.gda");
        let in_place = args(&path, &path, None);
        assert_eq!(in_place.layout(), ReorderLayout::Instanced);

        let to_output = args(&path, &path, Some(PathBuf::from("out.gda")));
        assert_eq!(to_output.layout(), ReorderLayout::Expanded);

        let forced = ReorderArgs {
            expanded: true,
            ..args(&path, &path, None)
        };
        assert_eq!(forced.layout(), ReorderLayout::Expanded);
    }

    #[test]
    fn test_in_place_reorder_keeps_ids() {
        let (dir, config, archive, order) = packed();

        handle(&args(&archive, &order, None), &config).expect("reorder");
        assert!(!archive.with_file_name(".bigfile-reorder").exists());

        let toc = BigfileToc::load(&archive, &config).expect("load");
        let names: Vec<&str> = toc.entries().iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a.bin", "b.bin", "c.bin"]);
        assert_eq!(toc.get(2).expect("c").offset(), StreamOffset::new(0));
        assert_eq!(toc.get(0).expect("a").offset(), StreamOffset::new(256));

        let out = dir.path().join("extracted/c.bin");
        assert_eq!(extract_id(&config, &archive, 2, &out), b"charlie");
    }

    #[test]
    fn test_reorder_to_output_renumbers() {
        let (dir, config, archive, order) = packed();
        let output = dir.path().join("ordered/Game.gda");

        handle(&args(&archive, &order, Some(output.clone())), &config).expect("reorder");

        let toc = BigfileToc::load(&output, &config).expect("load");
        let names: Vec<&str> = toc.entries().iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["c.bin", "a.bin", "b.bin"]);

        let out = dir.path().join("extracted/b.bin");
        assert_eq!(extract_id(&config, &output, 2, &out), b"bravo-bravo");

        let source = BigfileToc::load(&archive, &config).expect("source");
        assert_eq!(source.get(2).expect("c").filename, "c.bin");
    }

    #[test]
    fn test_failed_in_place_reorder_removes_staging() {
        let (_dir, config, archive, order) = packed();
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&archive)
            .expect("open archive");
        file.set_len(3).expect("truncate");

        assert!(handle(&args(&archive, &order, None), &config).is_err());
        assert!(!archive.with_file_name(".bigfile-reorder").exists());

        let toc = BigfileToc::load(&archive, &config).expect("source tables intact");
        assert_eq!(toc.len(), 3);
    }
}
