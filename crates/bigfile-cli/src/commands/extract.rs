//! `bigfile extract`

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use bigfile::{BigfileConfig, BigfileReader, BigfileToc, ContentHash, FileId};
use clap::Args;
use tracing::warn;

/// Arguments for `bigfile extract`
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Archive to read from
    pub archive: PathBuf,

    /// Id of the entry to extract
    #[arg(long)]
    pub id: FileId,

    /// File receiving the payload
    #[arg(long)]
    pub out: PathBuf,
}

/// Copy one payload out of an archive, checking its hash when one is stored
pub fn handle(args: &ExtractArgs, config: &BigfileConfig) -> Result<()> {
    let toc = BigfileToc::load(&args.archive, config)
        .with_context(|| format!("loading TOC of {}", args.archive.display()))?;
    let Some(entry) = toc.get(args.id) else {
        bail!("{} has no entry {}", args.archive.display(), args.id);
    };

    let mut reader = BigfileReader::new(config);
    reader.open(&args.archive)?;
    let data = reader.read_entry(entry)?;

    if !entry.content_hash.is_empty() && ContentHash::compute(&data) != entry.content_hash {
        warn!("Entry {} does not match its stored hash", entry.file_id);
    }

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, &data).with_context(|| format!("writing {}", args.out.display()))?;
    println!("{} ({} bytes) -> {}", entry.filename, data.len(), args.out.display());
    Ok(())
}
