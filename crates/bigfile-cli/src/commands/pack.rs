//! `bigfile pack`

use std::path::PathBuf;

use anyhow::{Context, Result};
use bigfile::{BigfileBuilder, BigfileConfig};
use clap::Args;

use crate::manifest::Manifest;

/// Arguments for `bigfile pack`
#[derive(Args, Debug)]
pub struct PackArgs {
    /// Directory the manifest filenames are relative to
    #[arg(long)]
    pub src: PathBuf,

    /// Directory receiving the archive and its tables
    #[arg(long)]
    pub out: PathBuf,

    /// JSON manifest listing the files to pack
    #[arg(long)]
    pub manifest: PathBuf,

    /// Only regenerate the tables, without writing the archive
    #[arg(long)]
    pub toc_only: bool,
}

/// Pack every manifest entry into one archive
pub fn handle(args: &PackArgs, config: BigfileConfig) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let archive = config.archive_path(&args.out);

    let mut builder = BigfileBuilder::new(config)?;
    for entry in &manifest.files {
        builder
            .add(entry.id, &entry.names)
            .with_context(|| format!("adding file id {}", entry.id))?;
        if entry.compressed {
            builder.mark_compressed(entry.id)?;
        }
    }

    let report = builder.simulate(&args.src)?;
    for id in &report.missing {
        println!("missing: file id {id}");
    }

    let toc = builder
        .save(&args.out, !args.toc_only)
        .with_context(|| format!("saving {}", archive.display()))?;

    println!(
        "{}: {} entries, {} bytes{}",
        archive.display(),
        toc.len(),
        report.final_size,
        if args.toc_only { " (TOC only)" } else { "" }
    );
    Ok(())
}
