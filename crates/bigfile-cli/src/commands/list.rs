//! `bigfile list`

use std::path::PathBuf;

use anyhow::{Context, Result};
use bigfile::{BigfileConfig, BigfileToc, TocEntry};
use clap::Args;

/// Arguments for `bigfile list`
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Archive whose tables should be listed
    pub archive: PathBuf,
}

/// One line per entry: id, size, flags, offsets, children, hash and name
pub fn format_entry(entry: &TocEntry) -> String {
    let offsets: Vec<String> = entry.offsets.iter().map(ToString::to_string).collect();
    let flags = match (entry.compressed, entry.children.is_empty()) {
        (true, true) => "C-",
        (true, false) => "CP",
        (false, true) => "--",
        (false, false) => "-P",
    };
    let children = if entry.children.is_empty() {
        String::new()
    } else {
        let ids: Vec<String> = entry.children.iter().map(ToString::to_string).collect();
        format!(" children=[{}]", ids.join(","))
    };

    format!(
        "{:>6} {:>10} {} [{}]{} {} {}",
        entry.file_id,
        entry.size,
        flags,
        offsets.join(","),
        children,
        hex::encode(entry.content_hash.as_bytes()),
        entry.filename
    )
}

/// Print the tables stored next to the archive
pub fn handle(args: &ListArgs, config: &BigfileConfig) -> Result<()> {
    let toc = BigfileToc::load(&args.archive, config)
        .with_context(|| format!("loading TOC of {}", args.archive.display()))?;

    for entry in toc.entries() {
        println!("{}", format_entry(entry));
    }
    println!("{} entries", toc.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigfile::{ContentHash, StreamOffset};

    #[test]
    fn test_format_entry() {
        let mut entry = TocEntry::new(5);
        entry.size = 100;
        entry.offsets = vec![StreamOffset::new(256), StreamOffset::EMPTY];
        entry.children = vec![6, 7];
        entry.filename = "main.bin".to_string();
        entry.content_hash = ContentHash::compute(b"abc");

        assert_eq!(
            format_entry(&entry),
            "     5        100 -P [0x100,empty] children=[6,7] \
             a9993e364706816aba3e25717850c26c9cd0d89d main.bin"
        );
    }
}
