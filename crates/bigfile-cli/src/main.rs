//! Command-line front end for packing, inspecting and reordering Bigfiles

#![allow(clippy::uninlined_format_args)] // Positional args in log macros

use std::path::PathBuf;

use anyhow::Result;
use bigfile::BigfileConfig;
use clap::{Parser, Subcommand};
use tracing::Level;

mod commands;
mod manifest;

#[derive(Parser)]
#[command(
    name = "bigfile",
    about = "Pack game assets into Bigfile archives and inspect their tables of contents",
    version,
    author
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Path to a JSON configuration file
    #[arg(short, long, global = true, env = "BIGFILE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Pack the files listed in a manifest
    Pack(commands::pack::PackArgs),

    /// List the entries of an archive
    List(commands::list::ListArgs),

    /// Extract one entry from an archive
    Extract(commands::extract::ExtractArgs),

    /// Rewrite an archive in the order given by an access-order log
    Reorder(commands::reorder::ReorderArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => BigfileConfig::from_file(path)?,
        None => BigfileConfig::default(),
    };

    match cli.command {
        Commands::Pack(args) => commands::pack::handle(&args, config),
        Commands::List(args) => commands::list::handle(&args, &config),
        Commands::Extract(args) => commands::extract::handle(&args, &config),
        Commands::Reorder(args) => commands::reorder::handle(&args, &config),
    }
}
