//! Subcommand implementations

pub mod extract;
pub mod list;
pub mod pack;
pub mod reorder;
