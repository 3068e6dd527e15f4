//! CLI subcommands

pub mod tune;
pub mod versions;
