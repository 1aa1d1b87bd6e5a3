//! CLI subcommand implementations

pub mod inspect;
pub mod manifest;
pub mod replay;
