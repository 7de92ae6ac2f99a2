//! Subcommand implementations for the ndnfw CLI

pub mod config;
pub mod encode;
pub mod simulate;
