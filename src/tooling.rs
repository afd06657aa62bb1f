//! Tooling & Integration Layer
//!
//! Command-line surfaces over the coordination components.

pub mod cli;

pub use cli::{CaseCommands, Cli, CliContext, Commands, JournalCommands};
