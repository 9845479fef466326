//! Tighten CLI - command-line front end for tighten-core
//!
//! `tighten detect` lists optional associations whose presence is validated
//! anyway, and `tighten rewrite` turns them into required associations.

pub mod commands;
pub mod report;

pub use commands::{build_cli, execute, parse_command, CliCommand, OutputFormat};
