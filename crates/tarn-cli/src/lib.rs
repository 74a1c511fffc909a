//! Library half of the `tarn` command-line host.
//!
//! The binary is a thin wrapper; argument parsing, commands, the `env`
//! host package and output formatting live here so they can be tested.

#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod commands;
pub mod formatters;
pub mod host;
pub mod runner;

pub use cli::{BackendKind, Cli, Commands};
