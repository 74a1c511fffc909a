//! Command implementations for the `tarn` CLI.
//!
//! Each command reads its inputs, drives the engine, and formats output
//! according to the requested format.

pub mod common;
pub mod inspect;
pub mod run;
