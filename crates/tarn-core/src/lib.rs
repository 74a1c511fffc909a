//! Core value types, status codes, and traits for the tarn WebAssembly engine.
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace: the tagged [`Value`] model, function and limit types, the flat
//! [`Status`] taxonomy, the [`Error`] hierarchy, engine configuration, and the
//! [`Backend`](traits::Backend) abstraction that hosts program against.
//!
//! # Architecture
//!
//! - Value model (`Value`, `ValueType`, `FuncType`, `Limits`)
//! - Status taxonomy and error hierarchy
//! - Engine configuration with security profiles
//! - Backend and memory-callback traits
//!
//! # Examples
//!
//! ```
//! use tarn_core::{FuncType, Value, ValueType};
//!
//! let ty = FuncType::from_tags("i", "ii").unwrap();
//! assert_eq!(ty.params(), &[ValueType::I32, ValueType::I32]);
//! assert_eq!(Value::I32(7).value_type(), ValueType::I32);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod status;
mod types;

pub mod cli;
pub mod stats;
pub mod traits;

pub use config::{EngineConfig, EngineConfigBuilder, EngineProfile};
pub use error::{Error, Result};
pub use status::Status;
pub use types::{
    FuncRef, FuncType, GlobalType, InstanceId, Limits, LimitsKind, MAX_PAGES, PAGE_SIZE, Value,
    ValueType, limits_compatible,
};
