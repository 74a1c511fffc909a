//! Sandboxed WebAssembly runtime: decoder, linker, and resumable interpreter.
//!
//! A module is decoded and validated once into an immutable [`Module`], then
//! instantiated any number of times inside a [`Store`]. Imports are resolved
//! against ordered [`ImportPackage`]s. Execution is driven by an
//! [`Interpreter`] that can stop at breakpoints, single-step, and be
//! suspended from another thread.
//!
//! # Architecture
//!
//! - `decode` - binary reader and body validator
//! - `store` / `linker` / `initializer` - instantiation pipeline
//! - `interpreter` - dispatch loop, numerics, debugger hooks
//! - `backend` - the [`Backend`](tarn_core::traits::Backend) contract over
//!   the interpreter (and over `wasmtime` with the `wasmtime` feature)
//!
//! # Examples
//!
//! ```
//! use tarn_runtime::{Engine, Store};
//! use tarn_core::Value;
//!
//! let engine = Engine::default();
//! let bytes = wat::parse_str(r#"
//!     (module (func (export "add") (param i32 i32) (result i32)
//!         local.get 0
//!         local.get 1
//!         i32.add))
//! "#).unwrap();
//! let module = engine.decode(&bytes).unwrap();
//!
//! let mut store = Store::new(&engine);
//! let id = store.instantiate(module, "calc", &[], None).unwrap();
//! let sum = store.invoke_export(id, "add", &[Value::I32(i32::MAX), Value::I32(1)]).unwrap();
//! assert_eq!(sum, vec![Value::I32(i32::MIN)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod backend;
pub mod cache;
pub mod decode;
pub mod engine;
pub mod host;
pub mod instr;
pub mod interpreter;
pub mod memory;
pub mod module;
pub mod store;
pub mod table;
#[cfg(feature = "wasmtime")]
pub mod wasmtime_backend;

mod initializer;
mod linker;

pub use backend::InterpreterBackend;
pub use cache::{CacheKey, ModuleCache};
pub use decode::decode;
pub use engine::Engine;
pub use host::{Binding, Caller, HostFunc, ImportPackage};
pub use interpreter::{
    FrameInfo, Interpreter, Location, Outcome, SuspendHandle, SuspendReason, Suspension,
};
pub use memory::LinearMemory;
pub use module::{Module, ModuleSummary};
pub use store::{Extern, GlobalAddr, MemAddr, Store, TableAddr};
pub use table::Table;
#[cfg(feature = "wasmtime")]
pub use wasmtime_backend::WasmtimeBackend;
