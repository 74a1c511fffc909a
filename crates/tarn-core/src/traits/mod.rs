//! Traits at the seams between the engine and its hosts.
//!
//! # Module Structure
//!
//! - `backend` - Backend-neutral execution contract and host bindings
//! - `memory` - Linear-memory reservation callbacks
//!
//! # Examples
//!
//! ```
//! use tarn_core::traits::{BudgetAllocator, MemoryCallbacks};
//! use tarn_core::Limits;
//!
//! let mut budget = BudgetAllocator::new(2 * 65_536);
//! assert!(budget.reserve(&Limits::new(1, None)));
//! assert!(budget.commit(1, 2));
//! assert!(!budget.commit(2, 3));
//! ```

mod backend;
mod memory;

pub use backend::{Backend, FunctionHandle, GlobalHandle, HostBinding, HostProc};
pub use memory::{BudgetAllocator, MemoryCallbacks};
