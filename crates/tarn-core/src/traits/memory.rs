//! Linear-memory reservation callbacks.
//!
//! The engine never grows a linear memory on its own authority: every memory
//! is reserved once when it is created and every growth is committed through
//! a [`MemoryCallbacks`] implementation. Returning `false` makes creation fail
//! with `FailMemoryAlloc` and makes `memory.grow` report failure.

use crate::{Limits, PAGE_SIZE};

/// Host policy for creating and growing linear memories.
pub trait MemoryCallbacks: Send {
    /// Called once when a memory with `limits` is created.
    fn reserve(&mut self, limits: &Limits) -> bool;

    /// Called before a memory grows from `current_pages` to `new_pages`.
    ///
    /// The engine has already checked `new_pages` against the declared
    /// maximum.
    fn commit(&mut self, current_pages: u32, new_pages: u32) -> bool;
}

/// Default callbacks: admit any size up to a fixed byte budget.
///
/// # Examples
///
/// ```
/// use tarn_core::traits::{BudgetAllocator, MemoryCallbacks};
/// use tarn_core::Limits;
///
/// let mut budget = BudgetAllocator::new(65_536);
/// assert!(!budget.reserve(&Limits::new(2, None)));
/// assert!(budget.reserve(&Limits::new(1, Some(4))));
/// assert_eq!(budget.committed_bytes(), 65_536);
/// ```
#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    limit_bytes: usize,
    committed_bytes: usize,
}

impl BudgetAllocator {
    /// Creates callbacks that admit at most `limit_bytes` per memory.
    #[must_use]
    pub const fn new(limit_bytes: usize) -> Self {
        Self {
            limit_bytes,
            committed_bytes: 0,
        }
    }

    /// Bytes committed so far.
    #[must_use]
    pub const fn committed_bytes(&self) -> usize {
        self.committed_bytes
    }

    /// The configured budget.
    #[must_use]
    pub const fn limit_bytes(&self) -> usize {
        self.limit_bytes
    }

    fn admit(&mut self, pages: u32) -> bool {
        let bytes = pages as usize * PAGE_SIZE as usize;
        if bytes > self.limit_bytes {
            tracing::warn!(
                requested = bytes,
                limit = self.limit_bytes,
                "linear memory exceeds budget"
            );
            return false;
        }
        self.committed_bytes = bytes;
        true
    }
}

impl MemoryCallbacks for BudgetAllocator {
    fn reserve(&mut self, limits: &Limits) -> bool {
        self.admit(limits.min)
    }

    fn commit(&mut self, _current_pages: u32, new_pages: u32) -> bool {
        self.admit(new_pages)
    }
}
