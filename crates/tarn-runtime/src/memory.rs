//! Linear memory.
//!
//! A memory is an owned byte buffer whose size is always a whole number of
//! 64 KiB pages. Reservation and growth are approved by the host's
//! [`MemoryCallbacks`]; the engine only updates `limits.min` after the host
//! agrees.

use std::fmt;
use tarn_core::traits::MemoryCallbacks;
use tarn_core::{Error, Limits, MAX_PAGES, PAGE_SIZE, Result, Status};

/// A growable, page-granular byte buffer.
pub struct LinearMemory {
    bytes: Vec<u8>,
    limits: Limits,
    callbacks: Box<dyn MemoryCallbacks>,
}

impl fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearMemory")
            .field("limits", &self.limits)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

const fn page_bytes(pages: u32) -> usize {
    pages as usize * PAGE_SIZE as usize
}

impl LinearMemory {
    /// Reserves a memory of `limits.min` zeroed pages.
    ///
    /// # Errors
    ///
    /// Returns `FailMemoryAlloc` if the callbacks refuse the reservation or
    /// the allocation itself fails.
    pub fn new(limits: Limits, mut callbacks: Box<dyn MemoryCallbacks>) -> Result<Self> {
        if !callbacks.reserve(&limits) {
            return Err(Error::instantiation(
                Status::FailMemoryAlloc,
                format!("memory reservation refused for {limits} pages"),
            ));
        }
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(page_bytes(limits.min))
            .map_err(|e| Error::instantiation(Status::FailMemoryAlloc, e.to_string()))?;
        bytes.resize(page_bytes(limits.min), 0);
        Ok(Self {
            bytes,
            limits,
            callbacks,
        })
    }

    /// Current size in pages.
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.limits.min
    }

    /// Current limits; `min` tracks the committed size.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        self.limits
    }

    /// Committed bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    /// Committed bytes, mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Committed size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for a zero-page memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Resizes the memory to `new_pages` pages.
    ///
    /// Requests above the maximum fail with `TrapMemoryOutOfBounds` without
    /// consulting the callbacks.
    ///
    /// # Errors
    ///
    /// Returns `TrapMemoryOutOfBounds` above the maximum and `FailMemoryAlloc`
    /// when shrinking or when the callbacks refuse.
    pub fn resize(&mut self, new_pages: u32) -> Result<()> {
        let max = self.limits.max.unwrap_or(MAX_PAGES).min(MAX_PAGES);
        if new_pages > max {
            return Err(Error::trap(
                Status::TrapMemoryOutOfBounds,
                format!("cannot grow memory to {new_pages} pages, maximum is {max}"),
            ));
        }
        let current = self.limits.min;
        if new_pages < current {
            return Err(Error::instantiation(
                Status::FailMemoryAlloc,
                format!("cannot shrink memory from {current} to {new_pages} pages"),
            ));
        }
        if new_pages == current {
            return Ok(());
        }
        if !self.callbacks.commit(current, new_pages) {
            tracing::warn!(current, new_pages, "memory growth refused");
            return Err(Error::instantiation(
                Status::FailMemoryAlloc,
                format!("memory growth to {new_pages} pages refused"),
            ));
        }
        let additional = page_bytes(new_pages) - self.bytes.len();
        self.bytes
            .try_reserve_exact(additional)
            .map_err(|e| Error::instantiation(Status::FailMemoryAlloc, e.to_string()))?;
        self.bytes.resize(page_bytes(new_pages), 0);
        self.limits.min = new_pages;
        tracing::trace!(from = current, to = new_pages, "memory grown");
        Ok(())
    }

    /// `memory.grow` semantics: grows by `delta` pages and returns the old
    /// size, or `None` if growth fails.
    pub fn grow(&mut self, delta: u32) -> Option<u32> {
        let old = self.limits.min;
        let new_pages = old.checked_add(delta)?;
        self.resize(new_pages).ok().map(|()| old)
    }

    /// Checks that `[addr, addr + len)` lies inside the memory.
    #[must_use]
    pub fn range(&self, addr: u64, len: u64) -> Option<std::ops::Range<usize>> {
        let end = addr.checked_add(len)?;
        if end > self.bytes.len() as u64 {
            return None;
        }
        Some(addr as usize..end as usize)
    }

    /// Reads `N` bytes at `addr`.
    #[must_use]
    pub fn read<const N: usize>(&self, addr: u64) -> Option<[u8; N]> {
        let range = self.range(addr, N as u64)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[range]);
        Some(buf)
    }

    /// Writes `src` at `addr`; nothing is written unless the whole range fits.
    pub fn write(&mut self, addr: u64, src: &[u8]) -> bool {
        match self.range(addr, src.len() as u64) {
            Some(range) => {
                self.bytes[range].copy_from_slice(src);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        reserves: Vec<Limits>,
        commits: Vec<(u32, u32)>,
        refuse_commit: bool,
    }

    struct Shared(Arc<Mutex<Recorder>>);

    impl MemoryCallbacks for Shared {
        fn reserve(&mut self, limits: &Limits) -> bool {
            self.0.lock().unwrap().reserves.push(*limits);
            true
        }

        fn commit(&mut self, current_pages: u32, new_pages: u32) -> bool {
            let mut rec = self.0.lock().unwrap();
            rec.commits.push((current_pages, new_pages));
            !rec.refuse_commit
        }
    }

    fn memory(limits: Limits) -> (LinearMemory, Arc<Mutex<Recorder>>) {
        let rec = Arc::new(Mutex::new(Recorder::default()));
        let mem = LinearMemory::new(limits, Box::new(Shared(Arc::clone(&rec)))).unwrap();
        (mem, rec)
    }

    #[test]
    fn test_new_reserves_min_pages() {
        let (mem, rec) = memory(Limits::new(2, Some(4)));
        assert_eq!(mem.len(), 2 * PAGE_SIZE as usize);
        assert_eq!(rec.lock().unwrap().reserves, vec![Limits::new(2, Some(4))]);
    }

    #[test]
    fn test_resize_within_max() {
        let (mut mem, rec) = memory(Limits::new(1, Some(2)));
        mem.resize(2).unwrap();
        assert_eq!(mem.pages(), 2);
        assert_eq!(mem.limits(), Limits::new(2, Some(2)));
        assert_eq!(rec.lock().unwrap().commits, vec![(1, 2)]);
    }

    #[test]
    fn test_resize_above_max_skips_callbacks() {
        let (mut mem, rec) = memory(Limits::new(1, Some(2)));
        let err = mem.resize(3).unwrap_err();
        assert_eq!(err.status(), Status::TrapMemoryOutOfBounds);
        assert!(rec.lock().unwrap().commits.is_empty());
        assert_eq!(mem.pages(), 1);
    }

    #[test]
    fn test_refused_commit_keeps_size() {
        let (mut mem, rec) = memory(Limits::new(1, None));
        rec.lock().unwrap().refuse_commit = true;
        let err = mem.resize(2).unwrap_err();
        assert_eq!(err.status(), Status::FailMemoryAlloc);
        assert_eq!(mem.pages(), 1);
        assert_eq!(mem.grow(1), None);
    }

    #[test]
    fn test_shrink_rejected() {
        let (mut mem, _) = memory(Limits::new(2, None));
        assert_eq!(mem.resize(1).unwrap_err().status(), Status::FailMemoryAlloc);
    }

    #[test]
    fn test_grow_returns_old_size() {
        let (mut mem, _) = memory(Limits::new(1, Some(3)));
        assert_eq!(mem.grow(1), Some(1));
        assert_eq!(mem.grow(0), Some(2));
        assert_eq!(mem.grow(2), None);
    }

    #[test]
    fn test_out_of_bounds_write_is_all_or_nothing() {
        let (mut mem, _) = memory(Limits::new(1, None));
        let end = PAGE_SIZE as u64;
        assert!(!mem.write(end - 2, &[1, 2, 3, 4]));
        assert_eq!(&mem.data()[PAGE_SIZE as usize - 2..], &[0, 0]);
        assert!(mem.write(end - 4, &[1, 2, 3, 4]));
        assert_eq!(mem.read::<4>(end - 4), Some([1, 2, 3, 4]));
        assert_eq!(mem.read::<4>(end - 3), None);
    }
}
