//! Reference tables.

use crate::module::TableType;
use tarn_core::{Error, Limits, Result, Status, Value, ValueType};

/// Hard cap on table size when no maximum is declared.
pub const MAX_TABLE_ELEMENTS: u32 = 10_000_000;

/// A growable array of references of one type.
#[derive(Debug, Clone)]
pub struct Table {
    element: ValueType,
    limits: Limits,
    elements: Vec<Value>,
}

fn out_of_bounds(what: &str) -> Error {
    Error::trap(
        Status::TrapTableOutOfBounds,
        format!("{what} out of table bounds"),
    )
}

impl Table {
    /// Creates a table of `ty.limits.min` null references.
    ///
    /// # Errors
    ///
    /// Returns `FailMemoryAlloc` if `min` exceeds [`MAX_TABLE_ELEMENTS`] or
    /// the allocation fails.
    pub fn new(ty: TableType) -> Result<Self> {
        let min = ty.limits.min;
        if min > MAX_TABLE_ELEMENTS {
            return Err(Error::instantiation(
                Status::FailMemoryAlloc,
                format!("table of {min} elements exceeds the limit of {MAX_TABLE_ELEMENTS}"),
            ));
        }
        let mut elements = Vec::new();
        elements
            .try_reserve_exact(min as usize)
            .map_err(|e| Error::instantiation(Status::FailMemoryAlloc, e.to_string()))?;
        elements.resize(min as usize, ty.element.default_value());
        Ok(Self {
            element: ty.element,
            limits: ty.limits,
            elements,
        })
    }

    /// Element reference type.
    #[must_use]
    pub const fn element_type(&self) -> ValueType {
        self.element
    }

    /// Current limits; `min` tracks the current size.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        self.limits
    }

    /// Current size in elements.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    /// Reads one element.
    ///
    /// # Errors
    ///
    /// Returns `TrapTableOutOfBounds` for an index past the end.
    pub fn get(&self, index: u32) -> Result<Value> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or_else(|| out_of_bounds("table.get"))
    }

    /// Writes one element.
    ///
    /// # Errors
    ///
    /// Returns `TrapTableOutOfBounds` for an index past the end.
    pub fn set(&mut self, index: u32, value: Value) -> Result<()> {
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or_else(|| out_of_bounds("table.set"))?;
        *slot = value;
        Ok(())
    }

    /// Grows by `delta` elements filled with `init`; returns the old size
    /// or `None` past the maximum.
    pub fn grow(&mut self, delta: u32, init: Value) -> Option<u32> {
        let old = self.size();
        let new_size = old.checked_add(delta)?;
        let max = self
            .limits
            .max
            .unwrap_or(MAX_TABLE_ELEMENTS)
            .min(MAX_TABLE_ELEMENTS);
        if new_size > max {
            return None;
        }
        self.elements.resize(new_size as usize, init);
        self.limits.min = new_size;
        Some(old)
    }

    /// Fills `[start, start + len)` with `value`.
    ///
    /// # Errors
    ///
    /// Returns `TrapTableOutOfBounds` if the range does not fit; nothing is
    /// written in that case.
    pub fn fill(&mut self, start: u32, value: Value, len: u32) -> Result<()> {
        let range = self
            .range(start, len)
            .ok_or_else(|| out_of_bounds("table.fill"))?;
        self.elements[range].fill(value);
        Ok(())
    }

    /// Copies `len` elements within this table.
    ///
    /// # Errors
    ///
    /// Returns `TrapTableOutOfBounds` if either range does not fit.
    pub fn copy_within(&mut self, dst: u32, src: u32, len: u32) -> Result<()> {
        let src_range = self
            .range(src, len)
            .ok_or_else(|| out_of_bounds("table.copy"))?;
        let dst_range = self
            .range(dst, len)
            .ok_or_else(|| out_of_bounds("table.copy"))?;
        self.elements.copy_within(src_range, dst_range.start);
        Ok(())
    }

    /// Writes `items` starting at `dst`.
    ///
    /// # Errors
    ///
    /// Returns `TrapTableOutOfBounds` if the range does not fit; nothing is
    /// written in that case.
    pub fn init(&mut self, dst: u32, items: &[Value]) -> Result<()> {
        let len = u32::try_from(items.len()).map_err(|_| out_of_bounds("table.init"))?;
        let range = self
            .range(dst, len)
            .ok_or_else(|| out_of_bounds("table.init"))?;
        self.elements[range].copy_from_slice(items);
        Ok(())
    }

    /// Elements in `[start, start + len)`, if in bounds.
    #[must_use]
    pub fn slice(&self, start: u32, len: u32) -> Option<&[Value]> {
        self.range(start, len).map(|r| &self.elements[r])
    }

    fn range(&self, start: u32, len: u32) -> Option<std::ops::Range<usize>> {
        let end = start.checked_add(len)?;
        (end <= self.size()).then_some(start as usize..end as usize)
    }
}
