//! Bump arena that owns everything a parse produces.

use std::cell::Cell;

use bumpalo::Bump;

use crate::{Error, Result};

/// Append-only memory pool for restored instances and string bytes.
///
/// Everything a parse returns borrows from the arena, so the whole tree is
/// released at once when the arena is dropped or [`reset`](Arena::reset).
///
/// Storage a parse keeps outside the bump, such as handle tables, is
/// [`charge`](Arena::charge)d against the same limit.
#[derive(Debug, Default)]
pub struct Arena {
    bump: Bump,
    limit: Option<usize>,
    charged: Cell<usize>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// An arena that fails with [`Error::OutOfMemory`] once `limit` bytes
    /// have been handed out.
    pub fn with_limit(limit: usize) -> Self {
        let bump = Bump::new();
        bump.set_allocation_limit(Some(limit));
        Self {
            bump,
            limit: Some(limit),
            charged: Cell::new(0),
        }
    }

    /// Allocate `len` zeroed bytes.
    pub fn alloc_zeroed(&self, len: usize) -> Result<&mut [u8]> {
        self.bump
            .try_alloc_slice_fill_copy(len, 0u8)
            .map_err(|_| Error::OutOfMemory)
    }

    /// Copy raw bytes into the arena.
    pub fn alloc_bytes(&self, bytes: &[u8]) -> Result<&[u8]> {
        self.bump
            .try_alloc_slice_copy(bytes)
            .map(|b| &*b)
            .map_err(|_| Error::OutOfMemory)
    }

    /// Count `len` bytes held elsewhere against the limit.
    ///
    /// Fails with [`Error::OutOfMemory`] when the bump and everything charged
    /// so far would exceed it; the bump's own limit shrinks to match.
    pub fn charge(&self, len: usize) -> Result<()> {
        let charged = self.charged.get().checked_add(len).ok_or(Error::OutOfMemory)?;
        if let Some(limit) = self.limit {
            let used = self
                .bump
                .allocated_bytes()
                .checked_add(charged)
                .ok_or(Error::OutOfMemory)?;
            if used > limit {
                return Err(Error::OutOfMemory);
            }
            self.bump.set_allocation_limit(Some(limit - charged));
        }
        self.charged.set(charged);
        Ok(())
    }

    /// Bytes currently held by the arena, including unused chunk capacity.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Bytes charged for storage outside the arena.
    pub fn charged_bytes(&self) -> usize {
        self.charged.get()
    }

    /// Free everything at once, keeping the largest chunk for reuse.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.charged.set(0);
        self.bump.set_allocation_limit(self.limit);
    }
}
