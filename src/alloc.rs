//! Pluggable allocation for the scratch state a completion handler
//! needs for the lifetime of one asynchronous operation.
//!
//! Rust gives no hook into the allocation of a hand-rolled `Future`'s
//! state beyond ordinary `Box`/`Rc`, so `MemorySource` scopes to what a
//! safe-Rust crate *can* own end to end: the scratch state a
//! [`crate::handler::CompletionHandler`] needs for the lifetime of one
//! `AsyncOp`.

use std::alloc::Layout;
use std::cell::Cell;
use std::rc::Rc;

use crate::error::{Error, Result};

/// A polymorphic allocator back-end, embedded in every promise shape.
pub trait MemorySource {
    fn allocate(&self, layout: Layout) -> Result<*mut u8>;

    /// # Safety
    /// `ptr` must have been returned by `allocate` on the same source
    /// with the same `layout`.
    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout);
}

/// The thread-local default: the process's ordinary global allocator,
/// used whenever a promise shape isn't constructed with an explicit
/// source.
pub struct GlobalSource;

impl MemorySource for GlobalSource {
    fn allocate(&self, layout: Layout) -> Result<*mut u8> {
        if layout.size() == 0 {
            return Ok(std::ptr::NonNull::dangling().as_ptr());
        }
        // Safety: `layout` is caller-validated to have non-zero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        if ptr.is_null() {
            Err(Error::AllocationFailed)
        } else {
            Ok(ptr)
        }
    }

    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr, layout);
        }
    }
}

/// A monotonic bump allocator over a small embedded buffer, falling
/// back to the global allocator once the buffer is exhausted so
/// `allocate` never has to fail in practice.
pub struct Monotonic {
    buffer: Box<[Cell<u8>]>,
    cursor: Cell<usize>,
}

impl Monotonic {
    pub const DEFAULT_CAPACITY: usize = 2048;

    pub fn new(capacity: usize) -> Self {
        Monotonic {
            buffer: (0..capacity).map(|_| Cell::new(0u8)).collect(),
            cursor: Cell::new(0),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }

    fn try_bump(&self, layout: Layout) -> Option<*mut u8> {
        let base = self.buffer.as_ptr() as usize;
        let start = base + self.cursor.get();
        let aligned = (start + layout.align() - 1) & !(layout.align() - 1);
        let end = aligned.checked_add(layout.size())?;
        if end > base + self.buffer.len() {
            return None;
        }
        self.cursor.set(end - base);
        Some(aligned as *mut u8)
    }
}

impl MemorySource for Monotonic {
    fn allocate(&self, layout: Layout) -> Result<*mut u8> {
        if let Some(ptr) = self.try_bump(layout) {
            return Ok(ptr);
        }
        GlobalSource.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        let base = self.buffer.as_ptr() as usize;
        let addr = ptr as usize;
        if addr < base || addr >= base + self.buffer.len() {
            // Allocation fell through to the global allocator.
            GlobalSource.deallocate(ptr, layout);
        }
        // Bump allocations are reclaimed in bulk when the source itself
        // drops; individual frees are a no-op, same as any arena.
    }
}

/// Shared handle to a memory source, cloned into every promise shape and
/// every completion handler it spawns.
pub type SourceHandle = Rc<dyn MemorySource>;

pub fn global_source() -> SourceHandle {
    thread_local! {
        static GLOBAL: Rc<dyn MemorySource> = Rc::new(GlobalSource);
    }
    GLOBAL.with(|g| g.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_bumps_within_capacity() {
        let source = Monotonic::new(64);
        let layout = Layout::from_size_align(8, 8).unwrap();
        let a = source.allocate(layout).unwrap();
        let b = source.allocate(layout).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn monotonic_falls_back_past_capacity() {
        let source = Monotonic::new(8);
        let layout = Layout::from_size_align(64, 8).unwrap();
        // Must not fail: falls back to the global allocator.
        let ptr = source.allocate(layout).unwrap();
        unsafe { source.deallocate(ptr, layout) };
    }
}
