//! Single preallocated buffer guaranteeing decompression can always make
//! progress, even when the pool and the fast-fail allocator are both
//! exhausted. Grounded in `zstd_fallback_mem`/`create_fallback_mem`.
//!
//! Modeled as a bounded semaphore of size one: `parking_lot::Mutex<()>`
//! guarded by [`ArenaGuard`], acquired exactly once per use and held for the
//! duration of the decompression call (Design Notes, Open question (b)),
//! with no separate quiesce-then-use step.

use crate::host::Host;
use core::ptr::NonNull;
use parking_lot::Mutex;

pub(crate) struct FallbackArena {
    mutex: Mutex<()>,
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: `ptr` is only ever dereferenced by whoever currently holds `mutex`
// (or, across the FFI boundary, via the forget/reconstruct protocol used by
// `ArenaGuard`, mirroring `SlotGuard`).
unsafe impl Send for FallbackArena {}
unsafe impl Sync for FallbackArena {}

fn round_up_to_page(size: usize, page: usize) -> usize {
    (size + page - 1) / page * page
}

impl FallbackArena {
    /// Preallocates a buffer of at least `size` bytes, rounded up to a page.
    pub fn new<H: Host>(host: &H, size: usize) -> Self {
        let rounded = round_up_to_page(size, host.page_size());
        let ptr = host
            .alloc_sleep(rounded)
            .expect("fallback arena preallocation must not fail at init");
        FallbackArena {
            mutex: Mutex::new(()),
            ptr,
            size: rounded,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Blocks until the arena is free, then returns a guard over its buffer.
    pub fn acquire(&self) -> ArenaGuard<'_> {
        let guard = self.mutex.lock();
        core::mem::forget(guard);
        ArenaGuard { arena: self }
    }

    /// Reconstructs the guard for an arena that is already checked out.
    ///
    /// # Safety
    /// Must only be called once per matching `acquire()` whose guard was
    /// forgotten rather than dropped.
    pub unsafe fn from_checked_out(&self) -> ArenaGuard<'_> {
        ArenaGuard { arena: self }
    }

    /// Frees the arena's backing buffer. Called once at teardown.
    ///
    /// # Safety
    /// Must not be called while any `ArenaGuard` is outstanding.
    pub unsafe fn free<H: Host>(&self, host: &H) {
        host.free(self.ptr, self.size);
    }
}

pub(crate) struct ArenaGuard<'a> {
    arena: &'a FallbackArena,
}

impl<'a> ArenaGuard<'a> {
    pub fn ptr(&self) -> NonNull<u8> {
        self.arena.ptr
    }

    pub fn size(&self) -> usize {
        self.arena.size
    }
}

impl<'a> Drop for ArenaGuard<'a> {
    fn drop(&mut self) {
        unsafe { self.arena.mutex.force_unlock() };
    }
}
