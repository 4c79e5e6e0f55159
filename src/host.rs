//! Host facilities the adapter borrows from its environment.
//!
//! The original collaborator is a kernel's `kmem_alloc`/`vmem_alloc`/mutex/
//! `gethrestime_sec`/`boot_ncpus` surface. Since this crate stands alone, that
//! surface is captured as a trait with a default, process-backed
//! implementation, so tests can substitute a double that fails allocations on
//! demand without needing to exhaust real memory.

use once_cell::sync::OnceCell;
use std::alloc::{alloc, dealloc, Layout};
use std::num::NonZeroU32;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Environment an [`crate::adapter::Adapter`] runs on.
pub trait Host: Send + Sync + 'static {
    /// Allocates `size` bytes using the sleeping allocator. In a kernel this
    /// blocks until memory is available; in userspace there is nothing to
    /// block on, so the default implementation is a direct allocation that
    /// can still fail under the rare condition of true exhaustion.
    fn alloc_sleep(&self, size: usize) -> Option<NonNull<u8>>;

    /// Allocates `size` bytes, failing immediately rather than retrying.
    fn alloc_nosleep(&self, size: usize) -> Option<NonNull<u8>>;

    /// Frees a block obtained from either allocator above.
    ///
    /// # Safety
    /// `ptr` must have been returned by `alloc_sleep`/`alloc_nosleep` on this
    /// same `Host` with this same `size`, and must not have been freed yet.
    unsafe fn free(&self, ptr: NonNull<u8>, size: usize);

    /// Coarse, non-decreasing wall-clock seconds.
    fn now_secs(&self) -> u64;

    /// Number of CPUs usable for sizing the memory pool.
    fn cpu_count(&self) -> NonZeroU32;

    /// Page size used to round up the fallback arena.
    fn page_size(&self) -> usize;
}

fn layout_for(size: usize) -> Layout {
    Layout::from_size_align(size.max(1), core::mem::align_of::<usize>())
        .expect("allocation size overflows isize")
}

/// Default [`Host`] implementation, backed by the process's global allocator,
/// a monotonic clock, and the detected CPU count.
pub struct SystemHost {
    start: Instant,
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SystemHost {
    fn alloc_sleep(&self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { alloc(layout_for(size)) })
    }

    fn alloc_nosleep(&self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { alloc(layout_for(size)) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        dealloc(ptr.as_ptr(), layout_for(size));
    }

    fn now_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    fn cpu_count(&self) -> NonZeroU32 {
        detected_cpu_count()
    }

    fn page_size(&self) -> usize {
        4096
    }
}

static NUM_CORES: OnceCell<NonZeroU32> = OnceCell::new();

fn detected_cpu_count() -> NonZeroU32 {
    *NUM_CORES.get_or_init(|| {
        #[cfg(feature = "detect_num_cores")]
        {
            NonZeroU32::new(num_cpus::get_physical() as u32).unwrap_or(NonZeroU32::new(1).unwrap())
        }
        #[cfg(not(feature = "detect_num_cores"))]
        {
            NonZeroU32::new(1).unwrap()
        }
    })
}

/// Test double that can be switched into a failure mode where both
/// allocators return `None`, without touching real system memory. Used to
/// exercise the decompression guaranteed-progress path.
pub struct FailingHost {
    inner: SystemHost,
    failing: AtomicBool,
}

impl FailingHost {
    pub fn new() -> Self {
        Self {
            inner: SystemHost::new(),
            failing: AtomicBool::new(false),
        }
    }

    /// Switches both allocators into (or out of) failure mode.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for FailingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for FailingHost {
    fn alloc_sleep(&self, size: usize) -> Option<NonNull<u8>> {
        if self.failing.load(Ordering::SeqCst) {
            return None;
        }
        self.inner.alloc_sleep(size)
    }

    fn alloc_nosleep(&self, size: usize) -> Option<NonNull<u8>> {
        if self.failing.load(Ordering::SeqCst) {
            return None;
        }
        self.inner.alloc_nosleep(size)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        self.inner.free(ptr, size)
    }

    fn now_secs(&self) -> u64 {
        self.inner.now_secs()
    }

    fn cpu_count(&self) -> NonZeroU32 {
        self.inner.cpu_count()
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }
}

impl<H: Host> Host for Arc<H> {
    fn alloc_sleep(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).alloc_sleep(size)
    }

    fn alloc_nosleep(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).alloc_nosleep(size)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        (**self).free(ptr, size)
    }

    fn now_secs(&self) -> u64 {
        (**self).now_secs()
    }

    fn cpu_count(&self) -> NonZeroU32 {
        (**self).cpu_count()
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }
}
