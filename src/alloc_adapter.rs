//! `ZSTD_customMem` shims handed to the codec so that every codec-internal
//! allocation threads through a [`Pool`] and is tagged for correct release.
//! Grounded in `zstd_alloc`/`zstd_dctx_alloc`/`zstd_free`.

use crate::alloc_header::{block_of, header_of, write_header, AllocHeader, Tag, HEADER_SIZE};
use crate::fallback_arena::FallbackArena;
use crate::host::Host;
use crate::pool::{Allocation, Pool, SlotGuard};
use core::ffi::c_void;
use core::ptr::NonNull;
use zstd_sys::ZSTD_customMem;

/// Allocator handed to the codec for compression contexts. Never falls back
/// past the pool's own lazy fallback: a `None` return must be treated by the
/// caller as "this block is incompressible".
pub(crate) struct CompressionAllocator<'a, H: Host> {
    pool: &'a Pool,
    host: &'a H,
}

impl<'a, H: Host> CompressionAllocator<'a, H> {
    pub fn new(pool: &'a Pool, host: &'a H) -> Self {
        Self { pool, host }
    }

    pub fn custom_mem(&self) -> ZSTD_customMem {
        ZSTD_customMem {
            customAlloc: Some(Self::alloc_trampoline),
            customFree: Some(Self::free_trampoline),
            opaque: self as *const Self as *mut c_void,
        }
    }

    fn do_alloc(&self, size: usize) -> *mut c_void {
        let total = size + HEADER_SIZE;
        match self.pool.alloc(self.host, total) {
            Some(Allocation::Slot(guard)) => {
                let ptr = guard.ptr();
                let size = guard.size();
                let slot = guard.slot_index();
                core::mem::forget(guard);
                unsafe { write_header(ptr, AllocHeader { tag: Tag::Pool, size, slot }).as_ptr() as *mut c_void }
            }
            Some(Allocation::Default(ptr, size)) => unsafe {
                write_header(ptr, AllocHeader { tag: Tag::Default, size, slot: 0 }).as_ptr() as *mut c_void
            },
            None => core::ptr::null_mut(),
        }
    }

    fn do_free(&self, ptr: *mut c_void) {
        let Some(suffix) = NonNull::new(ptr as *mut u8) else {
            return;
        };
        let header = unsafe { header_of(suffix) };
        match header.tag {
            Tag::Pool => drop(unsafe { SlotGuard::from_checked_out(self.pool, self.host, header.slot) }),
            Tag::Default => unsafe { self.host.free(block_of(suffix), header.size) },
            Tag::Dctx => unreachable!("compression allocator never hands out arena-tagged memory"),
        }
    }

    unsafe extern "C" fn alloc_trampoline(opaque: *mut c_void, size: usize) -> *mut c_void {
        (&*(opaque as *const Self)).do_alloc(size)
    }

    unsafe extern "C" fn free_trampoline(opaque: *mut c_void, ptr: *mut c_void) {
        (&*(opaque as *const Self)).do_free(ptr)
    }
}

/// Allocator handed to the codec for decompression contexts. Unlike its
/// compression counterpart, this one guarantees progress: a pool miss
/// retries once with the sleeping allocator, and a second miss blocks on the
/// fallback arena.
pub(crate) struct DecompressionAllocator<'a, H: Host> {
    pool: &'a Pool,
    arena: &'a FallbackArena,
    host: &'a H,
}

impl<'a, H: Host> DecompressionAllocator<'a, H> {
    pub fn new(pool: &'a Pool, arena: &'a FallbackArena, host: &'a H) -> Self {
        Self { pool, arena, host }
    }

    pub fn custom_mem(&self) -> ZSTD_customMem {
        ZSTD_customMem {
            customAlloc: Some(Self::alloc_trampoline),
            customFree: Some(Self::free_trampoline),
            opaque: self as *const Self as *mut c_void,
        }
    }

    fn do_alloc(&self, size: usize) -> *mut c_void {
        let total = size + HEADER_SIZE;

        if let Some(allocation) = self.pool.alloc(self.host, total) {
            return match allocation {
                Allocation::Slot(guard) => {
                    let ptr = guard.ptr();
                    let size = guard.size();
                    let slot = guard.slot_index();
                    core::mem::forget(guard);
                    unsafe { write_header(ptr, AllocHeader { tag: Tag::Pool, size, slot }).as_ptr() as *mut c_void }
                }
                Allocation::Default(ptr, size) => unsafe {
                    write_header(ptr, AllocHeader { tag: Tag::Default, size, slot: 0 }).as_ptr() as *mut c_void
                },
            };
        }

        if let Some(ptr) = self.host.alloc_sleep(total) {
            return unsafe {
                write_header(ptr, AllocHeader { tag: Tag::Default, size: total, slot: 0 }).as_ptr() as *mut c_void
            };
        }

        let guard = self.arena.acquire();
        if guard.size() < total {
            drop(guard);
            return core::ptr::null_mut();
        }
        let ptr = guard.ptr();
        let size = guard.size();
        core::mem::forget(guard);
        unsafe { write_header(ptr, AllocHeader { tag: Tag::Dctx, size, slot: 0 }).as_ptr() as *mut c_void }
    }

    fn do_free(&self, ptr: *mut c_void) {
        let Some(suffix) = NonNull::new(ptr as *mut u8) else {
            return;
        };
        let header = unsafe { header_of(suffix) };
        match header.tag {
            Tag::Pool => drop(unsafe { SlotGuard::from_checked_out(self.pool, self.host, header.slot) }),
            Tag::Default => unsafe { self.host.free(block_of(suffix), header.size) },
            Tag::Dctx => drop(unsafe { self.arena.from_checked_out() }),
        }
    }

    unsafe extern "C" fn alloc_trampoline(opaque: *mut c_void, size: usize) -> *mut c_void {
        (&*(opaque as *const Self)).do_alloc(size)
    }

    unsafe extern "C" fn free_trampoline(opaque: *mut c_void, ptr: *mut c_void) {
        (&*(opaque as *const Self)).do_free(ptr)
    }
}
