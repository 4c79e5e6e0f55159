//! Bounded pool of reusable per-context scratch buffers.
//!
//! Grounded in `zstd_mempool_alloc`/`zstd_mempool_free`: a reuse pass over
//! populated slots, a fresh-allocation pass over empty ones, both using
//! non-blocking `try_lock` to avoid convoying, and a lazy direct-allocation
//! fallback if neither pass secures a slot.
//!
//! The lock on a slot doubles as the "checked out" token (see Design Notes).
//! [`SlotGuard`] makes that explicit: it is handed back from [`Pool::alloc`]
//! holding the slot locked, and its `Drop` is the only path that unlocks the
//! slot and stamps its next expiry. Because the checked-out buffer crosses
//! an FFI boundary (the codec holds the raw pointer, not the guard), the
//! guard is deliberately forgotten at hand-off and reconstructed from the
//! allocation header's slot index when the codec calls back to free it
//! (see [`SlotGuard::from_checked_out`]).

use crate::host::Host;
use core::ptr::NonNull;
use parking_lot::Mutex;

/// Slots are evicted if left idle this long after their last checkout.
pub(crate) const POOL_TIMEOUT_SECS: u64 = 120;

/// Minimum pool size regardless of detected CPU count.
pub(crate) const POOL_FLOOR: usize = 16;

struct SlotState {
    payload: Option<NonNull<u8>>,
    size: usize,
    expires_at: u64,
}

struct Slot {
    mutex: Mutex<SlotState>,
}

// SAFETY: a slot's payload is only ever touched while its mutex is held (or,
// across the FFI boundary, while morally held per the forget/reconstruct
// protocol documented on `SlotGuard`).
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Slot {
    fn empty() -> Self {
        Slot {
            mutex: Mutex::new(SlotState {
                payload: None,
                size: 0,
                expires_at: 0,
            }),
        }
    }
}

/// A fixed-size array of reusable scratch-buffer slots, sized `4 × CPU_COUNT`
/// at init with a floor of [`POOL_FLOOR`]. One pool backs compression
/// contexts, a second backs decompression contexts.
pub(crate) struct Pool {
    slots: Box<[Slot]>,
}

/// Result of [`Pool::alloc`]: either a checked-out slot, or a one-off
/// allocation from the fast-fail allocator (the "lazy fallback" step).
pub(crate) enum Allocation<'a, H: Host> {
    Slot(SlotGuard<'a, H>),
    Default(NonNull<u8>, usize),
}

impl Pool {
    pub fn new(max_slots: usize) -> Self {
        let n = max_slots.max(1);
        Pool {
            slots: (0..n).map(|_| Slot::empty()).collect(),
        }
    }

    pub fn sized_for_cpu_count(cpu_count: usize) -> Self {
        Self::new((cpu_count * 4).max(POOL_FLOOR))
    }

    /// Runs the reuse pass, then the fresh-allocation pass, then the lazy
    /// fallback. Returns `None` only if the fast-fail allocator itself fails.
    pub fn alloc<'a, H: Host>(&'a self, host: &'a H, size: usize) -> Option<Allocation<'a, H>> {
        let now = host.now_secs();
        let mut candidate: Option<(usize, NonNull<u8>, usize)> = None;

        for (i, slot) in self.slots.iter().enumerate() {
            let mut guard = match slot.mutex.try_lock() {
                Some(g) => g,
                None => continue,
            };

            if candidate.is_none() {
                if let Some(ptr) = guard.payload {
                    if size <= guard.size {
                        guard.expires_at = now + POOL_TIMEOUT_SECS;
                        candidate = Some((i, ptr, guard.size));
                        core::mem::forget(guard);
                        continue;
                    }
                }
            }

            if let Some(ptr) = guard.payload {
                if now > guard.expires_at {
                    unsafe { host.free(ptr, guard.size) };
                    guard.payload = None;
                    guard.size = 0;
                }
            }
            // guard drops here, releasing the slot's lock.
        }

        if let Some((idx, ptr, size)) = candidate {
            return Some(Allocation::Slot(SlotGuard {
                pool: self,
                host,
                idx,
                ptr,
                size,
            }));
        }

        for (i, slot) in self.slots.iter().enumerate() {
            let mut guard = match slot.mutex.try_lock() {
                Some(g) => g,
                None => continue,
            };
            if guard.payload.is_none() {
                if let Some(ptr) = host.alloc_sleep(size) {
                    guard.payload = Some(ptr);
                    guard.size = size;
                    guard.expires_at = now + POOL_TIMEOUT_SECS;
                    core::mem::forget(guard);
                    return Some(Allocation::Slot(SlotGuard {
                        pool: self,
                        host,
                        idx: i,
                        ptr,
                        size,
                    }));
                }
            }
            // guard drops here, releasing the slot's lock.
        }

        host.alloc_nosleep(size).map(|ptr| Allocation::Default(ptr, size))
    }

    /// Quiesces every slot (blocking acquire/release) and frees any resident
    /// payload. Called once at teardown.
    pub fn drain<H: Host>(&self, host: &H) {
        for slot in self.slots.iter() {
            let mut guard = slot.mutex.lock();
            if let Some(ptr) = guard.payload.take() {
                unsafe { host.free(ptr, guard.size) };
            }
        }
    }
}

/// RAII handle for a checked-out pool slot. See the module docs for why this
/// is routinely forgotten and reconstructed rather than held end-to-end.
pub(crate) struct SlotGuard<'a, H: Host> {
    pool: &'a Pool,
    host: &'a H,
    idx: usize,
    ptr: NonNull<u8>,
    size: usize,
}

impl<'a, H: Host> SlotGuard<'a, H> {
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn slot_index(&self) -> usize {
        self.idx
    }

    /// Reconstructs the guard for a slot that is already checked out, using
    /// only the slot index recorded in its allocation header.
    ///
    /// # Safety
    /// `idx` must name a slot currently locked by a `SlotGuard` that was
    /// forgotten rather than dropped (i.e. one produced by `Pool::alloc` and
    /// not yet released). Calling this for any other slot is a data race.
    pub unsafe fn from_checked_out(pool: &'a Pool, host: &'a H, idx: usize) -> Self {
        let state = &*pool.slots[idx].mutex.data_ptr();
        SlotGuard {
            pool,
            host,
            idx,
            ptr: state.payload.expect("checked-out slot must have a payload"),
            size: state.size,
        }
    }
}

impl<'a, H: Host> Drop for SlotGuard<'a, H> {
    fn drop(&mut self) {
        unsafe {
            let state = &mut *self.pool.slots[self.idx].mutex.data_ptr();
            state.expires_at = self.host.now_secs() + POOL_TIMEOUT_SECS;
            self.pool.slots[self.idx].mutex.force_unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SystemHost;

    fn checkout_then_release(pool: &Pool, host: &SystemHost, size: usize) -> NonNull<u8> {
        match pool.alloc(host, size).expect("allocation should succeed") {
            Allocation::Slot(guard) => {
                let ptr = guard.ptr();
                let idx = guard.slot_index();
                core::mem::forget(guard);
                drop(unsafe { SlotGuard::from_checked_out(pool, host, idx) });
                ptr
            }
            Allocation::Default(ptr, _) => ptr,
        }
    }

    #[test]
    fn reuse_pass_returns_the_same_payload_pointer() {
        let host = SystemHost::new();
        let pool = Pool::new(4);
        let first = checkout_then_release(&pool, &host, 256);
        let second = checkout_then_release(&pool, &host, 256);
        assert_eq!(first, second);
    }

    #[test]
    fn fresh_pass_hands_out_distinct_slots_under_concurrent_checkout() {
        let host = SystemHost::new();
        let pool = Pool::new(4);
        let first = pool.alloc(&host, 64).expect("slot 1");
        let second = pool.alloc(&host, 64).expect("slot 2");
        match (&first, &second) {
            (Allocation::Slot(a), Allocation::Slot(b)) => {
                assert_ne!(a.slot_index(), b.slot_index());
            }
            _ => panic!("expected both checkouts to land in pool slots"),
        }
        drop(first);
        drop(second);
    }

    #[test]
    fn eviction_replaces_a_too_small_slot_after_timeout() {
        let host = SystemHost::new();
        let pool = Pool::new(4);
        let first = checkout_then_release(&pool, &host, 64);

        // Simulate the slot having gone stale by forcing its expiry into the
        // past, then requesting a larger size than it holds.
        {
            let guard = pool.slots[0].mutex.data_ptr();
            unsafe { (*guard).expires_at = 0 };
        }

        let second = match pool.alloc(&host, 4096).expect("fresh allocation") {
            Allocation::Slot(guard) => {
                assert_eq!(guard.size(), 4096);
                let ptr = guard.ptr();
                drop(guard);
                ptr
            }
            Allocation::Default(ptr, _) => ptr,
        };
        assert_ne!(first, second);

        pool.drain(&host);
    }

    #[test]
    fn drain_frees_every_resident_payload() {
        let host = SystemHost::new();
        let pool = Pool::new(2);
        let _ = checkout_then_release(&pool, &host, 128);
        pool.drain(&host);
    }
}
