//! Thin unsafe wrappers over the advanced, custom-allocator ZSTD API.
//!
//! Only the documented extension point is touched: context creation with a
//! `ZSTD_customMem`, bounded one-shot compress/decompress, context teardown,
//! and the decompression-context size estimate used to size the fallback
//! arena. No private codec internals are used.

use core::ffi::c_void;
use core::ptr::NonNull;
use zstd_sys::{
    ZSTD_compressCCtx, ZSTD_createCCtx_advanced, ZSTD_createDCtx_advanced, ZSTD_customMem,
    ZSTD_decompressDCtx, ZSTD_estimateDCtxSize, ZSTD_freeCCtx, ZSTD_freeDCtx, ZSTD_getErrorCode,
    ZSTD_isError, ZSTD_CCtx, ZSTD_DCtx, ZSTD_ErrorCode,
};

/// Creates a compression context using `custom_mem` for every internal
/// allocation. `None` means the allocator (ultimately the pool) returned
/// null for one of the context's internal allocations.
///
/// # Safety
/// `custom_mem`'s function pointers must remain valid, and its `opaque`
/// pointer must remain valid, for as long as the returned context exists.
pub(crate) unsafe fn create_cctx(custom_mem: ZSTD_customMem) -> Option<NonNull<ZSTD_CCtx>> {
    NonNull::new(ZSTD_createCCtx_advanced(custom_mem))
}

/// # Safety
/// `cctx` must have been created by [`create_cctx`] and not freed yet.
pub(crate) unsafe fn free_cctx(cctx: NonNull<ZSTD_CCtx>) {
    ZSTD_freeCCtx(cctx.as_ptr());
}

/// Compresses `src` into `dst` at `cookie`, returning the written length or
/// the codec's error code.
///
/// # Safety
/// `cctx` must be a live context from [`create_cctx`].
pub(crate) unsafe fn compress_cctx(
    cctx: NonNull<ZSTD_CCtx>,
    dst: &mut [u8],
    src: &[u8],
    cookie: i32,
) -> Result<usize, ZSTD_ErrorCode> {
    let written = ZSTD_compressCCtx(
        cctx.as_ptr(),
        dst.as_mut_ptr() as *mut c_void,
        dst.len(),
        src.as_ptr() as *const c_void,
        src.len(),
        cookie,
    );
    if ZSTD_isError(written) != 0 {
        Err(ZSTD_getErrorCode(written))
    } else {
        Ok(written)
    }
}

/// # Safety
/// Same requirement as [`create_cctx`], for a decompression context.
pub(crate) unsafe fn create_dctx(custom_mem: ZSTD_customMem) -> Option<NonNull<ZSTD_DCtx>> {
    NonNull::new(ZSTD_createDCtx_advanced(custom_mem))
}

/// # Safety
/// `dctx` must have been created by [`create_dctx`] and not freed yet.
pub(crate) unsafe fn free_dctx(dctx: NonNull<ZSTD_DCtx>) {
    ZSTD_freeDCtx(dctx.as_ptr());
}

/// Decompresses `src` into `dst`, returning the written length or the
/// codec's error code.
///
/// # Safety
/// `dctx` must be a live context from [`create_dctx`].
pub(crate) unsafe fn decompress_dctx(
    dctx: NonNull<ZSTD_DCtx>,
    dst: &mut [u8],
    src: &[u8],
) -> Result<usize, ZSTD_ErrorCode> {
    let written = ZSTD_decompressDCtx(
        dctx.as_ptr(),
        dst.as_mut_ptr() as *mut c_void,
        dst.len(),
        src.as_ptr() as *const c_void,
        src.len(),
    );
    if ZSTD_isError(written) != 0 {
        Err(ZSTD_getErrorCode(written))
    } else {
        Ok(written)
    }
}

/// Self-reported size of a decompression context, used to size the fallback
/// arena at init.
pub(crate) fn estimate_dctx_size() -> usize {
    unsafe { ZSTD_estimateDCtxSize() }
}
