//! The public framed codec: on-disk header layout, size checks, and the
//! "incompressible → return source length" contract. Grounded in
//! `zstd_compress`/`zstd_decompress_level`/`zstd_get_level`.

use crate::alloc_adapter::{CompressionAllocator, DecompressionAllocator};
use crate::host::Host;
use crate::level::Level;
use crate::pool::Pool;
use crate::{fallback_arena::FallbackArena, zstd_ffi};
use static_assertions::const_assert_eq;
use thiserror_no_std::Error;

/// Fixed width of the on-disk block header.
pub const HEADER_LEN: usize = 8;

/// The 8-byte big-endian header prepended to every compressed block:
/// `c_len` (length of the codec payload that follows) and `level_cookie`
/// (the codec's signed level at which the block was produced, stored raw so
/// the level enum may evolve without breaking old blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub c_len: u32,
    pub level_cookie: i32,
}

const_assert_eq!(HEADER_LEN, 8);

impl BlockHeader {
    pub fn encode(&self, dst: &mut [u8]) {
        dst[0..4].copy_from_slice(&self.c_len.to_be_bytes());
        dst[4..8].copy_from_slice(&self.level_cookie.to_be_bytes());
    }

    pub fn decode(src: &[u8]) -> Self {
        let c_len = u32::from_be_bytes(src[0..4].try_into().unwrap());
        let level_cookie = i32::from_be_bytes(src[4..8].try_into().unwrap());
        Self { c_len, level_cookie }
    }
}

/// Failure modes on the decompression path. All variants are treated
/// identically by the dispatcher (the block is lost); the structure exists
/// for diagnostics and testing, not differentiated recovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompressError {
    /// `c_len + HEADER_LEN` would exceed the source length.
    #[error("corrupt header: stored length does not fit the source buffer")]
    CorruptHeader,
    /// The codec itself reported an error after decompression.
    #[error("zstd decompression failed")]
    Codec(zstd_sys::ZSTD_ErrorCode),
    /// Could not obtain a decompression context even from the fallback
    /// arena. In practice this only happens if the arena was never
    /// preallocated, i.e. module misconfiguration.
    #[error("could not obtain a decompression context, even from the fallback arena")]
    FatalMemory,
}

/// Failure mode for [`peek_level`]: the source is too short to contain a
/// header at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PeekLevelError {
    #[error("source too short to contain a block header")]
    TooShort,
}

/// Compresses `src` into `dst` at `level`, returning the number of bytes
/// written. This path is infallible: on any internal failure (allocation
/// failure, codec error) it returns `src.len()`, signalling to the caller
/// that the block should be stored uncompressed. A return value `>= src.len()`
/// always means "incompressible"; any smaller value is a genuine compressed
/// block with its header already written.
///
/// # Panics
/// Panics (via `debug_assert!`) in debug builds if `dst.len() < HEADER_LEN`
/// or `dst.len() > src.len()`, both of which are caller preconditions.
pub(crate) fn compress<H: Host>(pool: &Pool, host: &H, src: &[u8], dst: &mut [u8], level: Level) -> usize {
    debug_assert!(dst.len() >= HEADER_LEN);
    debug_assert!(dst.len() <= src.len());

    let cookie = level.to_cookie();
    let allocator = CompressionAllocator::new(pool, host);

    let cctx = match unsafe { zstd_ffi::create_cctx(allocator.custom_mem()) } {
        Some(cctx) => cctx,
        None => return src.len(),
    };

    let result = unsafe { zstd_ffi::compress_cctx(cctx, &mut dst[HEADER_LEN..], src, cookie) };
    unsafe { zstd_ffi::free_cctx(cctx) };

    let c_len = match result {
        Ok(n) => n,
        Err(_) => return src.len(),
    };

    BlockHeader {
        c_len: c_len as u32,
        level_cookie: cookie,
    }
    .encode(dst);
    c_len + HEADER_LEN
}

/// Decompresses a block produced by [`compress`], discarding the level it
/// was produced at. Delegates to [`decompress_level`], matching the
/// original's own `zstd_decompress` → `zstd_decompress_level` relationship.
pub(crate) fn decompress<H: Host>(
    pool: &Pool,
    arena: &FallbackArena,
    host: &H,
    src: &[u8],
    dst: &mut [u8],
) -> Result<(), DecompressError> {
    decompress_level(pool, arena, host, src, dst).map(|_| ())
}

/// Decompresses a block produced by [`compress`] and also reports the level
/// it was produced at (translated through the level map).
pub(crate) fn decompress_level<H: Host>(
    pool: &Pool,
    arena: &FallbackArena,
    host: &H,
    src: &[u8],
    dst: &mut [u8],
) -> Result<Level, DecompressError> {
    debug_assert!(dst.len() >= src.len());

    if src.len() < HEADER_LEN {
        return Err(DecompressError::CorruptHeader);
    }
    let header = BlockHeader::decode(src);
    let level = Level::from_cookie(header.level_cookie);

    if header.c_len as usize + HEADER_LEN > src.len() {
        return Err(DecompressError::CorruptHeader);
    }

    let allocator = DecompressionAllocator::new(pool, arena, host);
    let dctx = match unsafe { zstd_ffi::create_dctx(allocator.custom_mem()) } {
        Some(dctx) => dctx,
        None => return Err(DecompressError::FatalMemory),
    };

    let payload = &src[HEADER_LEN..HEADER_LEN + header.c_len as usize];
    let result = unsafe { zstd_ffi::decompress_dctx(dctx, dst, payload) };
    unsafe { zstd_ffi::free_dctx(dctx) };

    result.map(|_| level).map_err(DecompressError::Codec)
}

/// Reads the level a block was compressed at without touching its payload.
pub fn peek_level(src: &[u8]) -> Result<Level, PeekLevelError> {
    if src.len() < HEADER_LEN {
        return Err(PeekLevelError::TooShort);
    }
    let header = BlockHeader::decode(src);
    Ok(Level::from_cookie(header.level_cookie))
}
