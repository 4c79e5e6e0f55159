//! # zstd-block-adapter
//!
//! A ZSTD compression adapter for a copy-on-write filesystem's block I/O
//! path: a stable 8-byte on-disk block header, a bounded pool of reusable
//! codec scratch buffers, a fallback arena guaranteeing decompression can
//! always make progress, and a bijective mapping between a stable level
//! enum and the codec's signed level "cookies".
//!
//! The public surface lives on [`Adapter`]; [`adapter::global`] offers a
//! thin process-wide compatibility shim for callers that would rather not
//! thread an `Adapter` through.

/// Host facilities the adapter borrows from its environment: allocator,
/// clock, CPU count. See [`host::Host`] for the trait and `SystemHost`/
/// `FailingHost` for the shipped implementations.
pub mod host;

/// The stable level enum and its bidirectional mapping to the codec's
/// signed level cookie.
pub mod level;

/// The record stamped in front of every buffer handed to the codec.
mod alloc_header;

/// The bounded pool of reusable compression/decompression scratch buffers.
mod pool;

/// The single-slot fallback arena guaranteeing decompression progress.
mod fallback_arena;

/// Unsafe bindings to the codec's advanced, custom-allocator API.
mod zstd_ffi;

/// `ZSTD_customMem` shims threading codec allocations through the pool.
mod alloc_adapter;

/// The public framed codec: header layout, compress/decompress/peek.
pub mod codec;

/// The owned lifecycle context and its global compatibility shim.
pub mod adapter;

pub use adapter::Adapter;
pub use codec::{BlockHeader, DecompressError, PeekLevelError, HEADER_LEN};
pub use host::{FailingHost, Host, SystemHost};
pub use level::{cookie_to_enum, enum_to_cookie, Level, ALL_LEVELS, COMPLEVEL_DEFAULT};
