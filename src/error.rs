//! Error types for arena operations.

use crate::access::{AccessClass, Protection};
use std::io;

/// Errors returned by [`ProtectedArena`](crate::ProtectedArena) operations.
///
/// Only recoverable conditions are returned. Freeing into a slot that never
/// had a pool, and a failed protection change during a sweep, are invariant
/// violations and panic instead; [`ArenaError::ProtectionChange`] exists to
/// format that panic.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// The arena has not been initialized, or has been torn down.
    #[error("arena is not initialized")]
    NotInitialized,

    /// The access class is not one of the recognized combinations.
    #[error("unrecognized access class {0:?}")]
    UnknownAccessClass(AccessClass),

    /// Attempted to allocate a zero-sized block.
    #[error("cannot allocate zero-sized block")]
    ZeroSized,

    /// The backing region needed for the request does not fit in `usize`.
    #[error("request of {requested} bytes overflows region sizing")]
    RequestTooLarge {
        /// Requested block size.
        requested: usize,
    },

    /// The host could not map a new backing region.
    #[error("host failed to map {bytes} bytes")]
    MappingFailed {
        /// Size of the region that was requested from the host.
        bytes: usize,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The engine still could not carve the block after the pool grew once.
    #[error("pool exhausted: {requested} bytes unavailable after growth")]
    ExhaustedAfterGrowth {
        /// Requested block size.
        requested: usize,
    },

    /// The host refused to change a region's protection.
    #[error("failed to set {protection} on region {base:#x}+{len:#x}")]
    ProtectionChange {
        /// Region base address.
        base: usize,
        /// Region length in bytes.
        len: usize,
        /// Protection that was being applied.
        protection: Protection,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid arena configuration: {0}")]
    InvalidConfig(String),

    /// The configuration document could not be parsed.
    #[error("failed to parse arena configuration")]
    Config(#[from] serde_json::Error),
}
