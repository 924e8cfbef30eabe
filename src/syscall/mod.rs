//! Raw host virtual-memory primitives.
//!
//! Each platform module exposes the same free functions;
//! [`NativeHost`](crate::host::NativeHost) wraps them behind the
//! [`HostMemory`](crate::host::HostMemory) trait.

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use unix::*;

#[cfg(windows)]
pub use windows::*;
