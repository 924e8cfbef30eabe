//! The host virtual-memory collaborator.
//!
//! [`HostMemory`] is the seam between the arena and the operating system.
//! [`NativeHost`] forwards to `mmap`/`mprotect`/`munmap` or
//! `VirtualAlloc`/`VirtualProtect`/`VirtualFree`; [`SimulatedHost`] keeps
//! mappings on the heap and checks accesses against their recorded
//! protection, so protection behavior can be tested without faulting.

mod simulated;

pub use simulated::{Access, AccessDenied, HostCounters, SimulatedHost};

use crate::access::Protection;
use crate::syscall;
use std::io;
use std::ptr::NonNull;

/// Host memory-mapping primitives consumed by the arena.
pub trait HostMemory {
    /// The host page size in bytes.
    fn page_size(&self) -> usize;

    /// The minimum size and alignment of an independent mapping.
    fn granularity(&self) -> usize;

    /// Reserves and commits `len` bytes with `protection`.
    ///
    /// # Errors
    /// Returns the OS error if the host cannot satisfy the reservation.
    fn map(&mut self, len: usize, protection: Protection) -> io::Result<NonNull<u8>>;

    /// Changes the protection of the `len` bytes mapped at `base`.
    ///
    /// # Errors
    /// Returns the OS error if the host refuses the change.
    ///
    /// # Safety
    /// `base..base + len` must lie within a mapping returned by [`map`](Self::map)
    /// that has not been unmapped. Any live reference into the range must
    /// remain valid under the new protection.
    unsafe fn protect(&mut self, base: NonNull<u8>, len: usize, protection: Protection) -> io::Result<()>;

    /// Releases the mapping at `base`.
    ///
    /// # Safety
    /// `base` and `len` must describe exactly one mapping returned by
    /// [`map`](Self::map), and nothing may access it afterwards.
    unsafe fn unmap(&mut self, base: NonNull<u8>, len: usize);
}

/// The operating system's memory mapper.
#[derive(Clone, Copy, Debug)]
pub struct NativeHost {
    page_size: usize,
    granularity: usize,
}

impl NativeHost {
    /// Queries the page size and allocation granularity once.
    pub fn new() -> Self {
        let page_size = syscall::page_size();
        let granularity = syscall::allocation_granularity();
        trace_event!(page_size, granularity, "native host memory queried");
        Self { page_size, granularity }
    }
}

impl Default for NativeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMemory for NativeHost {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn granularity(&self) -> usize {
        self.granularity
    }

    fn map(&mut self, len: usize, protection: Protection) -> io::Result<NonNull<u8>> {
        if len == 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        unsafe { syscall::map_region(len, protection) }
    }

    unsafe fn protect(&mut self, base: NonNull<u8>, len: usize, protection: Protection) -> io::Result<()> {
        syscall::protect_region(base, len, protection)
    }

    unsafe fn unmap(&mut self, base: NonNull<u8>, len: usize) {
        syscall::free_region(base, len);
    }
}
