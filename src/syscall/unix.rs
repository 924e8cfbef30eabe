//! `mmap`/`mprotect`/`munmap` wrappers.

#![cfg(unix)]

use crate::access::Protection;
use libc::{
    c_void, mmap, mprotect, munmap, sysconf, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_EXEC,
    PROT_NONE, PROT_READ, PROT_WRITE, _SC_PAGESIZE,
};
use std::io;
use std::ptr::{self, NonNull};

fn native_protection(protection: Protection) -> libc::c_int {
    match protection {
        Protection::NoAccess => PROT_NONE,
        Protection::ReadOnly => PROT_READ,
        Protection::ReadWrite => PROT_READ | PROT_WRITE,
        Protection::Execute => PROT_EXEC,
        Protection::ReadExecute => PROT_READ | PROT_EXEC,
        Protection::ReadWriteExecute => PROT_READ | PROT_WRITE | PROT_EXEC,
    }
}

/// Returns the host page size.
pub fn page_size() -> usize {
    let size = unsafe { sysconf(_SC_PAGESIZE) };
    usize::try_from(size).unwrap_or(4096)
}

/// Independent mappings on unix are page aligned, so the allocation
/// granularity is the page size.
pub fn allocation_granularity() -> usize {
    page_size()
}

/// Maps `size` bytes of anonymous private memory with `protection`.
///
/// # Safety
/// The caller owns the returned mapping and must release it with
/// [`free_region`].
pub unsafe fn map_region(size: usize, protection: Protection) -> io::Result<NonNull<u8>> {
    let ptr = mmap(
        ptr::null_mut(),
        size,
        native_protection(protection),
        MAP_PRIVATE | MAP_ANON,
        -1,
        0,
    );

    if ptr == MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
}

/// Changes the protection of `size` bytes at `ptr`.
///
/// # Safety
/// The range must lie within a live mapping from [`map_region`].
pub unsafe fn protect_region(ptr: NonNull<u8>, size: usize, protection: Protection) -> io::Result<()> {
    if mprotect(ptr.as_ptr().cast::<c_void>(), size, native_protection(protection)) == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Releases a mapping made by [`map_region`].
///
/// # Safety
/// Nothing may access the mapping afterwards.
pub unsafe fn free_region(ptr: NonNull<u8>, size: usize) {
    munmap(ptr.as_ptr().cast::<c_void>(), size);
}
