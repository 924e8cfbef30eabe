//! `VirtualAlloc`/`VirtualProtect`/`VirtualFree` wrappers.

#![cfg(windows)]

use crate::access::Protection;
use std::io;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE,
    PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_NOACCESS, PAGE_PROTECTION_FLAGS, PAGE_READONLY,
    PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

fn native_protection(protection: Protection) -> PAGE_PROTECTION_FLAGS {
    match protection {
        Protection::NoAccess => PAGE_NOACCESS,
        Protection::ReadOnly => PAGE_READONLY,
        Protection::ReadWrite => PAGE_READWRITE,
        Protection::Execute => PAGE_EXECUTE,
        Protection::ReadExecute => PAGE_EXECUTE_READ,
        Protection::ReadWriteExecute => PAGE_EXECUTE_READWRITE,
    }
}

fn system_info() -> SYSTEM_INFO {
    let mut info = MaybeUninit::<SYSTEM_INFO>::zeroed();
    unsafe {
        GetSystemInfo(info.as_mut_ptr());
        info.assume_init()
    }
}

/// Returns the host page size.
pub fn page_size() -> usize {
    system_info().dwPageSize as usize
}

/// Returns the granularity at which `VirtualAlloc` places reservations
/// (64 KiB on every current Windows target).
pub fn allocation_granularity() -> usize {
    system_info().dwAllocationGranularity as usize
}

/// Reserves and commits `size` bytes with `protection`.
///
/// # Safety
/// The caller owns the returned mapping and must release it with
/// [`free_region`].
pub unsafe fn map_region(size: usize, protection: Protection) -> io::Result<NonNull<u8>> {
    let ptr = VirtualAlloc(
        ptr::null(),
        size,
        MEM_COMMIT | MEM_RESERVE,
        native_protection(protection),
    );
    NonNull::new(ptr.cast::<u8>()).ok_or_else(io::Error::last_os_error)
}

/// Changes the protection of `size` bytes at `ptr`.
///
/// # Safety
/// The range must lie within a live mapping from [`map_region`].
pub unsafe fn protect_region(ptr: NonNull<u8>, size: usize, protection: Protection) -> io::Result<()> {
    let mut old_prot = 0;
    if VirtualProtect(ptr.as_ptr().cast(), size, native_protection(protection), &mut old_prot) != 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Releases a reservation made by [`map_region`].
///
/// # Safety
/// Nothing may access the reservation afterwards.
pub unsafe fn free_region(ptr: NonNull<u8>, _size: usize) {
    // MEM_RELEASE frees the entire reservation. Size must be 0.
    VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE);
}
