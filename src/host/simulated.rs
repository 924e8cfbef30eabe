//! A heap-backed stand-in for the host memory mapper.

use super::HostMemory;
use crate::access::Protection;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::BTreeMap;
use std::io;
use std::ptr::NonNull;

/// A kind of memory access checked by [`SimulatedHost::check_access`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// A load.
    Read,
    /// A store.
    Write,
    /// An instruction fetch.
    Execute,
}

/// An access the simulated host would have faulted on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{access:?} access at {addr:#x} denied (protection: {protection:?})")]
pub struct AccessDenied {
    /// First faulting address.
    pub addr: usize,
    /// The attempted access.
    pub access: Access,
    /// Protection of the mapping at `addr`, `None` if nothing is mapped there.
    pub protection: Option<Protection>,
}

/// Calls made against a [`SimulatedHost`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HostCounters {
    /// Successful `map` calls.
    pub maps: usize,
    /// Successful `protect` calls.
    pub protects: usize,
    /// `unmap` calls.
    pub unmaps: usize,
}

struct Mapping {
    layout: Layout,
    protection: Protection,
}

/// A simulated host.
///
/// Mappings are zeroed heap allocations aligned to the granularity; each
/// remembers the protection it was last given. Failures can be injected
/// with [`fail_maps_after`](Self::fail_maps_after) and
/// [`fail_protect`](Self::fail_protect).
pub struct SimulatedHost {
    page_size: usize,
    granularity: usize,
    mappings: BTreeMap<usize, Mapping>,
    maps_remaining: Option<usize>,
    fail_protect: bool,
    counters: HostCounters,
}

impl SimulatedHost {
    /// A host with 4 KiB pages and 4 KiB granularity.
    pub fn new() -> Self {
        Self::with_geometry(4096, 4096)
    }

    /// A host with the given page size and allocation granularity.
    ///
    /// # Panics
    /// Panics unless both are powers of two and `granularity` is a multiple
    /// of `page_size`.
    pub fn with_geometry(page_size: usize, granularity: usize) -> Self {
        assert!(page_size.is_power_of_two() && granularity.is_power_of_two());
        assert_eq!(granularity % page_size, 0, "granularity must be a page multiple");
        Self {
            page_size,
            granularity,
            mappings: BTreeMap::new(),
            maps_remaining: None,
            fail_protect: false,
            counters: HostCounters::default(),
        }
    }

    /// Lets `count` more `map` calls succeed; every later call fails.
    pub fn fail_maps_after(&mut self, count: usize) {
        self.maps_remaining = Some(count);
    }

    /// Makes every `protect` call fail (or succeed again).
    pub fn fail_protect(&mut self, fail: bool) {
        self.fail_protect = fail;
    }

    /// Calls made so far.
    pub fn counters(&self) -> HostCounters {
        self.counters
    }

    /// Number of live mappings.
    pub fn live_mappings(&self) -> usize {
        self.mappings.len()
    }

    /// Total bytes currently mapped.
    pub fn mapped_bytes(&self) -> usize {
        self.mappings.values().map(|m| m.layout.size()).sum()
    }

    /// Current protection of the mapping containing `ptr`.
    pub fn protection_of(&self, ptr: *const u8) -> Option<Protection> {
        self.find(ptr as usize).map(|(_, m)| m.protection)
    }

    /// Checks whether `len` bytes at `ptr` could be accessed as `access`.
    ///
    /// # Errors
    /// Returns [`AccessDenied`] if any byte is unmapped or its mapping's
    /// protection disallows `access`.
    pub fn check_access(&self, ptr: *const u8, len: usize, access: Access) -> Result<(), AccessDenied> {
        let addr = ptr as usize;
        let denied = |protection| AccessDenied { addr, access, protection };

        let Some((start, mapping)) = self.find(addr) else {
            return Err(denied(None));
        };
        let end = start + mapping.layout.size();
        if addr.saturating_add(len) > end {
            return Err(AccessDenied { addr: end, access, protection: None });
        }

        let protection = mapping.protection;
        let allowed = match access {
            Access::Read => protection.allows_read(),
            Access::Write => protection.allows_write(),
            Access::Execute => protection.allows_execute(),
        };
        if allowed {
            Ok(())
        } else {
            Err(denied(Some(protection)))
        }
    }

    /// Stores `value` into `len` bytes at `ptr` if the mapping allows writes.
    ///
    /// # Errors
    /// Returns [`AccessDenied`] where the native host would have faulted;
    /// nothing is written in that case.
    pub fn fill(&self, ptr: *mut u8, value: u8, len: usize) -> Result<(), AccessDenied> {
        self.check_access(ptr, len, Access::Write)?;
        // SAFETY: the whole range lies inside a live heap allocation owned by `self`.
        unsafe { ptr.write_bytes(value, len) };
        Ok(())
    }

    /// Loads `len` bytes at `ptr` if the mapping allows reads.
    ///
    /// # Errors
    /// Returns [`AccessDenied`] where the native host would have faulted.
    pub fn read(&self, ptr: *const u8, len: usize) -> Result<Vec<u8>, AccessDenied> {
        self.check_access(ptr, len, Access::Read)?;
        // SAFETY: the whole range lies inside a live heap allocation owned by `self`.
        Ok(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
    }

    fn find(&self, addr: usize) -> Option<(usize, &Mapping)> {
        let (&start, mapping) = self.mappings.range(..=addr).next_back()?;
        (addr < start + mapping.layout.size()).then_some((start, mapping))
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMemory for SimulatedHost {
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
        if let Some(remaining) = self.maps_remaining.as_mut() {
            if *remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::OutOfMemory, "simulated mapping failure"));
            }
            *remaining -= 1;
        }

        let layout = Layout::from_size_align(len, self.granularity)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: `len` is non-zero.
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })
            .ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))?;

        self.mappings.insert(ptr.as_ptr() as usize, Mapping { layout, protection });
        self.counters.maps += 1;
        Ok(ptr)
    }

    unsafe fn protect(&mut self, base: NonNull<u8>, len: usize, protection: Protection) -> io::Result<()> {
        if self.fail_protect {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "simulated protection failure"));
        }
        let mapping = self
            .mappings
            .get_mut(&(base.as_ptr() as usize))
            .filter(|m| len <= m.layout.size())
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
        mapping.protection = protection;
        self.counters.protects += 1;
        Ok(())
    }

    unsafe fn unmap(&mut self, base: NonNull<u8>, _len: usize) {
        self.counters.unmaps += 1;
        if let Some(mapping) = self.mappings.remove(&(base.as_ptr() as usize)) {
            dealloc(base.as_ptr(), mapping.layout);
        }
    }
}

impl Drop for SimulatedHost {
    fn drop(&mut self) {
        for (addr, mapping) in std::mem::take(&mut self.mappings) {
            // SAFETY: every entry was produced by `alloc_zeroed` with this layout.
            unsafe { dealloc(addr as *mut u8, mapping.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_is_enforced() {
        let mut host = SimulatedHost::new();
        let base = host.map(4096, Protection::ReadWrite).unwrap();
        assert!(host.fill(base.as_ptr(), 1, 4096).is_ok());

        unsafe { host.protect(base, 4096, Protection::Execute).unwrap() };
        let err = host.fill(base.as_ptr(), 1, 1).unwrap_err();
        assert_eq!(err.protection, Some(Protection::Execute));
        assert!(host.read(base.as_ptr(), 1).is_err());
        assert!(host.check_access(base.as_ptr(), 16, Access::Execute).is_ok());
    }

    #[test]
    fn test_out_of_bounds_is_denied() {
        let mut host = SimulatedHost::new();
        let base = host.map(4096, Protection::ReadWrite).unwrap();
        let err = host.fill(base.as_ptr(), 0, 4097).unwrap_err();
        assert_eq!(err.protection, None);
    }

    #[test]
    fn test_map_budget() {
        let mut host = SimulatedHost::new();
        host.fail_maps_after(1);
        assert!(host.map(4096, Protection::ReadOnly).is_ok());
        let err = host.map(4096, Protection::ReadOnly).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
        assert_eq!(host.counters().maps, 1);
    }

    #[test]
    fn test_unmap_releases() {
        let mut host = SimulatedHost::new();
        let base = host.map(8192, Protection::ReadOnly).unwrap();
        assert_eq!(host.mapped_bytes(), 8192);
        unsafe { host.unmap(base, 8192) };
        assert_eq!(host.live_mappings(), 0);
        assert_eq!(host.protection_of(base.as_ptr()), None);
    }
}
