//! Record of every backing region the arena has mapped.

use crate::access::{Protection, SlotIndex};
use crate::engine::RegionHandle;
use std::ptr::NonNull;

/// One host mapping owned by a pool.
///
/// `protection` is the protection the region carries while enforcement is
/// active. It is fixed when the region is mapped, whatever protection the
/// region was actually mapped with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    base: NonNull<u8>,
    len: usize,
    protection: Protection,
    slot: SlotIndex,
    handle: RegionHandle,
}

impl Region {
    pub(crate) fn new(
        base: NonNull<u8>,
        len: usize,
        protection: Protection,
        slot: SlotIndex,
        handle: RegionHandle,
    ) -> Self {
        Self { base, len, protection, slot, handle }
    }

    /// First byte of the mapping.
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Length of the mapping in bytes.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Protection applied while enforcement is active.
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Slot of the owning pool.
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// Handle of the region within the owning pool's engine.
    pub fn handle(&self) -> RegionHandle {
        self.handle
    }

    /// Whether `ptr` lies inside the region.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.base.as_ptr() as usize;
        (start..start + self.len).contains(&(ptr as usize))
    }
}

/// Ordered list of registered regions.
#[derive(Debug, Default)]
pub(crate) struct RegionRegistry {
    regions: Vec<Region>,
}

impl RegionRegistry {
    pub(crate) fn register(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub(crate) fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Removes every region, most recently registered first.
    pub(crate) fn drain_newest_first(&mut self) -> impl Iterator<Item = Region> + '_ {
        self.regions.drain(..).rev()
    }

    pub(crate) fn len(&self) -> usize {
        self.regions.len()
    }

    pub(crate) fn mapped_bytes(&self) -> usize {
        self.regions.iter().map(Region::size).sum()
    }
}
