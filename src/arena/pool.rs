//! Per-slot allocation pools.

use crate::access::{Protection, SlotIndex};
use crate::engine::{FreeListEngine, RegionHandle};
use std::ptr::NonNull;

/// The allocation pool of one slot: a single engine instance plus the
/// handles of the regions it was given.
pub struct ProtectedPool<E> {
    slot: SlotIndex,
    protection: Protection,
    engine: E,
    regions: Vec<RegionHandle>,
    live: usize,
}

impl<E: FreeListEngine> ProtectedPool<E> {
    pub(crate) fn new(slot: SlotIndex, protection: Protection) -> Self {
        Self {
            slot,
            protection,
            engine: E::create(),
            regions: Vec::new(),
            live: 0,
        }
    }

    /// # Safety
    /// See [`FreeListEngine::add_region`].
    pub(crate) unsafe fn adopt(&mut self, base: NonNull<u8>, len: usize) -> RegionHandle {
        let handle = self.engine.add_region(base, len);
        self.regions.push(handle);
        handle
    }

    pub(crate) fn carve(&mut self, size: usize) -> Option<NonNull<u8>> {
        let ptr = self.engine.allocate(size)?;
        self.live += 1;
        Some(ptr)
    }

    /// # Safety
    /// See [`FreeListEngine::release`].
    pub(crate) unsafe fn release(&mut self, ptr: NonNull<u8>) {
        self.engine.release(ptr);
        self.live -= 1;
    }

    pub(crate) fn retire(&mut self, handle: RegionHandle) {
        self.engine.retire_region(handle);
        self.regions.retain(|&h| h != handle);
    }

    /// Slot this pool serves.
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// Protection its regions carry while enforcement is active.
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// The engine instance.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Number of regions backing the pool.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Blocks carved and not yet released.
    pub fn live_blocks(&self) -> usize {
        self.live
    }
}
