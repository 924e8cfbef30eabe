//! The free-list engine collaborator.
//!
//! A pool hands its backing regions to one engine instance and asks it to
//! carve and release blocks. The engine decides placement; the pool decides
//! when to map more memory.

mod segregated;

pub use segregated::SegregatedFit;

use std::ptr::NonNull;

/// Identifies a region previously added to an engine instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegionHandle(pub(crate) usize);

/// A free-list allocator that manages blocks inside caller-supplied regions.
///
/// One instance is created per pool and destroyed (dropped) once. An engine
/// must not assume it can touch region memory at any time: the arena may
/// have revoked read or write access to every region.
pub trait FreeListEngine: Sized {
    /// Fixed per-instance metadata overhead in bytes.
    const CONTROL_OVERHEAD: usize;
    /// Metadata overhead per added region in bytes.
    const REGION_OVERHEAD: usize;
    /// Worst-case overhead per allocated block in bytes.
    const BLOCK_OVERHEAD: usize;

    /// Creates an empty instance.
    fn create() -> Self;

    /// Adds `len` bytes at `base` to the instance.
    ///
    /// # Safety
    /// The range must stay mapped until [`retire_region`](Self::retire_region)
    /// is called for the returned handle or the instance is dropped, and must
    /// not overlap any other region of the instance.
    unsafe fn add_region(&mut self, base: NonNull<u8>, len: usize) -> RegionHandle;

    /// Forgets a region so that nothing refers to it once it is unmapped.
    /// Blocks still live in the region are abandoned.
    fn retire_region(&mut self, handle: RegionHandle);

    /// Carves a block of at least `size` bytes, or `None` if no region has
    /// room.
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>>;

    /// Returns a block to the instance.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// instance and not released since.
    unsafe fn release(&mut self, ptr: NonNull<u8>);

    /// Total metadata overhead a self-managed pool reserves room for.
    fn metadata_overhead() -> usize {
        Self::CONTROL_OVERHEAD + Self::REGION_OVERHEAD + Self::BLOCK_OVERHEAD
    }
}
