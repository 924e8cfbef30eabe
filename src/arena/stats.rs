//! Arena activity counters.

use serde::Serialize;

/// Snapshot of arena activity since the last `init`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ArenaStats {
    /// Registered backing regions.
    pub regions: usize,
    /// Bytes mapped across all regions.
    pub mapped_bytes: usize,
    /// Populated pool slots.
    pub pools: usize,
    /// Blocks carved and not yet freed.
    pub live_allocations: usize,
    /// Successful `alloc` calls.
    pub allocations: usize,
    /// `free` calls.
    pub frees: usize,
    /// Regions mapped because a pool was exhausted.
    pub growth_events: usize,
    /// Completed protection sweeps, enforce and relax.
    pub sweeps: usize,
    /// Whether regions currently carry their recorded protection.
    pub enforcing: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub(crate) allocations: usize,
    pub(crate) frees: usize,
    pub(crate) growth_events: usize,
    pub(crate) sweeps: usize,
}
