//! Backing-region sizing.

use crate::config::{ArenaConfig, MetadataPlacement};
use crate::engine::FreeListEngine;

/// Computes how large a new backing region must be for a request.
///
/// The baseline region is `granularity * default_blocks` bytes. Larger
/// requests get `requested + metadata_reserve` bytes rounded up to a
/// granularity multiple. The reserve is the engine's metadata overhead
/// rounded up to a page for self-managed pools and zero for delegated ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GrowthPolicy {
    granularity: usize,
    default_blocks: usize,
    metadata_reserve: usize,
}

impl GrowthPolicy {
    /// A policy for a pool that reserves room for `E`'s metadata itself.
    pub fn self_managed<E: FreeListEngine>(page_size: usize, granularity: usize, default_blocks: usize) -> Self {
        let overhead = E::metadata_overhead();
        Self {
            granularity,
            default_blocks,
            metadata_reserve: round_up(overhead, page_size).unwrap_or(usize::MAX),
        }
    }

    /// A policy for an engine that accounts for its own overhead.
    pub fn delegated(granularity: usize, default_blocks: usize) -> Self {
        Self { granularity, default_blocks, metadata_reserve: 0 }
    }

    /// Picks the variant named by `config.metadata`.
    pub fn from_config<E: FreeListEngine>(config: &ArenaConfig, page_size: usize, granularity: usize) -> Self {
        match config.metadata {
            MetadataPlacement::SelfManaged => Self::self_managed::<E>(page_size, granularity, config.default_blocks),
            MetadataPlacement::Delegated => Self::delegated(granularity, config.default_blocks),
        }
    }

    /// Size of a region that needs no special sizing, or `None` if
    /// `granularity * default_blocks` overflows.
    pub fn baseline(&self) -> Option<usize> {
        self.granularity.checked_mul(self.default_blocks)
    }

    /// Bytes reserved for engine metadata in oversized regions.
    pub fn metadata_reserve(&self) -> usize {
        self.metadata_reserve
    }

    /// Region size for a request of `requested` bytes, or `None` if it
    /// overflows.
    pub fn region_size(&self, requested: usize) -> Option<usize> {
        let baseline = self.baseline()?;
        if requested <= baseline.saturating_sub(self.metadata_reserve) {
            return Some(baseline);
        }
        let wanted = requested.checked_add(self.metadata_reserve)?;
        round_up(wanted, self.granularity)
    }
}

fn round_up(size: usize, unit: usize) -> Option<usize> {
    let mut units = size / unit;
    if size > units * unit {
        units += 1;
    }
    units.checked_mul(unit)
}
