//! Fixed sizing constants.

/// Host allocation units mapped for a pool's baseline region.
pub const DEFAULT_BLOCK_COUNT: usize = 15;

/// Alignment of every block handed out by the segregated engine.
pub const ENGINE_ALIGN: usize = 16;

/// Smallest block the segregated engine tracks. Smaller remainders stay
/// attached to the block they were split from.
pub const MIN_BLOCK_SIZE: usize = ENGINE_ALIGN;
