//! Segregated best-fit engine with out-of-band metadata.
//!
//! Free blocks are binned by power-of-two size class. A request is served
//! from the smallest adequate block in its own class, falling back to the
//! smallest block of the next non-empty class. Splits keep the remainder
//! free when it can hold a minimum block; releases coalesce with the free
//! neighbours of the same region.
//!
//! All bookkeeping lives on the Rust heap, never inside the managed
//! regions. Regions may be execute-only or read-only at any moment.

use super::{FreeListEngine, RegionHandle};
use crate::constants::{ENGINE_ALIGN, MIN_BLOCK_SIZE};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ptr::NonNull;

const BIN_COUNT: usize = usize::BITS as usize;

#[derive(Copy, Clone, Debug)]
struct Span {
    base: usize,
    len: usize,
}

#[derive(Copy, Clone, Debug)]
struct Block {
    size: usize,
    region: usize,
}

fn bin_for(size: usize) -> usize {
    debug_assert!(size > 0);
    (usize::BITS - 1 - size.leading_zeros()) as usize
}

fn round_request(size: usize) -> Option<usize> {
    let rounded = size.max(1).checked_add(ENGINE_ALIGN - 1)? & !(ENGINE_ALIGN - 1);
    Some(rounded.max(MIN_BLOCK_SIZE))
}

/// The default free-list engine.
pub struct SegregatedFit {
    regions: Vec<Option<Span>>,
    // (size, addr) per size class
    bins: Vec<BTreeSet<(usize, usize)>>,
    free: BTreeMap<usize, Block>,
    live: HashMap<usize, Block>,
}

impl SegregatedFit {
    /// Bytes available in free blocks.
    pub fn free_bytes(&self) -> usize {
        self.free.values().map(|b| b.size).sum()
    }

    /// Number of blocks currently handed out.
    pub fn live_blocks(&self) -> usize {
        self.live.len()
    }

    /// Number of regions added and not retired.
    pub fn region_count(&self) -> usize {
        self.regions.iter().flatten().count()
    }

    /// Usable size of a live block.
    pub fn block_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.live.get(&(ptr.as_ptr() as usize)).map(|b| b.size)
    }

    fn insert_free(&mut self, addr: usize, block: Block) {
        self.bins[bin_for(block.size)].insert((block.size, addr));
        self.free.insert(addr, block);
    }

    fn remove_free(&mut self, addr: usize) -> Option<Block> {
        let block = self.free.remove(&addr)?;
        self.bins[bin_for(block.size)].remove(&(block.size, addr));
        Some(block)
    }

    fn take_best_fit(&mut self, size: usize) -> Option<(usize, Block)> {
        let first = bin_for(size);
        let (_, addr) = self.bins[first]
            .range((size, 0)..)
            .next()
            .copied()
            .or_else(|| self.bins[first + 1..].iter().find_map(|bin| bin.first().copied()))?;
        let block = self.remove_free(addr)?;
        Some((addr, block))
    }
}

impl Default for SegregatedFit {
    fn default() -> Self {
        Self::create()
    }
}

impl FreeListEngine for SegregatedFit {
    const CONTROL_OVERHEAD: usize = 0;
    const REGION_OVERHEAD: usize = 0;
    const BLOCK_OVERHEAD: usize = ENGINE_ALIGN - 1;

    fn create() -> Self {
        Self {
            regions: Vec::new(),
            bins: vec![BTreeSet::new(); BIN_COUNT],
            free: BTreeMap::new(),
            live: HashMap::new(),
        }
    }

    unsafe fn add_region(&mut self, base: NonNull<u8>, len: usize) -> RegionHandle {
        let region = self.regions.len();
        let base = base.as_ptr() as usize;
        self.regions.push(Some(Span { base, len }));

        let start = base.next_multiple_of(ENGINE_ALIGN);
        let end = base.saturating_add(len) & !(ENGINE_ALIGN - 1);
        if end > start && end - start >= MIN_BLOCK_SIZE {
            self.insert_free(start, Block { size: end - start, region });
        }
        RegionHandle(region)
    }

    fn retire_region(&mut self, handle: RegionHandle) {
        let Some(span) = self.regions.get_mut(handle.0).and_then(Option::take) else {
            return;
        };
        let inside: Vec<usize> = self
            .free
            .range(span.base..span.base + span.len)
            .map(|(&addr, _)| addr)
            .collect();
        for addr in inside {
            self.remove_free(addr);
        }
        self.live.retain(|_, block| block.region != handle.0);
    }

    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        let size = round_request(size)?;
        let (addr, block) = self.take_best_fit(size)?;

        let remainder = block.size - size;
        let handed = if remainder >= MIN_BLOCK_SIZE {
            self.insert_free(addr + size, Block { size: remainder, region: block.region });
            size
        } else {
            block.size
        };

        self.live.insert(addr, Block { size: handed, region: block.region });
        NonNull::new(addr as *mut u8)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) {
        let addr = ptr.as_ptr() as usize;
        let Some(mut block) = self.live.remove(&addr) else {
            panic!("released block {addr:#x} is not live in this engine");
        };
        let next = addr + block.size;
        if let Some(following) = self.free.get(&next).copied().filter(|b| b.region == block.region) {
            self.remove_free(next);
            block.size += following.size;
        }

        let mut start = addr;
        let preceding = self.free.range(..addr).next_back().map(|(&a, &b)| (a, b));
        if let Some((prev_addr, prev)) = preceding {
            if prev.region == block.region && prev_addr + prev.size == addr {
                self.remove_free(prev_addr);
                start = prev_addr;
                block.size += prev.size;
            }
        }

        self.insert_free(start, block);
    }
}
