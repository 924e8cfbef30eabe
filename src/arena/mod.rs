//! The protected-arena manager.
//!
//! A [`ProtectedArena`] owns one lazily created [`ProtectedPool`] per access
//! slot and a registry of every backing region those pools were given.
//! Regions are mapped fully permissive while the arena is relaxed, or with
//! their true protection while it is enforcing; the two sweeps in
//! [`enforce_protection`](ProtectedArena::enforce_protection) and
//! [`relax_protection`](ProtectedArena::relax_protection) flip every region
//! at once.
//!
//! ```text
//!   alloc(class, n)
//!       │
//!       ▼
//!   resolve_slot ──► slot empty? ──► map region (GrowthPolicy(n)), create pool
//!       │
//!       ▼
//!   pool.carve(n) ──► None? ──► map one more region, carve again (once)
//! ```
//!
//! The arena is single-threaded. It is `Send` when its host and engine are,
//! but never `Sync`; share it behind a `Mutex` if several threads need it.

mod growth;
mod pool;
mod registry;
mod stats;
mod sweep;

pub use growth::GrowthPolicy;
pub use pool::ProtectedPool;
pub use registry::Region;
pub use stats::ArenaStats;

use crate::access::{self, AccessClass, Protection, SLOT_COUNT};
use crate::config::ArenaConfig;
use crate::engine::{FreeListEngine, SegregatedFit};
use crate::error::ArenaError;
use crate::host::{HostMemory, NativeHost};
use registry::RegionRegistry;
use stats::Counters;
use std::ptr::NonNull;

/// An arena over the operating system's memory mapper.
pub type NativeArena = ProtectedArena<NativeHost, SegregatedFit>;

/// Protection-aware allocator context.
///
/// Created uninitialized; call [`init`](Self::init) before allocating.
/// Dropping the arena tears it down and unmaps every region.
pub struct ProtectedArena<H: HostMemory, E: FreeListEngine = SegregatedFit> {
    host: H,
    config: ArenaConfig,
    growth: GrowthPolicy,
    slots: [Option<ProtectedPool<E>>; SLOT_COUNT],
    registry: RegionRegistry,
    enforcing: bool,
    initialized: bool,
    counters: Counters,
}

// SAFETY: the arena exclusively owns every region it registered; the raw
// region pointers are never shared with another owner.
unsafe impl<H: HostMemory + Send, E: FreeListEngine + Send> Send for ProtectedArena<H, E> {}

impl NativeArena {
    /// An uninitialized arena over the native host with default settings.
    pub fn native() -> Self {
        Self::new(NativeHost::new())
    }
}

impl<H: HostMemory, E: FreeListEngine> ProtectedArena<H, E> {
    /// An uninitialized arena with the default configuration.
    pub fn new(host: H) -> Self {
        let config = ArenaConfig::default();
        let growth = GrowthPolicy::from_config::<E>(&config, host.page_size(), host.granularity());
        Self::assemble(host, config, growth)
    }

    /// An uninitialized arena with `config`.
    ///
    /// # Errors
    /// Returns [`ArenaError::InvalidConfig`] if the configuration is out of
    /// range, or if its baseline region overflows at the host's granularity.
    pub fn with_config(host: H, config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let growth = GrowthPolicy::from_config::<E>(&config, host.page_size(), host.granularity());
        if growth.baseline().is_none() {
            return Err(ArenaError::InvalidConfig(format!(
                "default_blocks {} overflows at granularity {}",
                config.default_blocks,
                host.granularity()
            )));
        }
        Ok(Self::assemble(host, config, growth))
    }

    fn assemble(host: H, config: ArenaConfig, growth: GrowthPolicy) -> Self {
        Self {
            host,
            config,
            growth,
            slots: std::array::from_fn(|_| None),
            registry: RegionRegistry::default(),
            enforcing: false,
            initialized: false,
            counters: Counters::default(),
        }
    }

    /// Clears all pools and regions and marks the arena ready.
    ///
    /// Calling `init` on an arena that is already initialized is ignored.
    pub fn init(&mut self) {
        if self.initialized {
            warn_event!("init on an initialized arena ignored");
            return;
        }
        self.slots = std::array::from_fn(|_| None);
        self.registry = RegionRegistry::default();
        self.counters = Counters::default();
        self.enforcing = self.config.enforce_on_init;
        self.initialized = true;
        debug_event!(
            slots = SLOT_COUNT,
            baseline = ?self.growth.baseline(),
            enforcing = self.enforcing,
            "arena initialized"
        );
    }

    /// Unmaps every region, destroys every pool and marks the arena
    /// uninitialized. Does nothing if the arena is not initialized.
    ///
    /// Every block handed out by the arena is invalid afterwards.
    pub fn deinit(&mut self) {
        if !self.initialized {
            return;
        }

        let mut slots: [Option<ProtectedPool<E>>; SLOT_COUNT] =
            std::mem::replace(&mut self.slots, std::array::from_fn(|_| None));
        #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
        let (regions, bytes) = (self.registry.len(), self.registry.mapped_bytes());

        for region in self.registry.drain_newest_first() {
            if let Some(pool) = slots[region.slot().index()].as_mut() {
                pool.retire(region.handle());
            }
            trace_event!(base = ?region.base(), size = region.size(), "region unmapped");
            // SAFETY: the region was mapped by `self.host` with this size and
            // its pool no longer refers to it.
            unsafe { self.host.unmap(region.base(), region.size()) };
        }
        // Engines go only after none of their regions remain.
        drop(slots);

        self.enforcing = false;
        self.initialized = false;
        self.counters = Counters::default();
        debug_event!(regions, bytes, "arena torn down");
    }

    /// Allocates `size` bytes intended for `class` access.
    ///
    /// The first allocation for a slot creates its pool. If the pool has no
    /// room, one more region is mapped and the allocation is retried once.
    ///
    /// # Errors
    /// - [`ArenaError::NotInitialized`] before `init` or after `deinit`.
    /// - [`ArenaError::UnknownAccessClass`] for an unrecognized class.
    /// - [`ArenaError::ZeroSized`] if `size` is zero.
    /// - [`ArenaError::RequestTooLarge`] if region sizing overflows.
    /// - [`ArenaError::MappingFailed`] if the host cannot map a region.
    /// - [`ArenaError::ExhaustedAfterGrowth`] if the retry also fails.
    pub fn alloc(&mut self, class: AccessClass, size: usize) -> Result<NonNull<u8>, ArenaError> {
        if !self.initialized {
            return Err(ArenaError::NotInitialized);
        }
        if size == 0 {
            return Err(ArenaError::ZeroSized);
        }
        let slot = access::resolve_slot(class).ok_or(ArenaError::UnknownAccessClass(class))?;

        let mut pool = match self.slots[slot.index()].take() {
            Some(pool) => pool,
            None => {
                let protection = access::resolve_protection(class);
                let mut pool = ProtectedPool::new(slot, protection);
                #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
                let bytes = self.grow(&mut pool, size)?;
                debug_event!(%slot, %protection, bytes, "pool created");
                pool
            }
        };

        let result = self.carve(&mut pool, size);
        self.slots[slot.index()] = Some(pool);

        if result.is_ok() {
            self.counters.allocations += 1;
        }
        result
    }

    /// Returns a block to the pool of `class`.
    ///
    /// Does nothing if the arena is not initialized.
    ///
    /// # Safety
    /// `ptr` must come from [`alloc`](Self::alloc) on this arena with the
    /// same normalized access class, and must not have been freed since.
    ///
    /// # Panics
    /// Panics if no pool exists for `class`: no block of that class was
    /// ever allocated, so the call violates the contract above.
    pub unsafe fn free(&mut self, class: AccessClass, ptr: NonNull<u8>) {
        if !self.initialized {
            return;
        }
        let pool = access::resolve_slot(class).and_then(|slot| self.slots[slot.index()].as_mut());
        let Some(pool) = pool else {
            panic!("free of {ptr:p}: no pool exists for access class {class:?}");
        };
        pool.release(ptr);
        self.counters.frees += 1;
        trace_event!(?ptr, ?class, "block freed");
    }

    fn carve(&mut self, pool: &mut ProtectedPool<E>, size: usize) -> Result<NonNull<u8>, ArenaError> {
        if let Some(ptr) = pool.carve(size) {
            return Ok(ptr);
        }

        debug_event!(slot = %pool.slot(), size, "pool exhausted, growing");
        self.grow(pool, size)?;
        self.counters.growth_events += 1;
        pool.carve(size).ok_or(ArenaError::ExhaustedAfterGrowth { requested: size })
    }

    /// Maps one region sized for `size`, hands it to `pool` and returns its
    /// length.
    fn grow(&mut self, pool: &mut ProtectedPool<E>, size: usize) -> Result<usize, ArenaError> {
        let len = self
            .growth
            .region_size(size)
            .ok_or(ArenaError::RequestTooLarge { requested: size })?;
        let recorded = pool.protection();
        let mapped = if self.enforcing { recorded } else { Protection::PERMISSIVE };

        let base = self
            .host
            .map(len, mapped)
            .map_err(|source| ArenaError::MappingFailed { bytes: len, source })?;
        // SAFETY: the mapping is fresh, owned by the registry until deinit,
        // and disjoint from every other region.
        let handle = unsafe { pool.adopt(base, len) };
        self.registry.register(Region::new(base, len, recorded, pool.slot(), handle));

        trace_event!(
            base = ?base,
            size = len,
            %recorded,
            %mapped,
            slot = %pool.slot(),
            "region mapped"
        );
        Ok(len)
    }

    /// Whether `init` has run without a matching `deinit`.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether regions currently carry their recorded protection.
    pub fn is_enforcing(&self) -> bool {
        self.enforcing
    }

    /// Every registered region, oldest first.
    pub fn regions(&self) -> &[Region] {
        self.registry.as_slice()
    }

    /// The pool serving `class`, if one has been created.
    pub fn pool(&self, class: AccessClass) -> Option<&ProtectedPool<E>> {
        access::resolve_slot(class).and_then(|slot| self.slots[slot.index()].as_ref())
    }

    /// Whether a pool serving `class` exists.
    pub fn has_pool(&self, class: AccessClass) -> bool {
        self.pool(class).is_some()
    }

    /// The host memory mapper.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host, e.g. for fault injection.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The configuration the arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The region sizing policy.
    pub fn growth_policy(&self) -> &GrowthPolicy {
        &self.growth
    }

    /// Activity snapshot since the last `init`.
    pub fn stats(&self) -> ArenaStats {
        let pools = self.slots.iter().flatten();
        ArenaStats {
            regions: self.registry.len(),
            mapped_bytes: self.registry.mapped_bytes(),
            pools: pools.clone().count(),
            live_allocations: pools.map(ProtectedPool::live_blocks).sum(),
            allocations: self.counters.allocations,
            frees: self.counters.frees,
            growth_events: self.counters.growth_events,
            sweeps: self.counters.sweeps,
            enforcing: self.enforcing,
        }
    }
}

impl<H: HostMemory, E: FreeListEngine> Drop for ProtectedArena<H, E> {
    fn drop(&mut self) {
        self.deinit();
    }
}
