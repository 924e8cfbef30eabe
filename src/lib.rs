//! # `wxarena` - W^X-aware protected arenas
//!
//! A small allocator context that hands out blocks from backing regions
//! mapped straight from the host's virtual-memory primitives, grouped by the
//! access the caller intends (read, write, execute). Each access class is
//! served by its own pool, so every region has exactly one intended
//! protection. The whole arena can then be swept between two states:
//!
//! - **enforcing**: every region carries its intended protection, so
//!   executable memory is never writable and data is never executable;
//! - **relaxed**: every region is readable, writable and executable, for
//!   phases such as patching code in place.
//!
//! ## Architecture
//!
//! ```text
//!   ProtectedArena<H, E>
//!   ├── slots[5]: Option<ProtectedPool<E>>   one per normalized access class
//!   │        └── E: FreeListEngine            block placement, metadata out of band
//!   ├── RegionRegistry                        every mapping, oldest first
//!   ├── GrowthPolicy                          region sizing
//!   └── H: HostMemory                         NativeHost or SimulatedHost
//! ```
//!
//! The free-list engine never stores bookkeeping inside the regions it
//! manages, so a sweep can revoke read or write access to a region without
//! the allocator itself faulting on it.
//!
//! ## Example
//!
//! ```rust
//! use wxarena::{AccessClass, Protection, ProtectedArena, SegregatedFit, SimulatedHost};
//!
//! let mut arena: ProtectedArena<SimulatedHost, SegregatedFit> =
//!     ProtectedArena::new(SimulatedHost::new());
//! arena.init();
//!
//! let code = arena.alloc(AccessClass::READ | AccessClass::EXECUTE, 128)?;
//! arena.host().fill(code.as_ptr(), 0xC3, 128)?;
//!
//! arena.enforce_protection();
//! assert_eq!(arena.host().protection_of(code.as_ptr()), Some(Protection::ReadExecute));
//! assert!(arena.host().fill(code.as_ptr(), 0x90, 1).is_err());
//!
//! unsafe { arena.free(AccessClass::READ | AccessClass::EXECUTE, code) };
//! arena.deinit();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`NativeArena`] is the same context over the operating system's mapper.
//!
//! ## Features
//!
//! - `tracing` (default): emits `tracing` events for pool creation, region
//!   mapping, growth, sweeps and teardown.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
mod trace;

pub mod access;
pub mod arena;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod host;
pub mod syscall;

pub use access::{AccessClass, Protection, SlotIndex};
pub use arena::{ArenaStats, GrowthPolicy, NativeArena, ProtectedArena, ProtectedPool, Region};
pub use config::{ArenaConfig, MetadataPlacement};
pub use engine::{FreeListEngine, SegregatedFit};
pub use error::ArenaError;
pub use host::{HostMemory, NativeHost, SimulatedHost};
