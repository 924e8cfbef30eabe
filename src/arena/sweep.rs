//! Whole-arena protection sweeps.

use super::ProtectedArena;
use crate::access::Protection;
use crate::engine::FreeListEngine;
use crate::error::ArenaError;
use crate::host::HostMemory;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Sweep {
    Enforce,
    Relax,
}

impl<H: HostMemory, E: FreeListEngine> ProtectedArena<H, E> {
    /// Applies every region's recorded protection and keeps new regions
    /// mapped with theirs. Does nothing if the arena is not initialized.
    ///
    /// # Panics
    /// Panics if the host refuses a protection change. The arena would
    /// otherwise be left half enforced.
    pub fn enforce_protection(&mut self) {
        if !self.initialized {
            return;
        }
        self.enforcing = true;
        self.sweep(Sweep::Enforce);
    }

    /// Makes every region readable, writable and executable, and maps new
    /// regions that way. Does nothing if the arena is not initialized.
    ///
    /// # Panics
    /// Panics if the host refuses a protection change.
    pub fn relax_protection(&mut self) {
        if !self.initialized {
            return;
        }
        self.enforcing = false;
        self.sweep(Sweep::Relax);
    }

    fn sweep(&mut self, sweep: Sweep) {
        for region in self.registry.iter() {
            let protection = match sweep {
                Sweep::Enforce => region.protection(),
                Sweep::Relax => Protection::PERMISSIVE,
            };
            // SAFETY: registered regions are live mappings of `self.host`,
            // and engine metadata never lives inside them.
            if let Err(source) = unsafe { self.host.protect(region.base(), region.size(), protection) } {
                let reason = source.to_string();
                let err = ArenaError::ProtectionChange {
                    base: region.base().as_ptr() as usize,
                    len: region.size(),
                    protection,
                    source,
                };
                error_event!(error = %err, %reason, ?sweep, "protection sweep failed");
                panic!("{err}: {reason}");
            }
        }
        self.counters.sweeps += 1;
        debug_event!(?sweep, regions = self.registry.len(), "protection sweep complete");
    }
}
