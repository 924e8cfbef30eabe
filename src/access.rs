//! Access classes and the table that maps them onto pool slots and host
//! protections.
//!
//! Six classes are recognized. `WRITE` on its own cannot be expressed by
//! the host (there is no write-without-read page protection), so it is
//! upgraded to `READ | WRITE` and shares that class's slot.
//!
//! | Class                     | Slot | Protection           |
//! |---------------------------|------|----------------------|
//! | `READ`                    | 0    | `ReadOnly`           |
//! | `WRITE`                   | 1    | `ReadWrite`          |
//! | `READ \| WRITE`           | 1    | `ReadWrite`          |
//! | `EXECUTE`                 | 2    | `Execute`            |
//! | `READ \| EXECUTE`         | 3    | `ReadExecute`        |
//! | `READ \| WRITE \| EXECUTE`| 4    | `ReadWriteExecute`   |

use bitflags::bitflags;
use core::fmt;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The access an allocation is eventually meant to carry.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct AccessClass: u8 {
        /// The block will be read.
        const READ    = 0b001;
        /// The block will be written.
        const WRITE   = 0b010;
        /// The block will be executed.
        const EXECUTE = 0b100;
    }
}

/// A page protection as understood by the host memory mapper.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protection {
    /// Any access faults.
    NoAccess,
    /// Read only.
    ReadOnly,
    /// Read and write.
    ReadWrite,
    /// Execute only.
    Execute,
    /// Read and execute.
    ReadExecute,
    /// Everything. Used for every region while protection is relaxed.
    ReadWriteExecute,
}

impl Protection {
    /// The protection every region carries while the arena is relaxed.
    pub const PERMISSIVE: Protection = Protection::ReadWriteExecute;

    /// Whether reads are allowed.
    pub fn allows_read(self) -> bool {
        matches!(
            self,
            Protection::ReadOnly
                | Protection::ReadWrite
                | Protection::ReadExecute
                | Protection::ReadWriteExecute
        )
    }

    /// Whether writes are allowed.
    pub fn allows_write(self) -> bool {
        matches!(self, Protection::ReadWrite | Protection::ReadWriteExecute)
    }

    /// Whether instruction fetches are allowed.
    pub fn allows_execute(self) -> bool {
        matches!(
            self,
            Protection::Execute | Protection::ReadExecute | Protection::ReadWriteExecute
        )
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protection::NoAccess => "---",
            Protection::ReadOnly => "r--",
            Protection::ReadWrite => "rw-",
            Protection::Execute => "--x",
            Protection::ReadExecute => "r-x",
            Protection::ReadWriteExecute => "rwx",
        };
        f.write_str(s)
    }
}

/// Index of the pool dedicated to one normalized access class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// The slot as an array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

struct AccessEntry {
    class: AccessClass,
    slot: SlotIndex,
    protection: Protection,
}

const READ: AccessClass = AccessClass::READ;
const WRITE: AccessClass = AccessClass::WRITE;
const EXECUTE: AccessClass = AccessClass::EXECUTE;

static ACCESS_TABLE: [AccessEntry; 6] = [
    AccessEntry { class: READ, slot: SlotIndex(0), protection: Protection::ReadOnly },
    AccessEntry { class: WRITE, slot: SlotIndex(1), protection: Protection::ReadWrite },
    AccessEntry {
        class: READ.union(WRITE),
        slot: SlotIndex(1),
        protection: Protection::ReadWrite,
    },
    AccessEntry { class: EXECUTE, slot: SlotIndex(2), protection: Protection::Execute },
    AccessEntry {
        class: READ.union(EXECUTE),
        slot: SlotIndex(3),
        protection: Protection::ReadExecute,
    },
    AccessEntry {
        class: READ.union(WRITE).union(EXECUTE),
        slot: SlotIndex(4),
        protection: Protection::ReadWriteExecute,
    },
];

/// Number of distinct pool slots.
pub const SLOT_COUNT: usize = 5;

fn entry_for(class: AccessClass) -> Option<&'static AccessEntry> {
    ACCESS_TABLE.iter().find(|entry| entry.class == class)
}

/// Resolves the pool slot for `class`, or `None` if the class is not one of
/// the six recognized combinations.
pub fn resolve_slot(class: AccessClass) -> Option<SlotIndex> {
    entry_for(class).map(|entry| entry.slot)
}

/// Resolves the host protection that realizes `class`.
///
/// Unrecognized classes resolve to [`Protection::NoAccess`]; nothing may be
/// allocated with them.
pub fn resolve_protection(class: AccessClass) -> Protection {
    entry_for(class).map_or(Protection::NoAccess, |entry| entry.protection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_normalizes_to_read_write() {
        let rw = AccessClass::READ | AccessClass::WRITE;
        assert_eq!(resolve_slot(AccessClass::WRITE), resolve_slot(rw));
        assert_eq!(resolve_protection(AccessClass::WRITE), resolve_protection(rw));
        assert_eq!(resolve_protection(rw), Protection::ReadWrite);
    }

    #[test]
    fn test_slots_are_distinct_per_protection() {
        let classes = [
            AccessClass::READ,
            AccessClass::READ | AccessClass::WRITE,
            AccessClass::EXECUTE,
            AccessClass::READ | AccessClass::EXECUTE,
            AccessClass::all(),
        ];
        let mut seen = Vec::new();
        for class in classes {
            let slot = resolve_slot(class).unwrap();
            assert!(slot.index() < SLOT_COUNT);
            assert!(!seen.contains(&slot), "{class:?} shares {slot}");
            seen.push(slot);
        }
    }

    #[test]
    fn test_unrecognized_classes() {
        let wx = AccessClass::WRITE | AccessClass::EXECUTE;
        assert_eq!(resolve_slot(wx), None);
        assert_eq!(resolve_protection(wx), Protection::NoAccess);
        assert_eq!(resolve_slot(AccessClass::empty()), None);
    }

    #[test]
    fn test_protection_bits() {
        assert!(Protection::PERMISSIVE.allows_read());
        assert!(Protection::PERMISSIVE.allows_write());
        assert!(Protection::PERMISSIVE.allows_execute());
        assert!(!Protection::Execute.allows_read());
        assert!(!Protection::ReadExecute.allows_write());
        assert!(!Protection::NoAccess.allows_execute());
        assert_eq!(Protection::ReadExecute.to_string(), "r-x");
    }
}
