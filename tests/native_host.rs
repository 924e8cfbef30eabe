#![cfg(target_os = "linux")]

use anyhow::Result;
use wxarena::{AccessClass, HostMemory, NativeArena, Protection};

#[test]
fn test_native_alloc_write_read() -> Result<()> {
    let mut arena = NativeArena::native();
    arena.init();

    let ptr = arena.alloc(AccessClass::READ | AccessClass::WRITE, 4000)?;
    unsafe {
        ptr.as_ptr().write_bytes(0x42, 4000);
        assert_eq!(*ptr.as_ptr().add(3999), 0x42);
    }

    arena.enforce_protection();
    unsafe {
        ptr.as_ptr().write_bytes(0x17, 16);
        assert_eq!(*ptr.as_ptr(), 0x17);
    }

    unsafe { arena.free(AccessClass::READ | AccessClass::WRITE, ptr) };
    arena.deinit();
    Ok(())
}

#[test]
fn test_native_regions_follow_granularity() -> Result<()> {
    let mut arena = NativeArena::native();
    arena.init();
    let granularity = arena.host().granularity();

    arena.alloc(AccessClass::READ, 8)?;
    let big = arena.alloc(AccessClass::READ, granularity * 40 + 1)?;

    let region = arena.regions()[1];
    assert_eq!(region.size() % granularity, 0);
    assert!(region.size() > granularity * 40);
    assert!(region.contains(big.as_ptr()));
    assert_eq!(region.protection(), Protection::ReadOnly);
    Ok(())
}

#[test]
fn test_native_relaxed_write_then_read_only() -> Result<()> {
    let mut arena = NativeArena::native();
    arena.init();

    let table = arena.alloc(AccessClass::READ, 256)?;
    unsafe { table.as_ptr().write_bytes(0xEE, 256) };
    arena.enforce_protection();
    assert_eq!(unsafe { *table.as_ptr().add(255) }, 0xEE);

    arena.relax_protection();
    unsafe { table.as_ptr().write(0x11) };
    assert_eq!(unsafe { *table.as_ptr() }, 0x11);
    Ok(())
}

#[cfg(target_arch = "x86_64")]
#[test]
fn test_native_executes_code_after_enforce() -> Result<()> {
    // mov eax, 42; ret
    const CODE: [u8; 6] = [0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3];

    let mut arena = NativeArena::native();
    arena.init();
    let code = arena.alloc(AccessClass::READ | AccessClass::EXECUTE, CODE.len())?;
    unsafe { code.as_ptr().copy_from_nonoverlapping(CODE.as_ptr(), CODE.len()) };

    arena.enforce_protection();
    let entry: extern "C" fn() -> u32 = unsafe { std::mem::transmute(code.as_ptr()) };
    assert_eq!(entry(), 42);
    Ok(())
}
