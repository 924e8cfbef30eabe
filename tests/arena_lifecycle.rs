use anyhow::Result;
use wxarena::{
    AccessClass, ArenaConfig, ArenaError, ArenaStats, HostMemory, MetadataPlacement, NativeArena, ProtectedArena,
    SegregatedFit, SimulatedHost,
};

type Arena = ProtectedArena<SimulatedHost, SegregatedFit>;

fn initialized() -> Arena {
    let mut arena = Arena::new(SimulatedHost::new());
    arena.init();
    arena
}

#[test]
fn test_nothing_is_mapped_before_first_alloc() {
    let mut arena = initialized();
    for class in [AccessClass::READ, AccessClass::WRITE, AccessClass::EXECUTE, AccessClass::all()] {
        assert!(!arena.has_pool(class));
    }
    assert!(arena.regions().is_empty());
    assert_eq!(arena.host().counters().maps, 0);

    arena.enforce_protection();
    arena.relax_protection();
    assert_eq!(arena.host().counters().protects, 0);
}

#[test]
fn test_each_class_gets_its_own_pool() -> Result<()> {
    let mut arena = initialized();
    arena.alloc(AccessClass::READ, 16)?;
    arena.alloc(AccessClass::READ | AccessClass::EXECUTE, 16)?;
    arena.alloc(AccessClass::EXECUTE, 16)?;
    arena.alloc(AccessClass::all(), 16)?;

    assert_eq!(arena.regions().len(), 4);
    let mut slots: Vec<_> = arena.regions().iter().map(|r| r.slot()).collect();
    slots.sort();
    slots.dedup();
    assert_eq!(slots.len(), 4);
    assert!(!arena.has_pool(AccessClass::READ | AccessClass::WRITE));
    Ok(())
}

#[test]
fn test_write_shares_the_read_write_pool() -> Result<()> {
    let mut arena = initialized();
    let a = arena.alloc(AccessClass::WRITE, 46)?;
    let b = arena.alloc(AccessClass::READ | AccessClass::WRITE, 46)?;

    assert_ne!(a, b);
    assert_eq!(arena.regions().len(), 1);
    assert!(arena.regions()[0].contains(a.as_ptr()));
    assert!(arena.regions()[0].contains(b.as_ptr()));
    assert_eq!(arena.pool(AccessClass::WRITE).map(|p| p.live_blocks()), Some(2));

    unsafe { arena.free(AccessClass::READ | AccessClass::WRITE, a) };
    unsafe { arena.free(AccessClass::WRITE, b) };
    assert_eq!(arena.stats().live_allocations, 0);
    Ok(())
}

#[test]
fn test_freed_space_is_reused() -> Result<()> {
    let mut arena = initialized();
    let first = arena.alloc(AccessClass::READ, 30_000)?;
    unsafe { arena.free(AccessClass::READ, first) };
    let second = arena.alloc(AccessClass::READ, 30_000)?;

    assert_eq!(first, second);
    assert_eq!(arena.host().counters().maps, 1);
    Ok(())
}

#[test]
fn test_deinit_releases_everything() -> Result<()> {
    let mut arena = initialized();
    arena.alloc(AccessClass::READ, 100)?;
    arena.alloc(AccessClass::EXECUTE, 100)?;
    arena.alloc(AccessClass::READ, 61_400)?;
    arena.enforce_protection();
    assert_eq!(arena.host().live_mappings(), 3);

    arena.deinit();
    assert!(!arena.is_initialized());
    assert!(!arena.is_enforcing());
    assert!(arena.regions().is_empty());
    assert!(!arena.has_pool(AccessClass::READ));
    assert!(!arena.has_pool(AccessClass::EXECUTE));
    assert_eq!(arena.host().live_mappings(), 0);
    assert_eq!(arena.host().counters().unmaps, 3);
    assert_eq!(arena.stats(), ArenaStats::default());
    Ok(())
}

#[test]
fn test_operations_after_deinit() {
    let mut arena = initialized();
    arena.deinit();
    arena.deinit();

    assert!(matches!(arena.alloc(AccessClass::READ, 8), Err(ArenaError::NotInitialized)));
    arena.enforce_protection();
    assert!(!arena.is_enforcing());
    assert_eq!(arena.host().counters().maps, 0);
}

#[test]
fn test_reinit_recreates_pools_from_scratch() -> Result<()> {
    let mut arena = initialized();
    arena.alloc(AccessClass::EXECUTE, 64)?;
    arena.enforce_protection();
    arena.deinit();

    arena.init();
    assert!(!arena.is_enforcing());
    assert!(!arena.has_pool(AccessClass::EXECUTE));

    arena.alloc(AccessClass::EXECUTE, 64)?;
    assert_eq!(arena.regions().len(), 1);
    assert_eq!(arena.host().counters().maps, 2);
    assert_eq!(arena.host().live_mappings(), 1);
    assert_eq!(arena.stats().allocations, 1);
    Ok(())
}

#[test]
fn test_config_controls_baseline_and_enforcement() -> Result<()> {
    let config = ArenaConfig::from_json(r#"{ "default_blocks": 4, "enforce_on_init": true }"#)?;
    let mut arena = Arena::with_config(SimulatedHost::new(), config)?;
    arena.init();
    assert!(arena.is_enforcing());

    arena.alloc(AccessClass::READ, 8)?;
    assert_eq!(arena.regions()[0].size(), 4 * 4096);
    assert_eq!(arena.host().counters().protects, 0);
    Ok(())
}

#[test]
fn test_delegated_metadata_sizes_for_request_alone() -> Result<()> {
    let config = ArenaConfig { metadata: MetadataPlacement::Delegated, ..ArenaConfig::default() };
    let mut arena = Arena::with_config(SimulatedHost::new(), config)?;
    arena.init();

    arena.alloc(AccessClass::READ, 4096 * 15)?;
    assert_eq!(arena.regions()[0].size(), 4096 * 15);
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ArenaConfig { default_blocks: 0, ..ArenaConfig::default() };
    let err = Arena::with_config(SimulatedHost::new(), config).err();
    assert!(matches!(err, Some(ArenaError::InvalidConfig(_))));

    assert!(matches!(ArenaConfig::from_json("{ nope"), Err(ArenaError::Config(_))));
}

#[test]
fn test_baseline_overflow_is_a_config_error() {
    let config = ArenaConfig { default_blocks: usize::MAX, ..ArenaConfig::default() };
    let err = Arena::with_config(SimulatedHost::new(), config).err();
    assert!(matches!(err, Some(ArenaError::InvalidConfig(_))));

    let config = ArenaConfig { default_blocks: usize::MAX / 65536 + 1, ..ArenaConfig::default() };
    let err = Arena::with_config(SimulatedHost::with_geometry(4096, 65536), config).err();
    assert!(matches!(err, Some(ArenaError::InvalidConfig(_))));
}

#[test]
fn test_coarse_granularity_host() -> Result<()> {
    let mut arena = Arena::new(SimulatedHost::with_geometry(4096, 65536));
    arena.init();
    let ptr = arena.alloc(AccessClass::READ, 8)?;

    assert_eq!(arena.regions()[0].size(), 65536 * 15);
    assert_eq!(ptr.as_ptr() as usize % arena.host().granularity(), 0);
    Ok(())
}

#[test]
fn test_arena_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Arena>();
    assert_send::<NativeArena>();
}
