//! Second-level cache read-through, write-back and eviction.

use ormkit_cache::CacheRegion;
use ormkit_core::{CacheKey, CacheMode, CachedCollection, CollectionState, RoleOptions, SessionConfig};
use ormkit_testkit::prelude::*;
use std::sync::Arc;

fn s(value: &str) -> String {
    value.to_string()
}

fn cached_tags() -> Arc<ormkit_core::RoleDescriptor<ormkit_core::TextType>> {
    with_options(set_role("Post.tags"), RoleOptions::new().cacheable(true))
}

fn key(harness: &Harness, owner: ormkit_core::OwnerSlot, role: &str) -> CacheKey {
    CacheKey::new(role, *harness.owner_id(owner).as_bytes())
}

#[test]
fn second_session_reads_from_cache() {
    init_test_tracing();
    let harness = Harness::with_cache(SessionConfig::default());
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = cached_tags();
    harness.store.seed_elements(owner_id, &role, &[s("a"), s("b")]);

    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    assert_eq!(tags.len().unwrap(), 2);
    assert_eq!(harness.session.stats().cache_misses(), 1);
    assert_eq!(harness.session.stats().cache_puts(), 1);
    let cache = harness.cache.as_ref().unwrap();
    assert!(cache.contains(&key(&harness, owner, "Post.tags")));

    let session = harness.reopen(SessionConfig::default());
    let slot = session.register_owner(owner_id).unwrap();
    let mut again = session.lazy_set(slot, &role).unwrap();
    assert_eq!(again.to_vec().unwrap(), vec![s("a"), s("b")]);
    assert_eq!(session.stats().cache_hits(), 1);
    assert_eq!(session.stats().collections_loaded(), 0);
    assert_eq!(harness.store.load_count(), 1);
    assert!(!again.is_dirty());
}

#[test]
fn queued_operations_replay_over_cached_contents() {
    let harness = Harness::with_cache(SessionConfig::default());
    let owner = harness.owner();
    let role = cached_tags();
    let cache = harness.cache.as_ref().unwrap();
    let entry = CachedCollection::set(vec![ormkit_codec::Value::from("cached")])
        .encode()
        .unwrap();
    cache.inject(key(&harness, owner, "Post.tags"), entry);

    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    tags.clear().unwrap();
    tags.insert(s("fresh")).unwrap();
    assert_eq!(tags.to_vec().unwrap(), vec![s("fresh")]);
    assert_eq!(harness.store.load_count(), 0);
    assert!(tags.is_dirty());
}

#[test]
fn unreadable_entry_is_evicted_and_reloaded() {
    let harness = Harness::with_cache(SessionConfig::default());
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = cached_tags();
    harness.store.seed_elements(owner_id, &role, &[s("a")]);
    let cache = harness.cache.as_ref().unwrap();
    cache.inject(key(&harness, owner, "Post.tags"), vec![0xff, 0x00, 0x13]);

    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    assert_eq!(tags.to_vec().unwrap(), vec![s("a")]);
    assert_eq!(harness.session.stats().cache_evictions(), 1);
    assert_eq!(harness.store.load_count(), 1);

    let entry = cache.get(&key(&harness, owner, "Post.tags")).unwrap().unwrap();
    assert_eq!(CachedCollection::decode(&entry).unwrap().len(), 1);
}

#[test]
fn entry_of_another_shape_is_evicted() {
    let harness = Harness::with_cache(SessionConfig::default());
    let owner = harness.owner();
    let role = cached_tags();
    let cache = harness.cache.as_ref().unwrap();
    let entry = CachedCollection::sequence(vec![ormkit_codec::Value::from("x")])
        .encode()
        .unwrap();
    cache.inject(key(&harness, owner, "Post.tags"), entry);

    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    assert!(tags.is_empty().unwrap());
    assert_eq!(harness.session.stats().cache_evictions(), 1);
}

#[test]
fn cache_modes_gate_reads_and_writes() {
    for (mode, reads, writes) in [
        (CacheMode::Normal, true, true),
        (CacheMode::Get, true, false),
        (CacheMode::Put, false, true),
        (CacheMode::Ignore, false, false),
    ] {
        let harness = Harness::with_cache(SessionConfig::new().cache_mode(mode));
        let owner = harness.owner();
        let owner_id = harness.owner_id(owner);
        let role = cached_tags();
        harness.store.seed_elements(owner_id, &role, &[s("stored")]);
        let cache = harness.cache.as_ref().unwrap();

        let mut tags = harness.session.lazy_set(owner, &role).unwrap();
        tags.ensure_initialized().unwrap();
        assert_eq!(cache.contains(&key(&harness, owner, "Post.tags")), writes, "{mode:?}");

        let entry = CachedCollection::set(vec![ormkit_codec::Value::from("cached")])
            .encode()
            .unwrap();
        cache.inject(key(&harness, owner, "Post.tags"), entry);
        let session = harness.reopen(SessionConfig::new().cache_mode(mode));
        let slot = session.register_owner(owner_id).unwrap();
        let mut again = session.lazy_set(slot, &role).unwrap();
        let expected = if reads { s("cached") } else { s("stored") };
        assert_eq!(again.to_vec().unwrap(), vec![expected], "{mode:?}");
    }
}

#[test]
fn non_cacheable_roles_bypass_the_region() {
    let harness = Harness::with_cache(SessionConfig::default());
    let owner = harness.owner();
    let role = set_role("Post.tags");
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    tags.ensure_initialized().unwrap();
    assert!(harness.cache.as_ref().unwrap().is_empty());
    assert_eq!(harness.session.stats().cache_misses(), 0);
}

#[test]
fn flush_evicts_the_stale_entry() {
    let harness = Harness::with_cache(SessionConfig::default());
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = cached_tags();
    harness.store.seed_elements(owner_id, &role, &[s("a")]);
    let mut persister = StorePersister::new(harness.store.clone());
    let cache = harness.cache.as_ref().unwrap();

    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    tags.insert(s("b")).unwrap();
    assert!(cache.contains(&key(&harness, owner, "Post.tags")));

    tags.flush(&mut persister).unwrap();
    assert!(!cache.contains(&key(&harness, owner, "Post.tags")));
}

#[test]
fn unavailable_region_fails_initialization_retryably() {
    let harness = Harness::with_cache(SessionConfig::default());
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = cached_tags();
    harness.store.seed_elements(owner_id, &role, &[s("a")]);
    let cache = harness.cache.as_ref().unwrap();
    cache.set_offline(true);

    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    let err = tags.ensure_initialized().unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(tags.state(), CollectionState::Uninitialized);

    cache.set_offline(false);
    assert_eq!(tags.to_vec().unwrap(), vec![s("a")]);
}

#[test]
fn disassemble_then_assemble_in_another_session() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = list_role("Order.notes");
    harness.store.seed_elements(owner_id, &role, &[s("a"), s("b")]);

    let mut notes = harness.session.lazy_list(owner, &role).unwrap();
    let entry = notes.disassemble().unwrap();
    let bytes = entry.encode().unwrap();

    let session = harness.reopen(SessionConfig::default());
    let slot = session.register_owner(owner_id).unwrap();
    let mut copy = session.lazy_list(slot, &role).unwrap();
    copy.assemble(&CachedCollection::decode(&bytes).unwrap()).unwrap();
    assert_eq!(copy.to_vec().unwrap(), vec![s("a"), s("b")]);
    assert!(!copy.is_dirty());
    assert_eq!(harness.store.load_count(), 1);

    assert!(copy.assemble(&entry).is_err());
}
