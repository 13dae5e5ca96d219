//! Lazy initialization, delayed operations and lifecycle.

use ormkit_core::{
    CollectionState, CoreError, DelayedOperation, FlushOutcome, RoleDescriptor, RoleOptions, SessionConfig,
    ShapeKind, Slot,
};
use ormkit_testkit::prelude::*;
use std::sync::Arc;

fn s(value: &str) -> String {
    value.to_string()
}

#[test]
fn extra_lazy_set_queues_inserts_after_probing() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = with_options(set_role("Post.tags"), RoleOptions::new().extra_lazy(true));
    harness.store.seed_elements(harness.owner_id(owner), &role, &[s("rust")]);
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();

    assert!(!tags.insert(s("rust")).unwrap());
    assert!(tags.insert(s("orm")).unwrap());
    assert!(!tags.insert(s("orm")).unwrap());
    assert_eq!(harness.store.load_count(), 0);
    assert_eq!(
        tags.queued_operations(),
        &[DelayedOperation::Add {
            slot: Slot::Unordered,
            value: s("orm")
        }]
    );

    assert!(tags.remove(&s("rust")).unwrap());
    assert!(!tags.remove(&s("missing")).unwrap());
    assert_eq!(tags.queued_operations().len(), 2);
    assert!(harness.session.is_owner_dirty(owner));

    assert_eq!(tags.to_vec().unwrap(), vec![s("orm")]);
    assert_eq!(harness.store.load_count(), 1);
}

#[test]
fn plain_set_insert_loads_when_membership_is_unknown() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = set_role("Post.tags");
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();

    assert!(tags.insert(s("a")).unwrap());
    assert!(tags.is_initialized());
    assert!(tags.is_dirty());
    assert_eq!(harness.store.load_count(), 1);
    assert_eq!(harness.store.probe_count(), 0);
}

#[test]
fn queued_clear_answers_membership_without_loading() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = list_role("Order.notes");
    harness.store.seed_elements(harness.owner_id(owner), &role, &[s("a")]);
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    notes.clear().unwrap();
    assert!(!notes.contains(&s("a")).unwrap());
    assert!(!notes.remove(&s("a")).unwrap());
    assert_eq!(harness.store.load_count(), 0);

    notes.push(s("b")).unwrap();
    assert!(notes.contains(&s("b")).unwrap());
    assert_eq!(harness.store.load_count(), 1);
    assert_eq!(notes.to_vec().unwrap(), vec![s("b")]);
}

#[test]
fn extra_lazy_size_uses_probe() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = with_options(list_role("Order.notes"), RoleOptions::new().extra_lazy(true));
    harness
        .store
        .seed_elements(harness.owner_id(owner), &role, &[s("a"), s("b"), s("c")]);
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    assert_eq!(notes.len().unwrap(), 3);
    assert_eq!(notes.len().unwrap(), 3);
    assert_eq!(harness.store.probe_count(), 1);
    assert_eq!(harness.store.load_count(), 0);
    assert!(!notes.is_initialized());
}

#[test]
fn unknown_probe_answer_falls_back_to_loading() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = with_options(list_role("Order.notes"), RoleOptions::new().extra_lazy(true));
    harness.store.seed_elements(harness.owner_id(owner), &role, &[s("a")]);
    harness.store.set_probes_enabled(false);
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    assert_eq!(notes.len().unwrap(), 1);
    assert!(notes.is_initialized());
}

#[test]
fn prefetched_size_avoids_loading() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = set_role("Post.tags");
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();

    tags.set_cached_size(7);
    assert_eq!(tags.len().unwrap(), 7);
    assert_eq!(harness.store.load_count(), 0);

    tags.insert(s("a")).unwrap();
    assert_eq!(tags.cached_size(), None);
}

#[test]
fn extra_lazy_map_queues_with_previous_value() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = with_options(map_role("User.settings"), RoleOptions::new().extra_lazy(true));
    harness
        .store
        .seed_entries(harness.owner_id(owner), &role, &[(s("theme"), s("dark"))]);
    let mut settings = harness.session.lazy_map::<String, _>(owner, &role).unwrap();

    assert_eq!(settings.insert(s("theme"), s("light")).unwrap(), Some(s("dark")));
    assert_eq!(settings.insert(s("lang"), s("en")).unwrap(), None);
    assert!(settings.contains_key(&s("lang")).unwrap());
    assert_eq!(settings.remove(&s("lang")).unwrap(), Some(s("en")));
    assert_eq!(settings.remove(&s("missing")).unwrap(), None);
    assert_eq!(harness.store.load_count(), 0);
    assert_eq!(settings.queued_operations().len(), 3);

    assert_eq!(settings.to_vec().unwrap(), vec![(s("theme"), s("light"))]);
    assert!(settings.is_dirty());
}

#[test]
fn membership_is_by_identity_with_or_without_probes() {
    for extra_lazy in [false, true] {
        let harness = Harness::new();
        let owner = harness.owner();
        let owner_id = harness.owner_id(owner);
        let role = Arc::new(
            RoleDescriptor::new("Engine.parts", ShapeKind::Set, PartType)
                .with_options(RoleOptions::new().extra_lazy(extra_lazy)),
        );
        let nut = Part::new("nut");
        harness.store.seed_elements(owner_id, &role, &[nut.clone()]);
        let mut parts = harness.session.lazy_set(owner, &role).unwrap();

        assert!(parts.contains(&nut.revised()).unwrap(), "extra_lazy={extra_lazy}");
        assert!(!parts.insert(nut.revised()).unwrap(), "extra_lazy={extra_lazy}");
        assert!(parts.remove(&nut.revised()).unwrap(), "extra_lazy={extra_lazy}");
        assert_eq!(harness.store.load_count(), u64::from(!extra_lazy));

        let mut persister = StorePersister::new(harness.store.clone());
        parts.flush(&mut persister).unwrap();
        assert!(harness.store.stored_elements(owner_id, &role).is_empty());
        assert_eq!(parts.len().unwrap(), 0);
    }
}

#[test]
fn cascade_views_of_the_queue() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = with_options(map_role("User.settings"), RoleOptions::new().extra_lazy(true));
    harness
        .store
        .seed_entries(harness.owner_id(owner), &role, &[(s("theme"), s("dark"))]);
    let mut settings = harness.session.lazy_map::<String, _>(owner, &role).unwrap();

    settings.insert(s("theme"), s("light")).unwrap();
    assert_eq!(settings.queued_additions(), vec![&s("light")]);
    assert_eq!(settings.queued_orphans(), vec![s("dark")]);
}

#[test]
fn element_added_and_removed_while_unloaded_is_never_written() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = with_options(
        set_role("Post.tags"),
        RoleOptions::new().extra_lazy(true).orphan_delete(true),
    );
    harness.store.seed_elements(owner_id, &role, &[s("keep")]);
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();

    assert!(tags.insert(s("fresh")).unwrap());
    assert!(tags.remove(&s("fresh")).unwrap());
    assert!(tags.queued_orphans().is_empty());

    let mut persister = StorePersister::new(harness.store.clone());
    assert_eq!(tags.flush(&mut persister).unwrap(), FlushOutcome::Clean);
    assert_eq!(persister.call_count(), 0);
    assert!(!tags.has_queued_operations());
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![s("keep")]);
}

#[test]
fn failed_load_keeps_queue_and_can_retry() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = list_role("Order.notes");
    harness.store.seed_elements(harness.owner_id(owner), &role, &[s("a")]);
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();
    notes.push(s("b")).unwrap();

    harness.store.set_offline(true);
    let err = notes.len().unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(notes.state(), CollectionState::Uninitialized);
    assert_eq!(notes.queued_operations().len(), 1);

    harness.store.set_offline(false);
    assert_eq!(notes.to_vec().unwrap(), vec![s("a"), s("b")]);
}

#[test]
fn closing_the_session_unbinds_unloaded_collections() {
    let harness = Harness::new();
    let owner = harness.owner();
    let notes_role = list_role("Order.notes");
    let tags_role = set_role("Order.tags");
    harness.store.seed_elements(harness.owner_id(owner), &tags_role, &[s("x")]);

    let mut notes = harness.session.lazy_list(owner, &notes_role).unwrap();
    let mut tags = harness.session.lazy_set(owner, &tags_role).unwrap();
    tags.ensure_initialized().unwrap();
    harness.session.close();

    assert!(matches!(notes.len(), Err(CoreError::Lifecycle { .. })));
    assert_eq!(notes.state(), CollectionState::Unbound);
    assert!(matches!(notes.push(s("a")), Err(CoreError::Lifecycle { .. })));

    assert_eq!(tags.to_vec().unwrap(), vec![s("x")]);
    tags.insert(s("y")).unwrap();
    assert_eq!(tags.len().unwrap(), 2);
}

#[test]
fn unbound_collection_can_be_rebound() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = list_role("Order.notes");
    harness.store.seed_elements(owner_id, &role, &[s("a")]);

    let mut notes = harness.session.lazy_list(owner, &role).unwrap();
    notes.unbind();
    assert_eq!(notes.state(), CollectionState::Unbound);
    assert!(notes.len().is_err());

    let session = harness.reopen(SessionConfig::default());
    let slot = session.register_owner(owner_id).unwrap();
    notes.bind(&session, slot).unwrap();
    assert_eq!(notes.state(), CollectionState::Uninitialized);
    assert_eq!(notes.to_vec().unwrap(), vec![s("a")]);

    assert!(matches!(notes.bind(&session, slot), Err(CoreError::InvalidOperation { .. })));
}

#[test]
fn read_only_collections_reject_writes() {
    let harness = Harness::with_config(SessionConfig::new().default_read_only(true));
    let owner = harness.owner();
    let role = list_role("Order.notes");
    harness.store.seed_elements(harness.owner_id(owner), &role, &[s("a")]);
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    assert!(matches!(notes.push(s("b")), Err(CoreError::InvalidOperation { .. })));
    assert_eq!(notes.to_vec().unwrap(), vec![s("a")]);
    assert_eq!(notes.state(), CollectionState::ReadOnlyInitialized);

    notes.set_read_only(false);
    assert_eq!(notes.state(), CollectionState::Initialized);
    notes.push(s("b")).unwrap();
    assert_eq!(notes.len().unwrap(), 2);
}

#[test]
fn queueing_can_be_disabled() {
    let harness = Harness::with_config(SessionConfig::new().queue_operations(false));
    let owner = harness.owner();
    let role = list_role("Order.notes");
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();
    notes.push(s("a")).unwrap();
    assert!(notes.is_initialized());

    let role = with_options(set_role("Order.tags"), RoleOptions::new().queue_operations(false));
    let harness = Harness::with_config(SessionConfig::new().default_read_only(false));
    let owner = harness.owner();
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();
    tags.clear().unwrap();
    assert!(tags.is_initialized());
}
