//! Flushing collections through a persister.

use ormkit_core::{
    flush_collection, CollectionCore, CollectionState, CoreError, FlushOutcome, RoleDescriptor, RoleOptions,
    ShapeKind, TextType,
};
use ormkit_testkit::prelude::*;
use std::sync::Arc;

fn s(value: &str) -> String {
    value.to_string()
}

#[test]
fn dirty_list_flushes_its_diff() {
    init_test_tracing();
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = list_role("Order.notes");
    harness.store.seed_elements(owner_id, &role, &[s("a"), s("b"), s("c")]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    notes.set(0, s("z")).unwrap();
    notes.remove_at(2).unwrap();
    notes.push(s("d")).unwrap();

    let outcome = notes.flush(&mut persister).unwrap();
    assert_eq!(
        outcome,
        FlushOutcome::Flushed {
            deletions: 0,
            updates: 2,
            insertions: 0,
            truncated: false
        }
    );
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![s("z"), s("b"), s("d")]);
    assert!(!notes.is_dirty());
    assert!(notes.equals_snapshot());

    assert_eq!(notes.flush(&mut persister).unwrap(), FlushOutcome::Skipped);
    assert_eq!(persister.call_count(), 1);
    assert_eq!(harness.session.stats().collections_flushed(), 1);
    assert_eq!(harness.session.stats().flushes_skipped(), 1);
}

#[test]
fn shrinking_list_deletes_trailing_rows() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = list_role("Order.notes");
    harness.store.seed_elements(owner_id, &role, &[s("a"), s("b")]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    notes.remove_at(1).unwrap();
    notes.flush(&mut persister).unwrap();
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![s("a")]);
    assert_eq!(harness.store.rows(owner_id, role.role()).map(|r| r.len()), Some(1));
}

#[test]
fn queued_operations_flush_without_loading() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = with_options(set_role("Post.tags"), RoleOptions::new().extra_lazy(true));
    harness.store.seed_elements(owner_id, &role, &[s("old")]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();

    tags.insert(s("new")).unwrap();
    tags.remove(&s("old")).unwrap();
    let outcome = tags.flush(&mut persister).unwrap();

    assert_eq!(
        outcome,
        FlushOutcome::Flushed {
            deletions: 1,
            updates: 0,
            insertions: 1,
            truncated: false
        }
    );
    assert_eq!(harness.store.load_count(), 0);
    assert_eq!(tags.state(), CollectionState::Uninitialized);
    assert!(!tags.has_queued_operations());
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![s("new")]);
    assert_eq!(tags.to_vec().unwrap(), vec![s("new")]);
}

#[test]
fn queued_clear_truncates() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = list_role("Order.notes");
    harness.store.seed_elements(owner_id, &role, &[s("a"), s("b")]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    notes.push(s("x")).unwrap();
    notes.clear().unwrap();
    notes.push(s("c")).unwrap();
    notes.flush(&mut persister).unwrap();

    let work = &persister.last().unwrap().work;
    assert!(work.truncate);
    assert_eq!(work.insertions.len(), 1);
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![s("c")]);
}

#[test]
fn reverted_changes_flush_clean() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = set_role("Post.tags");
    harness.store.seed_elements(harness.owner_id(owner), &role, &[s("a")]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut tags = harness.session.lazy_set(owner, &role).unwrap();

    tags.insert(s("b")).unwrap();
    tags.remove(&s("b")).unwrap();
    assert!(tags.is_dirty());
    assert_eq!(tags.flush(&mut persister).unwrap(), FlushOutcome::Clean);
    assert!(!tags.is_dirty());
    assert_eq!(persister.call_count(), 0);
}

#[test]
fn persister_failure_leaves_collection_unchanged() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = map_role("User.settings");
    let mut persister = StorePersister::new(harness.store.clone());
    let mut settings = harness.session.lazy_map::<String, _>(owner, &role).unwrap();
    settings.insert(s("theme"), s("dark")).unwrap();

    persister.fail_next();
    assert!(settings.flush(&mut persister).is_err());
    assert!(settings.is_dirty());
    assert!(!settings.equals_snapshot());
    assert!(harness.store.rows(owner_id, role.role()).is_none());

    assert!(settings.flush(&mut persister).unwrap().wrote());
    assert_eq!(
        harness.store.stored_entries::<String, _>(owner_id, &role),
        vec![(s("theme"), s("dark"))]
    );
}

#[test]
fn read_only_collections_are_skipped() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = list_role("Order.notes");
    let mut persister = StorePersister::new(harness.store.clone());
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();
    notes.push(s("a")).unwrap();
    notes.ensure_initialized().unwrap();
    notes.set_read_only(true);

    assert_eq!(notes.flush(&mut persister).unwrap(), FlushOutcome::Skipped);
    assert_eq!(persister.call_count(), 0);
}

#[test]
fn without_dirty_checking_the_collection_is_recreated() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = with_options(list_role("Order.notes"), RoleOptions::new().dirty_checking(false));
    harness.store.seed_elements(owner_id, &role, &[s("a")]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();

    notes.ensure_initialized().unwrap();
    assert!(notes.snapshot().is_none());
    notes.push(s("b")).unwrap();
    notes.flush(&mut persister).unwrap();

    let work = &persister.last().unwrap().work;
    assert!(work.truncate);
    assert_eq!(work.insertions.len(), 2);
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![s("a"), s("b")]);
}

#[test]
fn orphans_are_reported_for_orphan_delete_roles() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = Arc::new(
        RoleDescriptor::new("Engine.parts", ShapeKind::Set, PartType).with_options(RoleOptions::new().orphan_delete(true)),
    );
    let bolt = Part::new("bolt");
    let nut = Part::new("nut");
    harness.store.seed_elements(owner_id, &role, &[bolt.clone(), nut.clone()]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut parts = harness.session.lazy_set(owner, &role).unwrap();

    parts.remove(&nut).unwrap();
    parts.ensure_initialized().unwrap();
    assert_eq!(parts.orphans(), vec![nut.clone()]);
    parts.flush(&mut persister).unwrap();

    assert_eq!(persister.last().unwrap().orphans, 1);
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![bolt]);
}

#[test]
fn revised_set_element_is_rewritten() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = Arc::new(RoleDescriptor::new("Engine.parts", ShapeKind::Set, PartType));
    let bolt = Part::new("bolt");
    harness.store.seed_elements(owner_id, &role, &[bolt.clone()]);
    let mut persister = StorePersister::new(harness.store.clone());
    let mut parts = harness.session.lazy_set(owner, &role).unwrap();

    parts.retain(|_| false).unwrap();
    parts.insert(bolt.revised()).unwrap();
    let outcome = parts.flush(&mut persister).unwrap();

    assert_eq!(
        outcome,
        FlushOutcome::Flushed {
            deletions: 1,
            updates: 0,
            insertions: 1,
            truncated: false
        }
    );
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![bolt.revised()]);
}

#[test]
fn wrapped_collection_inserts_everything() {
    let harness = Harness::new();
    let owner = harness.owner();
    let owner_id = harness.owner_id(owner);
    let role = set_role("Post.tags");
    let mut persister = StorePersister::new(harness.store.clone());
    let mut tags = harness
        .session
        .wrap_set(owner, &role, [s("b"), s("a")])
        .unwrap();

    let core: &mut CollectionCore<TextType> = &mut tags;
    let outcome = flush_collection(core, &mut persister).unwrap();
    assert_eq!(
        outcome,
        FlushOutcome::Flushed {
            deletions: 0,
            updates: 0,
            insertions: 2,
            truncated: false
        }
    );
    assert_eq!(harness.store.stored_elements(owner_id, &role), vec![s("a"), s("b")]);
}

#[test]
fn pending_queue_cannot_flush_after_close() {
    let harness = Harness::new();
    let owner = harness.owner();
    let role = list_role("Order.notes");
    let mut persister = StorePersister::new(harness.store.clone());
    let mut notes = harness.session.lazy_list(owner, &role).unwrap();
    notes.push(s("a")).unwrap();
    harness.session.close();

    assert!(matches!(notes.flush(&mut persister), Err(CoreError::Lifecycle { .. })));
    assert_eq!(notes.queued_operations().len(), 1);
    assert_eq!(notes.state(), CollectionState::Unbound);
}
