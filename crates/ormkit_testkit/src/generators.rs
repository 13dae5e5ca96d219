//! Property-based test generators using proptest.
//!
//! Element values come from a small alphabet so that generated operation
//! sequences hit the same elements repeatedly.

use ormkit_core::EntityId;
use proptest::prelude::*;

/// A mutation of a text list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOp {
    /// Append an element.
    Push(String),
    /// Remove the first occurrence of an element.
    Remove(String),
    /// Remove everything.
    Clear,
}

/// A mutation of a text set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOp {
    /// Add an element.
    Insert(String),
    /// Remove an element.
    Remove(String),
    /// Remove everything.
    Clear,
}

/// A mutation of a text map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOp {
    /// Store a value under a key.
    Insert(String, String),
    /// Remove a key.
    Remove(String),
    /// Remove everything.
    Clear,
}

/// Strategy for generating valid entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for a text element from a five-letter alphabet.
pub fn element_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e"]).prop_map(str::to_string)
}

/// Strategy for stored collection contents.
pub fn elements_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(element_strategy(), 0..=max)
}

/// Strategy for list mutation sequences. Clears are rare.
pub fn list_ops_strategy(max: usize) -> impl Strategy<Value = Vec<ListOp>> {
    let op = prop_oneof![
        4 => element_strategy().prop_map(ListOp::Push),
        2 => element_strategy().prop_map(ListOp::Remove),
        1 => Just(ListOp::Clear),
    ];
    prop::collection::vec(op, 0..=max)
}

/// Strategy for set mutation sequences. Clears are rare.
pub fn set_ops_strategy(max: usize) -> impl Strategy<Value = Vec<SetOp>> {
    let op = prop_oneof![
        4 => element_strategy().prop_map(SetOp::Insert),
        3 => element_strategy().prop_map(SetOp::Remove),
        1 => Just(SetOp::Clear),
    ];
    prop::collection::vec(op, 0..=max)
}

/// Strategy for map mutation sequences. Clears are rare.
pub fn map_ops_strategy(max: usize) -> impl Strategy<Value = Vec<MapOp>> {
    let op = prop_oneof![
        4 => (element_strategy(), element_strategy()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        3 => element_strategy().prop_map(MapOp::Remove),
        1 => Just(MapOp::Clear),
    ];
    prop::collection::vec(op, 0..=max)
}
