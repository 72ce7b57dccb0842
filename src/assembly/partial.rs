//! Partial bundle state threaded through beam search.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::items::{CohesionPolicy, CoordGroup, Item, SlotClass};

/// An in-progress outfit: committed `(slot, item)` pairs plus co-ord
/// bookkeeping. Cloned freely during beam expansion; items are shared
/// through `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PartialBundle {
    slots: BTreeMap<SlotClass, Arc<Item>>,
    skipped: BTreeSet<SlotClass>,
    /// The strict or prefer_strict group committed atomically, if any.
    committed_group: Option<Arc<CoordGroup>>,
}

impl PartialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child state with one more committed item.
    pub fn committing(&self, slot: SlotClass, item: Arc<Item>) -> Self {
        let mut child = self.clone();
        child.slots.insert(slot, item);
        child
    }

    /// Child state committing a whole co-ord group atomically.
    pub fn committing_group(
        &self,
        group: Arc<CoordGroup>,
        members: impl IntoIterator<Item = (SlotClass, Arc<Item>)>,
    ) -> Self {
        let mut child = self.clone();
        for (slot, item) in members {
            child.slots.insert(slot, item);
        }
        child.committed_group = Some(group);
        child
    }

    /// Child state that explicitly skips an optional slot.
    pub fn skipping(&self, slot: SlotClass) -> Self {
        let mut child = self.clone();
        child.skipped.insert(slot);
        child
    }

    pub fn get(&self, slot: SlotClass) -> Option<&Arc<Item>> {
        self.slots.get(&slot)
    }

    pub fn contains(&self, slot: SlotClass) -> bool {
        self.slots.contains_key(&slot)
    }

    pub fn is_skipped(&self, slot: SlotClass) -> bool {
        self.skipped.contains(&slot)
    }

    /// Committed `(slot, item)` pairs in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (SlotClass, &Arc<Item>)> {
        self.slots.iter().map(|(slot, item)| (*slot, item))
    }

    /// Committed items in slot order.
    pub fn items(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn one_piece_committed(&self) -> bool {
        self.contains(SlotClass::OnePiece)
    }

    pub fn committed_group(&self) -> Option<&Arc<CoordGroup>> {
        self.committed_group.as_ref()
    }

    /// Number of catalog items committed.
    pub fn catalog_count(&self) -> usize {
        self.items().filter(|i| i.is_catalog()).count()
    }

    /// Committed items carrying the given cohesion policy.
    pub fn items_with_policy(
        &self,
        policy: CohesionPolicy,
    ) -> impl Iterator<Item = (SlotClass, &Arc<Item>)> {
        self.entries().filter(move |(_, i)| i.has_policy(policy))
    }

    /// Deterministic tie-break token: committed item ids in slot order.
    pub fn tie_break_token(&self) -> String {
        let ids: Vec<&str> = self.slots.values().map(|i| i.item_id.as_str()).collect();
        ids.join("|")
    }

    /// Item ids as a sorted tuple for lexicographic terminal tie-breaks.
    pub fn id_tuple(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.values().map(|i| i.item_id.clone()).collect();
        ids.sort();
        ids
    }
}
