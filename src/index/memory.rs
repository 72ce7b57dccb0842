//! In-memory candidate index.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::items::{CoordGroup, Item, Owner};

use super::{IndexError, IndexPage, IndexQuery, ItemFilter};

/// A thread-safe, id-ordered item store implementing [`IndexQuery`].
///
/// Iteration order is the `BTreeMap` key order (item id), which makes
/// search results stable across calls without extra sorting.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    items: RwLock<BTreeMap<String, Arc<Item>>>,
    groups: RwLock<BTreeMap<String, Arc<CoordGroup>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item.
    pub fn upsert(&self, item: Item) {
        self.items
            .write()
            .insert(item.item_id.clone(), Arc::new(item));
    }

    /// Remove an item; returns whether it existed.
    pub fn remove(&self, item_id: &str) -> bool {
        self.items.write().remove(item_id).is_some()
    }

    /// Insert or replace a co-ord group document.
    pub fn upsert_group(&self, group: CoordGroup) {
        self.groups
            .write()
            .insert(group.group_id.clone(), Arc::new(group));
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the index holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn owner_matches(item: &Item, owner: Owner, filter: &ItemFilter) -> bool {
        if item.owner != owner {
            return false;
        }
        match owner {
            Owner::Wardrobe => match (&filter.user_id, &item.user_id) {
                (Some(want), Some(have)) => want == have,
                (Some(_), None) => false,
                (None, _) => true,
            },
            Owner::Catalog => true,
        }
    }
}

#[async_trait]
impl IndexQuery for MemoryIndex {
    async fn search(
        &self,
        owner: Owner,
        filter: &ItemFilter,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<IndexPage, IndexError> {
        let items = self.items.read();
        let mut out = Vec::with_capacity(limit.min(64));
        let mut next_cursor = None;

        let range = match &cursor {
            Some(after) => items.range::<String, _>((
                std::ops::Bound::Excluded(after.clone()),
                std::ops::Bound::Unbounded,
            )),
            None => items.range::<String, _>(..),
        };

        for (id, item) in range {
            if !Self::owner_matches(item, owner, filter) || !filter.matches(item) {
                continue;
            }
            if out.len() == limit {
                next_cursor = Some(id.clone());
                break;
            }
            out.push(Arc::clone(item));
        }

        Ok(IndexPage {
            items: out,
            next_cursor,
        })
    }

    async fn items_by_ids(&self, ids: &[String]) -> Result<Vec<Arc<Item>>, IndexError> {
        let items = self.items.read();
        Ok(ids.iter().filter_map(|id| items.get(id).cloned()).collect())
    }

    async fn coord_group(&self, group_id: &str) -> Result<Option<Arc<CoordGroup>>, IndexError> {
        Ok(self.groups.read().get(group_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{SlotClass, TemperatureBand};

    fn item(id: &str, owner: Owner, slot: SlotClass, formality: u8) -> Item {
        let item = Item::new(
            id,
            owner,
            match slot {
                SlotClass::Top => "shirt",
                SlotClass::Bottom => "trousers",
                _ => "shoes",
            },
            slot,
            formality,
            [TemperatureBand::Warm],
        );
        match owner {
            Owner::Wardrobe => item.with_user("u1"),
            Owner::Catalog => item,
        }
    }

    #[tokio::test]
    async fn test_search_filters_and_orders_by_id() {
        let index = MemoryIndex::new();
        index.upsert(item("b", Owner::Wardrobe, SlotClass::Top, 4));
        index.upsert(item("a", Owner::Wardrobe, SlotClass::Top, 4));
        index.upsert(item("c", Owner::Wardrobe, SlotClass::Bottom, 4));
        index.upsert(item("d", Owner::Catalog, SlotClass::Top, 4));

        let filter = ItemFilter::for_slot(SlotClass::Top).with_user("u1");
        let page = index
            .search(Owner::Wardrobe, &filter, 10, None)
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_search_paginates_with_cursor() {
        let index = MemoryIndex::new();
        for id in ["a", "b", "c"] {
            index.upsert(item(id, Owner::Wardrobe, SlotClass::Top, 3));
        }
        let filter = ItemFilter::for_slot(SlotClass::Top);
        let first = index
            .search(Owner::Wardrobe, &filter, 2, None)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        let cursor = first.next_cursor.clone().unwrap();
        let rest = index
            .search(Owner::Wardrobe, &filter, 2, Some(cursor))
            .await
            .unwrap();
        let ids: Vec<_> = rest.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_formality_and_band_facets() {
        let index = MemoryIndex::new();
        index.upsert(item("lo", Owner::Wardrobe, SlotClass::Top, 1));
        index.upsert(item("hi", Owner::Wardrobe, SlotClass::Top, 5));
        let filter = ItemFilter::for_slot(SlotClass::Top)
            .with_formality(4, 5)
            .with_band(TemperatureBand::Warm);
        let page = index
            .search(Owner::Wardrobe, &filter, 10, None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].item_id, "hi");
    }

    #[tokio::test]
    async fn test_items_by_ids_skips_missing() {
        let index = MemoryIndex::new();
        index.upsert(item("a", Owner::Wardrobe, SlotClass::Top, 3));
        let found = index
            .items_by_ids(&["a".into(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
