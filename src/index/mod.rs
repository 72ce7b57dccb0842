//! Candidate index: the denormalized, read-only view of items the engine
//! retrieves candidates from.
//!
//! The engine owns the query trait; hosts back it with whatever search
//! infrastructure they run. [`MemoryIndex`] is the in-process
//! implementation used by tests and small hosts.

mod memory;

pub use memory::MemoryIndex;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::items::{CoordGroup, Item, Owner, SlotClass, TemperatureBand};

/// Retrieval failure, wrapped by the engine as `INDEX_ERROR`.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("index query failed: {message}")]
    Query { message: String },

    #[error("index unavailable: {message}")]
    Unavailable { message: String },
}

/// Facet filter for candidate search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Scope wardrobe queries to one user; ignored for catalog queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotClass>,
    /// Seasonality must contain this band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<TemperatureBand>,
    /// Inclusive formality bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formality: Option<(u8, u8)>,
    /// Items carrying any of these style tags are excluded.
    #[serde(default)]
    pub forbidden_tags: BTreeSet<String>,
    /// Restrict to members of one co-ord group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl ItemFilter {
    pub fn for_slot(slot: SlotClass) -> Self {
        Self {
            slot: Some(slot),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_band(mut self, band: TemperatureBand) -> Self {
        self.band = Some(band);
        self
    }

    pub fn with_formality(mut self, lo: u8, hi: u8) -> Self {
        self.formality = Some((lo, hi));
        self
    }

    pub fn with_forbidden_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.forbidden_tags = tags;
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Whether an item passes every facet of this filter.
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(slot) = self.slot {
            if item.slot != slot {
                return false;
            }
        }
        if let Some(band) = self.band {
            if !item.seasonality.contains(&band) {
                return false;
            }
        }
        if let Some((lo, hi)) = self.formality {
            if !(lo..=hi).contains(&item.formality) {
                return false;
            }
        }
        if !self.forbidden_tags.is_empty()
            && item.style_tags.iter().any(|t| self.forbidden_tags.contains(t))
        {
            return false;
        }
        if let Some(group_id) = &self.group_id {
            if item.group_id.as_deref() != Some(group_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// One page of index results, ordered stably by item id under equal keys.
#[derive(Debug, Clone)]
pub struct IndexPage {
    pub items: Vec<Arc<Item>>,
    pub next_cursor: Option<String>,
}

/// Read-model query surface the engine consumes.
#[async_trait]
pub trait IndexQuery: Send + Sync + fmt::Debug {
    /// Filtered search within one ownership domain. Ordering under equal
    /// keys must be stable across calls.
    async fn search(
        &self,
        owner: Owner,
        filter: &ItemFilter,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<IndexPage, IndexError>;

    /// Resolve items by id; missing ids are silently absent from the
    /// result, preserving input order otherwise.
    async fn items_by_ids(&self, ids: &[String]) -> Result<Vec<Arc<Item>>, IndexError>;

    /// Resolve a co-ord group document.
    async fn coord_group(&self, group_id: &str) -> Result<Option<Arc<CoordGroup>>, IndexError>;
}
