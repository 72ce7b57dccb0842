//! Co-ordinated set documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CohesionPolicy, SlotClass};

/// A co-ordinated set (suit, tracksuit, knit set) as a standalone document.
///
/// Groups declare their members per slot; items reference groups by
/// `group_id` and the engine resolves membership by id lookup. A member
/// slot whose item no longer resolves through the index marks the group
/// incomplete, which is how a half-deleted strict suit is detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordGroup {
    pub group_id: String,
    /// Set kind tag (`suit`, `tracksuit`, `knit_set`, ...).
    pub kind: String,
    pub policy: CohesionPolicy,
    /// Declared members: slot class to item id.
    pub member_slots: BTreeMap<SlotClass, String>,
}

impl CoordGroup {
    /// Create a group document.
    pub fn new(
        group_id: impl Into<String>,
        kind: impl Into<String>,
        policy: CohesionPolicy,
        member_slots: impl IntoIterator<Item = (SlotClass, String)>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            kind: kind.into(),
            policy,
            member_slots: member_slots.into_iter().collect(),
        }
    }

    /// The declared member item for a slot, if the group covers it.
    pub fn member_in(&self, slot: SlotClass) -> Option<&str> {
        self.member_slots.get(&slot).map(String::as_str)
    }

    /// Slot classes this group spans.
    pub fn slots(&self) -> impl Iterator<Item = SlotClass> + '_ {
        self.member_slots.keys().copied()
    }
}
