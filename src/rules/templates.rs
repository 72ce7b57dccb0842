//! Per-occasion outfit templates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::items::SlotClass;
use crate::profile::Profile;

/// How firmly a template demands a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRequirement {
    Required,
    Optional,
    /// Required unless a one-piece occupies the outfit core.
    RequiredUnlessOnePiece,
}

/// One slot in a template recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSlot {
    pub slot: SlotClass,
    pub requirement: SlotRequirement,
}

impl TemplateSlot {
    pub fn required(slot: SlotClass) -> Self {
        Self {
            slot,
            requirement: SlotRequirement::Required,
        }
    }

    pub fn optional(slot: SlotClass) -> Self {
        Self {
            slot,
            requirement: SlotRequirement::Optional,
        }
    }

    pub fn core(slot: SlotClass) -> Self {
        Self {
            slot,
            requirement: SlotRequirement::RequiredUnlessOnePiece,
        }
    }
}

/// A per-occasion recipe: slots, anchor, dressiness range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_id: String,
    pub occasion: String,
    pub dressiness_lo: u8,
    pub dressiness_hi: u8,
    /// Slot committed first; typically where co-ord groups or one-pieces
    /// live.
    pub anchor: SlotClass,
    pub slots: Vec<TemplateSlot>,
    /// Tags used for profile-affinity tie-breaking at selection.
    #[serde(default)]
    pub style_tags: BTreeSet<String>,
}

impl Template {
    /// Whether this template serves the occasion at the target dressiness.
    pub fn matches(&self, occasion: &str, dressiness: u8) -> bool {
        self.occasion == occasion
            && (self.dressiness_lo..=self.dressiness_hi).contains(&dressiness)
    }

    /// Overlap between template tags and the profile's style signature.
    pub fn affinity(&self, profile: &Profile) -> usize {
        self.style_tags
            .intersection(&profile.style_signature)
            .count()
    }

    /// Whether the template exposes a slot at all.
    pub fn includes(&self, slot: SlotClass) -> bool {
        self.slots.iter().any(|s| s.slot == slot)
    }

    /// The requirement of a slot, if the template exposes it.
    pub fn requirement_of(&self, slot: SlotClass) -> Option<SlotRequirement> {
        self.slots
            .iter()
            .find(|s| s.slot == slot)
            .map(|s| s.requirement)
    }

    /// Assembly order: anchor first, declared order next, accessories last.
    pub fn ordered_slots(&self) -> Vec<SlotClass> {
        let mut ordered = Vec::with_capacity(self.slots.len());
        ordered.push(self.anchor);
        for s in &self.slots {
            if s.slot != self.anchor && !s.slot.is_accessory() {
                ordered.push(s.slot);
            }
        }
        for s in &self.slots {
            if s.slot != self.anchor && s.slot.is_accessory() {
                ordered.push(s.slot);
            }
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> Template {
        Template {
            template_id: "work_office_core".into(),
            occasion: "work_office".into(),
            dressiness_lo: 3,
            dressiness_hi: 5,
            anchor: SlotClass::Outer,
            slots: vec![
                TemplateSlot::core(SlotClass::Top),
                TemplateSlot::core(SlotClass::Bottom),
                TemplateSlot::optional(SlotClass::OnePiece),
                TemplateSlot::optional(SlotClass::Outer),
                TemplateSlot::required(SlotClass::Footwear),
                TemplateSlot::optional(SlotClass::Belt),
                TemplateSlot::optional(SlotClass::Bag),
            ],
            style_tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_matches_range() {
        let t = office();
        assert!(t.matches("work_office", 4));
        assert!(!t.matches("work_office", 2));
        assert!(!t.matches("evening", 4));
    }

    #[test]
    fn test_ordered_slots_anchor_first_accessories_last() {
        let order = office().ordered_slots();
        assert_eq!(order[0], SlotClass::Outer);
        let belt_pos = order.iter().position(|s| *s == SlotClass::Belt).unwrap();
        let shoe_pos = order.iter().position(|s| *s == SlotClass::Footwear).unwrap();
        assert!(shoe_pos < belt_pos);
        assert_eq!(order.len(), office().slots.len());
    }
}
