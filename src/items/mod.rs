//! Garment item model.
//!
//! Items are sparse attribute bags: every field beyond the identity core is
//! optional, and the attribute registry decides which fields are applicable
//! to which role. Co-ordinated sets are separate group objects referenced by
//! id; items never hold back-pointers into other items.

mod group;
mod item;

pub use group::CoordGroup;
pub use item::Item;

use serde::{Deserialize, Serialize};

/// Where an item lives: the user's wardrobe or the global catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Wardrobe,
    Catalog,
}

impl Owner {
    /// Merge rank for retrieval ordering: wardrobe sorts before catalog.
    pub fn rank(self) -> u8 {
        match self {
            Owner::Wardrobe => 0,
            Owner::Catalog => 1,
        }
    }
}

/// The slot class a role occupies in an outfit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotClass {
    Top,
    Mid,
    Outer,
    Bottom,
    OnePiece,
    Footwear,
    Bag,
    Belt,
    Jewelry,
    Headwear,
    Hosiery,
}

impl SlotClass {
    /// All slot classes, in canonical order.
    pub const ALL: [SlotClass; 11] = [
        SlotClass::Top,
        SlotClass::Mid,
        SlotClass::Outer,
        SlotClass::Bottom,
        SlotClass::OnePiece,
        SlotClass::Footwear,
        SlotClass::Bag,
        SlotClass::Belt,
        SlotClass::Jewelry,
        SlotClass::Headwear,
        SlotClass::Hosiery,
    ];

    /// Accessory slots are always ordered last during assembly.
    pub fn is_accessory(self) -> bool {
        matches!(
            self,
            SlotClass::Bag
                | SlotClass::Belt
                | SlotClass::Jewelry
                | SlotClass::Headwear
                | SlotClass::Hosiery
        )
    }

    /// Body-covering layer slots governed by the layering graph.
    pub fn is_layer(self) -> bool {
        matches!(self, SlotClass::Top | SlotClass::Mid | SlotClass::Outer)
    }

    /// Slots displaced by a committed one-piece.
    pub fn excluded_by_one_piece(self) -> bool {
        matches!(self, SlotClass::Top | SlotClass::Mid | SlotClass::Bottom)
    }

    /// Slots close to the face, used by skin synergy and terminal
    /// tie-breaking.
    pub fn is_near_face(self) -> bool {
        matches!(
            self,
            SlotClass::Top | SlotClass::Outer | SlotClass::Headwear | SlotClass::Jewelry
        )
    }
}

/// Temperature band, doubling as a seasonality tag on items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    Cold,
    Cool,
    Mild,
    Warm,
    Hot,
}

/// Surface pattern of a garment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    #[default]
    Solid,
    Stripe,
    Check,
    Print,
    Texture,
    #[serde(other)]
    Other,
}

impl Pattern {
    /// Whether this pattern counts against the pattern-mix budget.
    pub fn is_patterned(self) -> bool {
        !matches!(self, Pattern::Solid)
    }
}

/// Visual scale of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternScale {
    Micro,
    Small,
    Medium,
    Large,
}

/// Cut volume of a garment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitProfile {
    Slim,
    Regular,
    Relaxed,
    Oversized,
}

impl FitProfile {
    /// Coarse volume bucket for silhouette contrast.
    pub fn volume(self) -> i8 {
        match self {
            FitProfile::Slim => 0,
            FitProfile::Regular => 1,
            FitProfile::Relaxed => 2,
            FitProfile::Oversized => 3,
        }
    }
}

/// Shoulder construction of a layer garment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoulderStructure {
    Structured,
    Soft,
    None,
}

/// How firmly a co-ordinated set binds its members together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohesionPolicy {
    Strict,
    PreferStrict,
    Loose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_class_serde_snake_case() {
        let json = serde_json::to_string(&SlotClass::OnePiece).unwrap();
        assert_eq!(json, "\"one_piece\"");
        let back: SlotClass = serde_json::from_str("\"footwear\"").unwrap();
        assert_eq!(back, SlotClass::Footwear);
    }

    #[test]
    fn test_pattern_other_round_trip() {
        let p: Pattern = serde_json::from_str("\"herringbone\"").unwrap();
        assert_eq!(p, Pattern::Other);
        assert!(p.is_patterned());
    }

    #[test]
    fn test_accessory_partition() {
        let accessories: Vec<_> = SlotClass::ALL
            .iter()
            .filter(|s| s.is_accessory())
            .collect();
        assert_eq!(accessories.len(), 5);
        assert!(!SlotClass::Footwear.is_accessory());
    }
}
