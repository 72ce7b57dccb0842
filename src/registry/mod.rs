//! Attribute registry: which attributes apply to which garment roles.
//!
//! The registry is immutable for the process lifetime. Hosts validate items
//! against it at ingress; the engine assumes validity from then on.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::items::{Item, SlotClass};

/// Lexical shape of roles, set roles, and style tags.
static NAME_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex"));

/// Attribute field names used in applicability declarations and in the
/// per-attribute confidence map.
pub mod fields {
    pub const COLOR: &str = "color";
    pub const PATTERN: &str = "pattern";
    pub const PATTERN_SCALE: &str = "pattern_scale";
    pub const MATERIAL: &str = "material";
    pub const STYLE_TAGS: &str = "style_tags";
    pub const FIT_PROFILE: &str = "fit_profile";
    pub const TOP_LENGTH_CLASS: &str = "top_length_class";
    pub const BOTTOM_RISE_CLASS: &str = "bottom_rise_class";
    pub const SHOULDER_STRUCTURE: &str = "shoulder_structure";
    pub const COORD_GROUP: &str = "coord_group";
    pub const LEATHER_FAMILY: &str = "leather_family";
    pub const METAL_FAMILY: &str = "metal_family";
    pub const METAL_FINISH: &str = "metal_finish";
    pub const BAG_KIND: &str = "bag_kind";
    pub const JEWELRY_KIND: &str = "jewelry_kind";
    pub const FOOTWEAR_CLASS: &str = "footwear_class";
    pub const HAS_BELT_LOOPS: &str = "has_belt_loops";
    pub const FORMALITY: &str = "formality";
    pub const SEASONALITY: &str = "seasonality";
}

/// A single ingress validation failure.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum AttributeViolation {
    #[error("unknown role '{role}'")]
    UnknownRole { role: String },

    #[error("role '{role}' is slot-typed {expected:?}, item declares {found:?}")]
    SlotMismatch {
        role: String,
        expected: SlotClass,
        found: SlotClass,
    },

    #[error("field '{field}' is not applicable to role '{role}'")]
    FieldNotApplicable { role: String, field: String },

    #[error("formality {value} outside 1..=5")]
    FormalityOutOfRange { value: u8 },

    #[error("seasonality must not be empty")]
    EmptySeasonality,

    #[error("color component {component} out of range: {value}")]
    ColorOutOfRange { component: String, value: f64 },

    #[error("co-ord fields must be set together; '{missing}' is absent")]
    IncompleteCoordFields { missing: String },

    #[error("confidence for '{field}' is {value}, outside [0, 1]")]
    ConfidenceOutOfRange { field: String, value: f64 },

    #[error("name '{value}' does not match the required shape")]
    MalformedName { value: String },
}

/// Declaration of a role: its slot class and applicable attribute fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub slot: SlotClass,
    pub applicable: BTreeSet<String>,
}

/// Immutable registry of roles and attribute applicability.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    roles: BTreeMap<String, RoleSpec>,
}

impl AttributeRegistry {
    /// Empty registry; add roles with [`AttributeRegistry::with_role`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide default registry covering the common garment roles.
    pub fn global() -> &'static AttributeRegistry {
        static GLOBAL: Lazy<AttributeRegistry> = Lazy::new(AttributeRegistry::default_roles);
        &GLOBAL
    }

    /// Register a role with its slot class and applicable fields beyond the
    /// always-applicable core (formality, seasonality, style tags, co-ord
    /// membership, pattern).
    pub fn with_role<I, S>(mut self, role: &str, slot: SlotClass, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut applicable: BTreeSet<String> = [
            fields::FORMALITY,
            fields::SEASONALITY,
            fields::COLOR,
            fields::PATTERN,
            fields::PATTERN_SCALE,
            fields::MATERIAL,
            fields::STYLE_TAGS,
            fields::COORD_GROUP,
        ]
        .into_iter()
        .map(String::from)
        .collect();
        applicable.extend(extra.into_iter().map(Into::into));
        self.roles
            .insert(role.to_string(), RoleSpec { slot, applicable });
        self
    }

    /// The registry shipped as process default.
    pub fn default_roles() -> Self {
        use fields::*;
        let layer_fit = [FIT_PROFILE, TOP_LENGTH_CLASS, SHOULDER_STRUCTURE];
        Self::new()
            .with_role("shirt", SlotClass::Top, layer_fit)
            .with_role("tee", SlotClass::Top, layer_fit)
            .with_role("blouse", SlotClass::Top, layer_fit)
            .with_role("sweater", SlotClass::Mid, layer_fit)
            .with_role("cardigan", SlotClass::Mid, layer_fit)
            .with_role("vest", SlotClass::Mid, layer_fit)
            .with_role("jacket", SlotClass::Outer, layer_fit)
            .with_role("blazer", SlotClass::Outer, layer_fit)
            .with_role("coat", SlotClass::Outer, layer_fit)
            .with_role(
                "trousers",
                SlotClass::Bottom,
                [FIT_PROFILE, BOTTOM_RISE_CLASS, HAS_BELT_LOOPS],
            )
            .with_role(
                "jeans",
                SlotClass::Bottom,
                [FIT_PROFILE, BOTTOM_RISE_CLASS, HAS_BELT_LOOPS],
            )
            .with_role("skirt", SlotClass::Bottom, [FIT_PROFILE, BOTTOM_RISE_CLASS])
            .with_role(
                "shorts",
                SlotClass::Bottom,
                [FIT_PROFILE, BOTTOM_RISE_CLASS, HAS_BELT_LOOPS],
            )
            .with_role("dress", SlotClass::OnePiece, [FIT_PROFILE, TOP_LENGTH_CLASS])
            .with_role("jumpsuit", SlotClass::OnePiece, [FIT_PROFILE])
            .with_role(
                "shoes",
                SlotClass::Footwear,
                [FOOTWEAR_CLASS, LEATHER_FAMILY],
            )
            .with_role(
                "boots",
                SlotClass::Footwear,
                [FOOTWEAR_CLASS, LEATHER_FAMILY],
            )
            .with_role(
                "sneakers",
                SlotClass::Footwear,
                [FOOTWEAR_CLASS, LEATHER_FAMILY],
            )
            .with_role("bag", SlotClass::Bag, [BAG_KIND, LEATHER_FAMILY, METAL_FAMILY, METAL_FINISH])
            .with_role("belt", SlotClass::Belt, [LEATHER_FAMILY, METAL_FAMILY, METAL_FINISH])
            .with_role(
                "jewelry",
                SlotClass::Jewelry,
                [JEWELRY_KIND, METAL_FAMILY, METAL_FINISH],
            )
            .with_role("hat", SlotClass::Headwear, [MATERIAL])
            .with_role("scarf", SlotClass::Headwear, [MATERIAL])
            .with_role("socks", SlotClass::Hosiery, [MATERIAL])
            .with_role("tights", SlotClass::Hosiery, [MATERIAL])
    }

    /// Fields applicable to a role, or `None` for unknown roles.
    pub fn applicable_fields(&self, role: &str) -> Option<&BTreeSet<String>> {
        self.roles.get(role).map(|spec| &spec.applicable)
    }

    /// The slot class a role is typed to.
    pub fn slot_of(&self, role: &str) -> Option<SlotClass> {
        self.roles.get(role).map(|spec| spec.slot)
    }

    /// Validate an item document at ingress.
    ///
    /// Returns every violation found, not just the first.
    pub fn validate(&self, item: &Item) -> Result<(), Vec<AttributeViolation>> {
        let mut violations = Vec::new();

        if !NAME_SHAPE.is_match(&item.role) {
            violations.push(AttributeViolation::MalformedName {
                value: item.role.clone(),
            });
        }
        for tag in &item.style_tags {
            if !NAME_SHAPE.is_match(tag) {
                violations.push(AttributeViolation::MalformedName { value: tag.clone() });
            }
        }

        let spec = match self.roles.get(&item.role) {
            Some(spec) => spec,
            None => {
                violations.push(AttributeViolation::UnknownRole {
                    role: item.role.clone(),
                });
                return Err(violations);
            }
        };

        if spec.slot != item.slot {
            violations.push(AttributeViolation::SlotMismatch {
                role: item.role.clone(),
                expected: spec.slot,
                found: item.slot,
            });
        }

        if !(1..=5).contains(&item.formality) {
            violations.push(AttributeViolation::FormalityOutOfRange {
                value: item.formality,
            });
        }
        if item.seasonality.is_empty() {
            violations.push(AttributeViolation::EmptySeasonality);
        }

        if let Some(color) = item.color {
            if !(0.0..=100.0).contains(&color.l) {
                violations.push(AttributeViolation::ColorOutOfRange {
                    component: "L".into(),
                    value: color.l,
                });
            }
            if !(0.0..=150.0).contains(&color.c) {
                violations.push(AttributeViolation::ColorOutOfRange {
                    component: "C".into(),
                    value: color.c,
                });
            }
            if !(0.0..360.0).contains(&color.h) {
                violations.push(AttributeViolation::ColorOutOfRange {
                    component: "h".into(),
                    value: color.h,
                });
            }
        }

        self.check_coord_fields(item, &mut violations);
        self.check_applicability(item, spec, &mut violations);

        for (field, value) in &item.confidence {
            if !(0.0..=1.0).contains(value) {
                violations.push(AttributeViolation::ConfidenceOutOfRange {
                    field: field.clone(),
                    value: *value,
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Co-ord membership fields are all-or-none.
    fn check_coord_fields(&self, item: &Item, violations: &mut Vec<AttributeViolation>) {
        let any = item.group_id.is_some()
            || item.set_role.is_some()
            || item.coord_set_kind.is_some()
            || item.set_cohesion_policy.is_some();
        if !any {
            return;
        }
        for (present, name) in [
            (item.group_id.is_some(), "group_id"),
            (item.set_role.is_some(), "set_role"),
            (item.coord_set_kind.is_some(), "coord_set_kind"),
            (item.set_cohesion_policy.is_some(), "set_cohesion_policy"),
        ] {
            if !present {
                violations.push(AttributeViolation::IncompleteCoordFields {
                    missing: name.to_string(),
                });
            }
        }
        if let Some(set_role) = &item.set_role {
            if !NAME_SHAPE.is_match(set_role) {
                violations.push(AttributeViolation::MalformedName {
                    value: set_role.clone(),
                });
            }
        }
    }

    /// Every present optional field must be declared applicable to the role.
    fn check_applicability(
        &self,
        item: &Item,
        spec: &RoleSpec,
        violations: &mut Vec<AttributeViolation>,
    ) {
        let present: [(bool, &str); 12] = [
            (item.fit_profile.is_some(), fields::FIT_PROFILE),
            (item.top_length_class.is_some(), fields::TOP_LENGTH_CLASS),
            (item.bottom_rise_class.is_some(), fields::BOTTOM_RISE_CLASS),
            (
                item.shoulder_structure.is_some(),
                fields::SHOULDER_STRUCTURE,
            ),
            (item.group_id.is_some(), fields::COORD_GROUP),
            (item.leather_family.is_some(), fields::LEATHER_FAMILY),
            (item.metal_family.is_some(), fields::METAL_FAMILY),
            (item.metal_finish.is_some(), fields::METAL_FINISH),
            (item.bag_kind.is_some(), fields::BAG_KIND),
            (item.jewelry_kind.is_some(), fields::JEWELRY_KIND),
            (item.footwear_class.is_some(), fields::FOOTWEAR_CLASS),
            (item.has_belt_loops, fields::HAS_BELT_LOOPS),
        ];
        for (is_present, field) in present {
            if is_present && !spec.applicable.contains(field) {
                violations.push(AttributeViolation::FieldNotApplicable {
                    role: item.role.clone(),
                    field: field.to_string(),
                });
            }
        }
    }
}
