//! The item document: identity, core attributes, fit, co-ord membership,
//! accessory families, and per-attribute provenance confidence.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::color::Lch;

use super::{
    CohesionPolicy, FitProfile, Owner, Pattern, PatternScale, ShoulderStructure, SlotClass,
    TemperatureBand,
};

/// A garment item as read from the candidate index.
///
/// Attributes are sparse: a field is present only when the attribute
/// registry declares it applicable to the item's role and the source
/// asserted or inferred it. Downstream engine code assumes items have
/// passed ingress validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier, also the final tie-break key everywhere.
    pub item_id: String,
    /// Owning user for wardrobe items; `None` for catalog items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub owner: Owner,

    // ---- Core ----
    /// Role tag from the attribute registry (e.g. `shirt`, `trousers`).
    pub role: String,
    pub slot: SlotClass,
    /// Dressiness 1 (casual) to 5 (formal).
    pub formality: u8,
    /// Temperature bands this item suits; never empty.
    pub seasonality: BTreeSet<TemperatureBand>,
    /// Dominant color; may be absent when the pattern carries the color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Lch>,
    #[serde(default)]
    pub pattern: Pattern,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_scale: Option<PatternScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default)]
    pub style_tags: BTreeSet<String>,

    // ---- Fit ----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_profile: Option<FitProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_length_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_rise_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoulder_structure: Option<ShoulderStructure>,

    // ---- Co-ord membership (all-or-none) ----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coord_set_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_cohesion_policy: Option<CohesionPolicy>,

    // ---- Accessories ----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leather_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_finish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bag_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jewelry_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footwear_class: Option<String>,
    /// Whether a bottom garment has belt loops (drives the belt rule).
    #[serde(default)]
    pub has_belt_loops: bool,

    // ---- Provenance ----
    /// Per-attribute confidence for inferred fields. Absent key means the
    /// field was asserted (confidence 1.0).
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create an item with the identity core; everything else defaults to
    /// absent and can be layered on with the `with_` builders.
    pub fn new(
        item_id: impl Into<String>,
        owner: Owner,
        role: impl Into<String>,
        slot: SlotClass,
        formality: u8,
        seasonality: impl IntoIterator<Item = TemperatureBand>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: None,
            owner,
            role: role.into(),
            slot,
            formality,
            seasonality: seasonality.into_iter().collect(),
            color: None,
            pattern: Pattern::Solid,
            pattern_scale: None,
            material: None,
            style_tags: BTreeSet::new(),
            fit_profile: None,
            top_length_class: None,
            bottom_rise_class: None,
            shoulder_structure: None,
            group_id: None,
            set_role: None,
            coord_set_kind: None,
            set_cohesion_policy: None,
            leather_family: None,
            metal_family: None,
            metal_finish: None,
            bag_kind: None,
            jewelry_kind: None,
            footwear_class: None,
            has_belt_loops: false,
            confidence: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Attach the owning user id (wardrobe items).
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the dominant color.
    pub fn with_color(mut self, color: Lch) -> Self {
        self.color = Some(color);
        self
    }

    /// Set pattern and scale.
    pub fn with_pattern(mut self, pattern: Pattern, scale: Option<PatternScale>) -> Self {
        self.pattern = pattern;
        self.pattern_scale = scale;
        self
    }

    /// Add style tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.style_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set the fit profile.
    pub fn with_fit(mut self, fit: FitProfile) -> Self {
        self.fit_profile = Some(fit);
        self
    }

    /// Join a co-ordinated set. All four membership fields are set together.
    pub fn with_group(
        mut self,
        group_id: impl Into<String>,
        set_role: impl Into<String>,
        kind: impl Into<String>,
        policy: CohesionPolicy,
    ) -> Self {
        self.group_id = Some(group_id.into());
        self.set_role = Some(set_role.into());
        self.coord_set_kind = Some(kind.into());
        self.set_cohesion_policy = Some(policy);
        self
    }

    /// Record a per-attribute confidence value.
    pub fn with_confidence(mut self, field: impl Into<String>, value: f64) -> Self {
        self.confidence.insert(field.into(), value);
        self
    }

    /// Confidence for one attribute; asserted fields default to 1.0.
    pub fn confidence_for(&self, field: &str) -> f64 {
        self.confidence.get(field).copied().unwrap_or(1.0)
    }

    /// Minimum confidence across the named attributes.
    pub fn min_confidence<'a, I>(&self, fields: I) -> f64
    where
        I: IntoIterator<Item = &'a str>,
    {
        fields
            .into_iter()
            .map(|f| self.confidence_for(f))
            .fold(1.0_f64, f64::min)
    }

    /// Whether this item comes from the global catalog.
    pub fn is_catalog(&self) -> bool {
        self.owner == Owner::Catalog
    }

    /// Whether the item belongs to a set with the given policy.
    pub fn has_policy(&self, policy: CohesionPolicy) -> bool {
        self.set_cohesion_policy == Some(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> Item {
        Item::new(
            "itm-shirt-1",
            Owner::Wardrobe,
            "shirt",
            SlotClass::Top,
            4,
            [TemperatureBand::Warm, TemperatureBand::Mild],
        )
        .with_user("user-1")
        .with_confidence("color", 0.8)
    }

    #[test]
    fn test_confidence_defaults_to_asserted() {
        let item = shirt();
        assert_eq!(item.confidence_for("formality"), 1.0);
        assert_eq!(item.confidence_for("color"), 0.8);
        let min = item.min_confidence(["formality", "color", "seasonality"]);
        assert_eq!(min, 0.8);
    }

    #[test]
    fn test_group_builder_sets_all_fields() {
        let item = shirt().with_group("g1", "jacket", "suit", CohesionPolicy::Strict);
        assert_eq!(item.group_id.as_deref(), Some("g1"));
        assert_eq!(item.set_role.as_deref(), Some("jacket"));
        assert_eq!(item.coord_set_kind.as_deref(), Some("suit"));
        assert!(item.has_policy(CohesionPolicy::Strict));
    }

    #[test]
    fn test_serde_omits_absent_fields() {
        let json = serde_json::to_value(shirt()).unwrap();
        assert!(json.get("group_id").is_none());
        assert!(json.get("color").is_none());
        assert_eq!(json["pattern"], "solid");
    }
}
