//! Rule sets: the versioned, immutable bundle of layering graph, templates,
//! constraint parameters, scoring weights, and thresholds.
//!
//! Rule sets are read-only within a request; the engine captures an `Arc`
//! snapshot from the provider once at request entry.

mod layering;
mod templates;
mod weights;

pub use layering::{LayeringCycle, LayeringGraph};
pub use templates::{SlotRequirement, Template, TemplateSlot};
pub use weights::{AccessoryMode, Thresholds, Weights};

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::items::SlotClass;
use crate::profile::Profile;

/// Failure to materialize a rule set from its persisted payload.
#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("malformed rule set payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Layering(#[from] LayeringCycle),

    #[error("rule set declares invalid weights")]
    InvalidWeights,

    #[error("template '{template_id}' does not list its anchor slot")]
    AnchorNotInTemplate { template_id: String },
}

/// The immutable, versioned rule bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub ruleset_id: String,
    pub version: u64,
    pub layering: LayeringGraph,
    pub templates: Vec<Template>,
    pub weights: Weights,
    pub thresholds: Thresholds,
    pub accessory_mode: AccessoryMode,
}

impl RuleSet {
    /// Parse a rule set out of its persisted JSON payload.
    pub fn from_payload(
        ruleset_id: impl Into<String>,
        version: u64,
        payload: &serde_json::Value,
    ) -> Result<Self, RuleSetError> {
        #[derive(Deserialize)]
        #[serde(default)]
        struct Payload {
            layering: LayeringGraph,
            templates: Vec<Template>,
            weights: Weights,
            thresholds: Thresholds,
            accessory_mode: AccessoryMode,
        }
        impl Default for Payload {
            fn default() -> Self {
                Self {
                    layering: LayeringGraph::standard(),
                    templates: builtin_templates(),
                    weights: Weights::default(),
                    thresholds: Thresholds::default(),
                    accessory_mode: AccessoryMode::default(),
                }
            }
        }

        let parsed: Payload = serde_json::from_value(payload.clone())?;
        if !parsed.weights.is_valid() {
            return Err(RuleSetError::InvalidWeights);
        }
        for template in &parsed.templates {
            if !template.includes(template.anchor) {
                return Err(RuleSetError::AnchorNotInTemplate {
                    template_id: template.template_id.clone(),
                });
            }
        }
        Ok(Self {
            ruleset_id: ruleset_id.into(),
            version,
            layering: parsed.layering,
            templates: parsed.templates,
            weights: parsed.weights,
            thresholds: parsed.thresholds,
            accessory_mode: parsed.accessory_mode,
        })
    }

    /// The built-in rule set at a given version, used by hosts without a
    /// published one and by tests.
    pub fn builtin(version: u64) -> Self {
        Self {
            ruleset_id: "builtin".to_string(),
            version,
            layering: LayeringGraph::standard(),
            templates: builtin_templates(),
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            accessory_mode: AccessoryMode::default(),
        }
    }

    /// Select the template for an occasion and dressiness target.
    ///
    /// Ties break by profile affinity (descending), then template id.
    pub fn template_for(
        &self,
        occasion: &str,
        dressiness: u8,
        profile: &Profile,
    ) -> Option<&Template> {
        let mut matching: Vec<&Template> = self
            .templates
            .iter()
            .filter(|t| t.matches(occasion, dressiness))
            .collect();
        matching.sort_by(|a, b| {
            b.affinity(profile)
                .cmp(&a.affinity(profile))
                .then_with(|| a.template_id.cmp(&b.template_id))
        });
        matching.first().copied()
    }

    /// Shortlist size for a slot under this rule set.
    pub fn shortlist_size(&self, slot: SlotClass, anchor: SlotClass) -> usize {
        if slot == anchor {
            self.thresholds.anchor_shortlist
        } else {
            self.thresholds.slot_shortlist
        }
    }
}

/// The built-in template registry.
fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            template_id: "casual_day".into(),
            occasion: "casual".into(),
            dressiness_lo: 1,
            dressiness_hi: 3,
            anchor: SlotClass::OnePiece,
            slots: vec![
                TemplateSlot::optional(SlotClass::OnePiece),
                TemplateSlot::core(SlotClass::Top),
                TemplateSlot::core(SlotClass::Bottom),
                TemplateSlot::optional(SlotClass::Mid),
                TemplateSlot::optional(SlotClass::Outer),
                TemplateSlot::required(SlotClass::Footwear),
                TemplateSlot::optional(SlotClass::Bag),
            ],
            style_tags: ["casual"].into_iter().map(String::from).collect(),
        },
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
            style_tags: ["tailored", "classic"].into_iter().map(String::from).collect(),
        },
        Template {
            template_id: "evening_out".into(),
            occasion: "evening".into(),
            dressiness_lo: 3,
            dressiness_hi: 5,
            anchor: SlotClass::OnePiece,
            slots: vec![
                TemplateSlot::optional(SlotClass::OnePiece),
                TemplateSlot::core(SlotClass::Top),
                TemplateSlot::core(SlotClass::Bottom),
                TemplateSlot::optional(SlotClass::Outer),
                TemplateSlot::required(SlotClass::Footwear),
                TemplateSlot::optional(SlotClass::Jewelry),
                TemplateSlot::optional(SlotClass::Bag),
            ],
            style_tags: ["evening"].into_iter().map(String::from).collect(),
        },
        Template {
            template_id: "lounge_home".into(),
            occasion: "lounge".into(),
            dressiness_lo: 1,
            dressiness_hi: 2,
            anchor: SlotClass::Top,
            slots: vec![
                TemplateSlot::core(SlotClass::Top),
                TemplateSlot::core(SlotClass::Bottom),
                TemplateSlot::optional(SlotClass::OnePiece),
                TemplateSlot::optional(SlotClass::Mid),
                TemplateSlot::optional(SlotClass::Footwear),
            ],
            style_tags: ["comfort"].into_iter().map(String::from).collect(),
        },
    ]
}

/// Source of the current rule set, captured once per request.
pub trait RuleSetProvider: Send + Sync + fmt::Debug {
    /// The currently published rule set.
    fn current(&self) -> Arc<RuleSet>;
}

/// In-process provider holding the latest published rule set.
#[derive(Debug)]
pub struct StaticRuleSets {
    current: RwLock<Arc<RuleSet>>,
}

impl StaticRuleSets {
    pub fn new(ruleset: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(ruleset)),
        }
    }

    /// Publish a new version; subsequent requests capture it.
    pub fn publish(&self, ruleset: RuleSet) {
        *self.current.write() = Arc::new(ruleset);
    }
}

impl RuleSetProvider for StaticRuleSets {
    fn current(&self) -> Arc<RuleSet> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_parses_from_empty_payload() {
        let rules = RuleSet::from_payload("rs-1", 7, &serde_json::json!({})).unwrap();
        assert_eq!(rules.version, 7);
        assert!(!rules.templates.is_empty());
        assert_eq!(rules.thresholds.beam_width, 8);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let payload = serde_json::json!({"weights": {"palette_harmony": -1.0}});
        let err = RuleSet::from_payload("rs-1", 1, &payload).unwrap_err();
        assert!(matches!(err, RuleSetError::InvalidWeights));
    }

    #[test]
    fn test_template_selection_matches_occasion_and_range() {
        let rules = RuleSet::builtin(1);
        let profile = Profile::new("u1", 3);
        let t = rules.template_for("work_office", 4, &profile).unwrap();
        assert_eq!(t.template_id, "work_office_core");
        assert!(rules.template_for("work_office", 1, &profile).is_none());
        assert!(rules.template_for("regatta", 3, &profile).is_none());
    }

    #[test]
    fn test_template_selection_tie_breaks_by_id() {
        let mut rules = RuleSet::builtin(1);
        let mut clone = rules.templates[1].clone();
        clone.template_id = "aa_work_alt".into();
        clone.style_tags.clear();
        rules.templates.push(clone);
        let profile = Profile::new("u1", 3);
        // Equal affinity (empty signature): lexicographically first id wins.
        let t = rules.template_for("work_office", 4, &profile).unwrap();
        assert_eq!(t.template_id, "aa_work_alt");
        // Affinity with the tagged template outranks the id order.
        let profile = profile.with_signature(["tailored"]);
        let t = rules.template_for("work_office", 4, &profile).unwrap();
        assert_eq!(t.template_id, "work_office_core");
    }

    #[test]
    fn test_provider_publish_swaps_snapshot() {
        let provider = StaticRuleSets::new(RuleSet::builtin(1));
        let before = provider.current();
        provider.publish(RuleSet::builtin(2));
        assert_eq!(before.version, 1);
        assert_eq!(provider.current().version, 2);
    }
}
