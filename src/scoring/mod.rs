//! Soft scoring: weighted components over bundle state.
//!
//! Every component is a pure function from `(state, ruleset, profile,
//! context)` to a score in `[0, 1]` with an explanation. Weights are
//! renormalized over the evaluated set, each contribution is damped by the
//! minimum confidence of its inputs, and a prefer_strict break deduction is
//! applied last. The reported breakdown reconstructs the aggregate exactly.

mod components;

pub use components::{
    AccessoryConsistency, FormalityCloseness, NoveltyVariety, PaletteHarmony, PatternMix,
    ProportionFit, SilhouetteBalance, SkinSynergy, StyleTagMatch, TemperatureFit,
};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::assembly::PartialBundle;
use crate::color::delta_e2000;
use crate::items::{CohesionPolicy, CoordGroup, Item};
use crate::profile::{Context, Profile};
use crate::rules::{RuleSet, Weights};

/// Identity of a soft component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKey {
    PaletteHarmony,
    PatternMix,
    SilhouetteBalance,
    FormalityCloseness,
    TemperatureFit,
    StyleTagMatch,
    NoveltyVariety,
    AccessoryConsistency,
    SkinSynergy,
    ProportionFit,
}

impl ComponentKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKey::PaletteHarmony => "palette_harmony",
            ComponentKey::PatternMix => "pattern_mix",
            ComponentKey::SilhouetteBalance => "silhouette_balance",
            ComponentKey::FormalityCloseness => "formality_closeness",
            ComponentKey::TemperatureFit => "temperature_fit",
            ComponentKey::StyleTagMatch => "style_tag_match",
            ComponentKey::NoveltyVariety => "novelty_variety",
            ComponentKey::AccessoryConsistency => "accessory_consistency",
            ComponentKey::SkinSynergy => "skin_synergy",
            ComponentKey::ProportionFit => "proportion_fit",
        }
    }

    /// The configured weight for this component.
    pub fn weight_in(self, weights: &Weights) -> f64 {
        match self {
            ComponentKey::PaletteHarmony => weights.palette_harmony,
            ComponentKey::PatternMix => weights.pattern_mix,
            ComponentKey::SilhouetteBalance => weights.silhouette_balance,
            ComponentKey::FormalityCloseness => weights.formality_closeness,
            ComponentKey::TemperatureFit => weights.temperature_fit,
            ComponentKey::StyleTagMatch => weights.style_tag_match,
            ComponentKey::NoveltyVariety => weights.novelty_variety,
            ComponentKey::AccessoryConsistency => weights.accessory_consistency,
            ComponentKey::SkinSynergy => weights.skin_synergy,
            ComponentKey::ProportionFit => weights.proportion_fit,
        }
    }
}

/// Result of one component evaluation.
#[derive(Debug, Clone)]
pub struct ComponentScore {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Minimum confidence of the inputs that produced the score.
    pub confidence: f64,
    pub explanation: String,
}

impl ComponentScore {
    pub fn new(score: f64, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
        }
    }

    /// The neutral 0.5 a component reports when its inputs are absent.
    pub fn neutral(explanation: impl Into<String>) -> Self {
        Self::new(0.5, 1.0, explanation)
    }
}

/// Request-scoped cache of pairwise CIEDE2000 distances, keyed by ordered
/// item-id pairs. Thread-safe; shared across beam children.
#[derive(Debug, Default)]
pub struct DeltaCache {
    pairs: DashMap<(String, String), f64>,
}

impl DeltaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// ΔE between two items' colors, or `None` when either has no color.
    pub fn between(&self, a: &Item, b: &Item) -> Option<f64> {
        let (ca, cb) = (a.color?, b.color?);
        let key = if a.item_id <= b.item_id {
            (a.item_id.clone(), b.item_id.clone())
        } else {
            (b.item_id.clone(), a.item_id.clone())
        };
        if let Some(hit) = self.pairs.get(&key) {
            return Some(*hit);
        }
        let delta = delta_e2000(ca, cb);
        self.pairs.insert(key, delta);
        Some(delta)
    }

    /// Cached pair count, for diagnostics.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Everything a component may read.
pub struct ScoreInputs<'a> {
    pub state: &'a PartialBundle,
    pub ruleset: &'a RuleSet,
    pub profile: &'a Profile,
    pub context: &'a Context,
    /// Recently worn item ids, most recent first.
    pub history: &'a [String],
    pub deltas: &'a DeltaCache,
    /// Co-ord group documents resolved this request, for the
    /// prefer_strict break deduction.
    pub groups: &'a BTreeMap<String, Arc<CoordGroup>>,
}

impl ScoreInputs<'_> {
    /// prefer_strict groups represented in the state but not worn whole:
    /// some declared member slot is empty or holds a different item.
    fn broken_prefer_strict(&self) -> usize {
        let mut broken: BTreeSet<&str> = BTreeSet::new();
        for (_, item) in self.state.items_with_policy(CohesionPolicy::PreferStrict) {
            let Some(group_id) = item.group_id.as_deref() else {
                continue;
            };
            let Some(group) = self.groups.get(group_id) else {
                continue;
            };
            let whole = group.member_slots.iter().all(|(slot, member_id)| {
                self.state
                    .get(*slot)
                    .is_some_and(|committed| committed.item_id == *member_id)
            });
            if !whole {
                broken.insert(group_id);
            }
        }
        broken.len()
    }
}

/// A single soft-scoring component.
pub trait SoftComponent: Send + Sync {
    fn key(&self) -> ComponentKey;
    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore;
}

/// One line of the reported breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub key: ComponentKey,
    pub score: f64,
    /// Normalized weight actually applied.
    pub weight: f64,
    pub confidence: f64,
    pub explanation: String,
}

/// The aggregate and its reported parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub aggregate: f64,
    /// Deduction applied for broken prefer_strict sets.
    pub penalty: f64,
    pub components: Vec<ComponentReport>,
}

impl ScoreBreakdown {
    /// Recompute the aggregate from the reported parts. Matches
    /// [`ScoreBreakdown::aggregate`] to within 1e-9.
    pub fn reconstruct(&self) -> f64 {
        let weighted: f64 = self
            .components
            .iter()
            .map(|c| c.weight * c.score * c.confidence)
            .sum();
        (weighted - self.penalty).clamp(0.0, 1.0)
    }
}

/// The component registry plus aggregation.
pub struct Scorer {
    components: Vec<Box<dyn SoftComponent>>,
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.components.iter().map(|c| c.key().as_str()).collect();
        f.debug_struct("Scorer").field("components", &keys).finish()
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            components: vec![
                Box::new(PaletteHarmony),
                Box::new(PatternMix),
                Box::new(SilhouetteBalance),
                Box::new(FormalityCloseness),
                Box::new(TemperatureFit),
                Box::new(StyleTagMatch),
                Box::new(NoveltyVariety),
                Box::new(AccessoryConsistency),
                Box::new(SkinSynergy),
                Box::new(ProportionFit),
            ],
        }
    }
}

impl Scorer {
    pub fn new(components: Vec<Box<dyn SoftComponent>>) -> Self {
        Self { components }
    }

    /// Score a bundle state and report the full breakdown.
    pub fn score(&self, inputs: &ScoreInputs<'_>) -> ScoreBreakdown {
        let weights = &inputs.ruleset.weights;
        let total: f64 = self
            .components
            .iter()
            .map(|c| c.key().weight_in(weights))
            .sum();
        if total <= 0.0 {
            log::warn!("all scoring weights are zero; returning neutral aggregate");
            return ScoreBreakdown {
                aggregate: 0.5,
                penalty: 0.0,
                components: Vec::new(),
            };
        }

        let mut components = Vec::with_capacity(self.components.len());
        let mut aggregate = 0.0;
        for component in &self.components {
            let weight = component.key().weight_in(weights) / total;
            let result = component.score(inputs);
            aggregate += weight * result.score * result.confidence;
            components.push(ComponentReport {
                key: component.key(),
                score: result.score,
                weight,
                confidence: result.confidence,
                explanation: result.explanation,
            });
        }

        let penalty = inputs.ruleset.thresholds.prefer_strict_break_penalty
            * inputs.broken_prefer_strict() as f64;
        ScoreBreakdown {
            aggregate: (aggregate - penalty).clamp(0.0, 1.0),
            penalty,
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::items::{Owner, SlotClass, TemperatureBand};

    fn inputs_fixture() -> (PartialBundle, RuleSet, Profile, Context) {
        let state = PartialBundle::new().committing(
            SlotClass::Top,
            Arc::new(Item::new(
                "shirt",
                Owner::Wardrobe,
                "shirt",
                SlotClass::Top,
                3,
                [TemperatureBand::Mild],
            )),
        );
        (
            state,
            RuleSet::builtin(1),
            Profile::new("u1", 3),
            Context::new("casual", TemperatureBand::Mild),
        )
    }

    fn no_groups() -> BTreeMap<String, Arc<CoordGroup>> {
        BTreeMap::new()
    }

    #[test]
    fn test_aggregate_within_bounds_and_reconstructs() {
        let (state, ruleset, profile, context) = inputs_fixture();
        let deltas = DeltaCache::new();
        let groups = no_groups();
        let inputs = ScoreInputs {
            state: &state,
            ruleset: &ruleset,
            profile: &profile,
            context: &context,
            history: &[],
            deltas: &deltas,
            groups: &groups,
        };
        let breakdown = Scorer::default().score(&inputs);
        assert!((0.0..=1.0).contains(&breakdown.aggregate));
        for c in &breakdown.components {
            assert!((0.0..=1.0).contains(&c.score), "{:?}", c.key);
        }
        assert!((breakdown.reconstruct() - breakdown.aggregate).abs() < 1e-9);
    }

    #[test]
    fn test_weights_renormalize_to_one() {
        let (state, ruleset, profile, context) = inputs_fixture();
        let deltas = DeltaCache::new();
        let groups = no_groups();
        let inputs = ScoreInputs {
            state: &state,
            ruleset: &ruleset,
            profile: &profile,
            context: &context,
            history: &[],
            deltas: &deltas,
            groups: &groups,
        };
        let breakdown = Scorer::default().score(&inputs);
        let sum: f64 = breakdown.components.iter().map(|c| c.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_broken_prefer_strict_set_is_penalized() {
        let ruleset = RuleSet::builtin(1);
        let profile = Profile::new("u1", 3);
        let context = Context::new("casual", TemperatureBand::Mild);
        let deltas = DeltaCache::new();

        let member = |id: &str, role: &str, slot| {
            Arc::new(
                Item::new(id, Owner::Wardrobe, role, slot, 3, [TemperatureBand::Mild])
                    .with_group("k1", role, "knit_set", CohesionPolicy::PreferStrict),
            )
        };
        let mut groups = BTreeMap::new();
        groups.insert(
            "k1".to_string(),
            Arc::new(CoordGroup::new(
                "k1",
                "knit_set",
                CohesionPolicy::PreferStrict,
                [
                    (SlotClass::Top, "k1-top".to_string()),
                    (SlotClass::Bottom, "k1-bottom".to_string()),
                ],
            )),
        );

        let whole = PartialBundle::new()
            .committing(SlotClass::Top, member("k1-top", "tee", SlotClass::Top))
            .committing(
                SlotClass::Bottom,
                member("k1-bottom", "trousers", SlotClass::Bottom),
            );
        let broken = PartialBundle::new()
            .committing(SlotClass::Top, member("k1-top", "tee", SlotClass::Top));

        let score_of = |state: &PartialBundle| {
            Scorer::default().score(&ScoreInputs {
                state,
                ruleset: &ruleset,
                profile: &profile,
                context: &context,
                history: &[],
                deltas: &deltas,
                groups: &groups,
            })
        };
        assert_eq!(score_of(&whole).penalty, 0.0);
        let penalized = score_of(&broken);
        assert!((penalized.penalty - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_delta_cache_memoizes() {
        use crate::color::Lch;
        let deltas = DeltaCache::new();
        let a = Item::new(
            "a",
            Owner::Wardrobe,
            "shirt",
            SlotClass::Top,
            3,
            [TemperatureBand::Mild],
        )
        .with_color(Lch::new(50.0, 40.0, 20.0).unwrap());
        let b = Item::new(
            "b",
            Owner::Wardrobe,
            "trousers",
            SlotClass::Bottom,
            3,
            [TemperatureBand::Mild],
        )
        .with_color(Lch::new(30.0, 20.0, 200.0).unwrap());
        let first = deltas.between(&a, &b).unwrap();
        let second = deltas.between(&b, &a).unwrap();
        assert_eq!(first, second);
        assert_eq!(deltas.len(), 1);
        let no_color = Item::new(
            "c",
            Owner::Wardrobe,
            "shirt",
            SlotClass::Top,
            3,
            [TemperatureBand::Mild],
        );
        assert!(deltas.between(&a, &no_color).is_none());
    }
}
