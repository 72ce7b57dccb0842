//! The built-in soft components.

use std::collections::{BTreeMap, BTreeSet};

use crate::color::{circular_std_dev, delta_e2000, relation, HueRelation, Lch};
use crate::items::{PatternScale, ShoulderStructure, SlotClass, TemperatureBand};
use crate::profile::SynergyStyle;
use crate::registry::fields;

use super::{ComponentKey, ComponentScore, ScoreInputs, SoftComponent};

/// Relation preference order for dominant-relation ties.
const RELATION_ORDER: [HueRelation; 5] = [
    HueRelation::Same,
    HueRelation::Analogous,
    HueRelation::Complementary,
    HueRelation::Triadic,
    HueRelation::Unrelated,
];

fn relation_base(rel: HueRelation) -> f64 {
    match rel {
        HueRelation::Same => 0.8,
        HueRelation::Analogous => 0.9,
        HueRelation::Complementary => 0.85,
        HueRelation::Triadic => 0.7,
        HueRelation::Unrelated => 0.3,
    }
}

/// Pairwise hue relations over chromatic items; neutrals boost.
pub struct PaletteHarmony;

impl SoftComponent for PaletteHarmony {
    fn key(&self) -> ComponentKey {
        ComponentKey::PaletteHarmony
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let c_neutral = inputs.ruleset.thresholds.c_neutral;
        let mut chromatic: Vec<Lch> = Vec::new();
        let mut neutrals = 0usize;
        let mut confidence = 1.0_f64;

        for item in inputs.state.items() {
            let Some(color) = item.color else { continue };
            confidence = confidence.min(item.confidence_for(fields::COLOR));
            if color.is_neutral(c_neutral) {
                neutrals += 1;
            } else {
                chromatic.push(color);
            }
        }

        let boost = (0.05 * neutrals as f64).min(0.1);
        if chromatic.len() < 2 {
            let score = 0.85 + boost;
            return ComponentScore::new(
                score,
                confidence,
                format!("{} chromatic items; {neutrals} neutrals", chromatic.len()),
            );
        }

        let mut counts: BTreeMap<HueRelation, usize> = BTreeMap::new();
        for (i, a) in chromatic.iter().enumerate() {
            for b in &chromatic[i + 1..] {
                *counts.entry(relation(*a, *b)).or_insert(0) += 1;
            }
        }
        // Ties on pair counts resolve by the fixed preference order.
        let top_count = counts.values().copied().max().unwrap_or(0);
        let dominant = RELATION_ORDER
            .iter()
            .copied()
            .find(|rel| counts.get(rel).copied().unwrap_or(0) == top_count)
            .unwrap_or(HueRelation::Unrelated);

        let hues: Vec<f64> = chromatic.iter().map(|c| c.h).collect();
        let sigma = circular_std_dev(&hues);
        let score = relation_base(dominant) * (1.0 - (sigma / 60.0).min(1.0)) + boost;
        ComponentScore::new(
            score,
            confidence,
            format!(
                "dominant relation {dominant:?} over {} chromatic items, hue spread {sigma:.1}°, {neutrals} neutrals",
                chromatic.len()
            ),
        )
    }
}

/// Budgeted pattern count with a shared-scale deduction.
pub struct PatternMix;

impl SoftComponent for PatternMix {
    fn key(&self) -> ComponentKey {
        ComponentKey::PatternMix
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let max_patterns = inputs.ruleset.thresholds.max_patterns.max(2) as f64;
        let mut patterned = 0usize;
        let mut scales: BTreeMap<PatternScale, usize> = BTreeMap::new();
        let mut confidence = 1.0_f64;

        for item in inputs.state.items() {
            confidence = confidence.min(item.confidence_for(fields::PATTERN));
            if item.pattern.is_patterned() {
                patterned += 1;
                if let Some(scale) = item.pattern_scale {
                    *scales.entry(scale).or_insert(0) += 1;
                }
            }
        }

        let mut score = 1.0 - ((patterned.saturating_sub(1)) as f64 / (max_patterns - 1.0)).max(0.0);
        let mut shared = 0usize;
        for count in scales.values() {
            if *count >= 2 {
                shared += count - 1;
            }
        }
        score -= 0.1 * shared as f64;
        ComponentScore::new(
            score,
            confidence,
            format!("{patterned} patterned items, {shared} shared-scale clashes"),
        )
    }
}

/// Volume contrast between top and bottom; structured layers budget.
pub struct SilhouetteBalance;

impl SoftComponent for SilhouetteBalance {
    fn key(&self) -> ComponentKey {
        ComponentKey::SilhouetteBalance
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let state = inputs.state;
        let mut confidence = 1.0_f64;

        let fit_of = |slot: SlotClass| {
            state.get(slot).and_then(|item| item.fit_profile)
        };
        for item in state.items() {
            if item.fit_profile.is_some() {
                confidence = confidence.min(item.confidence_for(fields::FIT_PROFILE));
            }
        }

        let (base, detail) = match (fit_of(SlotClass::Top), fit_of(SlotClass::Bottom)) {
            (Some(top), Some(bottom)) => {
                let contrast = (top.volume() - bottom.volume()).abs();
                let base = match contrast {
                    0 => 0.6,
                    1 => 0.8,
                    _ => 1.0,
                };
                (base, format!("top/bottom volume contrast {contrast}"))
            }
            _ => (0.75, "no top/bottom fit pair".to_string()),
        };

        let structured = state
            .items()
            .filter(|i| i.shoulder_structure == Some(ShoulderStructure::Structured))
            .count();
        let penalty = 0.2 * structured.saturating_sub(1) as f64;
        ComponentScore::new(
            base - penalty,
            confidence,
            format!("{detail}, {structured} structured layers"),
        )
    }
}

/// Distance of the weighted formality average from the target.
pub struct FormalityCloseness;

impl SoftComponent for FormalityCloseness {
    fn key(&self) -> ComponentKey {
        ComponentKey::FormalityCloseness
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let target = inputs.context.effective_dressiness(inputs.profile) as f64;
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut confidence = 1.0_f64;

        for (slot, item) in inputs.state.entries() {
            let weight = if matches!(
                slot,
                SlotClass::Top | SlotClass::Outer | SlotClass::Footwear
            ) {
                2.0
            } else {
                1.0
            };
            weighted_sum += weight * item.formality as f64;
            weight_total += weight;
            confidence = confidence.min(item.confidence_for(fields::FORMALITY));
        }

        if weight_total == 0.0 {
            return ComponentScore::neutral("no items committed");
        }
        let avg = weighted_sum / weight_total;
        let score = 1.0 - (avg - target).abs() / 4.0;
        ComponentScore::new(
            score,
            confidence,
            format!("weighted formality {avg:.2} against target {target:.0}"),
        )
    }
}

/// Share of items suited to the band, with a cold-weather outer bonus.
pub struct TemperatureFit;

impl SoftComponent for TemperatureFit {
    fn key(&self) -> ComponentKey {
        ComponentKey::TemperatureFit
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let band = inputs.context.temperature_band;
        let total = inputs.state.len();
        if total == 0 {
            return ComponentScore::neutral("no items committed");
        }
        let mut suited = 0usize;
        let mut confidence = 1.0_f64;
        for item in inputs.state.items() {
            if item.seasonality.contains(&band) {
                suited += 1;
            }
            confidence = confidence.min(item.confidence_for(fields::SEASONALITY));
        }
        let mut score = suited as f64 / total as f64;
        let mut bonus = "";
        if band == TemperatureBand::Cold && inputs.state.contains(SlotClass::Outer) {
            score += 0.1;
            bonus = ", outer layer bonus";
        }
        ComponentScore::new(
            score,
            confidence,
            format!("{suited}/{total} items suit {band:?}{bonus}"),
        )
    }
}

/// Jaccard similarity of bundle tags with the style signature, gated by
/// guardrails.
pub struct StyleTagMatch;

impl SoftComponent for StyleTagMatch {
    fn key(&self) -> ComponentKey {
        ComponentKey::StyleTagMatch
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let mut union: BTreeSet<&str> = BTreeSet::new();
        let mut confidence = 1.0_f64;
        for item in inputs.state.items() {
            if !item.style_tags.is_empty() {
                confidence = confidence.min(item.confidence_for(fields::STYLE_TAGS));
            }
            union.extend(item.style_tags.iter().map(String::as_str));
        }

        let forbidden: Vec<&str> = union
            .iter()
            .copied()
            .filter(|t| inputs.profile.forbidden_tags.contains(*t))
            .collect();
        if !forbidden.is_empty() {
            return ComponentScore::new(
                0.0,
                confidence,
                format!("forbidden tags present: {forbidden:?}"),
            );
        }

        let signature = &inputs.profile.style_signature;
        if signature.is_empty() {
            return ComponentScore::neutral("no style signature declared");
        }
        let intersection = union
            .iter()
            .filter(|t| signature.contains(**t))
            .count();
        let union_size = union.len() + signature.len() - intersection;
        let jaccard = if union_size == 0 {
            0.0
        } else {
            intersection as f64 / union_size as f64
        };
        ComponentScore::new(
            jaccard,
            confidence,
            format!("{intersection} of {} signature tags present", signature.len()),
        )
    }
}

/// Recency-decayed penalty for items worn in the last few outfits.
pub struct NoveltyVariety;

/// Per-step decay applied to the recency rank of a worn item.
const NOVELTY_DECAY: f64 = 0.85;

impl SoftComponent for NoveltyVariety {
    fn key(&self) -> ComponentKey {
        ComponentKey::NoveltyVariety
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let total = inputs.state.len();
        if total == 0 || inputs.history.is_empty() {
            return ComponentScore::new(1.0, 1.0, "no recent wear overlap");
        }
        let window = inputs.ruleset.thresholds.novelty_window;
        let mut rank_of: BTreeMap<&str, usize> = BTreeMap::new();
        for (rank, id) in inputs.history.iter().take(window).enumerate() {
            rank_of.entry(id.as_str()).or_insert(rank);
        }

        let mut worn = 0usize;
        let mut penalty = 0.0;
        for item in inputs.state.items() {
            if let Some(rank) = rank_of.get(item.item_id.as_str()) {
                worn += 1;
                penalty += NOVELTY_DECAY.powi(*rank as i32);
            }
        }
        let score = 1.0 - (penalty / total as f64).min(1.0);
        ComponentScore::new(
            score,
            1.0,
            format!("{worn}/{total} items worn recently"),
        )
    }
}

/// Leather and metal family agreement across accessories.
pub struct AccessoryConsistency;

impl SoftComponent for AccessoryConsistency {
    fn key(&self) -> ComponentKey {
        ComponentKey::AccessoryConsistency
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        use crate::rules::AccessoryMode;

        let mode = inputs.ruleset.accessory_mode;
        if mode == AccessoryMode::Free {
            return ComponentScore::new(1.0, 1.0, "accessory mode free");
        }

        let mut leather: BTreeSet<&str> = BTreeSet::new();
        let mut metal: BTreeSet<(&str, &str)> = BTreeSet::new();
        let mut confidence = 1.0_f64;
        for item in inputs.state.items() {
            if let Some(family) = item.leather_family.as_deref() {
                leather.insert(family);
                confidence = confidence.min(item.confidence_for(fields::LEATHER_FAMILY));
            }
            if let Some(family) = item.metal_family.as_deref() {
                metal.insert((family, item.metal_finish.as_deref().unwrap_or("")));
                confidence = confidence.min(item.confidence_for(fields::METAL_FAMILY));
            }
        }

        let mismatches = leather.len().saturating_sub(1) + metal.len().saturating_sub(1);
        let score = match mode {
            AccessoryMode::StrictFamily => {
                if mismatches == 0 {
                    1.0
                } else {
                    0.0
                }
            }
            AccessoryMode::Coordinated => (1.0 - 0.5 * mismatches as f64).max(0.0),
            AccessoryMode::Free => 1.0,
        };
        ComponentScore::new(
            score,
            confidence,
            format!(
                "{} leather families, {} metal family/finish pairs",
                leather.len(),
                metal.len()
            ),
        )
    }
}

/// Near-face colors against the declared skin tone.
pub struct SkinSynergy;

impl SoftComponent for SkinSynergy {
    fn key(&self) -> ComponentKey {
        ComponentKey::SkinSynergy
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        let Some(appearance) = &inputs.profile.appearance_signature else {
            return ComponentScore::neutral("appearance signature absent");
        };

        let near_face: Vec<(&str, Lch, f64)> = inputs
            .state
            .entries()
            .filter(|(slot, _)| slot.is_near_face())
            .filter_map(|(_, item)| {
                item.color
                    .map(|c| (item.item_id.as_str(), c, item.confidence_for(fields::COLOR)))
            })
            .collect();
        if near_face.is_empty() {
            return ComponentScore::neutral("no near-face colors committed");
        }

        // Preferred ΔE band center and width by resolved synergy style.
        let (center, sigma, label) = match appearance.resolved_style() {
            SynergyStyle::Contrast => (45.0, 15.0, "contrast"),
            SynergyStyle::Harmonize => (7.5, 7.5, "harmonize"),
            SynergyStyle::Auto => unreachable!("resolved_style never returns auto"),
        };

        let mut sum = 0.0;
        let mut confidence = 1.0_f64;
        for (_, color, item_confidence) in &near_face {
            let delta = delta_e2000(appearance.skin_lch, *color);
            let deviation = (delta - center) / sigma;
            sum += (-0.5 * deviation * deviation).exp();
            confidence = confidence.min(*item_confidence);
        }
        let score = sum / near_face.len() as f64;
        ComponentScore::new(
            score,
            confidence,
            format!("{label} band over {} near-face items", near_face.len()),
        )
    }
}

/// Proportion rules against the declared body signature.
pub struct ProportionFit;

impl SoftComponent for ProportionFit {
    fn key(&self) -> ComponentKey {
        ComponentKey::ProportionFit
    }

    fn score(&self, inputs: &ScoreInputs<'_>) -> ComponentScore {
        use crate::profile::{HeightClass, TorsoClass};

        let Some(body) = &inputs.profile.body_signature else {
            return ComponentScore::neutral("body signature absent");
        };

        let state = inputs.state;
        let bottom_rise = state
            .get(SlotClass::Bottom)
            .and_then(|i| i.bottom_rise_class.as_deref());
        let outer_length = state
            .get(SlotClass::Outer)
            .and_then(|i| i.top_length_class.as_deref());

        let mut score = 0.5_f64;
        let mut notes: Vec<&str> = Vec::new();

        if body.torso == Some(TorsoClass::Long) && bottom_rise == Some("high_rise") {
            score += 0.15;
            notes.push("high rise balances long torso");
        }
        if body.torso == Some(TorsoClass::Short) && bottom_rise == Some("low_rise") {
            score -= 0.1;
            notes.push("low rise shortens torso further");
        }
        if body.height_class == Some(HeightClass::Petite) && outer_length == Some("long") {
            score -= 0.15;
            notes.push("long outer overwhelms petite frame");
        }
        if body.height_class == Some(HeightClass::Tall) && outer_length == Some("long") {
            score += 0.1;
            notes.push("long outer suits tall frame");
        }

        let mut confidence = 1.0_f64;
        for item in state.items() {
            if item.bottom_rise_class.is_some() {
                confidence = confidence.min(item.confidence_for(fields::BOTTOM_RISE_CLASS));
            }
            if item.top_length_class.is_some() {
                confidence = confidence.min(item.confidence_for(fields::TOP_LENGTH_CLASS));
            }
        }
        let explanation = if notes.is_empty() {
            "no proportion rules triggered".to_string()
        } else {
            notes.join("; ")
        };
        ComponentScore::new(score, confidence, explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::assembly::PartialBundle;
    use crate::items::{Item, Owner, Pattern};
    use crate::profile::{
        AppearanceSignature, BodySignature, Context, HeightClass, Profile, TorsoClass, Undertone,
    };
    use crate::rules::{AccessoryMode, RuleSet};
    use crate::scoring::{DeltaCache, ScoreInputs};

    struct Fixture {
        state: PartialBundle,
        ruleset: RuleSet,
        profile: Profile,
        context: Context,
        history: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                state: PartialBundle::new(),
                ruleset: RuleSet::builtin(1),
                profile: Profile::new("u1", 3),
                context: Context::new("casual", TemperatureBand::Mild),
                history: Vec::new(),
            }
        }

        fn score(&self, component: &dyn SoftComponent) -> ComponentScore {
            let deltas = DeltaCache::new();
            let groups = std::collections::BTreeMap::new();
            component.score(&ScoreInputs {
                state: &self.state,
                ruleset: &self.ruleset,
                profile: &self.profile,
                context: &self.context,
                history: &self.history,
                deltas: &deltas,
                groups: &groups,
            })
        }
    }

    fn item(id: &str, role: &str, slot: SlotClass) -> Item {
        Item::new(
            id,
            Owner::Wardrobe,
            role,
            slot,
            3,
            [TemperatureBand::Mild],
        )
    }

    fn colored(id: &str, role: &str, slot: SlotClass, l: f64, c: f64, h: f64) -> Arc<Item> {
        Arc::new(item(id, role, slot).with_color(Lch::new(l, c, h).unwrap()))
    }

    #[test]
    fn test_palette_all_neutrals_scores_high() {
        let mut fx = Fixture::new();
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, colored("a", "shirt", SlotClass::Top, 95.0, 2.0, 180.0))
            .committing(
                SlotClass::Bottom,
                colored("b", "trousers", SlotClass::Bottom, 25.0, 2.0, 250.0),
            );
        let result = fx.score(&PaletteHarmony);
        assert!(result.score >= 0.9, "score was {}", result.score);
    }

    #[test]
    fn test_palette_analogous_beats_unrelated() {
        let mut fx = Fixture::new();
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, colored("a", "shirt", SlotClass::Top, 50.0, 40.0, 100.0))
            .committing(
                SlotClass::Bottom,
                colored("b", "trousers", SlotClass::Bottom, 45.0, 35.0, 115.0),
            );
        let analogous = fx.score(&PaletteHarmony);

        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, colored("a", "shirt", SlotClass::Top, 50.0, 40.0, 100.0))
            .committing(
                SlotClass::Bottom,
                colored("b", "trousers", SlotClass::Bottom, 45.0, 35.0, 170.0),
            );
        let unrelated = fx.score(&PaletteHarmony);
        assert!(analogous.score > unrelated.score);
    }

    #[test]
    fn test_palette_confidence_tracks_color_inputs() {
        let mut fx = Fixture::new();
        let uncertain = Arc::new(
            item("a", "shirt", SlotClass::Top)
                .with_color(Lch::new(50.0, 40.0, 100.0).unwrap())
                .with_confidence("color", 0.6),
        );
        fx.state = PartialBundle::new().committing(SlotClass::Top, uncertain);
        let result = fx.score(&PaletteHarmony);
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn test_pattern_mix_budget() {
        let mut fx = Fixture::new();
        let striped = |id: &str, slot, scale| {
            Arc::new(
                item(id, "shirt", slot).with_pattern(Pattern::Stripe, Some(scale)),
            )
        };
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, striped("a", SlotClass::Top, PatternScale::Small))
            .committing(SlotClass::Mid, striped("b", SlotClass::Mid, PatternScale::Large));
        let two = fx.score(&PatternMix);
        assert!((two.score - 0.5).abs() < 1e-9, "was {}", two.score);

        // Same scale twice adds the clash deduction.
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, striped("a", SlotClass::Top, PatternScale::Small))
            .committing(SlotClass::Mid, striped("b", SlotClass::Mid, PatternScale::Small));
        let clash = fx.score(&PatternMix);
        assert!((clash.score - 0.4).abs() < 1e-9, "was {}", clash.score);
    }

    #[test]
    fn test_silhouette_contrast_rewarded() {
        let mut fx = Fixture::new();
        let fitted = Arc::new(item("a", "shirt", SlotClass::Top).with_fit(crate::items::FitProfile::Oversized));
        let slim = Arc::new(item("b", "trousers", SlotClass::Bottom).with_fit(crate::items::FitProfile::Slim));
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, fitted)
            .committing(SlotClass::Bottom, slim);
        assert!((fx.score(&SilhouetteBalance).score - 1.0).abs() < 1e-9);

        let same_a = Arc::new(item("a", "shirt", SlotClass::Top).with_fit(crate::items::FitProfile::Regular));
        let same_b = Arc::new(item("b", "trousers", SlotClass::Bottom).with_fit(crate::items::FitProfile::Regular));
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, same_a)
            .committing(SlotClass::Bottom, same_b);
        assert!((fx.score(&SilhouetteBalance).score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_silhouette_structured_layers_penalized() {
        let mut fx = Fixture::new();
        let structured = |id: &str, role: &str, slot| {
            let mut it = item(id, role, slot);
            it.shoulder_structure = Some(ShoulderStructure::Structured);
            Arc::new(it)
        };
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, structured("a", "shirt", SlotClass::Top))
            .committing(SlotClass::Outer, structured("b", "jacket", SlotClass::Outer));
        let result = fx.score(&SilhouetteBalance);
        assert!((result.score - 0.55).abs() < 1e-9, "was {}", result.score);
    }

    #[test]
    fn test_formality_weighted_average() {
        let mut fx = Fixture::new();
        fx.context = Context::new("work_office", TemperatureBand::Mild).with_dressiness(4);
        let formal = |id: &str, role: &str, slot, formality: u8| {
            let mut it = item(id, role, slot);
            it.formality = formality;
            Arc::new(it)
        };
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, formal("a", "shirt", SlotClass::Top, 4))
            .committing(SlotClass::Bottom, formal("b", "trousers", SlotClass::Bottom, 4))
            .committing(SlotClass::Footwear, formal("c", "shoes", SlotClass::Footwear, 4));
        let result = fx.score(&FormalityCloseness);
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_fraction_and_cold_bonus() {
        let mut fx = Fixture::new();
        fx.context = Context::new("casual", TemperatureBand::Cold);
        let cold_coat = Arc::new(Item::new(
            "coat",
            Owner::Wardrobe,
            "coat",
            SlotClass::Outer,
            3,
            [TemperatureBand::Cold],
        ));
        let mild_top = Arc::new(item("top", "shirt", SlotClass::Top));
        fx.state = PartialBundle::new()
            .committing(SlotClass::Outer, cold_coat)
            .committing(SlotClass::Top, mild_top);
        let result = fx.score(&TemperatureFit);
        // Half the items suit the band, plus the outer bonus.
        assert!((result.score - 0.6).abs() < 1e-9, "was {}", result.score);
    }

    #[test]
    fn test_style_forbidden_tag_zeroes() {
        let mut fx = Fixture::new();
        fx.profile.forbidden_tags.insert("neon".to_string());
        fx.profile.style_signature.insert("classic".to_string());
        fx.state = PartialBundle::new().committing(
            SlotClass::Top,
            Arc::new(item("a", "shirt", SlotClass::Top).with_tags(["neon", "classic"])),
        );
        assert_eq!(fx.score(&StyleTagMatch).score, 0.0);
    }

    #[test]
    fn test_style_empty_signature_neutral() {
        let mut fx = Fixture::new();
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, Arc::new(item("a", "shirt", SlotClass::Top)));
        assert_eq!(fx.score(&StyleTagMatch).score, 0.5);
    }

    #[test]
    fn test_novelty_penalizes_recent_wear() {
        let mut fx = Fixture::new();
        fx.state = PartialBundle::new()
            .committing(SlotClass::Top, Arc::new(item("worn", "shirt", SlotClass::Top)))
            .committing(
                SlotClass::Bottom,
                Arc::new(item("fresh", "trousers", SlotClass::Bottom)),
            );
        fx.history = vec!["worn".to_string()];
        let result = fx.score(&NoveltyVariety);
        assert!((result.score - 0.5).abs() < 1e-9, "was {}", result.score);

        fx.history.clear();
        assert_eq!(fx.score(&NoveltyVariety).score, 1.0);
    }

    #[test]
    fn test_accessory_strict_zeroes_on_mismatch() {
        let mut fx = Fixture::new();
        fx.ruleset.accessory_mode = AccessoryMode::StrictFamily;
        let leather = |id: &str, role: &str, slot, family: &str| {
            let mut it = item(id, role, slot);
            it.leather_family = Some(family.to_string());
            Arc::new(it)
        };
        fx.state = PartialBundle::new()
            .committing(SlotClass::Footwear, leather("a", "shoes", SlotClass::Footwear, "black"))
            .committing(SlotClass::Belt, leather("b", "belt", SlotClass::Belt, "tan"));
        assert_eq!(fx.score(&AccessoryConsistency).score, 0.0);

        fx.ruleset.accessory_mode = AccessoryMode::Coordinated;
        assert!((fx.score(&AccessoryConsistency).score - 0.5).abs() < 1e-9);

        fx.ruleset.accessory_mode = AccessoryMode::Free;
        assert_eq!(fx.score(&AccessoryConsistency).score, 1.0);
    }

    #[test]
    fn test_skin_synergy_absent_is_exactly_neutral() {
        let mut fx = Fixture::new();
        fx.state = PartialBundle::new().committing(
            SlotClass::Top,
            colored("a", "shirt", SlotClass::Top, 50.0, 40.0, 100.0),
        );
        let result = fx.score(&SkinSynergy);
        assert_eq!(result.score, 0.5);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_skin_synergy_contrast_prefers_distant() {
        let mut fx = Fixture::new();
        fx.profile = fx.profile.clone().with_appearance(AppearanceSignature {
            skin_lch: Lch::new(65.0, 20.0, 60.0).unwrap(),
            undertone: Undertone::Cool,
            synergy_style: SynergyStyle::Contrast,
        });
        fx.state = PartialBundle::new().committing(
            SlotClass::Top,
            colored("far", "shirt", SlotClass::Top, 20.0, 40.0, 260.0),
        );
        let distant = fx.score(&SkinSynergy);

        fx.state = PartialBundle::new().committing(
            SlotClass::Top,
            colored("near", "shirt", SlotClass::Top, 63.0, 22.0, 62.0),
        );
        let close = fx.score(&SkinSynergy);
        assert!(distant.score > close.score);
    }

    #[test]
    fn test_proportion_rules() {
        let mut fx = Fixture::new();
        assert_eq!(fx.score(&ProportionFit).score, 0.5);

        fx.profile = fx.profile.clone().with_body(BodySignature {
            height_class: Some(HeightClass::Petite),
            torso: Some(TorsoClass::Long),
        });
        let mut trousers = item("t", "trousers", SlotClass::Bottom);
        trousers.bottom_rise_class = Some("high_rise".to_string());
        let mut coat = item("c", "coat", SlotClass::Outer);
        coat.top_length_class = Some("long".to_string());
        fx.state = PartialBundle::new()
            .committing(SlotClass::Bottom, Arc::new(trousers))
            .committing(SlotClass::Outer, Arc::new(coat));
        let result = fx.score(&ProportionFit);
        // +0.15 high rise, -0.15 long outer on petite.
        assert!((result.score - 0.5).abs() < 1e-9, "was {}", result.score);
    }
}
