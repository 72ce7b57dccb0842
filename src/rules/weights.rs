//! Scoring weights, numeric thresholds, and the accessory-consistency mode.

use serde::{Deserialize, Serialize};

/// Per-component soft-scoring weights. Non-negative; renormalized over the
/// evaluated set at aggregation time, so they need not sum to one here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub palette_harmony: f64,
    pub pattern_mix: f64,
    pub silhouette_balance: f64,
    pub formality_closeness: f64,
    pub temperature_fit: f64,
    pub style_tag_match: f64,
    pub novelty_variety: f64,
    pub accessory_consistency: f64,
    pub skin_synergy: f64,
    pub proportion_fit: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            palette_harmony: 0.22,
            pattern_mix: 0.12,
            silhouette_balance: 0.12,
            formality_closeness: 0.14,
            temperature_fit: 0.10,
            style_tag_match: 0.08,
            novelty_variety: 0.05,
            accessory_consistency: 0.07,
            skin_synergy: 0.08,
            proportion_fit: 0.10,
        }
    }
}

impl Weights {
    /// All weights as `(name, value)` pairs, in canonical order.
    pub fn entries(&self) -> [(&'static str, f64); 10] {
        [
            ("palette_harmony", self.palette_harmony),
            ("pattern_mix", self.pattern_mix),
            ("silhouette_balance", self.silhouette_balance),
            ("formality_closeness", self.formality_closeness),
            ("temperature_fit", self.temperature_fit),
            ("style_tag_match", self.style_tag_match),
            ("novelty_variety", self.novelty_variety),
            ("accessory_consistency", self.accessory_consistency),
            ("skin_synergy", self.skin_synergy),
            ("proportion_fit", self.proportion_fit),
        ]
    }

    /// Whether every weight is non-negative and at least one is positive.
    pub fn is_valid(&self) -> bool {
        let entries = self.entries();
        entries.iter().all(|(_, w)| *w >= 0.0 && w.is_finite())
            && entries.iter().any(|(_, w)| *w > 0.0)
    }
}

/// Numeric thresholds and search budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Chroma below which a color is neutral.
    pub c_neutral: f64,
    /// ΔE at or below which two colors read as near.
    pub delta_e_near: f64,
    /// ΔE at or above which two colors read as distant.
    pub delta_e_distant: f64,
    /// Maximum patterned items before the mix score bottoms out.
    pub max_patterns: u8,
    /// Formality tolerance below target.
    pub formality_tolerance_lo: u8,
    /// Formality tolerance above target.
    pub formality_tolerance_hi: u8,
    /// Aggregate deduction when a prefer_strict set is broken.
    pub prefer_strict_break_penalty: f64,
    /// Beam width for assembly.
    pub beam_width: usize,
    /// Shortlist size for the anchor slot.
    pub anchor_shortlist: usize,
    /// Shortlist size for every other slot.
    pub slot_shortlist: usize,
    /// How many recent outfits the novelty component looks back over.
    pub novelty_window: usize,
    /// When true, any committed item must list the context band.
    pub strict_temperature: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            c_neutral: 10.0,
            delta_e_near: 15.0,
            delta_e_distant: 40.0,
            max_patterns: 3,
            formality_tolerance_lo: 1,
            formality_tolerance_hi: 1,
            prefer_strict_break_penalty: 0.15,
            beam_width: 8,
            anchor_shortlist: 40,
            slot_shortlist: 20,
            novelty_window: 20,
            strict_temperature: true,
        }
    }
}

/// How tightly accessories must agree on material families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessoryMode {
    /// All leather families equal; all metal families and finishes equal.
    StrictFamily,
    /// One mismatch tolerated with linear decay.
    #[default]
    Coordinated,
    /// No accessory scoring pressure.
    Free,
}
