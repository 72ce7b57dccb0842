//! User profile and occasion context.
//!
//! Optional appearance and body signatures degrade gracefully: when absent,
//! the dependent scoring components report a neutral 0.5 and nothing else
//! in the pipeline changes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Lch;
use crate::items::TemperatureBand;

/// Validation failure for profiles and contexts, surfaced as
/// `INVALID_INPUT` at the engine boundary.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("dressiness {value} outside 1..=5")]
    DressinessOutOfRange { value: u8 },

    #[error("occasion must not be empty")]
    EmptyOccasion,
}

/// Skin undertone, used to resolve the `auto` synergy style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Undertone {
    Warm,
    Cool,
    Neutral,
}

/// Preferred relationship between near-face garments and skin tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynergyStyle {
    /// Prefer ΔE ≥ 25 against skin.
    Contrast,
    /// Prefer ΔE ≤ 15 against skin.
    Harmonize,
    /// Resolve by undertone: warm harmonizes, cool and neutral contrast.
    Auto,
}

/// Declared appearance traits for skin-synergy scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppearanceSignature {
    pub skin_lch: Lch,
    pub undertone: Undertone,
    pub synergy_style: SynergyStyle,
}

impl AppearanceSignature {
    /// The synergy style with `auto` resolved by undertone.
    pub fn resolved_style(&self) -> SynergyStyle {
        match self.synergy_style {
            SynergyStyle::Auto => match self.undertone {
                Undertone::Warm => SynergyStyle::Harmonize,
                Undertone::Cool | Undertone::Neutral => SynergyStyle::Contrast,
            },
            other => other,
        }
    }
}

/// Height bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightClass {
    Petite,
    Average,
    Tall,
}

/// Torso proportion bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorsoClass {
    Long,
    Balanced,
    Short,
}

/// Declared body traits for proportion scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodySignature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_class: Option<HeightClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torso: Option<TorsoClass>,
}

/// A user's stylistic profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    /// Dressiness used when the context does not override it.
    pub baseline_dressiness: u8,
    pub default_occasion: String,
    #[serde(default)]
    pub style_signature: BTreeSet<String>,
    /// Tags that zero out style matching and are filtered at retrieval.
    #[serde(default)]
    pub forbidden_tags: BTreeSet<String>,
    #[serde(default)]
    pub preferred_tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance_signature: Option<AppearanceSignature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_signature: Option<BodySignature>,
}

impl Profile {
    /// Minimal profile for a user.
    pub fn new(user_id: impl Into<String>, baseline_dressiness: u8) -> Self {
        Self {
            user_id: user_id.into(),
            baseline_dressiness,
            default_occasion: "casual".to_string(),
            style_signature: BTreeSet::new(),
            forbidden_tags: BTreeSet::new(),
            preferred_tags: BTreeSet::new(),
            appearance_signature: None,
            body_signature: None,
        }
    }

    /// Attach an appearance signature.
    pub fn with_appearance(mut self, signature: AppearanceSignature) -> Self {
        self.appearance_signature = Some(signature);
        self
    }

    /// Attach a body signature.
    pub fn with_body(mut self, signature: BodySignature) -> Self {
        self.body_signature = Some(signature);
        self
    }

    /// Set the style signature tags.
    pub fn with_signature<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.style_signature = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=5).contains(&self.baseline_dressiness) {
            return Err(ValidationError::DressinessOutOfRange {
                value: self.baseline_dressiness,
            });
        }
        Ok(())
    }
}

/// The occasion a bundle is assembled for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub occasion: String,
    /// Overrides the profile baseline when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dressiness: Option<u8>,
    pub temperature_band: TemperatureBand,
    #[serde(default)]
    pub event_tags: BTreeSet<String>,
}

impl Context {
    pub fn new(occasion: impl Into<String>, temperature_band: TemperatureBand) -> Self {
        Self {
            occasion: occasion.into(),
            target_dressiness: None,
            temperature_band,
            event_tags: BTreeSet::new(),
        }
    }

    /// Set the dressiness override.
    pub fn with_dressiness(mut self, target: u8) -> Self {
        self.target_dressiness = Some(target);
        self
    }

    /// The dressiness target for this request.
    pub fn effective_dressiness(&self, profile: &Profile) -> u8 {
        self.target_dressiness.unwrap_or(profile.baseline_dressiness)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.occasion.trim().is_empty() {
            return Err(ValidationError::EmptyOccasion);
        }
        if let Some(target) = self.target_dressiness {
            if !(1..=5).contains(&target) {
                return Err(ValidationError::DressinessOutOfRange { value: target });
            }
        }
        Ok(())
    }
}
