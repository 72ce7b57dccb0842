//! Perceptual color math on Lightness-Chroma-hue coordinates.
//!
//! All color comparison in the engine happens in LCh; there is no implicit
//! RGB path. Differences are CIEDE2000 ([`delta_e2000`]), hue relationships
//! are classified into the bands the palette scorer consumes.

mod delta_e;

pub use delta_e::delta_e2000;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chroma below which a color is treated as neutral (default threshold).
pub const DEFAULT_C_NEUTRAL: f64 = 10.0;

/// Lightness at or above which a color is neutral regardless of chroma.
const L_NEUTRAL_HIGH: f64 = 95.0;

/// Lightness at or below which a color is neutral regardless of chroma.
const L_NEUTRAL_LOW: f64 = 8.0;

/// Error raised when LCh components are outside their valid ranges.
#[derive(Debug, Clone, Error)]
#[error("LCh component out of range: {component}={value}")]
pub struct ColorOutOfRange {
    /// Which component violated its bounds (`"L"` or `"C"`).
    pub component: &'static str,
    /// The offending value.
    pub value: f64,
}

/// A color in Lightness-Chroma-hue coordinates.
///
/// `l ∈ [0, 100]`, `c ∈ [0, 150]`, `h ∈ [0, 360)`. Hue is stored in
/// degrees and normalized on construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lch {
    /// Lightness.
    pub l: f64,
    /// Chroma.
    pub c: f64,
    /// Hue angle in degrees, `[0, 360)`.
    pub h: f64,
}

impl Lch {
    /// Create a validated LCh color. Hue is normalized into `[0, 360)`.
    pub fn new(l: f64, c: f64, h: f64) -> Result<Self, ColorOutOfRange> {
        if !(0.0..=100.0).contains(&l) || !l.is_finite() {
            return Err(ColorOutOfRange {
                component: "L",
                value: l,
            });
        }
        if !(0.0..=150.0).contains(&c) || !c.is_finite() {
            return Err(ColorOutOfRange {
                component: "C",
                value: c,
            });
        }
        Ok(Self {
            l,
            c,
            h: normalize_hue(h),
        })
    }

    /// Convert from CIELAB coordinates.
    pub fn from_lab(l: f64, a: f64, b: f64) -> Self {
        let c = a.hypot(b);
        let h = normalize_hue(b.atan2(a).to_degrees());
        Self { l, c, h }
    }

    /// The CIELAB `(L, a, b)` equivalent of this color.
    pub fn to_lab(self) -> (f64, f64, f64) {
        let rad = self.h.to_radians();
        (self.l, self.c * rad.cos(), self.c * rad.sin())
    }

    /// Whether this color reads as neutral at the given chroma threshold.
    ///
    /// Near-white and near-black count as neutral whatever their chroma.
    pub fn is_neutral(self, c_neutral: f64) -> bool {
        self.c < c_neutral || self.l >= L_NEUTRAL_HIGH || self.l <= L_NEUTRAL_LOW
    }
}

/// Normalize a hue angle in degrees into `[0, 360)`.
fn normalize_hue(h: f64) -> f64 {
    let r = h % 360.0;
    if r < 0.0 {
        r + 360.0
    } else {
        r
    }
}

/// Absolute hue separation between two colors, in `[0, 180]` degrees.
pub fn hue_delta(a: Lch, b: Lch) -> f64 {
    let d = (a.h - b.h).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Classification of the hue relationship between two chromatic colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HueRelation {
    /// Hues within 8° of each other.
    Same,
    /// Hues within 30°.
    Analogous,
    /// Hues 110–130° apart.
    Triadic,
    /// Hues at least 150° apart.
    Complementary,
    /// Everything else.
    Unrelated,
}

/// Classify the hue relationship between two colors.
pub fn relation(a: Lch, b: Lch) -> HueRelation {
    let d = hue_delta(a, b);
    if d <= 8.0 {
        HueRelation::Same
    } else if d <= 30.0 {
        HueRelation::Analogous
    } else if (110.0..=130.0).contains(&d) {
        HueRelation::Triadic
    } else if d >= 150.0 {
        HueRelation::Complementary
    } else {
        HueRelation::Unrelated
    }
}

/// Circular standard deviation of a set of hue angles, in degrees.
///
/// Returns 0.0 for fewer than two samples. Uses the mean-resultant-length
/// estimator, which is stable for tight clusters and saturates for
/// uniformly spread hues.
pub fn circular_std_dev(hues_deg: &[f64]) -> f64 {
    if hues_deg.len() < 2 {
        return 0.0;
    }
    let (mut sin_sum, mut cos_sum) = (0.0_f64, 0.0_f64);
    for h in hues_deg {
        let r = h.to_radians();
        sin_sum += r.sin();
        cos_sum += r.cos();
    }
    let n = hues_deg.len() as f64;
    let r_bar = (sin_sum / n).hypot(cos_sum / n);
    if r_bar <= f64::EPSILON {
        // Uniformly spread; the estimator diverges, clamp to a flat spread.
        return 180.0;
    }
    let sd = (-2.0 * r_bar.ln()).sqrt().to_degrees();
    sd.min(180.0)
}
