//! CIEDE2000 color difference.
//!
//! Implements the standard formula with the parametric factors
//! `kL = kC = kH = 1`, including the G chroma correction, the T hue
//! weighting, and the rotation term. Verified against the Sharma, Wu &
//! Dalal reference pairs.

use super::Lch;

const POW7_25: f64 = 6_103_515_625.0; // 25^7

/// CIEDE2000 difference between two colors.
pub fn delta_e2000(a: Lch, b: Lch) -> f64 {
    let (l1, a1, b1) = a.to_lab();
    let (l2, a2, b2) = b.to_lab();

    let c1 = a1.hypot(b1);
    let c2 = a2.hypot(b2);
    let c_bar = (c1 + c2) / 2.0;

    let c_bar7 = c_bar.powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + POW7_25)).sqrt());

    let a1p = (1.0 + g) * a1;
    let a2p = (1.0 + g) * a2;
    let c1p = a1p.hypot(b1);
    let c2p = a2p.hypot(b2);

    let h1p = hue_angle(a1p, b1);
    let h2p = hue_angle(a2p, b2);

    let dl = l2 - l1;
    let dc = c2p - c1p;

    let dhp = if c1p * c2p == 0.0 {
        0.0
    } else {
        let diff = h2p - h1p;
        if diff.abs() <= 180.0 {
            diff
        } else if diff > 180.0 {
            diff - 360.0
        } else {
            diff + 360.0
        }
    };
    let dh_big = 2.0 * (c1p * c2p).sqrt() * (dhp / 2.0).to_radians().sin();

    let l_bar = (l1 + l2) / 2.0;
    let cp_bar = (c1p + c2p) / 2.0;

    let h_bar = if c1p * c2p == 0.0 {
        h1p + h2p
    } else {
        let sum = h1p + h2p;
        if (h1p - h2p).abs() <= 180.0 {
            sum / 2.0
        } else if sum < 360.0 {
            (sum + 360.0) / 2.0
        } else {
            (sum - 360.0) / 2.0
        }
    };

    let t = 1.0 - 0.17 * (h_bar - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar).to_radians().cos()
        + 0.32 * (3.0 * h_bar + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar - 63.0).to_radians().cos();

    let d_theta = 30.0 * (-((h_bar - 275.0) / 25.0).powi(2)).exp();
    let cp_bar7 = cp_bar.powi(7);
    let rc = 2.0 * (cp_bar7 / (cp_bar7 + POW7_25)).sqrt();
    let rt = -(2.0 * d_theta).to_radians().sin() * rc;

    let l_minus_50_sq = (l_bar - 50.0).powi(2);
    let sl = 1.0 + 0.015 * l_minus_50_sq / (20.0 + l_minus_50_sq).sqrt();
    let sc = 1.0 + 0.045 * cp_bar;
    let sh = 1.0 + 0.015 * cp_bar * t;

    let term_l = dl / sl;
    let term_c = dc / sc;
    let term_h = dh_big / sh;

    (term_l * term_l + term_c * term_c + term_h * term_h + rt * term_c * term_h).sqrt()
}

/// Hue angle of `(a', b)` in degrees, `[0, 360)`; zero when both are zero.
fn hue_angle(ap: f64, b: f64) -> f64 {
    if ap == 0.0 && b == 0.0 {
        return 0.0;
    }
    let h = b.atan2(ap).to_degrees();
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Check one Sharma reference pair to the published 4-decimal value.
    fn check(lab1: (f64, f64, f64), lab2: (f64, f64, f64), expected: f64) {
        let a = Lch::from_lab(lab1.0, lab1.1, lab1.2);
        let b = Lch::from_lab(lab2.0, lab2.1, lab2.2);
        let got = delta_e2000(a, b);
        assert!(
            (got - expected).abs() < 1e-4,
            "pair {lab1:?} vs {lab2:?}: got {got:.4}, expected {expected:.4}"
        );
        // The metric is symmetric.
        let rev = delta_e2000(b, a);
        assert!((rev - got).abs() < 1e-9);
    }

    #[test]
    fn test_sharma_blue_pairs() {
        check((50.0, 2.6772, -79.7751), (50.0, 0.0, -82.7485), 2.0425);
        check((50.0, 3.1571, -77.2803), (50.0, 0.0, -82.7485), 2.8615);
        check((50.0, 2.8361, -74.0200), (50.0, 0.0, -82.7485), 3.4412);
    }

    #[test]
    fn test_sharma_large_difference_pairs() {
        check((50.0, 2.5, 0.0), (73.0, 25.0, -18.0), 27.1492);
        check((50.0, 2.5, 0.0), (61.0, -5.0, 29.0), 22.8977);
        check((50.0, 2.5, 0.0), (56.0, -27.0, -3.0), 31.9030);
        check((50.0, 2.5, 0.0), (58.0, 24.0, 15.0), 19.4535);
    }

    #[test]
    fn test_sharma_near_unit_pairs() {
        check((50.0, 2.5, 0.0), (50.0, 3.1736, 0.5854), 1.0000);
        check((50.0, 2.5, 0.0), (50.0, 3.2972, 0.0), 1.0000);
        check((50.0, 2.5, 0.0), (50.0, 1.8634, 0.5757), 1.0000);
        check((50.0, 2.5, 0.0), (50.0, 3.2592, 0.3350), 1.0000);
    }

    #[test]
    fn test_sharma_natural_pairs() {
        check(
            (60.2574, -34.0099, 36.2677),
            (60.4626, -34.1751, 39.4387),
            1.2644,
        );
        check(
            (63.0109, -31.0961, -5.8663),
            (62.8187, -29.7946, -4.0864),
            1.2630,
        );
        check(
            (61.2901, 3.7196, -5.3901),
            (61.4292, 2.2480, -4.9620),
            1.8731,
        );
        check(
            (35.0831, -44.1164, 3.7933),
            (35.0232, -40.0716, 1.5901),
            1.8645,
        );
        check(
            (22.7233, 20.0904, -46.6940),
            (23.0331, 14.9730, -42.5619),
            2.0373,
        );
        check(
            (36.4612, 47.8580, 18.3852),
            (36.2715, 50.5065, 21.2231),
            1.4146,
        );
        check(
            (90.8027, -2.0831, 1.4410),
            (91.1528, -1.6435, 0.0447),
            1.4441,
        );
        check(
            (90.9257, -0.5406, -0.9208),
            (88.6381, -0.8985, -0.7239),
            1.5381,
        );
        check(
            (6.7747, -0.2908, -2.4247),
            (5.8714, -0.0985, -2.2286),
            0.6377,
        );
        check(
            (2.0776, 0.0795, -1.1350),
            (0.9033, -0.0636, -0.5514),
            0.9082,
        );
    }

    #[test]
    fn test_identical_colors_are_zero() {
        let c = Lch::new(40.0, 50.0, 275.0).unwrap();
        assert!(delta_e2000(c, c).abs() < 1e-12);
    }
}
