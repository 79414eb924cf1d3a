//! Perceptual color difference
//!
//! CIEDE2000 following Sharma, Wu & Dalal (2005). Angles are kept in
//! degrees and converted at each trigonometric call.
//!
//! Rough reading of ΔE00: below 1 imperceptible, 1-2 visible on close
//! inspection, 2-10 visible at a glance, above 10 distinct colors.

use super::model::LabColor;

const POW25_7: f64 = 6_103_515_625.0; // 25^7

/// Hue angle in degrees, normalized to [0, 360); the hue of (0, 0) is 0
fn hue_degrees(b: f64, a_prime: f64) -> f64 {
    if b == 0.0 && a_prime == 0.0 {
        return 0.0;
    }
    let h = b.atan2(a_prime).to_degrees();
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}

fn chroma_weight(c: f64) -> f64 {
    let c7 = c.powi(7);
    (c7 / (c7 + POW25_7)).sqrt()
}

/// CIEDE2000 color difference (kL = kC = kH = 1). Always >= 0.
pub fn delta_e_cie2000(lab1: LabColor, lab2: LabColor) -> f64 {
    let LabColor { l: l1, a: a1, b: b1 } = lab1;
    let LabColor { l: l2, a: a2, b: b2 } = lab2;

    // Chroma correction of a*
    let c_bar = (a1.hypot(b1) + a2.hypot(b2)) / 2.0;
    let g = 0.5 * (1.0 - chroma_weight(c_bar));
    let a1p = (1.0 + g) * a1;
    let a2p = (1.0 + g) * a2;

    let c1p = a1p.hypot(b1);
    let c2p = a2p.hypot(b2);
    let h1p = hue_degrees(b1, a1p);
    let h2p = hue_degrees(b2, a2p);

    // Differences
    let delta_lp = l2 - l1;
    let delta_cp = c2p - c1p;
    let chroma_product = c1p * c2p;
    let delta_hp = if chroma_product == 0.0 {
        0.0
    } else {
        let diff = h2p - h1p;
        if diff > 180.0 {
            diff - 360.0
        } else if diff < -180.0 {
            diff + 360.0
        } else {
            diff
        }
    };
    let delta_big_hp = 2.0 * chroma_product.sqrt() * (delta_hp / 2.0).to_radians().sin();

    // Means
    let l_bar_p = (l1 + l2) / 2.0;
    let c_bar_p = (c1p + c2p) / 2.0;
    let h_bar_p = if chroma_product == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) / 2.0
    } else if h1p + h2p < 360.0 {
        (h1p + h2p + 360.0) / 2.0
    } else {
        (h1p + h2p - 360.0) / 2.0
    };

    let t = 1.0 - 0.17 * (h_bar_p - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar_p).to_radians().cos()
        + 0.32 * (3.0 * h_bar_p + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar_p - 63.0).to_radians().cos();

    let delta_theta = 30.0 * (-((h_bar_p - 275.0) / 25.0).powi(2)).exp();
    let r_c = 2.0 * chroma_weight(c_bar_p);
    let r_t = -(2.0 * delta_theta).to_radians().sin() * r_c;

    let l_offset = (l_bar_p - 50.0).powi(2);
    let s_l = 1.0 + 0.015 * l_offset / (20.0 + l_offset).sqrt();
    let s_c = 1.0 + 0.045 * c_bar_p;
    let s_h = 1.0 + 0.015 * c_bar_p * t;

    let lt = delta_lp / s_l;
    let ct = delta_cp / s_c;
    let ht = delta_big_hp / s_h;

    // The rotation term can push the radicand a hair below zero for
    // near-identical colors.
    (lt * lt + ct * ct + ht * ht + r_t * ct * ht).max(0.0).sqrt()
}

/// CIE76 color difference (Euclidean distance in Lab)
pub fn delta_e_cie76(lab1: LabColor, lab2: LabColor) -> f64 {
    let dl = lab1.l - lab2.l;
    let da = lab1.a - lab2.a;
    let db = lab1.b - lab2.b;
    (dl * dl + da * da + db * db).sqrt()
}
