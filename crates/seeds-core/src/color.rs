//! Correlated colour temperature from an RGB reading.
//!
//! The chain is sRGB (0-255) -> linear sRGB -> CIE XYZ (D65) -> chromaticity
//! (x, y) -> CCT using the Hernández-Andrés et al. (1999) exponential fit.
//! Everything here is a pure function of its input. Results outside the fit's
//! domain come back as `NaN` so they show up in the log and on the image
//! instead of aborting the pass.

use crate::observation::Rgb;

/// D65 white point chromaticity, returned for a black (all-zero) reading.
pub const D65_XY: (f64, f64) = (0.3127, 0.3290);

/// sRGB to XYZ matrix for the D65 reference white.
const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.412_390_8, 0.357_584_34, 0.180_480_79],
    [0.212_639_01, 0.715_168_68, 0.072_192_32],
    [0.019_330_82, 0.119_194_78, 0.950_532_15],
];

/// Above this the low-temperature fit is replaced by the high-temperature one.
const HIGH_RANGE_THRESHOLD_K: f64 = 50_000.0;

/// Tristimulus values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Estimate the correlated colour temperature of an RGB reading in Kelvin.
///
/// Channels are clamped to `[0, 255]`. Returns `NaN` for non-finite input or
/// when the chromaticity falls outside the range the approximation covers.
pub fn correlated_color_temperature(rgb: Rgb) -> f64 {
    if rgb.channels().iter().any(|c| !c.is_finite()) {
        return f64::NAN;
    }

    let xyz = srgb_to_xyz(rgb);
    let (x, y) = xyz_to_xy(xyz);
    let cct = xy_to_cct_hernandez1999(x, y);

    if cct.is_finite() && cct >= 0.0 {
        cct
    } else {
        f64::NAN
    }
}

/// Convert an 8-bit sRGB reading into XYZ tristimulus values.
pub fn srgb_to_xyz(rgb: Rgb) -> Xyz {
    let linear = rgb
        .channels()
        .map(|c| srgb_decode((c / 255.0).clamp(0.0, 1.0)));

    let row = |r: [f64; 3]| r[0] * linear[0] + r[1] * linear[1] + r[2] * linear[2];

    Xyz {
        x: row(SRGB_TO_XYZ[0]),
        y: row(SRGB_TO_XYZ[1]),
        z: row(SRGB_TO_XYZ[2]),
    }
}

/// Project XYZ onto the chromaticity plane.
///
/// A zero sum has no chromaticity, so the D65 white point stands in.
pub fn xyz_to_xy(xyz: Xyz) -> (f64, f64) {
    let sum = xyz.x + xyz.y + xyz.z;
    if sum == 0.0 {
        return D65_XY;
    }
    (xyz.x / sum, xyz.y / sum)
}

/// Hernández-Andrés, Lee & Romero (1999) CCT approximation.
pub fn xy_to_cct_hernandez1999(x: f64, y: f64) -> f64 {
    let n = (x - 0.3366) / (y - 0.1735);
    let cct = -949.863_15
        + 6_253.803_38 * (-n / 0.921_59).exp()
        + 28.705_99 * (-n / 0.200_39).exp()
        + 0.000_04 * (-n / 0.071_25).exp();

    if cct <= HIGH_RANGE_THRESHOLD_K {
        return cct;
    }

    let n = (x - 0.3356) / (y - 0.1691);
    36_284.489_53 + 0.002_28 * (-n / 0.078_61).exp() + 5.4535e-36 * (-n / 0.015_43).exp()
}

/// sRGB electro-optical transfer function (gamma decode).
fn srgb_decode(c: f64) -> f64 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
