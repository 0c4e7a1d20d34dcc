//! Optical constants and coefficient data
//!
//! Pure-water optical properties and QAA v6 coefficients used by the
//! absorption estimator.

/// First wavelength of [`AW_POPE_FRY`] [nm]
pub const AW_START: f64 = 380.0;
/// Sampling step of [`AW_POPE_FRY`] [nm]
pub const AW_STEP: f64 = 2.5;

/// Pure-water absorption coefficient [m^-1], 380 to 727.5 nm every 2.5 nm.
///
/// Pope, R. M., & Fry, E. S. (1997). Absorption spectrum (380-700 nm) of pure
/// water. II. Integrating cavity measurements. *Applied Optics*, 36(33), 8710-8723.
#[rustfmt::skip]
pub const AW_POPE_FRY: [f64; 140] = [
    0.01137, 0.01044, 0.00941, 0.00917, 0.00851, 0.00829, 0.00813, 0.00775, // 380
    0.00663, 0.00579, 0.00530, 0.00503, 0.00473, 0.00452, 0.00444, 0.00442, // 400
    0.00454, 0.00474, 0.00478, 0.00482, 0.00495, 0.00504, 0.00530, 0.00580, // 420
    0.00635, 0.00696, 0.00751, 0.00830, 0.00922, 0.00969, 0.00962, 0.00957, // 440
    0.00979, 0.01005, 0.01011, 0.01020, 0.01060, 0.01090, 0.01140, 0.01210, // 460
    0.01270, 0.01310, 0.01360, 0.01440, 0.01500, 0.01560, 0.01629, 0.01733, // 480
    0.02040, 0.02288, 0.02560, 0.02899, 0.03250, 0.03400, 0.03500, 0.03710, // 500
    0.04090, 0.04160, 0.04170, 0.04280, 0.04340, 0.04470, 0.04520, 0.04580, // 520
    0.04740, 0.04860, 0.05110, 0.05370, 0.05650, 0.05790, 0.05960, 0.06050, // 540
    0.06190, 0.06370, 0.06420, 0.06720, 0.06950, 0.07330, 0.07720, 0.08360, // 560
    0.08960, 0.09890, 0.11000, 0.12200, 0.13510, 0.15160, 0.16720, 0.19250, // 580
    0.22240, 0.24700, 0.25770, 0.26290, 0.26440, 0.26780, 0.26550, 0.26910, // 600
    0.27550, 0.28000, 0.28340, 0.28690, 0.29160, 0.29720, 0.30270, 0.30900, // 620
    0.31080, 0.31500, 0.32500, 0.33000, 0.34000, 0.35100, 0.36500, 0.37900, // 640
    0.41000, 0.42400, 0.42900, 0.43600, 0.43900, 0.44800, 0.45000, 0.45900, // 660
    0.46500, 0.47500, 0.48600, 0.50000, 0.51600, 0.53900, 0.55900, 0.58800, // 680
    0.62400, 0.66300, 0.70400, 0.75600, 0.82700, 0.91400, 1.00700, 1.11900, // 700
    1.23100, 1.36400, 1.48900, 1.66000, // 720
];

/// Pure seawater backscattering, bbw(λ) = BBW_400 (400 / λ)^BBW_EXPONENT
/// (Morel 1974, as used by Lee et al. 2002)
pub const BBW_400: f64 = 0.0038;
pub const BBW_EXPONENT: f64 = 4.32;

/// Target wavelengths of the QAA band ratios (nm)
pub const BLUE_443: f64 = 443.0;
pub const BLUE_490: f64 = 490.0;
/// QAA reference wavelength (nm)
pub const LAMBDA_0: f64 = 555.0;
pub const RED_670: f64 = 670.0;

/// Largest distance between a QAA target wavelength and the grid band used for it (nm)
pub const REFERENCE_BAND_TOLERANCE: f64 = 15.0;

/// Above-to-below surface conversion, rrs = Rrs / (T0 + T1 * Rrs)
pub const T0: f64 = 0.52;
pub const T1: f64 = 1.7;

pub const G0: f64 = 0.08945;
pub const G1: f64 = 0.1247;

/// Default coefficients for SeaWiFS
/// https://oceancolor.gsfc.nasa.gov/docs/ocssw/qaa_8c_source.html
pub const C1: f64 = -1.146;
pub const C2: f64 = -1.366;
pub const C3: f64 = -0.469;

/// Pure-water absorption at `wavelength`, linearly interpolated in
/// [`AW_POPE_FRY`] and held at the ends of the table.
pub fn water_absorption(wavelength: f64) -> f64 {
    let last = AW_POPE_FRY.len() - 1;
    let position = ((wavelength - AW_START) / AW_STEP).clamp(0.0, last as f64);
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(last);
    let t = position - lower as f64;
    AW_POPE_FRY[lower] + t * (AW_POPE_FRY[upper] - AW_POPE_FRY[lower])
}

/// Pure seawater backscattering at `wavelength` [m^-1].
pub fn water_backscattering(wavelength: f64) -> f64 {
    BBW_400 * (400.0 / wavelength).powf(BBW_EXPONENT)
}
