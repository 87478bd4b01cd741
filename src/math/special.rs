//! Special functions needed by the survival families.
//!
//! Numerical notes:
//! - `erfc` uses W. J. Cody's rational approximations (Math. Comp. 1969) on
//!   three intervals, accurate to roughly double precision throughout.
//! - Log-normal likelihoods need `ln(1 - Φ(z))` far into the upper tail, where
//!   `1 - Φ(z)` underflows long before its logarithm does. For `x > 0.46875`
//!   erfc is computed as `exp(-x²) · R(x)`, so `ln erfc` keeps the exponent in
//!   log space and stays finite for any finite `x`.
//! - `ln(1 + e^u)` is evaluated branch-wise so it neither overflows for large
//!   `u` nor loses precision for very negative `u`.

use std::f64::consts::{LN_2, PI, SQRT_2};

/// Boundary between the `erf` series and the first `erfc` fraction.
const ERF_SMALL: f64 = 0.46875;
/// Boundary between the two `erfc` fractions.
const ERFC_MID: f64 = 4.0;
/// `1 / sqrt(π)`.
const FRAC_1_SQRT_PI: f64 = 0.564_189_583_547_756_286_95;

const ERF_A: [f64; 5] = [
    3.161_123_743_870_565_6e0,
    1.138_641_541_510_501_56e2,
    3.774_852_376_853_020_21e2,
    3.209_377_589_138_469_47e3,
    1.857_777_061_846_031_53e-1,
];
const ERF_B: [f64; 4] = [
    2.360_129_095_234_412_09e1,
    2.440_246_379_344_441_73e2,
    1.282_616_526_077_372_28e3,
    2.844_236_833_439_170_62e3,
];

const ERFC_C: [f64; 9] = [
    5.641_884_969_886_700_89e-1,
    8.883_149_794_388_375_94e0,
    6.611_919_063_714_162_95e1,
    2.986_351_381_974_001_31e2,
    8.819_522_212_417_690_9e2,
    1.712_047_612_634_070_58e3,
    2.051_078_377_826_071_47e3,
    1.230_339_354_797_997_25e3,
    2.153_115_354_744_038_46e-8,
];
const ERFC_D: [f64; 8] = [
    1.574_492_611_070_983_47e1,
    1.176_939_508_913_124_99e2,
    5.371_811_018_620_098_58e2,
    1.621_389_574_566_690_19e3,
    3.290_799_235_733_459_63e3,
    4.362_619_090_143_247_16e3,
    3.439_367_674_143_721_64e3,
    1.230_339_354_803_749_42e3,
];

const ERFC_P: [f64; 6] = [
    3.053_266_349_612_323_44e-1,
    3.603_448_999_498_044_39e-1,
    1.257_817_261_112_292_46e-1,
    1.608_378_514_874_227_66e-2,
    6.587_491_615_298_378_03e-4,
    1.631_538_713_730_209_78e-2,
];
const ERFC_Q: [f64; 5] = [
    2.568_520_192_289_822_42e0,
    1.872_952_849_923_467_25e0,
    5.279_051_029_514_284_12e-1,
    6.051_834_131_244_131_91e-2,
    2.335_204_976_268_691_85e-3,
];

/// `erf(x)` for `|x| <= 0.46875`.
fn erf_small(x: f64) -> f64 {
    let ysq = x * x;
    let mut num = ERF_A[4] * ysq;
    let mut den = ysq;
    for i in 0..3 {
        num = (num + ERF_A[i]) * ysq;
        den = (den + ERF_B[i]) * ysq;
    }
    x * (num + ERF_A[3]) / (den + ERF_B[3])
}

/// `ln erfc(y)` for `y > 0.46875`.
fn ln_erfc_upper(y: f64) -> f64 {
    let ratio = if y <= ERFC_MID {
        let mut num = ERFC_C[8] * y;
        let mut den = y;
        for i in 0..7 {
            num = (num + ERFC_C[i]) * y;
            den = (den + ERFC_D[i]) * y;
        }
        (num + ERFC_C[7]) / (den + ERFC_D[7])
    } else {
        let ysq = 1.0 / (y * y);
        let mut num = ERFC_P[5] * ysq;
        let mut den = ysq;
        for i in 0..4 {
            num = (num + ERFC_P[i]) * ysq;
            den = (den + ERFC_Q[i]) * ysq;
        }
        let tail = ysq * (num + ERFC_P[4]) / (den + ERFC_Q[4]);
        (FRAC_1_SQRT_PI - tail) / y
    };
    // Split y² so the large part is exact in binary.
    let head = (y * 16.0).trunc() / 16.0;
    let rest = (y - head) * (y + head);
    -head * head - rest + ratio.ln()
}

/// Complementary error function.
pub fn erfc(x: f64) -> f64 {
    let y = x.abs();
    if y <= ERF_SMALL {
        1.0 - erf_small(x)
    } else if x > 0.0 {
        ln_erfc_upper(y).exp()
    } else {
        2.0 - ln_erfc_upper(y).exp()
    }
}

/// `ln(erfc(x))`, valid for all finite `x`.
pub fn ln_erfc(x: f64) -> f64 {
    let y = x.abs();
    if y <= ERF_SMALL {
        (-erf_small(x)).ln_1p()
    } else if x > 0.0 {
        ln_erfc_upper(y)
    } else {
        // erfc(-y) = 2 - erfc(y), bounded in [1, 2].
        (2.0 - ln_erfc_upper(y).exp()).ln()
    }
}

/// `ln(1 - Φ(z))` for the standard normal distribution.
pub fn normal_log_sf(z: f64) -> f64 {
    ln_erfc(z / SQRT_2) - LN_2
}

/// `1 - Φ(z)` for the standard normal distribution.
pub fn normal_sf(z: f64) -> f64 {
    normal_log_sf(z).exp()
}

/// `ln φ(z)` for the standard normal distribution.
pub fn normal_log_pdf(z: f64) -> f64 {
    -0.5 * z * z - 0.5 * (2.0 * PI).ln()
}

/// `ln(1 + e^u)`.
pub fn softplus(u: f64) -> f64 {
    if u > 0.0 {
        u + (-u).exp().ln_1p()
    } else {
        u.exp().ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rel(got: f64, want: f64, tol: f64) {
        assert!(((got - want) / want).abs() < tol, "got {got:e}, want {want:e}");
    }

    #[test]
    fn erfc_matches_double_precision_references() {
        let cases = [
            (0.0, 1.0),
            (0.1, 0.887_537_083_981_715_1),
            (0.5, 0.479_500_122_186_953_5),
            (1.0, 0.157_299_207_050_285_13),
            (2.0, 0.004_677_734_981_047_266),
            (3.0, 2.209_049_699_858_544e-5),
            (5.0, 1.537_459_794_428_034_9e-12),
            (-1.0, 1.842_700_792_949_714_8),
            (-0.1, 1.112_462_916_018_284_9),
        ];
        for (x, want) in cases {
            assert_rel(erfc(x), want, 1e-13);
            assert_rel(ln_erfc(x).exp(), want, 1e-13);
        }
    }

    #[test]
    fn ln_erfc_stays_finite_where_erfc_underflows() {
        assert_rel(erfc(10.0), 2.088_487_583_762_545e-45, 1e-13);
        assert_eq!(erfc(30.0), 0.0);
        // ln erfc(30) = -900 - ln(30 sqrt(pi)) + O(1/1800).
        let v = ln_erfc(30.0);
        assert!(v.is_finite());
        assert!((v + 900.0 + (30.0 * PI.sqrt()).ln()).abs() < 1e-3, "got {v}");
    }

    #[test]
    fn normal_sf_matches_reference_quantiles() {
        assert!((normal_sf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_sf(1.959_963_985) - 0.025).abs() < 1e-7);
        assert!((normal_sf(-1.959_963_985) - 0.975).abs() < 1e-7);
        assert_rel(normal_sf(1.0), 0.158_655_253_931_457_07, 1e-13);
    }

    #[test]
    fn normal_log_sf_is_finite_deep_in_the_tail() {
        // ln(1 - Φ(10)) = ln(7.6198530241605e-24)
        let v = normal_log_sf(10.0);
        assert!((v + 53.231_285_150_512_47).abs() < 1e-10, "got {v}");
        assert!(normal_log_sf(40.0).is_finite());
        assert!(normal_log_sf(-40.0).abs() < 1e-12);
    }

    #[test]
    fn softplus_is_stable_at_extremes() {
        assert!((softplus(0.0) - LN_2).abs() < 1e-15);
        assert!((softplus(800.0) - 800.0).abs() < 1e-12);
        assert!(softplus(-800.0) >= 0.0);
        assert!(softplus(-800.0) < 1e-300);
    }
}
