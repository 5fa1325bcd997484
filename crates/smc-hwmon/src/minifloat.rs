//! Integer-only codec for the SMC's single-precision `flt ` payloads.
//!
//! Values are normalized to milli-units (value × 1000) without touching the FPU. Every shift
//! and divide truncates toward zero, so results can sit one milli-unit below the IEEE
//! round-to-nearest answer; readers depend on that exact behaviour.

const SCALE: u128 = 1_000_000_000;
const TO_MILLI: u128 = 1_000_000;
const BIAS: i32 = 127;
const MANTISSA_BITS: u32 = 23;

fn shift(x: u128, d: i32) -> u128 {
    match d {
        0 => x,
        d if d > 0 => {
            if d >= 128 {
                0
            } else {
                x.wrapping_shl(d as u32)
            }
        }
        d => {
            let r = d.unsigned_abs();
            if r >= 128 {
                0
            } else {
                x >> r
            }
        }
    }
}

/// Decode raw single-precision bits into milli-units.
///
/// Total over all inputs. Scaling runs in 128 bits, so any finite value whose milli-unit
/// result fits an `i64` (up to about 9.2e15) is exact up to truncation. Larger magnitudes,
/// and exponent 255 (NaN/infinity), are not special-cased and wrap to 64 bits.
pub fn decode(bits: u32) -> i64 {
    let negative = bits >> 31 != 0;
    let exponent = ((bits >> MANTISSA_BITS) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    let mut frac: u128 = 0;
    for i in (0..MANTISSA_BITS).rev() {
        if mantissa & (1 << i) != 0 {
            frac += SCALE >> (MANTISSA_BITS - i);
        }
    }

    let magnitude = if exponent == 0 && mantissa == 0 {
        0
    } else if exponent == 0 {
        shift(frac, exponent - BIAS) / TO_MILLI
    } else {
        shift(frac + SCALE, exponent - BIAS) / TO_MILLI
    };

    let value = magnitude as u64 as i64;
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Encode milli-units as the nearest single-precision bit pattern.
pub fn encode(milli: i64) -> u32 {
    if milli == 0 {
        return 0;
    }
    let sign = if milli < 0 { 1u32 << 31 } else { 0 };
    let a = u128::from(milli.unsigned_abs());

    // find e with 1000 <= a / 2^e < 2000
    let at_least = |e: i32, k: u128| -> bool {
        let lhs = if e < 0 { a << e.unsigned_abs() } else { a };
        let rhs = if e > 0 { k << e as u32 } else { k };
        lhs >= rhs
    };
    let mut e = (127 - a.leading_zeros() as i32) - 10;
    while at_least(e, 2000) {
        e += 1;
    }
    while !at_least(e, 1000) {
        e -= 1;
    }

    let (num, den) = if e <= MANTISSA_BITS as i32 {
        (a << (MANTISSA_BITS as i32 - e) as u32, 1000u128)
    } else {
        (a, 1000u128 << (e - MANTISSA_BITS as i32) as u32)
    };
    let mut q = (num + den / 2) / den;
    if q == 1 << (MANTISSA_BITS + 1) {
        e += 1;
        q = 1 << MANTISSA_BITS;
    }

    let biased = (e + BIAS) as u32;
    sign | (biased << MANTISSA_BITS) | (q as u32 & 0x007f_ffff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_unit_values() {
        assert_eq!(decode(0x0000_0000), 0);
        assert_eq!(decode(0x3F80_0000), 1000);
        assert_eq!(decode(0xBF80_0000), -1000);
        assert_eq!(decode(0x3F00_0000), 500);
    }

    #[test]
    fn typical_sensor_readings() {
        // 25.5 degC, 100 W, -40.0
        assert_eq!(decode(0x41CC_0000), 25_500);
        assert_eq!(decode(0x42C8_0000), 100_000);
        assert_eq!(decode(0xC220_0000), -40_000);
        assert_eq!(decode(0x447A_0000), 1_000_000);
    }

    #[test]
    fn truncates_instead_of_rounding() {
        // 0.99999994 -> 999, not 1000
        assert_eq!(decode(0x3F7F_FFFF), 999);
        // pi -> 3141
        assert_eq!(decode(0x4049_0FDB), 3141);
        // 0.1 is slightly above 0.1 in binary but still floors to 100
        assert_eq!(decode(0x3DCC_CCCD), 100);
        // 8388609.0: accumulated truncation leaves the result just under the exact value
        assert_eq!(decode(0x4B00_0001), 8_388_608_998);
    }

    #[test]
    fn subnormals_take_the_subnormal_branch() {
        let sub = decode(0x0040_0000);
        let normal = decode(0x3FC0_0000);
        assert_eq!(sub, 0);
        assert_eq!(normal, 1500);
        assert!(sub.abs() < normal.abs());
        // smallest normal does not reach a milli-unit either
        assert!(decode(0x0000_0001).abs() <= decode(0x0080_0001).abs());
    }

    #[test]
    fn large_finite_values_are_exact() {
        // 2^35 and 2^53
        assert_eq!(decode(0x5100_0000), 34_359_738_368_000);
        assert_eq!(decode(0xD100_0000), -34_359_738_368_000);
        assert_eq!(decode(0x5A00_0000), 9_007_199_254_740_992_000);
        let mut prev = 0;
        for exp in 128u32..=180 {
            let v = decode(exp << MANTISSA_BITS);
            assert!(v > prev, "exponent {exp}");
            prev = v;
        }
    }

    #[test]
    fn total_over_special_exponents() {
        // no panics for infinities, NaNs or huge exponents
        for bits in [0x7F80_0000u32, 0xFF80_0000, 0x7FC0_0000, 0x7F7F_FFFF, 0xFFFF_FFFF] {
            let _ = decode(bits);
        }
    }

    #[test]
    fn encode_matches_ieee_bit_patterns() {
        assert_eq!(encode(0), 0);
        assert_eq!(encode(1000), 0x3F80_0000);
        assert_eq!(encode(-1000), 0xBF80_0000);
        assert_eq!(encode(25_500), 0x41CC_0000);
        assert_eq!(encode(100), 0x3DCC_CCCD);
        assert_eq!(encode(1), 0x3A83_126F);
    }

    #[test]
    fn encode_then_decode_stays_within_a_milli_unit() {
        for milli in -99_999i64..100_000 {
            let back = decode(encode(milli));
            assert!((back - milli).abs() <= 1, "{milli} -> {back}");
        }
    }
}
