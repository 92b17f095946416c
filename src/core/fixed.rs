//! 16.16 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the simulation. All gameplay
//! quantities - positions, velocities, friction, damage scaling - use
//! this representation; no floats anywhere that affects state.
//!
//! ## Format: 16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: 16.16 (32-bit signed integer)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                     │
//! │   │  └── 15 bits ────┘└──── 16 bits ───┘                    │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 map units                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A map unit is roughly an inch; 16 integer bits cover the largest
//! legal map while the fractional bits give sub-pixel movement.

/// 16.16 fixed-point number stored as i32.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FRACBITS: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FRACUNIT: Fixed = 1 << FRACBITS;

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or table construction. NEVER in the tic loop.
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FRACUNIT as f64)) as Fixed
}

/// Convert fixed-point to float for display/logging.
///
/// # Warning
/// Only use for output. NEVER use the result in game logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FRACUNIT as f32
}

/// Multiply two fixed-point numbers.
///
/// The exact rounding of the 64-bit product scaled down by 2^16:
/// widen, multiply, arithmetic shift right. Truncates toward negative
/// infinity, which is what every historical engine revision did.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FRACBITS) as Fixed
}

/// Divide two fixed-point numbers.
///
/// Saturates when the quotient would not fit, matching the original
/// engine's pre-check (`abs(a) >> 14 >= abs(b)` means overflow).
/// Division by zero saturates rather than panicking; the simulation
/// must never abort on arithmetic.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if (a.wrapping_abs() >> 14) >= b.wrapping_abs() {
        if (a ^ b) < 0 {
            i32::MIN
        } else {
            i32::MAX
        }
    } else {
        let wide = (a as i64) << FRACBITS;
        (wide / b as i64) as Fixed
    }
}

/// Absolute value of a fixed-point number.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    if x < 0 {
        x.wrapping_neg()
    } else {
        x
    }
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_constants() {
        assert_eq!(FRACUNIT, 65536);
        assert_eq!(FRACBITS, 16);
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.0), FRACUNIT);
        assert_eq!(to_fixed(0.5), FRACUNIT / 2);
        assert_eq!(to_fixed(2.0), FRACUNIT * 2);
        assert_eq!(to_fixed(-1.0), -FRACUNIT);
    }

    #[test]
    fn test_fixed_mul() {
        // 2.0 * 3.0 = 6.0
        assert_eq!(fixed_mul(to_fixed(2.0), to_fixed(3.0)), to_fixed(6.0));

        // 0.5 * 0.5 = 0.25
        assert_eq!(fixed_mul(FRACUNIT / 2, FRACUNIT / 2), to_fixed(0.25));

        // Negative: -2.0 * 3.0 = -6.0
        assert_eq!(fixed_mul(to_fixed(-2.0), to_fixed(3.0)), to_fixed(-6.0));

        // Truncation is toward negative infinity for negative products
        assert_eq!(fixed_mul(-1, 1), -1);
    }

    #[test]
    fn test_fixed_div() {
        assert_eq!(fixed_div(to_fixed(6.0), to_fixed(2.0)), to_fixed(3.0));
        assert_eq!(fixed_div(FRACUNIT, to_fixed(4.0)), to_fixed(0.25));

        // Overflow saturates with the sign of the quotient
        assert_eq!(fixed_div(to_fixed(30000.0), 1), i32::MAX);
        assert_eq!(fixed_div(to_fixed(-30000.0), 1), i32::MIN);

        // Division by zero saturates instead of panicking
        assert_eq!(fixed_div(FRACUNIT, 0), i32::MAX);
        assert_eq!(fixed_div(-FRACUNIT, 0), i32::MIN);
    }

    #[test]
    fn test_fixed_abs_clamp() {
        assert_eq!(fixed_abs(-FRACUNIT), FRACUNIT);
        assert_eq!(fixed_abs(FRACUNIT), FRACUNIT);
        assert_eq!(fixed_clamp(to_fixed(5.0), 0, FRACUNIT), FRACUNIT);
        assert_eq!(fixed_clamp(to_fixed(-5.0), 0, FRACUNIT), 0);
    }

    #[test]
    fn test_fixed_determinism() {
        // Same inputs must produce same outputs
        let a = 12345678;
        let b = 87654321;
        for _ in 0..1000 {
            assert_eq!(fixed_mul(a, b), fixed_mul(a, b));
            assert_eq!(fixed_div(a, b), fixed_div(a, b));
        }
    }
}
