//! Binary Angular Measure
//!
//! Angles are 32-bit unsigned values where the full circle is the full
//! u32 range: `0x40000000` is 90 degrees and wrapping arithmetic gives
//! free modular rotation. Trigonometry is table lookup only - the
//! simulation never calls libm.
//!
//! The tables are built once at startup from f64 math with fixed
//! rounding, the same table-construction-only exemption as
//! [`to_fixed`](crate::core::fixed::to_fixed); after that the
//! simulation reads pure integer data.

use std::sync::OnceLock;

use super::fixed::{Fixed, FRACUNIT};

/// 32-bit binary angle. `0x10000000` = 22.5 degrees.
pub type Angle = u32;

/// 45 degrees
pub const ANG45: Angle = 0x2000_0000;
/// 90 degrees
pub const ANG90: Angle = 0x4000_0000;
/// 180 degrees
pub const ANG180: Angle = 0x8000_0000;
/// 270 degrees
pub const ANG270: Angle = 0xc000_0000;

/// Number of fine angles in a full circle.
pub const FINEANGLES: usize = 8192;
/// Mask for wrapping a fine-angle index.
pub const FINEMASK: usize = FINEANGLES - 1;
/// Right shift to convert a BAM angle to a fine-angle index.
pub const ANGLETOFINESHIFT: u32 = 19;

/// Denominator of the tangent slope used by `tantoangle` lookups.
pub const SLOPERANGE: usize = 2048;

struct TrigTables {
    // finesine has a quarter-turn of overlap so finecosine can be a
    // view at offset FINEANGLES/4
    finesine: Vec<Fixed>,
    finetangent: Vec<Fixed>,
    tantoangle: Vec<Angle>,
}

fn tables() -> &'static TrigTables {
    static TABLES: OnceLock<TrigTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let full = std::f64::consts::PI * 2.0;

        let finesine = (0..FINEANGLES + FINEANGLES / 4)
            .map(|i| {
                let a = (i as f64 + 0.5) / FINEANGLES as f64 * full;
                (a.sin() * FRACUNIT as f64) as Fixed
            })
            .collect();

        let finetangent = (0..FINEANGLES / 2)
            .map(|i| {
                let a = (i as f64 + 0.5 - (FINEANGLES / 4) as f64) / FINEANGLES as f64 * full;
                (a.tan() * FRACUNIT as f64) as Fixed
            })
            .collect();

        let tantoangle = (0..=SLOPERANGE)
            .map(|i| {
                let t = (i as f64 / SLOPERANGE as f64).atan() / full;
                (t * 4294967296.0) as i64 as Angle
            })
            .collect();

        TrigTables {
            finesine,
            finetangent,
            tantoangle,
        }
    })
}

/// Sine of a fine angle, in fixed point.
#[inline]
pub fn finesine(i: usize) -> Fixed {
    tables().finesine[i & FINEMASK]
}

/// Cosine of a fine angle, in fixed point.
///
/// The quarter-turn overlap rows at the end of the sine table make
/// this a plain offset read.
#[inline]
pub fn finecosine(i: usize) -> Fixed {
    tables().finesine[(i & FINEMASK) + FINEANGLES / 4]
}

/// Tangent of a fine angle in `[0, FINEANGLES/2)`, in fixed point.
#[inline]
pub fn finetangent(i: usize) -> Fixed {
    tables().finetangent[i & (FINEANGLES / 2 - 1)]
}

/// Arctangent of `num/den` scaled to `[0, SLOPERANGE]`.
#[inline]
pub fn tantoangle(slope: usize) -> Angle {
    tables().tantoangle[slope.min(SLOPERANGE)]
}

/// Convert a BAM angle to its fine-angle table index.
#[inline]
pub fn fineangle(angle: Angle) -> usize {
    (angle >> ANGLETOFINESHIFT) as usize
}

/// Slope division for angle-from-coordinates lookups. Clamps into the
/// table range exactly like the original renderer/sim shared helper.
#[inline]
pub fn slope_div(num: u32, den: u32) -> usize {
    if den < 512 {
        SLOPERANGE
    } else {
        let ans = ((num << 3) / (den >> 8)) as usize;
        ans.min(SLOPERANGE)
    }
}

/// Angle from the origin to the point `(x, y)`, both fixed.
///
/// Octant decomposition over the `tantoangle` table; this is the
/// deterministic replacement for `atan2` used by monster AI facing.
pub fn point_to_angle(x: Fixed, y: Fixed) -> Angle {
    if x == 0 && y == 0 {
        return 0;
    }
    let (ax, ay) = (x.unsigned_abs(), y.unsigned_abs());
    if x >= 0 {
        if y >= 0 {
            if ax > ay {
                tantoangle(slope_div(ay, ax))
            } else {
                ANG90 - 1 - tantoangle(slope_div(ax, ay))
            }
        } else if ax > ay {
            0u32.wrapping_sub(tantoangle(slope_div(ay, ax)))
        } else {
            ANG270 + tantoangle(slope_div(ax, ay))
        }
    } else if y >= 0 {
        if ax > ay {
            ANG180 - 1 - tantoangle(slope_div(ay, ax))
        } else {
            ANG90 + tantoangle(slope_div(ax, ay))
        }
    } else if ax > ay {
        ANG180 + tantoangle(slope_div(ay, ax))
    } else {
        ANG270 - 1 - tantoangle(slope_div(ax, ay))
    }
}
