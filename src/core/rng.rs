//! Class-Indexed Deterministic PRNG
//!
//! One 256-byte scramble table and an 8-bit cursor per draw *class*.
//! Unrelated systems draw from unrelated classes, so adding a random
//! call to one subsystem cannot perturb another's sequence - the
//! property every demo and netgame depends on.
//!
//! # Determinism Guarantee
//!
//! `random(class)` advances exactly one class cursor and returns a value
//! that depends only on that cursor, the compat-level seed mix, and the
//! insurance phase. Given the same seed and call sequence the PRNG
//! produces identical output on any platform.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::compat::CompatLevel;

/// Purpose of a random draw. Every caller names its class so the
/// draw sequences stay independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum RngClass {
    SkullFly,
    Damage,
    Crush,
    GenLift,
    KillTics,
    DamageMobj,
    PainChance,
    Lights,
    Explode,
    Respawn,
    LastLook,
    SpawnThing,
    SpawnPuff,
    SpawnBlood,
    Missile,
    Shadow,
    Plats,
    Punch,
    PunchAngle,
    Saw,
    Plasma,
    Gunshot,
    Misfire,
    Shotgun,
    Bfg,
    SlimeHurt,
    DmSpawn,
    MissRange,
    TryWalk,
    NewChase,
    NewChaseDir,
    See,
    FaceTarget,
    PosAttack,
    TroopAttack,
    SargAttack,
    HeadAttack,
    BruisAttack,
    Tracer,
    SkelFist,
    Scream,
    Misc,
}

/// Number of independent draw classes.
pub const NUM_RNG_CLASSES: usize = RngClass::Misc as usize + 1;

/// Seed mix applied below MBF: a fixed constant, so pre-MBF demos
/// reproduce regardless of the stored seed.
const VANILLA_MIX: u8 = 0;

/// The classic 256-entry scramble table.
#[rustfmt::skip]
const RND_TABLE: [u8; 256] = [
      0,   8, 109, 220, 222, 241, 149, 107,  75, 248, 254, 140,  16,  66,
     74,  21, 211,  47,  80, 242, 154,  27, 205, 128, 161,  89,  77,  36,
     95, 110,  85,  48, 212, 140, 211, 249,  22,  79, 200,  50,  28, 188,
     52, 140, 202, 120,  68, 145,  62,  70, 184, 190,  91, 197, 152, 224,
    149, 104,  25, 178, 252, 182, 202, 182, 141, 197,   4,  81, 181, 242,
    145,  42,  39, 227, 156, 198, 225, 193, 219,  93, 122, 175, 249,   0,
    175, 143,  70, 239,  46, 246, 163,  53, 163, 109, 168, 135,   2, 235,
     25,  92,  20, 145, 138,  77,  69, 166,  78, 176, 173, 212, 166, 113,
     94, 161,  41,  50, 239,  49, 111, 164,  70,  60,   2,  37, 171,  75,
    136, 156,  11,  56,  42, 146, 138, 229,  73, 146,  77,  61,  98, 196,
    135, 106,  63, 197, 195,  86,  96, 203, 113, 101, 170, 247, 181, 113,
     80, 250, 108,   7, 255, 237, 129, 226,  79, 107, 112, 166, 103, 241,
     24, 223, 239, 120, 198,  58,  60,  82, 128,   3, 184,  66, 143, 224,
    145, 224,  81, 206, 163,  45,  63,  90, 168, 114,  59,  33, 159,  95,
     28, 139, 123,  98, 125, 196,  15,  70, 194, 253,  54,  14, 109, 226,
     71,  17, 161,  93, 186,  87, 244, 138,  20,  52, 123, 251,  26,  36,
     17,  46,  52, 231, 232,  76,  31, 221,  84,  37, 216, 165, 212, 106,
    197, 242,  98,  43,  39, 175, 254, 145, 190,  84, 118, 222, 187, 136,
    120, 163, 236, 249,
];

/// Serialized form of the per-class cursor vector; spelled out by hand
/// because the class count exceeds serde's array support.
fn serialize_indices<S>(indices: &[u8; NUM_RNG_CLASSES], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serde::Serialize::serialize(&indices[..], s)
}

fn deserialize_indices<'de, D>(d: D) -> Result<[u8; NUM_RNG_CLASSES], D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: Vec<u8> = serde::Deserialize::deserialize(d)?;
    if v.len() != NUM_RNG_CLASSES {
        return Err(serde::de::Error::invalid_length(v.len(), &"rng class count"));
    }
    let mut out = [0u8; NUM_RNG_CLASSES];
    out.copy_from_slice(&v);
    Ok(out)
}

/// The simulation's random number state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rng {
    #[serde(
        serialize_with = "serialize_indices",
        deserialize_with = "deserialize_indices"
    )]
    indices: [u8; NUM_RNG_CLASSES],
    mix: u8,
    seed: u32,
    /// Demo sync insurance: mixes the tic phase into every draw so a
    /// dropped or duplicated call shows up immediately instead of tics
    /// later.
    insurance: bool,
    /// `gametic - basetic`, maintained by the ticker.
    phase: u32,
}

impl Default for Rng {
    fn default() -> Self {
        Self::new()
    }
}

impl Rng {
    /// Create an unseeded RNG (all cursors at zero, vanilla mix).
    pub fn new() -> Self {
        Self {
            indices: [0; NUM_RNG_CLASSES],
            mix: VANILLA_MIX,
            seed: 0,
            insurance: false,
            phase: 0,
        }
    }

    /// Zero every class cursor and reseed the mix.
    ///
    /// Below MBF the mix is a fixed constant; at MBF and above it is a
    /// deterministic function of the stored seed, so the seed recorded
    /// in a demo or savegame reproduces the exact draw sequence.
    pub fn clear(&mut self, seed: u32, level: CompatLevel) {
        self.indices = [0; NUM_RNG_CLASSES];
        self.seed = seed;
        self.mix = if level >= CompatLevel::Mbf {
            derive_seed_mix(seed)
        } else {
            VANILLA_MIX
        };
    }

    /// Draw the next value for `class` in `[0, 255]`.
    ///
    /// Advances only this class's cursor.
    #[inline]
    pub fn random(&mut self, class: RngClass) -> u8 {
        let i = class as usize;
        self.indices[i] = self.indices[i].wrapping_add(1);
        let mut r = RND_TABLE[self.indices[i] as usize] ^ self.mix;
        if self.insurance {
            r = r.wrapping_add(self.phase.wrapping_mul(7) as u8);
        }
        r
    }

    /// Signed difference of two consecutive draws, in `[-255, 255]`.
    /// The classic spread used for angles and blood offsets.
    #[inline]
    pub fn sub_random(&mut self, class: RngClass) -> i32 {
        let a = self.random(class) as i32;
        a - self.random(class) as i32
    }

    /// Update the insurance phase. Called once per tic by the ticker
    /// with `gametic - basetic`.
    #[inline]
    pub fn set_phase(&mut self, phase: u32) {
        self.phase = phase;
    }

    /// Enable or disable demo sync insurance.
    pub fn set_insurance(&mut self, on: bool) {
        self.insurance = on;
    }

    /// The stored seed (recorded into demos and savegames).
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Snapshot of the per-class cursor vector, for archiving.
    pub fn indices(&self) -> &[u8; NUM_RNG_CLASSES] {
        &self.indices
    }

    /// Restore an archived cursor vector.
    pub fn restore_indices(&mut self, indices: [u8; NUM_RNG_CLASSES]) {
        self.indices = indices;
    }
}

/// Derive the MBF+ seed mix from the stored 32-bit seed.
///
/// Domain-separated SHA-256, truncated to one byte. The exact function
/// does not matter for sync as long as it is pure; hashing keeps weak
/// seeds from producing a degenerate mix.
fn derive_seed_mix(seed: u32) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(b"STYGIA_RNG_MIX_V1");
    hasher.update(seed.to_le_bytes());
    hasher.finalize()[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut a = Rng::new();
        let mut b = Rng::new();
        a.clear(12345, CompatLevel::Mbf);
        b.clear(12345, CompatLevel::Mbf);

        for _ in 0..1000 {
            assert_eq!(a.random(RngClass::Damage), b.random(RngClass::Damage));
        }
    }

    #[test]
    fn test_class_isolation() {
        // Drawing from one class must not advance any other class.
        let mut rng = Rng::new();
        rng.clear(777, CompatLevel::Mbf21);

        let before = *rng.indices();
        for _ in 0..57 {
            rng.random(RngClass::PainChance);
        }
        let after = *rng.indices();

        for i in 0..NUM_RNG_CLASSES {
            if i == RngClass::PainChance as usize {
                assert_eq!(after[i], before[i].wrapping_add(57));
            } else {
                assert_eq!(after[i], before[i], "class {} moved", i);
            }
        }
    }

    #[test]
    fn test_seed_mix_by_level() {
        // Below MBF the stored seed must not change the sequence.
        let mut a = Rng::new();
        let mut b = Rng::new();
        a.clear(1, CompatLevel::Vanilla);
        b.clear(999999, CompatLevel::Boom);
        for _ in 0..64 {
            assert_eq!(a.random(RngClass::Misc), b.random(RngClass::Misc));
        }

        // At MBF the seed feeds the mix.
        let mut c = Rng::new();
        let mut d = Rng::new();
        c.clear(1, CompatLevel::Mbf);
        d.clear(2, CompatLevel::Mbf);
        let cs: Vec<u8> = (0..16).map(|_| c.random(RngClass::Misc)).collect();
        let ds: Vec<u8> = (0..16).map(|_| d.random(RngClass::Misc)).collect();
        assert_ne!(cs, ds);
    }

    #[test]
    fn test_known_values() {
        // Regression pin: these must never change, or recorded demos
        // stop reproducing.
        let mut rng = Rng::new();
        rng.clear(0, CompatLevel::Vanilla);
        assert_eq!(rng.random(RngClass::Misc), 8);
        assert_eq!(rng.random(RngClass::Misc), 109);
        assert_eq!(rng.random(RngClass::Misc), 220);
    }

    #[test]
    fn test_insurance_phase() {
        let mut plain = Rng::new();
        let mut insured = Rng::new();
        plain.clear(5, CompatLevel::Mbf);
        insured.clear(5, CompatLevel::Mbf);
        insured.set_insurance(true);
        insured.set_phase(3);

        let p = plain.random(RngClass::Misc);
        let i = insured.random(RngClass::Misc);
        assert_eq!(i, p.wrapping_add(21));
    }

    #[test]
    fn test_sub_random_range() {
        let mut rng = Rng::new();
        rng.clear(42, CompatLevel::Mbf21);
        for _ in 0..512 {
            let v = rng.sub_random(RngClass::PunchAngle);
            assert!((-255..=255).contains(&v));
        }
    }

    #[test]
    fn test_indices_roundtrip() {
        let mut rng = Rng::new();
        rng.clear(314159, CompatLevel::Mbf);
        for _ in 0..100 {
            rng.random(RngClass::Tracer);
            rng.random(RngClass::See);
        }
        let saved = *rng.indices();
        let upcoming: Vec<u8> = (0..8).map(|_| rng.random(RngClass::Tracer)).collect();

        rng.restore_indices(saved);
        let replayed: Vec<u8> = (0..8).map(|_| rng.random(RngClass::Tracer)).collect();
        assert_eq!(upcoming, replayed);
    }
}
