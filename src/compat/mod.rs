//! Compatibility Levels
//!
//! A single enum names the engine revision whose quirks the simulation
//! emulates. The resolver (`resolver` module) expands a level plus
//! overrides into the full behavior vector every simulation check
//! reads.

use serde::{Deserialize, Serialize};

pub mod resolver;

pub use resolver::{Behavior, Comp, Overrides, UserDefaults, COMP_TOTAL};

/// Engine revision lineage. Ordering matters: later revisions are
/// "greater", so `level >= CompatLevel::Mbf` gates MBF-and-up features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompatLevel {
    /// Original executable behavior (demo version 109, or 111 with
    /// long angle deltas).
    Vanilla = 0,
    /// Boom (demo versions 200/202).
    Boom = 1,
    /// MBF (demo version 203).
    Mbf = 2,
    /// MBF21 (demo version 221).
    Mbf21 = 3,
}

/// Executable flavor within the vanilla lineage. Only affects vanilla
/// demo quirks and which episodes exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameVersion {
    /// Doom 1.9 (registered / commercial)
    Doom19 = 0,
    /// Ultimate Doom (episode 4)
    Ultimate = 1,
    /// Final Doom (TNT / Plutonia)
    Final = 2,
    /// Chex Quest
    Chex = 3,
}

impl CompatLevel {
    /// The demo-version byte this level records.
    pub fn demo_version(self, longtics: bool) -> u8 {
        match self {
            CompatLevel::Vanilla => {
                if longtics {
                    111
                } else {
                    109
                }
            }
            CompatLevel::Boom => 202,
            CompatLevel::Mbf => 203,
            CompatLevel::Mbf21 => 221,
        }
    }

    /// Classify a demo-version byte. Returns `None` for unknown
    /// lineages (PrBoom's own 210+ range, for example).
    pub fn from_demo_version(version: u8) -> Option<CompatLevel> {
        match version {
            0..=199 => Some(CompatLevel::Vanilla),
            200..=202 => Some(CompatLevel::Boom),
            203..=204 => Some(CompatLevel::Mbf),
            221 => Some(CompatLevel::Mbf21),
            _ => None,
        }
    }

    /// Human-readable name, used in logs and the demo footer.
    pub fn name(self) -> &'static str {
        match self {
            CompatLevel::Vanilla => "vanilla",
            CompatLevel::Boom => "boom",
            CompatLevel::Mbf => "mbf",
            CompatLevel::Mbf21 => "mbf21",
        }
    }

    /// Parse a `-complevel` argument: a name or a numeric id. Some
    /// names also pin the executable flavor.
    pub fn parse_named(arg: &str) -> Option<(CompatLevel, Option<GameVersion>)> {
        let named: &[(&str, CompatLevel, Option<GameVersion>)] = &[
            ("vanilla", CompatLevel::Vanilla, None),
            ("doom2", CompatLevel::Vanilla, Some(GameVersion::Doom19)),
            ("1.9", CompatLevel::Vanilla, Some(GameVersion::Doom19)),
            ("2", CompatLevel::Vanilla, Some(GameVersion::Doom19)),
            ("ultimate", CompatLevel::Vanilla, Some(GameVersion::Ultimate)),
            ("3", CompatLevel::Vanilla, Some(GameVersion::Ultimate)),
            ("final", CompatLevel::Vanilla, Some(GameVersion::Final)),
            ("tnt", CompatLevel::Vanilla, Some(GameVersion::Final)),
            ("plutonia", CompatLevel::Vanilla, Some(GameVersion::Final)),
            ("4", CompatLevel::Vanilla, Some(GameVersion::Final)),
            ("boom", CompatLevel::Boom, None),
            ("9", CompatLevel::Boom, None),
            ("mbf", CompatLevel::Mbf, None),
            ("11", CompatLevel::Mbf, None),
            ("mbf21", CompatLevel::Mbf21, None),
            ("21", CompatLevel::Mbf21, None),
        ];
        named
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(arg))
            .map(|&(_, level, exe)| (level, exe))
    }

    /// Parse the contents of a WAD-embedded `COMPLVL` lump.
    pub fn parse_complvl_lump(data: &[u8]) -> Option<CompatLevel> {
        let text = std::str::from_utf8(data).ok()?;
        match text.trim_end() {
            t if t.eq_ignore_ascii_case("vanilla") => Some(CompatLevel::Vanilla),
            t if t.eq_ignore_ascii_case("boom") => Some(CompatLevel::Boom),
            t if t.eq_ignore_ascii_case("mbf") => Some(CompatLevel::Mbf),
            t if t.eq_ignore_ascii_case("mbf21") => Some(CompatLevel::Mbf21),
            _ => None,
        }
    }
}

impl GameVersion {
    /// Command-line spelling for the demo footer.
    pub fn cmdline_name(self) -> &'static str {
        match self {
            GameVersion::Doom19 => "1.9",
            GameVersion::Ultimate => "ultimate",
            GameVersion::Final => "final",
            GameVersion::Chex => "chex",
        }
    }

    /// Parse a `-gameversion` argument.
    pub fn parse(arg: &str) -> Option<GameVersion> {
        match arg {
            "1.9" => Some(GameVersion::Doom19),
            "ultimate" => Some(GameVersion::Ultimate),
            "final" => Some(GameVersion::Final),
            "chex" => Some(GameVersion::Chex),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(CompatLevel::Vanilla < CompatLevel::Boom);
        assert!(CompatLevel::Boom < CompatLevel::Mbf);
        assert!(CompatLevel::Mbf < CompatLevel::Mbf21);
    }

    #[test]
    fn test_demo_version_mapping() {
        assert_eq!(CompatLevel::Vanilla.demo_version(false), 109);
        assert_eq!(CompatLevel::Vanilla.demo_version(true), 111);
        assert_eq!(CompatLevel::Boom.demo_version(false), 202);
        assert_eq!(CompatLevel::Mbf.demo_version(false), 203);
        assert_eq!(CompatLevel::Mbf21.demo_version(false), 221);

        assert_eq!(CompatLevel::from_demo_version(109), Some(CompatLevel::Vanilla));
        assert_eq!(CompatLevel::from_demo_version(111), Some(CompatLevel::Vanilla));
        assert_eq!(CompatLevel::from_demo_version(200), Some(CompatLevel::Boom));
        assert_eq!(CompatLevel::from_demo_version(203), Some(CompatLevel::Mbf));
        assert_eq!(CompatLevel::from_demo_version(221), Some(CompatLevel::Mbf21));
        assert_eq!(CompatLevel::from_demo_version(210), None);
        assert_eq!(CompatLevel::from_demo_version(255), None);
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(
            CompatLevel::parse_named("vanilla"),
            Some((CompatLevel::Vanilla, None))
        );
        assert_eq!(
            CompatLevel::parse_named("TNT"),
            Some((CompatLevel::Vanilla, Some(GameVersion::Final)))
        );
        assert_eq!(CompatLevel::parse_named("boom"), Some((CompatLevel::Boom, None)));
        assert_eq!(CompatLevel::parse_named("21"), Some((CompatLevel::Mbf21, None)));
        assert_eq!(CompatLevel::parse_named("prboom"), None);
    }

    #[test]
    fn test_parse_complvl_lump() {
        assert_eq!(
            CompatLevel::parse_complvl_lump(b"mbf"),
            Some(CompatLevel::Mbf)
        );
        assert_eq!(
            CompatLevel::parse_complvl_lump(b"MBF21"),
            Some(CompatLevel::Mbf21)
        );
        assert_eq!(CompatLevel::parse_complvl_lump(b"garbage"), None);
    }
}
