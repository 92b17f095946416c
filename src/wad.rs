//! WAD Directory View
//!
//! The core does not read WAD files; the external loader hands over a
//! lump directory (names and lengths, plus raw bytes for the handful
//! of lumps the core consumes directly: `COMPLVL`, `OPTIONS`, demo
//! lumps). The headless driver feeds this from a JSON manifest.

use serde::{Deserialize, Serialize};

use crate::compat::CompatLevel;
use crate::game::GameMode;

/// One directory entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LumpInfo {
    pub name: String,
    pub length: u32,
    /// Raw bytes, present only for the lumps the core reads itself.
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

/// The loaded WAD set as the core sees it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WadDirectory {
    iwad: String,
    pwads: Vec<String>,
    lumps: Vec<LumpInfo>,
}

impl WadDirectory {
    pub fn new(iwad: String, pwads: Vec<String>, lumps: Vec<LumpInfo>) -> WadDirectory {
        WadDirectory { iwad, pwads, lumps }
    }

    /// Parse a JSON manifest (the headless stand-in for the real
    /// loader).
    pub fn from_manifest_json(json: &str) -> Result<WadDirectory, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn iwad_name(&self) -> &str {
        &self.iwad
    }

    pub fn pwads(&self) -> &[String] {
        &self.pwads
    }

    pub fn num_lumps(&self) -> usize {
        self.lumps.len()
    }

    /// Last lump with this name, like the classic directory search
    /// (later WADs override earlier ones).
    pub fn check_num_for_name(&self, name: &str) -> Option<usize> {
        self.lumps
            .iter()
            .rposition(|l| l.name.eq_ignore_ascii_case(name))
    }

    pub fn lump_length(&self, index: usize) -> u32 {
        self.lumps.get(index).map(|l| l.length).unwrap_or(0)
    }

    /// Raw bytes of a named lump, when the manifest carried them.
    pub fn lump_data(&self, name: &str) -> Option<&[u8]> {
        self.check_num_for_name(name)
            .and_then(|i| self.lumps[i].data.as_deref())
    }

    /// The map marker lump name for a slot.
    pub fn map_lump_name(mode: GameMode, episode: u32, map: u32) -> String {
        if mode == GameMode::Commercial {
            format!("MAP{:02}", map)
        } else {
            format!("E{}M{}", episode, map)
        }
    }

    /// A signature for the current WAD set, used to distinguish wads
    /// for savegame compatibility warnings: fold the lengths of the
    /// ten lumps after the map marker.
    pub fn signature(&self, mode: GameMode, episode: u32, map: u32) -> u64 {
        let name = Self::map_lump_name(mode, episode, map);
        let mut s: u64 = 0;
        if let Some(lump) = self.check_num_for_name(&name) {
            if lump + 10 < self.lumps.len() {
                let mut i = lump + 10;
                while i > lump {
                    s = s.wrapping_mul(2).wrapping_add(self.lump_length(i) as u64);
                    i -= 1;
                }
            }
        }
        s
    }

    /// The WAD-embedded compatibility level, if a `COMPLVL` lump is
    /// present and well-formed.
    pub fn complvl(&self) -> Option<CompatLevel> {
        self.lump_data("COMPLVL")
            .and_then(CompatLevel::parse_complvl_lump)
    }

    /// The embedded OPTIONS lump (key/value text overlaying the user
    /// defaults below MBF demo options).
    pub fn options_lump(&self) -> Option<&[u8]> {
        self.lump_data("OPTIONS")
    }

    /// Commercial secret levels present (the German edition shipped
    /// without them).
    pub fn has_wolf_levels(&self) -> bool {
        self.check_num_for_name("MAP31").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lump(name: &str, length: u32) -> LumpInfo {
        LumpInfo {
            name: name.to_string(),
            length,
            data: None,
        }
    }

    fn map_wad() -> WadDirectory {
        let mut lumps = vec![lump("MAP01", 0)];
        for (i, name) in [
            "THINGS", "LINEDEFS", "SIDEDEFS", "VERTEXES", "SEGS", "SSECTORS", "NODES",
            "SECTORS", "REJECT", "BLOCKMAP",
        ]
        .iter()
        .enumerate()
        {
            lumps.push(lump(name, 100 + i as u32));
        }
        lumps.push(lump("TRAILER", 7));
        WadDirectory::new("DOOM2.WAD".into(), vec!["A.WAD".into()], lumps)
    }

    #[test]
    fn test_signature_folds_ten_lumps() {
        let wad = map_wad();
        let sig = wad.signature(GameMode::Commercial, 1, 1);
        // Hand-fold: lumps 10 down to 1.
        let mut expect: u64 = 0;
        for i in (1..=10).rev() {
            expect = expect * 2 + wad.lump_length(i) as u64;
        }
        assert_eq!(sig, expect);
        assert_ne!(sig, 0);
    }

    #[test]
    fn test_signature_missing_map_is_zero() {
        let wad = map_wad();
        assert_eq!(wad.signature(GameMode::Commercial, 1, 2), 0);
        assert_eq!(wad.signature(GameMode::Retail, 1, 1), 0);
    }

    #[test]
    fn test_signature_changes_with_lengths() {
        let a = map_wad();
        let mut b = map_wad();
        b.lumps[3].length += 1;
        assert_ne!(
            a.signature(GameMode::Commercial, 1, 1),
            b.signature(GameMode::Commercial, 1, 1)
        );
    }

    #[test]
    fn test_last_lump_wins() {
        let mut wad = map_wad();
        wad.lumps.push(LumpInfo {
            name: "COMPLVL".into(),
            length: 3,
            data: Some(b"mbf".to_vec()),
        });
        wad.lumps.push(LumpInfo {
            name: "COMPLVL".into(),
            length: 5,
            data: Some(b"mbf21".to_vec()),
        });
        assert_eq!(wad.complvl(), Some(CompatLevel::Mbf21));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let wad = map_wad();
        let json = serde_json::to_string(&wad).unwrap();
        let back = WadDirectory::from_manifest_json(&json).unwrap();
        assert_eq!(back.iwad_name(), "DOOM2.WAD");
        assert_eq!(back.pwads(), &["A.WAD".to_string()]);
        assert_eq!(back.num_lumps(), wad.num_lumps());
    }

    #[test]
    fn test_wolf_levels_detection() {
        let mut wad = map_wad();
        assert!(!wad.has_wolf_levels());
        wad.lumps.push(lump("MAP31", 0));
        assert!(wad.has_wolf_levels());
    }
}
