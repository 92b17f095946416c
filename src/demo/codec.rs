//! Demo Byte Formats
//!
//! All reading and writing of demo headers, options blocks and
//! per-tic records. Everything is explicit little-endian byte pushes
//! through a cursor; nothing is type-punned across the wire.
//!
//! Version ids: 109 vanilla (111 longtics), 200/202 Boom, 203 MBF,
//! 221 MBF21. Boom and later carry a six-byte signature and an
//! options block; MBF21 drops the compatibility byte and always uses
//! long angle deltas.

use super::{DemoError, DEMOMARKER};
use crate::compat::resolver::{COMP_TOTAL, MBF21_COMP_TOTAL};
use crate::compat::{Behavior, CompatLevel};
use crate::game::ticcmd::TicCmd;
use crate::game::Skill;
use crate::{MAXPLAYERS, MIN_MAXPLAYERS};

/// Fixed size of the Boom/MBF options block.
pub const GAME_OPTION_SIZE: usize = 64;
/// Boom 2.00 wrote a 256-byte options area.
pub const V200_OPTION_SIZE: usize = 256;
/// Version byte announcing the UMAPINFO extension header.
pub const EXTENSION_VERSION: u8 = 255;

/// Everything a demo header names about the recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoHeader {
    pub version: u8,
    pub level: CompatLevel,
    pub longtics: bool,
    pub skill: Skill,
    pub episode: u32,
    pub map: u32,
    pub deathmatch: u8,
    pub consoleplayer: u8,
    pub playeringame: [bool; MAXPLAYERS],
    /// Map lump named by the UMAPINFO extension block, when present.
    pub umapinfo_map: Option<[u8; 8]>,
}

/// Forward-only reader over a demo lump.
pub struct DemoCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DemoCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Peek without consuming; `None` at end of lump.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_u8(&mut self) -> Result<u8, DemoError> {
        let b = *self.data.get(self.pos).ok_or(DemoError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DemoError> {
        if self.remaining() < n {
            return Err(DemoError::Truncated);
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DemoError> {
        self.read_bytes(n).map(|_| ())
    }
}

// =============================================================================
// OPTIONS BLOCKS
// =============================================================================

/// Write the Boom/MBF 64-byte options block.
///
/// Positions are frozen forever: an obsolete option keeps its byte,
/// a new one appends before the padding.
pub fn write_options(buf: &mut Vec<u8>, b: &Behavior) {
    let start = buf.len();

    buf.push(b.monsters_remember as u8);
    buf.push(b.variable_friction as u8);
    buf.push(b.weapon_recoil as u8);
    buf.push(b.allow_pushers as u8);
    buf.push(0);
    buf.push(b.player_bobbing as u8);
    buf.push(b.respawnparm as u8);
    buf.push(b.fastparm as u8);
    buf.push(b.nomonsters as u8);
    buf.push(b.demo_insurance as u8);

    buf.extend_from_slice(&b.rngseed.to_be_bytes());

    buf.push(b.monster_infighting as u8);
    buf.push(b.dogs);
    buf.push(b.classic_bfg as u8);
    buf.push(b.beta_emulation as u8);
    buf.extend_from_slice(&(b.distfriend as u16).to_be_bytes());
    buf.push(b.monster_backing as u8);
    buf.push(b.monster_avoid_hazards as u8);
    buf.push(b.monster_friction as u8);
    buf.push(b.help_friends as u8);
    buf.push(b.dog_jumping as u8);
    buf.push(b.monkeys as u8);

    for i in 0..COMP_TOTAL {
        buf.push(b.comp[i] as u8);
    }

    // Padding at end
    while buf.len() < start + GAME_OPTION_SIZE {
        buf.push(0);
    }
    debug_assert_eq!(buf.len(), start + GAME_OPTION_SIZE);
}

/// Write the MBF21 compact options block.
pub fn write_options_mbf21(buf: &mut Vec<u8>, b: &Behavior) {
    buf.push(b.monsters_remember as u8);
    buf.push(b.weapon_recoil as u8);
    buf.push(b.player_bobbing as u8);

    buf.push(b.respawnparm as u8);
    buf.push(b.fastparm as u8);
    buf.push(b.nomonsters as u8);

    buf.extend_from_slice(&b.rngseed.to_be_bytes());

    buf.push(b.monster_infighting as u8);
    buf.push(b.dogs);

    buf.extend_from_slice(&(b.distfriend as u16).to_be_bytes());

    buf.push(b.monster_backing as u8);
    buf.push(b.monster_avoid_hazards as u8);
    buf.push(b.monster_friction as u8);
    buf.push(b.help_friends as u8);
    buf.push(b.dog_jumping as u8);
    buf.push(b.monkeys as u8);

    buf.push(MBF21_COMP_TOTAL as u8);
    for i in 0..MBF21_COMP_TOTAL {
        buf.push(b.comp[i] as u8);
    }
}

/// Read the Boom/MBF options block and overwrite the behavior toggles.
/// `version` branches the v2.03+ tail exactly as the original reader.
pub fn read_options(
    cur: &mut DemoCursor,
    b: &mut Behavior,
    version: u8,
    beta_allowed: bool,
) -> Result<(), DemoError> {
    let end = cur.pos() + GAME_OPTION_SIZE;

    b.monsters_remember = cur.read_u8()? != 0;
    b.variable_friction = cur.read_u8()? != 0;
    b.weapon_recoil = cur.read_u8()? != 0;
    b.allow_pushers = cur.read_u8()? != 0;
    cur.skip(1)?;
    b.player_bobbing = cur.read_u8()? != 0;
    b.respawnparm = cur.read_u8()? != 0;
    b.fastparm = cur.read_u8()? != 0;
    b.nomonsters = cur.read_u8()? != 0;
    b.demo_insurance = cur.read_u8()? != 0;

    let seed = cur.read_bytes(4)?;
    b.rngseed = u32::from_be_bytes([seed[0], seed[1], seed[2], seed[3]]);

    if version >= 203 {
        b.monster_infighting = cur.read_u8()? != 0;
        b.dogs = cur.read_u8()?;
        b.classic_bfg = cur.read_u8()? != 0;
        b.beta_emulation = cur.read_u8()? != 0;

        if b.beta_emulation && !beta_allowed {
            return Err(DemoError::BetaRequired);
        }

        let df = cur.read_bytes(2)?;
        b.distfriend = i16::from_be_bytes([df[0], df[1]]);

        b.monster_backing = cur.read_u8()? != 0;
        b.monster_avoid_hazards = cur.read_u8()? != 0;
        b.monster_friction = cur.read_u8()? != 0;
        b.help_friends = cur.read_u8()? != 0;
        b.dog_jumping = cur.read_u8()? != 0;
        b.monkeys = cur.read_u8()? != 0;

        for i in 0..COMP_TOTAL {
            b.comp[i] = cur.read_u8()? != 0;
        }
        b.apply_mbf_fixups();
    } else {
        // Defaults for versions < 2.03
        for i in 0..COMP_TOTAL {
            b.comp[i] = b.compatibility;
        }
        if version == 202 {
            b.apply_boom_fixups();
        }
        b.monster_infighting = true;
        b.monster_backing = false;
        b.monster_avoid_hazards = false;
        b.monster_friction = false;
        b.help_friends = false;
        b.classic_bfg = false;
        b.beta_emulation = false;
        b.dogs = 0;
        b.dog_jumping = false;
        b.monkeys = false;
    }

    // The block is fixed-size regardless of how much was meaningful.
    cur.skip(end - cur.pos())?;
    Ok(())
}

/// Read the MBF21 options block.
pub fn read_options_mbf21(cur: &mut DemoCursor, b: &mut Behavior) -> Result<(), DemoError> {
    // Not configurable in mbf21
    b.variable_friction = true;
    b.allow_pushers = true;
    b.demo_insurance = false;
    b.classic_bfg = false;
    b.beta_emulation = false;

    b.monsters_remember = cur.read_u8()? != 0;
    b.weapon_recoil = cur.read_u8()? != 0;
    b.player_bobbing = cur.read_u8()? != 0;

    b.respawnparm = cur.read_u8()? != 0;
    b.fastparm = cur.read_u8()? != 0;
    b.nomonsters = cur.read_u8()? != 0;

    let seed = cur.read_bytes(4)?;
    b.rngseed = u32::from_be_bytes([seed[0], seed[1], seed[2], seed[3]]);

    b.monster_infighting = cur.read_u8()? != 0;
    b.dogs = cur.read_u8()?;

    let df = cur.read_bytes(2)?;
    b.distfriend = i16::from_be_bytes([df[0], df[1]]);

    b.monster_backing = cur.read_u8()? != 0;
    b.monster_avoid_hazards = cur.read_u8()? != 0;
    b.monster_friction = cur.read_u8()? != 0;
    b.help_friends = cur.read_u8()? != 0;
    b.dog_jumping = cur.read_u8()? != 0;
    b.monkeys = cur.read_u8()? != 0;

    let count = cur.read_u8()? as usize;
    if count > MBF21_COMP_TOTAL {
        return Err(DemoError::UnknownCompOptions);
    }
    for i in 0..count {
        b.comp[i] = cur.read_u8()? != 0;
    }

    // Shorter vectors imply the historical defaults for the tail.
    use crate::compat::Comp;
    if count <= Comp::Voodooscroller as usize {
        b.comp[Comp::Voodooscroller as usize] = true;
    }
    if count <= Comp::Reservedlineflag as usize {
        b.comp[Comp::Reservedlineflag as usize] = false;
    }

    Ok(())
}

// =============================================================================
// HEADER
// =============================================================================

/// Write the demo header for the behavior's compat level. Returns the
/// longtics mode recording will use.
pub fn write_header(
    buf: &mut Vec<u8>,
    b: &Behavior,
    header: &DemoHeader,
    force_longtics: bool,
) -> bool {
    // Optional UMAPINFO extension block.
    if let Some(map) = header.umapinfo_map {
        buf.push(EXTENSION_VERSION);
        buf.extend_from_slice(b"PR+UM\0");
        buf.push(1); // extension format version
        buf.extend_from_slice(&1u16.to_le_bytes()); // one extension
        buf.push(8); // name length
        buf.extend_from_slice(b"UMAPINFO");
        buf.extend_from_slice(&map);
    }

    let longtics;
    match b.level {
        CompatLevel::Mbf | CompatLevel::Mbf21 => {
            longtics = b.level == CompatLevel::Mbf21;
            buf.push(b.level.demo_version(false));

            // signature
            buf.push(0x1d);
            buf.extend_from_slice(b"MBF");
            buf.push(0xe6);
            buf.push(0);

            if b.level != CompatLevel::Mbf21 {
                buf.push(b.compatibility as u8);
            }

            buf.push(header.skill as u8);
            buf.push(header.episode as u8);
            buf.push(header.map as u8);
            buf.push(header.deathmatch);
            buf.push(header.consoleplayer);

            if b.level == CompatLevel::Mbf21 {
                write_options_mbf21(buf, b);
            } else {
                write_options(buf, b);
            }

            for i in 0..MAXPLAYERS {
                buf.push(header.playeringame[i] as u8);
            }
            // Always store at least MIN_MAXPLAYERS bytes, to support
            // enhancements later without losing demo compatibility.
            for _ in MAXPLAYERS..MIN_MAXPLAYERS {
                buf.push(0);
            }
        }
        CompatLevel::Boom => {
            longtics = false;
            buf.push(202);

            // signature
            buf.push(0x1d);
            buf.extend_from_slice(b"Boom");
            buf.push(0xe6);

            buf.push(0); // compatibility flag slot

            buf.push(header.skill as u8);
            buf.push(header.episode as u8);
            buf.push(header.map as u8);
            buf.push(header.deathmatch);
            buf.push(header.consoleplayer);

            write_options(buf, b);

            for i in 0..MAXPLAYERS {
                buf.push(header.playeringame[i] as u8);
            }
            for _ in MAXPLAYERS..MIN_MAXPLAYERS {
                buf.push(0);
            }
        }
        CompatLevel::Vanilla => {
            longtics = force_longtics;
            buf.push(if longtics { 111 } else { 109 });
            buf.push(header.skill as u8);
            buf.push(header.episode as u8);
            buf.push(header.map as u8);
            buf.push(header.deathmatch);
            buf.push(b.respawnparm as u8);
            buf.push(b.fastparm as u8);
            buf.push(b.nomonsters as u8);
            buf.push(header.consoleplayer);
            // Intentionally hard-coded 4-player table.
            for i in 0..4 {
                buf.push(*header.playeringame.get(i).unwrap_or(&false) as u8);
            }
        }
    }
    longtics
}

/// Parse a demo header, applying the recorded behavior on top of the
/// already-resolved vector (the header is the highest-precedence
/// layer).
pub fn read_header(
    cur: &mut DemoCursor,
    b: &mut Behavior,
    beta_allowed: bool,
) -> Result<DemoHeader, DemoError> {
    let mut umapinfo_map = None;

    let mut version = cur.read_u8()?;

    // Extended (UMAPINFO) header.
    if version == EXTENSION_VERSION {
        if cur.remaining() < 5 || cur.read_bytes(5)? != &b"PR+UM"[..] {
            return Err(DemoError::BadExtension);
        }
        cur.skip(1)?; // NUL after the magic
        if cur.read_u8()? != 1 {
            return Err(DemoError::UnknownFormat(EXTENSION_VERSION));
        }
        // The defunct format had only one extension (in two bytes).
        if cur.read_u8()? != 1 || cur.read_u8()? != 0 {
            return Err(DemoError::UnknownFormat(EXTENSION_VERSION));
        }
        if cur.read_u8()? != 8 {
            return Err(DemoError::UnknownFormat(EXTENSION_VERSION));
        }
        if cur.read_bytes(8)? != &b"UMAPINFO"[..] {
            return Err(DemoError::UnknownFormat(EXTENSION_VERSION));
        }
        let mut map = [0u8; 8];
        map.copy_from_slice(cur.read_bytes(8)?);
        umapinfo_map = Some(map);
        version = cur.read_u8()?;
    }

    let Some(level) = CompatLevel::from_demo_version(version) else {
        return Err(DemoError::UnknownFormat(version));
    };
    b.apply_level(level);

    let mut longtics = false;
    let header;

    if version < 200 {
        // Autodetect old demos.
        if version == 111 {
            longtics = true;
        }

        let (skill, episode, map, deathmatch, consoleplayer);
        if version >= 100 {
            // Demos from versions >= 1.4
            skill = cur.read_u8()?;
            episode = cur.read_u8()?;
            map = cur.read_u8()?;
            deathmatch = cur.read_u8()?;
            b.respawnparm = cur.read_u8()? != 0;
            b.fastparm = cur.read_u8()? != 0;
            b.nomonsters = cur.read_u8()? != 0;
            consoleplayer = cur.read_u8()?;
        } else {
            skill = version;
            episode = cur.read_u8()?;
            map = cur.read_u8()?;
            deathmatch = 0;
            consoleplayer = 0;
        }

        // Old demos hard-code four player slots.
        let mut playeringame = [false; MAXPLAYERS];
        for slot in playeringame.iter_mut().take(4.min(MAXPLAYERS)) {
            *slot = cur.read_u8()? != 0;
        }

        header = DemoHeader {
            version,
            level,
            longtics,
            skill: Skill::from_index(skill).unwrap_or(Skill::Medium),
            episode: episode as u32,
            map: map as u32,
            deathmatch,
            consoleplayer,
            playeringame,
            umapinfo_map,
        };
    } else {
        cur.skip(6)?; // skip signature

        if version == 221 {
            longtics = true;
            b.compatibility = false;
        } else {
            b.compatibility = cur.read_u8()? != 0;
        }

        let skill = cur.read_u8()?;
        let episode = cur.read_u8()?;
        let map = cur.read_u8()?;
        let deathmatch = cur.read_u8()?;
        let consoleplayer = cur.read_u8()?;

        if version == 221 {
            read_options_mbf21(cur, b)?;
        } else {
            read_options(cur, b, version, beta_allowed)?;
        }

        if version == 200 {
            // Partially fix v2.00 demos: their options area was wider.
            cur.skip(V200_OPTION_SIZE - GAME_OPTION_SIZE)?;
        }

        let mut playeringame = [false; MAXPLAYERS];
        for slot in playeringame.iter_mut() {
            *slot = cur.read_u8()? != 0;
        }
        cur.skip(MIN_MAXPLAYERS - MAXPLAYERS)?;

        header = DemoHeader {
            version,
            level,
            longtics,
            skill: Skill::from_index(skill).unwrap_or(Skill::Medium),
            episode: episode as u32,
            map: map as u32,
            deathmatch,
            consoleplayer,
            playeringame,
            umapinfo_map,
        };
    }

    Ok(header)
}

// =============================================================================
// PER-TIC RECORDS
// =============================================================================

/// Bytes one tic occupies on the wire.
pub fn tic_size(longtics: bool) -> usize {
    if longtics {
        5
    } else {
        4
    }
}

/// Append one cmd to the stream.
pub fn encode_ticcmd(buf: &mut Vec<u8>, cmd: &TicCmd, longtics: bool) {
    buf.push(cmd.forwardmove as u8);
    buf.push(cmd.sidemove as u8);
    if longtics {
        let a = cmd.angleturn as u16;
        buf.push((a & 0xff) as u8);
        buf.push((a >> 8) as u8);
    } else {
        // Round to the stored high byte.
        buf.push(((cmd.angleturn.wrapping_add(128) as u16) >> 8) as u8);
    }
    buf.push(cmd.buttons);
}

/// Decode one cmd; `None` at the end marker.
pub fn decode_ticcmd(cur: &mut DemoCursor, longtics: bool) -> Result<Option<TicCmd>, DemoError> {
    match cur.peek() {
        None => return Err(DemoError::Truncated),
        Some(DEMOMARKER) => return Ok(None),
        Some(_) => {}
    }

    let mut cmd = TicCmd {
        forwardmove: cur.read_u8()? as i8,
        sidemove: cur.read_u8()? as i8,
        ..Default::default()
    };
    if longtics {
        let lo = cur.read_u8()? as u16;
        let hi = cur.read_u8()? as u16;
        cmd.angleturn = (lo | (hi << 8)) as i16;
    } else {
        cmd.angleturn = ((cur.read_u8()? as u16) << 8) as i16;
    }
    cmd.buttons = cur.read_u8()?;
    Ok(Some(cmd))
}

// =============================================================================
// FOOTER
// =============================================================================

/// Append the human-readable footer after the end marker: engine
/// version, then the command line that reproduces the recording.
pub fn write_footer(
    buf: &mut Vec<u8>,
    b: &Behavior,
    iwad: &str,
    pwads: &[String],
    dehs: &[String],
) {
    let mut line = format!("{} {}\n", crate::ENGINE_NAME, crate::VERSION);
    line.push_str(&format!("-iwad \"{}\" ", iwad));
    for (i, pwad) in pwads.iter().enumerate() {
        if i == 0 {
            line.push_str("-file ");
        }
        line.push_str(&format!("\"{}\" ", pwad));
    }
    for (i, deh) in dehs.iter().enumerate() {
        if i == 0 {
            line.push_str("-deh ");
        }
        line.push_str(&format!("\"{}\" ", deh));
    }
    if b.demo_compatibility() {
        line.push_str("-complevel vanilla ");
        line.push_str(&format!("-gameversion {} ", b.gameversion.cmdline_name()));
    } else {
        line.push_str(&format!("-complevel {} ", b.level.name()));
    }
    let trimmed = line.trim_end().to_string();
    buf.extend_from_slice(trimmed.as_bytes());
    buf.push(b'\n');
}
