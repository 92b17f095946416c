//! World State
//!
//! Sectors, lines, sides and the per-level container that owns the
//! thinker arena. The world is loaded once per level from tables the
//! external WAD loader produced; heights and lights are then mutated
//! only by sector specials.

use serde::{Deserialize, Serialize};

use super::mobj::{flags, Mobj, MobjType, MOBJ_INFO};
use super::thinker::{Think, ThinkerId, Thinkers};
use super::Skill;
use crate::compat::Behavior;
use crate::core::angle::{Angle, ANG45};
use crate::core::fixed::{Fixed, FRACBITS};

/// A sector: a floor/ceiling pair with a light level and an active
/// special.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sector {
    pub floorheight: Fixed,
    pub ceilingheight: Fixed,
    pub lightlevel: i16,
    pub special: i16,
    pub tag: i16,
    /// Last noise-maker heard in this sector. Weak reference.
    pub soundtarget: Option<ThinkerId>,
}

/// A linedef: the activation surface for specials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Line {
    pub flags: u16,
    pub special: i16,
    pub tag: i16,
    /// Front side index; lines always have one.
    pub front_side: u16,
    /// Back side index for two-sided lines.
    pub back_side: Option<u16>,
}

/// Linedef flag bits the core consults.
pub mod line_flags {
    /// Blocks monsters and players.
    pub const ML_BLOCKING: u16 = 1;
    /// Blocks monsters only.
    pub const ML_BLOCKMONSTERS: u16 = 2;
    /// The historical reserved bit; MBF21 zeroes extended flags when
    /// it is set on old-format maps.
    pub const ML_RESERVED: u16 = 0x0800;
}

/// A sidedef: texture offsets mutated by scrollers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Side {
    pub textureoffset: Fixed,
    pub rowoffset: Fixed,
    pub sector: u16,
}

/// A thing placement from the map: spawn coordinates in whole map
/// units, as the external loader hands them over.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MapThing {
    pub x: i16,
    pub y: i16,
    /// Facing in degrees (0, 45, 90, ...).
    pub angle: i16,
    pub doomednum: i32,
    pub options: u16,
}

/// MapThing option bits.
pub mod thing_options {
    pub const MTF_EASY: u16 = 1;
    pub const MTF_NORMAL: u16 = 2;
    pub const MTF_HARD: u16 = 4;
    pub const MTF_AMBUSH: u16 = 8;
    pub const MTF_NOTSINGLE: u16 = 16;
}

/// Playable area bounds, in whole map units.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: i16,
    pub min_y: i16,
    pub max_x: i16,
    pub max_y: i16,
}

/// The parsed level tables the external loader supplies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelDef {
    pub name: String,
    pub bounds: Bounds,
    pub sectors: Vec<Sector>,
    pub lines: Vec<Line>,
    pub sides: Vec<Side>,
    pub things: Vec<MapThing>,
}

/// A UMAPINFO-style per-map metadata entry, consumed pre-parsed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapEntry {
    pub episode: u32,
    pub map: u32,
    pub next_map: Option<(u32, u32)>,
    pub next_secret: Option<(u32, u32)>,
    /// End the game after this map with this picture ("-" for none).
    pub endpic: Option<String>,
    pub nointermission: bool,
    /// Intermission text routed through the finale.
    pub intertext: Option<String>,
    pub partime: u32,
}

/// The live world for the current level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Level {
    pub def_name: String,
    pub bounds: Bounds,
    pub sectors: Vec<Sector>,
    pub lines: Vec<Line>,
    pub sides: Vec<Side>,
    pub thinkers: Thinkers,

    /// Automap marks placed by the player; archived in saves.
    pub automap_marks: Vec<(Fixed, Fixed)>,

    pub totalkills: i32,
    pub totalitems: i32,
    pub totalsecret: i32,
    /// Kills of monsters spawned after level load (respawns, helpers).
    pub extrakills: i32,
}

impl Level {
    /// Build the world from parsed tables and populate the thinker
    /// arena from the thing placements, in table order.
    ///
    /// Returns the level and the spawn mobj id for each player slot
    /// found (doomednum 1-4).
    pub fn load(
        def: &LevelDef,
        skill: Skill,
        behavior: &Behavior,
        deathmatch: bool,
    ) -> (Level, [Option<ThinkerId>; crate::MAXPLAYERS]) {
        let mut level = Level {
            def_name: def.name.clone(),
            bounds: def.bounds,
            sectors: def.sectors.clone(),
            lines: def.lines.clone(),
            sides: def.sides.clone(),
            thinkers: Thinkers::new(),
            automap_marks: Vec::new(),
            totalkills: 0,
            totalitems: 0,
            totalsecret: 0,
            extrakills: 0,
        };
        let mut starts: [Option<ThinkerId>; crate::MAXPLAYERS] = [None; crate::MAXPLAYERS];

        let skill_bit = match skill {
            Skill::Baby | Skill::Easy => thing_options::MTF_EASY,
            Skill::Medium => thing_options::MTF_NORMAL,
            Skill::Hard | Skill::Nightmare => thing_options::MTF_HARD,
        };

        for thing in &def.things {
            // Player starts spawn regardless of skill filters.
            if (1..=crate::MAXPLAYERS as i32).contains(&thing.doomednum) {
                let slot = (thing.doomednum - 1) as usize;
                let id = level.spawn_thing(MobjType::Player, thing);
                starts[slot] = Some(id);
                continue;
            }

            if thing.options & skill_bit == 0 {
                continue;
            }
            if !deathmatch && thing.options & thing_options::MTF_NOTSINGLE != 0 {
                continue;
            }

            let Some(kind) = mobj_type_for(thing.doomednum) else {
                continue;
            };
            if behavior.nomonsters && MOBJ_INFO[kind as usize].flags & flags::MF_COUNTKILL != 0 {
                continue;
            }

            let id = level.spawn_thing(kind, thing);
            if let Some(m) = level.thinkers.mobj(id) {
                if m.flags & flags::MF_COUNTKILL != 0 {
                    level.totalkills += 1;
                }
                if m.flags & flags::MF_COUNTITEM != 0 {
                    level.totalitems += 1;
                }
            }
        }

        level.totalsecret = level
            .sectors
            .iter()
            .filter(|s| s.special == 9)
            .count() as i32;

        (level, starts)
    }

    /// Spawn one mobj at a map-thing placement.
    pub fn spawn_thing(&mut self, kind: MobjType, thing: &MapThing) -> ThinkerId {
        let x = (thing.x as Fixed) << FRACBITS;
        let y = (thing.y as Fixed) << FRACBITS;
        let sector = self.sector_at(x, y);
        let mut mobj = Mobj::new(kind, x, y, self.sectors[sector as usize].floorheight);
        mobj.sector = sector;
        mobj.angle = angle_from_degrees(thing.angle);
        self.thinkers.spawn(Think::Mobj(mobj))
    }

    /// Which sector a point belongs to. The external loader's BSP is
    /// out of scope, so the core carries a simplification: things
    /// declare their sector via placement order, defaulting to sector
    /// zero for the open arena layouts the headless driver uses.
    pub fn sector_at(&self, _x: Fixed, _y: Fixed) -> u16 {
        0
    }

    /// Clamp a position into the level bounds.
    pub fn clamp_to_bounds(&self, x: Fixed, y: Fixed) -> (Fixed, Fixed) {
        let min_x = (self.bounds.min_x as Fixed) << FRACBITS;
        let max_x = (self.bounds.max_x as Fixed) << FRACBITS;
        let min_y = (self.bounds.min_y as Fixed) << FRACBITS;
        let max_y = (self.bounds.max_y as Fixed) << FRACBITS;
        (x.clamp(min_x, max_x), y.clamp(min_y, max_y))
    }

    /// Place an automap mark.
    pub fn add_mark(&mut self, x: Fixed, y: Fixed) {
        self.automap_marks.push((x, y));
    }

    /// Clear all automap marks (every new level start).
    pub fn clear_marks(&mut self) {
        self.automap_marks.clear();
    }
}

/// Editor-number lookup for the spawn table.
fn mobj_type_for(doomednum: i32) -> Option<MobjType> {
    match doomednum {
        3004 => Some(MobjType::Trooper),
        3002 => Some(MobjType::Demon),
        2035 => Some(MobjType::Barrel),
        888 => Some(MobjType::Dog),
        _ => None,
    }
}

/// Map-thing facing (degrees) to BAM.
fn angle_from_degrees(deg: i16) -> Angle {
    ANG45.wrapping_mul((deg as u32 % 360) / 45)
}

impl LevelDef {
    /// A small synthetic arena used by the headless driver and the
    /// test suite: one open sector and a row of monsters opposite the
    /// player starts.
    pub fn demo_arena() -> LevelDef {
        let sector = Sector {
            floorheight: 0,
            ceilingheight: 128 << FRACBITS,
            lightlevel: 192,
            special: 0,
            tag: 0,
            soundtarget: None,
        };
        let mut things = Vec::new();
        for slot in 0..crate::MAXPLAYERS as i32 {
            things.push(MapThing {
                x: -256 + slot as i16 * 64,
                y: -256,
                angle: 90,
                doomednum: 1 + slot,
                options: thing_options::MTF_EASY
                    | thing_options::MTF_NORMAL
                    | thing_options::MTF_HARD,
            });
        }
        for i in 0..4i16 {
            things.push(MapThing {
                x: -192 + i * 96,
                y: 256,
                angle: 270,
                doomednum: if i % 2 == 0 { 3004 } else { 3002 },
                options: thing_options::MTF_EASY
                    | thing_options::MTF_NORMAL
                    | thing_options::MTF_HARD,
            });
        }
        things.push(MapThing {
            x: 0,
            y: 0,
            angle: 0,
            doomednum: 2035,
            options: thing_options::MTF_EASY
                | thing_options::MTF_NORMAL
                | thing_options::MTF_HARD,
        });

        LevelDef {
            name: "ARENA".to_string(),
            bounds: Bounds {
                min_x: -512,
                min_y: -512,
                max_x: 512,
                max_y: 512,
            },
            sectors: vec![sector],
            lines: Vec::new(),
            sides: Vec::new(),
            things,
        }
    }
}
