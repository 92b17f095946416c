//! Savegame Archive
//!
//! Marshals the full simulation into the forward-only save stream and
//! back. Weak thinker references (player mobjs, targets, tracers,
//! sector sound targets) travel as ordinals into the archived thinker
//! sequence and are resolved through a fixup pass once every thinker
//! has been materialized again.

use tracing::{info, warn};

use super::cursor::{SaveReader, SaveWriter};
use super::SaveError;
use crate::compat::CompatLevel;
use crate::demo::codec;
use crate::game::mobj::{Mobj, MobjType, MoveDir, StateNum};
use crate::game::player::{Player, PlayerState, NUM_CARDS, NUM_POWERS};
use crate::game::specials::{
    CeilingMover, Door, DoorDir, DoorKind, FloorMover, LightFlicker, PlatDir, Platform, Pusher,
    Scroller,
};
use crate::game::thinker::{Think, ThinkerId, Thinkers};
use crate::game::weapons::{WeaponType, NUM_AMMO, NUM_WEAPONS};
use crate::game::world::{Bounds, Level, Line, Sector, Side};
use crate::game::{Game, GameState, Skill};
use crate::{ENGINE_NAME, MAXPLAYERS, MIN_MAXPLAYERS, VERSION};

/// Size of the description field.
pub const SAVESTRINGSIZE: usize = 24;
/// Size of the version-string field.
pub const VERSIONSIZE: usize = 16;
/// Trailing consistency marker.
pub const SAVE_MARKER: u8 = 0xe6;
/// Ordinal meaning "no referent".
const NO_ORDINAL: u32 = u32::MAX;

fn version_string() -> String {
    format!("{} {}", ENGINE_NAME, VERSION)
}

/// Serialize the whole game into a save stream.
pub fn save_game(game: &Game) -> Vec<u8> {
    let b = &game.behavior;
    let mut w = SaveWriter::new();

    w.reserve(SAVESTRINGSIZE + VERSIONSIZE + 16);
    w.write_str_padded(&game.savedescription, SAVESTRINGSIZE);
    w.write_str_padded(&version_string(), VERSIONSIZE);
    // Secondary save-format compat level.
    w.write_u8(b.level.demo_version(false));

    w.write_u8(b.level.demo_version(false));
    w.write_u8(b.compatibility as u8);

    w.write_u8(game.gameskill as u8);
    w.write_u8(game.gameepisode as u8);
    w.write_u8(game.gamemap as u8);

    // Lump-length checksum binding the save to its WAD set.
    let signature = game.wad.signature(game.mode, game.gameepisode, game.gamemap);
    w.write_u64(signature);

    // Loaded PWAD paths, newline separated, NUL terminated.
    let mut pwads = String::new();
    for p in game.wad.pwads() {
        pwads.push_str(p);
        pwads.push('\n');
    }
    w.reserve(pwads.len() + 2);
    w.write_cstr(&pwads);

    w.reserve(codec::GAME_OPTION_SIZE + MIN_MAXPLAYERS + 10);
    for i in 0..MAXPLAYERS {
        w.write_u8(game.playeringame[i] as u8);
    }
    for _ in MAXPLAYERS..MIN_MAXPLAYERS {
        w.write_u8(0);
    }

    w.write_i8(game.idmusnum);

    // Same options block the demo format uses.
    {
        let mut opts = Vec::new();
        if b.mbf21() {
            codec::write_options_mbf21(&mut opts, b);
        } else {
            codec::write_options(&mut opts, b);
        }
        w.write_bytes(&opts);
    }

    w.write_u32(game.leveltime);
    // Revenant tracer tiebreaker phase.
    w.write_u8(((game.gametic.wrapping_sub(game.basetic)) & 255) as u8);

    // The archived components. Ordinals index the thinker snapshot
    // taken here. Saving outside a level archives an empty world so
    // the stream shape never changes.
    let empty_level = Level {
        def_name: String::new(),
        bounds: Bounds {
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0,
        },
        sectors: Vec::new(),
        lines: Vec::new(),
        sides: Vec::new(),
        thinkers: Thinkers::new(),
        automap_marks: Vec::new(),
        totalkills: 0,
        totalitems: 0,
        totalsecret: 0,
        extrakills: 0,
    };
    let level = game.level.as_ref().unwrap_or(&empty_level);
    let order = level.thinkers.snapshot();
    // Weak references only ever point at mobjs, and the unarchive
    // side materializes mobjs alone before its fixup pass, so the
    // ordinal space must skip the interleaved sector specials.
    let mobj_order: Vec<ThinkerId> = order
        .iter()
        .copied()
        .filter(|&id| level.thinkers.mobj(id).is_some())
        .collect();
    let ordinals = OrdinalMap::new(&mobj_order);

    archive_players(&mut w, game, &ordinals);
    archive_world(&mut w, level, &ordinals);
    archive_thinkers(&mut w, level, &order, &ordinals);
    archive_specials(&mut w, level, &order);
    archive_rng(&mut w, game);
    archive_map_marks(&mut w, level);

    w.write_u8(SAVE_MARKER);

    w.reserve(16);
    w.write_u32(game.totalleveltimes);
    w.write_str_padded(&game.music_lump, 8);
    w.write_u32(game.level.as_ref().map(|l| l.extrakills).unwrap_or(0) as u32);

    w.into_bytes()
}

/// Deserialize a save stream into the game. On success the game is
/// standing at the saved tic, ready for the next `p_ticker` call.
pub fn load_game(game: &mut Game, data: &[u8], forced: bool) -> Result<(), SaveError> {
    let mut r = SaveReader::new(data);

    let description = r.read_str_padded(SAVESTRINGSIZE)?;
    let version = r.read_str_padded(VERSIONSIZE)?;
    let saveg_complevel = r.read_u8()?;

    // A different engine build is acceptable when its save-format
    // compat byte matches ours; otherwise ask the user.
    if version != version_string()
        && saveg_complevel != game.behavior.level.demo_version(false)
        && !forced
    {
        warn!(
            "savegame version {:?} does not match {:?}",
            version,
            version_string()
        );
        return Err(SaveError::VersionMismatch);
    }

    let demo_version = r.read_u8()?;
    let compatibility = r.read_u8()? != 0;
    let level_id =
        CompatLevel::from_demo_version(demo_version).unwrap_or(CompatLevel::Mbf21);

    let skill = Skill::from_index(r.read_u8()?).ok_or(SaveError::Corrupt("skill"))?;
    let episode = r.read_u8()? as u32;
    let map = r.read_u8()? as u32;

    let stored_signature = r.read_u64()?;
    let current_signature = game.wad.signature(game.mode, episode, map);
    if stored_signature != current_signature && !forced {
        return Err(SaveError::WrongSignature {
            expected: stored_signature,
            got: current_signature,
        });
    }

    let _pwads = r.read_cstr()?;

    let mut playeringame = [false; MAXPLAYERS];
    for slot in playeringame.iter_mut() {
        *slot = r.read_u8()? != 0;
    }
    for _ in MAXPLAYERS..MIN_MAXPLAYERS {
        r.read_u8()?;
    }

    let idmusnum = r.read_i8()?;

    // Rebuild the behavior vector: the savegame layer outranks
    // everything below the demo header.
    game.behavior.apply_level(level_id);
    game.behavior.compatibility = compatibility;
    {
        // The options block is the demo codec's; bridge the cursors.
        let rest = r.read_bytes(r.remaining())?;
        let mut dc = codec::DemoCursor::new(rest);
        let opt_result = if game.behavior.mbf21() {
            codec::read_options_mbf21(&mut dc, &mut game.behavior)
        } else {
            codec::read_options(&mut dc, &mut game.behavior, demo_version, true)
        };
        opt_result.map_err(|_| SaveError::Corrupt("options block"))?;
        let consumed = dc.pos();
        r = SaveReader::new(rest);
        r.read_bytes(consumed)?;
    }

    let leveltime = r.read_u32()?;
    let tracer_phase = r.read_u8()? as u32;

    let players = unarchive_players(&mut r)?;
    let mut level = unarchive_world(&mut r)?;
    let (thinkers, ordinal_ids) = unarchive_thinkers(&mut r)?;
    level.thinkers = thinkers;
    unarchive_specials(&mut r, &mut level)?;
    unarchive_rng(&mut r, game)?;
    unarchive_map_marks(&mut r, &mut level)?;

    let marker = r.read_u8()?;
    if marker != SAVE_MARKER {
        return Err(SaveError::BadMarker {
            expected: SAVE_MARKER,
            got: marker,
        });
    }

    let totalleveltimes = r.read_u32()?;
    let music_lump = r.read_str_padded(8)?;
    let extrakills = r.read_u32()? as i32;

    // Fixup pass: ordinals -> fresh arena ids.
    let resolve = |ord: u32| -> Option<ThinkerId> {
        if ord == NO_ORDINAL {
            None
        } else {
            ordinal_ids.get(ord as usize).copied()
        }
    };
    for (i, (player, mobj_ord)) in players.into_iter().enumerate() {
        let mut player = player;
        player.mobj = resolve(mobj_ord);
        game.players[i] = player;
    }
    {
        let fixups: Vec<(ThinkerId, u32, u32)> = level
            .thinkers
            .snapshot()
            .into_iter()
            .filter_map(|id| {
                level.thinkers.mobj(id).map(|m| {
                    (
                        id,
                        m.target.map(|t| t.to_raw() as u32).unwrap_or(NO_ORDINAL),
                        m.tracer.map(|t| t.to_raw() as u32).unwrap_or(NO_ORDINAL),
                    )
                })
            })
            .collect();
        for (id, t_ord, tr_ord) in fixups {
            let target = resolve(t_ord);
            let tracer = resolve(tr_ord);
            if let Some(m) = level.thinkers.mobj_mut(id) {
                m.target = target;
                m.tracer = tracer;
            }
        }
        for sector in level.sectors.iter_mut() {
            if let Some(st) = sector.soundtarget {
                sector.soundtarget = resolve(st.to_raw() as u32);
            }
        }
    }

    game.rng.set_insurance(game.behavior.demo_insurance);
    game.playeringame = playeringame;
    game.gameskill = skill;
    game.gameepisode = episode;
    game.gamemap = map;
    game.idmusnum = idmusnum;
    game.leveltime = leveltime;
    game.basetic = game.gametic.wrapping_sub(tracer_phase);
    game.level = Some(level);
    game.gamestate = GameState::Level;
    game.totalleveltimes = totalleveltimes;
    game.music_lump = music_lump;
    if let Some(level) = game.level.as_mut() {
        level.extrakills = extrakills;
    }
    game.savedescription = description;

    info!(
        "savegame loaded: {:?} skill {:?} map {}x{}",
        game.savedescription, skill, episode, map
    );
    Ok(())
}

// =============================================================================
// ORDINAL MAPPING
// =============================================================================

/// Maps live thinker ids to their position in the archive sequence.
#[derive(Default)]
struct OrdinalMap {
    by_raw: std::collections::BTreeMap<u64, u32>,
}

impl OrdinalMap {
    fn new(order: &[ThinkerId]) -> OrdinalMap {
        let mut by_raw = std::collections::BTreeMap::new();
        for (i, id) in order.iter().enumerate() {
            by_raw.insert(id.to_raw(), i as u32);
        }
        OrdinalMap { by_raw }
    }

    fn ordinal(&self, id: Option<ThinkerId>) -> u32 {
        id.and_then(|id| self.by_raw.get(&id.to_raw()).copied())
            .unwrap_or(NO_ORDINAL)
    }
}

// =============================================================================
// PLAYERS
// =============================================================================

fn archive_players(w: &mut SaveWriter, game: &Game, ordinals: &OrdinalMap) {
    for i in 0..MAXPLAYERS {
        w.reserve(128);
        w.write_u8(game.playeringame[i] as u8);
        if !game.playeringame[i] {
            continue;
        }
        let p = &game.players[i];
        w.write_u8(match p.playerstate {
            PlayerState::Live => 0,
            PlayerState::Dead => 1,
            PlayerState::Reborn => 2,
        });
        w.write_i32(p.health);
        w.write_i32(p.armorpoints);
        w.write_i32(p.armortype);
        for t in p.powers {
            w.write_i32(t);
        }
        for c in p.cards {
            w.write_u8(c as u8);
        }
        w.write_u8(p.backpack as u8);
        for f in p.frags {
            w.write_i32(f);
        }
        w.write_u8(p.readyweapon as u8);
        w.write_u8(p.pendingweapon as u8);
        for o in p.weaponowned {
            w.write_u8(o as u8);
        }
        for a in p.ammo {
            w.write_i32(a);
        }
        for a in p.maxammo {
            w.write_i32(a);
        }
        w.write_u8(p.attackdown as u8);
        w.write_u8(p.usedown as u8);
        w.write_u32(p.cheats);
        w.write_i32(p.refire);
        w.write_i32(p.killcount);
        w.write_i32(p.itemcount);
        w.write_i32(p.secretcount);
        w.write_i32(p.damagecount);
        w.write_i32(p.bonuscount);
        w.write_u8(p.didsecret as u8);
        w.write_u32(ordinals.ordinal(p.mobj));
    }
}

type ArchivedPlayer = (Player, u32);

fn unarchive_players(r: &mut SaveReader) -> Result<Vec<ArchivedPlayer>, SaveError> {
    let mut out = Vec::with_capacity(MAXPLAYERS);
    for _ in 0..MAXPLAYERS {
        if r.read_u8()? == 0 {
            out.push((Player::default(), NO_ORDINAL));
            continue;
        }
        let mut p = Player::default();
        p.playerstate = match r.read_u8()? {
            0 => PlayerState::Live,
            1 => PlayerState::Dead,
            2 => PlayerState::Reborn,
            _ => return Err(SaveError::Corrupt("playerstate")),
        };
        p.health = r.read_i32()?;
        p.armorpoints = r.read_i32()?;
        p.armortype = r.read_i32()?;
        for t in 0..NUM_POWERS {
            p.powers[t] = r.read_i32()?;
        }
        for c in 0..NUM_CARDS {
            p.cards[c] = r.read_u8()? != 0;
        }
        p.backpack = r.read_u8()? != 0;
        for f in 0..MAXPLAYERS {
            p.frags[f] = r.read_i32()?;
        }
        p.readyweapon =
            WeaponType::from_index(r.read_u8()?).ok_or(SaveError::Corrupt("readyweapon"))?;
        p.pendingweapon =
            WeaponType::from_index(r.read_u8()?).ok_or(SaveError::Corrupt("pendingweapon"))?;
        for o in 0..NUM_WEAPONS {
            p.weaponowned[o] = r.read_u8()? != 0;
        }
        for a in 0..NUM_AMMO {
            p.ammo[a] = r.read_i32()?;
        }
        for a in 0..NUM_AMMO {
            p.maxammo[a] = r.read_i32()?;
        }
        p.attackdown = r.read_u8()? != 0;
        p.usedown = r.read_u8()? != 0;
        p.cheats = r.read_u32()?;
        p.refire = r.read_i32()?;
        p.killcount = r.read_i32()?;
        p.itemcount = r.read_i32()?;
        p.secretcount = r.read_i32()?;
        p.damagecount = r.read_i32()?;
        p.bonuscount = r.read_i32()?;
        p.didsecret = r.read_u8()? != 0;
        let mobj_ord = r.read_u32()?;
        out.push((p, mobj_ord));
    }
    Ok(out)
}

// =============================================================================
// WORLD
// =============================================================================

fn archive_world(w: &mut SaveWriter, level: &Level, ordinals: &OrdinalMap) {
    w.reserve(64 + level.sectors.len() * 20 + level.lines.len() * 12 + level.sides.len() * 10);
    w.write_cstr(&level.def_name);
    w.write_i16(level.bounds.min_x);
    w.write_i16(level.bounds.min_y);
    w.write_i16(level.bounds.max_x);
    w.write_i16(level.bounds.max_y);

    w.write_u32(level.sectors.len() as u32);
    for s in &level.sectors {
        w.write_i32(s.floorheight);
        w.write_i32(s.ceilingheight);
        w.write_i16(s.lightlevel);
        w.write_i16(s.special);
        w.write_i16(s.tag);
        w.write_u32(ordinals.ordinal(s.soundtarget));
    }

    w.write_u32(level.lines.len() as u32);
    for l in &level.lines {
        w.write_u16(l.flags);
        w.write_i16(l.special);
        w.write_i16(l.tag);
        w.write_u16(l.front_side);
        w.write_u16(l.back_side.unwrap_or(u16::MAX));
    }

    w.write_u32(level.sides.len() as u32);
    for s in &level.sides {
        w.write_i32(s.textureoffset);
        w.write_i32(s.rowoffset);
        w.write_u16(s.sector);
    }

    w.write_i32(level.totalkills);
    w.write_i32(level.totalitems);
    w.write_i32(level.totalsecret);
}

fn unarchive_world(r: &mut SaveReader) -> Result<Level, SaveError> {
    let def_name = r.read_cstr()?;
    let bounds = Bounds {
        min_x: r.read_i16()?,
        min_y: r.read_i16()?,
        max_x: r.read_i16()?,
        max_y: r.read_i16()?,
    };

    let nsectors = r.read_u32()? as usize;
    let mut sectors = Vec::with_capacity(nsectors.min(65536));
    for _ in 0..nsectors {
        let floorheight = r.read_i32()?;
        let ceilingheight = r.read_i32()?;
        let lightlevel = r.read_i16()?;
        let special = r.read_i16()?;
        let tag = r.read_i16()?;
        let st = r.read_u32()?;
        sectors.push(Sector {
            floorheight,
            ceilingheight,
            lightlevel,
            special,
            tag,
            // Ordinal smuggled through the id type until the fixup
            // pass rewrites it.
            soundtarget: if st == NO_ORDINAL {
                None
            } else {
                Some(ThinkerId::from_raw(st as u64))
            },
        });
    }

    let nlines = r.read_u32()? as usize;
    let mut lines = Vec::with_capacity(nlines.min(65536));
    for _ in 0..nlines {
        let flags = r.read_u16()?;
        let special = r.read_i16()?;
        let tag = r.read_i16()?;
        let front_side = r.read_u16()?;
        let back = r.read_u16()?;
        lines.push(Line {
            flags,
            special,
            tag,
            front_side,
            back_side: if back == u16::MAX { None } else { Some(back) },
        });
    }

    let nsides = r.read_u32()? as usize;
    let mut sides = Vec::with_capacity(nsides.min(65536));
    for _ in 0..nsides {
        sides.push(Side {
            textureoffset: r.read_i32()?,
            rowoffset: r.read_i32()?,
            sector: r.read_u16()?,
        });
    }

    let totalkills = r.read_i32()?;
    let totalitems = r.read_i32()?;
    let totalsecret = r.read_i32()?;

    Ok(Level {
        def_name,
        bounds,
        sectors,
        lines,
        sides,
        thinkers: Thinkers::new(),
        automap_marks: Vec::new(),
        totalkills,
        totalitems,
        totalsecret,
        extrakills: 0,
    })
}

// =============================================================================
// THINKERS (MOBJS)
// =============================================================================

fn archive_thinkers(
    w: &mut SaveWriter,
    level: &Level,
    order: &[ThinkerId],
    ordinals: &OrdinalMap,
) {
    let mobjs: Vec<&Mobj> = order
        .iter()
        .filter_map(|&id| level.thinkers.mobj(id))
        .collect();
    w.reserve(8 + mobjs.len() * 64);
    w.write_u32(mobjs.len() as u32);
    for m in mobjs {
        w.write_u8(m.kind as u8);
        w.write_i32(m.x);
        w.write_i32(m.y);
        w.write_i32(m.z);
        w.write_i32(m.momx);
        w.write_i32(m.momy);
        w.write_i32(m.momz);
        w.write_u32(m.angle);
        w.write_u32(m.flags);
        w.write_i32(m.health);
        w.write_u16(m.sector);
        w.write_u16(m.state as u16);
        w.write_i32(m.tics);
        w.write_i32(m.reactiontime);
        w.write_i32(m.threshold);
        w.write_u8(m.movedir as u8);
        w.write_i32(m.movecount);
        w.write_u8(m.lastlook);
        w.write_u32(ordinals.ordinal(m.target));
        w.write_u32(ordinals.ordinal(m.tracer));
        w.write_u8(m.player.unwrap_or(u8::MAX));
    }
}

/// Rebuild the mobj thinkers. Returns the arena and the archive
/// ordinal -> new id mapping (target/tracer fields still hold raw
/// ordinals until the caller's fixup pass).
fn unarchive_thinkers(r: &mut SaveReader) -> Result<(Thinkers, Vec<ThinkerId>), SaveError> {
    let mut thinkers = Thinkers::new();
    let count = r.read_u32()? as usize;
    if count > 1 << 20 {
        return Err(SaveError::Corrupt("thinker count"));
    }
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = MobjType::from_u8(r.read_u8()?).ok_or(SaveError::Corrupt("mobj type"))?;
        let mut m = Mobj::new(kind, 0, 0, 0);
        m.x = r.read_i32()?;
        m.y = r.read_i32()?;
        m.z = r.read_i32()?;
        m.momx = r.read_i32()?;
        m.momy = r.read_i32()?;
        m.momz = r.read_i32()?;
        m.angle = r.read_u32()?;
        m.flags = r.read_u32()?;
        m.health = r.read_i32()?;
        m.sector = r.read_u16()?;
        m.state = StateNum::from_u16(r.read_u16()?).ok_or(SaveError::Corrupt("mobj state"))?;
        m.tics = r.read_i32()?;
        m.reactiontime = r.read_i32()?;
        m.threshold = r.read_i32()?;
        m.movedir = MoveDir::from_u8(r.read_u8()?).ok_or(SaveError::Corrupt("movedir"))?;
        m.movecount = r.read_i32()?;
        m.lastlook = r.read_u8()?;
        let target_ord = r.read_u32()?;
        let tracer_ord = r.read_u32()?;
        // Smuggle the ordinals through until the fixup pass.
        m.target = if target_ord == NO_ORDINAL {
            None
        } else {
            Some(ThinkerId::from_raw(target_ord as u64))
        };
        m.tracer = if tracer_ord == NO_ORDINAL {
            None
        } else {
            Some(ThinkerId::from_raw(tracer_ord as u64))
        };
        let player = r.read_u8()?;
        m.player = if player == u8::MAX { None } else { Some(player) };
        ids.push(thinkers.spawn(Think::Mobj(m)));
    }
    Ok((thinkers, ids))
}

// =============================================================================
// SPECIALS
// =============================================================================

/// Special-record class tags. Zero terminates the section.
mod special_class {
    pub const END: u8 = 0;
    pub const DOOR: u8 = 1;
    pub const PLAT: u8 = 2;
    pub const FLOOR: u8 = 3;
    pub const CEILING: u8 = 4;
    pub const LIGHT: u8 = 5;
    pub const SCROLLER: u8 = 6;
    pub const PUSHER: u8 = 7;
}

fn archive_specials(w: &mut SaveWriter, level: &Level, order: &[ThinkerId]) {
    for &id in order {
        let Some(think) = level.thinkers.get(id) else {
            continue;
        };
        w.reserve(40);
        match think {
            Think::Mobj(_) => continue,
            Think::Door(d) => {
                w.write_u8(special_class::DOOR);
                w.write_u16(d.sector);
                w.write_u8(d.kind as u8);
                w.write_i32(d.topheight);
                w.write_i32(d.speed);
                w.write_u8(d.dir as u8);
                w.write_i32(d.topwait);
                w.write_i32(d.topcount);
            }
            Think::Plat(p) => {
                w.write_u8(special_class::PLAT);
                w.write_u16(p.sector);
                w.write_i32(p.speed);
                w.write_i32(p.low);
                w.write_i32(p.high);
                w.write_i32(p.wait);
                w.write_i32(p.count);
                w.write_u8(p.dir as u8);
            }
            Think::Floor(f) => {
                w.write_u8(special_class::FLOOR);
                w.write_u16(f.sector);
                w.write_i32(f.speed);
                w.write_i32(f.dest);
            }
            Think::Ceiling(c) => {
                w.write_u8(special_class::CEILING);
                w.write_u16(c.sector);
                w.write_i32(c.speed);
                w.write_i32(c.bottom);
                w.write_i32(c.top);
                w.write_u8(c.going_down as u8);
            }
            Think::Light(l) => {
                w.write_u8(special_class::LIGHT);
                w.write_u16(l.sector);
                w.write_i16(l.maxlight);
                w.write_i16(l.minlight);
                w.write_i32(l.count);
            }
            Think::Scroller(s) => {
                w.write_u8(special_class::SCROLLER);
                w.write_u16(s.affectee);
                w.write_i32(s.dx);
                w.write_i32(s.dy);
                w.write_u8(s.carry as u8);
            }
            Think::Pusher(p) => {
                w.write_u8(special_class::PUSHER);
                w.write_u16(p.sector);
                w.write_i32(p.x_mag);
                w.write_i32(p.y_mag);
                w.write_u8(p.point as u8);
            }
        }
    }
    w.write_u8(special_class::END);
}

fn unarchive_specials(r: &mut SaveReader, level: &mut Level) -> Result<(), SaveError> {
    loop {
        let class = r.read_u8()?;
        let think = match class {
            special_class::END => break,
            special_class::DOOR => {
                let sector = r.read_u16()?;
                let kind =
                    DoorKind::from_u8(r.read_u8()?).ok_or(SaveError::Corrupt("door kind"))?;
                let mut d = Door::new(sector, kind, 0);
                d.topheight = r.read_i32()?;
                d.speed = r.read_i32()?;
                d.dir = DoorDir::from_u8(r.read_u8()?).ok_or(SaveError::Corrupt("door dir"))?;
                d.topwait = r.read_i32()?;
                d.topcount = r.read_i32()?;
                Think::Door(d)
            }
            special_class::PLAT => {
                let sector = r.read_u16()?;
                let mut p = Platform::new(sector, 0, 0);
                p.speed = r.read_i32()?;
                p.low = r.read_i32()?;
                p.high = r.read_i32()?;
                p.wait = r.read_i32()?;
                p.count = r.read_i32()?;
                p.dir = PlatDir::from_u8(r.read_u8()?).ok_or(SaveError::Corrupt("plat dir"))?;
                Think::Plat(p)
            }
            special_class::FLOOR => {
                let sector = r.read_u16()?;
                let mut f = FloorMover::new(sector, 0);
                f.speed = r.read_i32()?;
                f.dest = r.read_i32()?;
                Think::Floor(f)
            }
            special_class::CEILING => {
                let sector = r.read_u16()?;
                let mut c = CeilingMover::new(sector, 0, 0);
                c.speed = r.read_i32()?;
                c.bottom = r.read_i32()?;
                c.top = r.read_i32()?;
                c.going_down = r.read_u8()? != 0;
                Think::Ceiling(c)
            }
            special_class::LIGHT => {
                let sector = r.read_u16()?;
                let maxlight = r.read_i16()?;
                let minlight = r.read_i16()?;
                let mut l = LightFlicker::new(sector, maxlight, minlight);
                l.count = r.read_i32()?;
                Think::Light(l)
            }
            special_class::SCROLLER => {
                let affectee = r.read_u16()?;
                let dx = r.read_i32()?;
                let dy = r.read_i32()?;
                let carry = r.read_u8()? != 0;
                Think::Scroller(Scroller::new(affectee, dx, dy, carry))
            }
            special_class::PUSHER => {
                let sector = r.read_u16()?;
                let x_mag = r.read_i32()?;
                let y_mag = r.read_i32()?;
                let point = r.read_u8()? != 0;
                Think::Pusher(Pusher::new(sector, x_mag, y_mag, point))
            }
            _ => return Err(SaveError::Corrupt("special class")),
        };
        level.thinkers.spawn(think);
    }
    Ok(())
}

// =============================================================================
// RNG AND MAP MARKS
// =============================================================================

fn archive_rng(w: &mut SaveWriter, game: &Game) {
    let indices = game.rng.indices();
    w.reserve(16 + indices.len());
    w.write_u32(indices.len() as u32);
    w.write_bytes(&indices[..]);
    w.write_u32(game.rng.seed());
}

fn unarchive_rng(r: &mut SaveReader, game: &mut Game) -> Result<(), SaveError> {
    let n = r.read_u32()? as usize;
    if n != crate::core::rng::NUM_RNG_CLASSES {
        return Err(SaveError::Corrupt("rng class count"));
    }
    let bytes = r.read_bytes(n)?;
    let mut indices = [0u8; crate::core::rng::NUM_RNG_CLASSES];
    indices.copy_from_slice(bytes);
    let seed = r.read_u32()?;
    game.rng.clear(seed, game.behavior.level);
    game.rng.restore_indices(indices);
    Ok(())
}

fn archive_map_marks(w: &mut SaveWriter, level: &Level) {
    w.reserve(8 + level.automap_marks.len() * 8);
    w.write_u32(level.automap_marks.len() as u32);
    for &(x, y) in &level.automap_marks {
        w.write_i32(x);
        w.write_i32(y);
    }
}

fn unarchive_map_marks(r: &mut SaveReader, level: &mut Level) -> Result<(), SaveError> {
    let n = r.read_u32()? as usize;
    if n > 1 << 16 {
        return Err(SaveError::Corrupt("mark count"));
    }
    for _ in 0..n {
        let x = r.read_i32()?;
        let y = r.read_i32()?;
        level.automap_marks.push((x, y));
    }
    Ok(())
}
