//! Map Objects
//!
//! A mobj is the thinker variant with a position, velocity and a
//! state-machine pointer: players, monsters, barrels, projectiles.
//! State advance is data-driven - each state holds a tic count, an
//! action tag and a successor - so the whole table is cloneable and
//! serializable, and the dispatcher in `sim` is the single place
//! behavior lives.

use serde::{Deserialize, Serialize};

use super::thinker::ThinkerId;
use crate::core::angle::Angle;
use crate::core::fixed::{Fixed, FRACUNIT};

/// Mobj flag bits.
pub mod flags {
    /// Blocks other solid things.
    pub const MF_SOLID: u32 = 0x0002;
    /// Can be hit.
    pub const MF_SHOOTABLE: u32 = 0x0004;
    /// Not affected by gravity.
    pub const MF_NOGRAVITY: u32 = 0x0200;
    /// Allowed to move over drop-offs.
    pub const MF_DROPOFF: u32 = 0x0400;
    /// Player invisibility sphere active.
    pub const MF_SHADOW: u32 = 0x40000;
    /// Dead.
    pub const MF_CORPSE: u32 = 0x100000;
    /// Counts toward the kill tally.
    pub const MF_COUNTKILL: u32 = 0x400000;
    /// Counts toward the item tally.
    pub const MF_COUNTITEM: u32 = 0x800000;
    /// Charging lost-soul style attack.
    pub const MF_SKULLFLY: u32 = 0x1000000;
    /// Friendly monster (helper dog).
    pub const MF_FRIEND: u32 = 0x4000000;
}

/// The kinds of map object this port's core simulates directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum MobjType {
    Player = 0,
    Trooper = 1,
    Demon = 2,
    Barrel = 3,
    Dog = 4,
}

/// Number of mobj kinds.
pub const NUM_MOBJ_TYPES: usize = 5;

impl MobjType {
    pub fn from_u8(v: u8) -> Option<MobjType> {
        match v {
            0 => Some(MobjType::Player),
            1 => Some(MobjType::Trooper),
            2 => Some(MobjType::Demon),
            3 => Some(MobjType::Barrel),
            4 => Some(MobjType::Dog),
            _ => None,
        }
    }
}

/// Static per-type data. The patch formats mutate copies of this
/// table at load time; the simulation reads it read-only afterwards.
#[derive(Clone, Copy, Debug)]
pub struct MobjInfo {
    pub doomednum: i32,
    pub spawnhealth: i32,
    /// Map units per move step, in whole units.
    pub speed: i32,
    pub radius: Fixed,
    pub height: Fixed,
    pub painchance: u8,
    pub flags: u32,
    pub spawnstate: StateNum,
    pub seestate: StateNum,
    pub attackstate: StateNum,
    pub painstate: StateNum,
    pub deathstate: StateNum,
}

/// State-machine node ids. One compact table for every type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum StateNum {
    Null = 0,
    PlayerStand,
    TrooperStand,
    TrooperRun,
    TrooperAttack,
    TrooperPain,
    TrooperDie,
    TrooperDead,
    DemonStand,
    DemonRun,
    DemonAttack,
    DemonPain,
    DemonDie,
    DemonDead,
    BarrelStand,
    BarrelDie,
    DogStand,
    DogRun,
    DogAttack,
    DogPain,
    DogDie,
    DogDead,
}

/// Action tags dispatched by the simulation when a state is entered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[default]
    None,
    /// Scan for a target.
    Look,
    /// Pursue the current target.
    Chase,
    /// Turn toward the target.
    FaceTarget,
    /// Hitscan attack.
    ShootTarget,
    /// Melee bite.
    Bite,
    /// Death scream, drop solidity.
    Scream,
    /// Radius damage, then remove.
    Explode,
    /// Final death frame housekeeping.
    Fall,
}

/// A state table entry.
#[derive(Clone, Copy, Debug)]
pub struct State {
    /// Tics to stay in this state; -1 means forever.
    pub tics: i32,
    pub action: Action,
    pub next: StateNum,
}

impl StateNum {
    /// Decode a state id from an archive; out-of-range ids are
    /// corrupt data, not a panic.
    pub fn from_u16(v: u16) -> Option<StateNum> {
        if (v as usize) < STATES.len() {
            // Discriminants are dense and start at zero.
            Some(ALL_STATES[v as usize])
        } else {
            None
        }
    }
}

/// Dense discriminant-order listing backing [`StateNum::from_u16`].
#[rustfmt::skip]
const ALL_STATES: [StateNum; 22] = [
    StateNum::Null,
    StateNum::PlayerStand,
    StateNum::TrooperStand, StateNum::TrooperRun, StateNum::TrooperAttack,
    StateNum::TrooperPain, StateNum::TrooperDie, StateNum::TrooperDead,
    StateNum::DemonStand, StateNum::DemonRun, StateNum::DemonAttack,
    StateNum::DemonPain, StateNum::DemonDie, StateNum::DemonDead,
    StateNum::BarrelStand, StateNum::BarrelDie,
    StateNum::DogStand, StateNum::DogRun, StateNum::DogAttack,
    StateNum::DogPain, StateNum::DogDie, StateNum::DogDead,
];

/// The state table, indexed by [`StateNum`] discriminant.
#[rustfmt::skip]
pub const STATES: [State; 22] = [
    /* Null         */ State { tics: -1, action: Action::None,        next: StateNum::Null },
    /* PlayerStand  */ State { tics: -1, action: Action::None,        next: StateNum::PlayerStand },
    /* TrooperStand */ State { tics: 10, action: Action::Look,        next: StateNum::TrooperStand },
    /* TrooperRun   */ State { tics:  4, action: Action::Chase,       next: StateNum::TrooperRun },
    /* TrooperAttack*/ State { tics: 10, action: Action::ShootTarget, next: StateNum::TrooperRun },
    /* TrooperPain  */ State { tics:  3, action: Action::None,        next: StateNum::TrooperRun },
    /* TrooperDie   */ State { tics:  5, action: Action::Scream,      next: StateNum::TrooperDead },
    /* TrooperDead  */ State { tics: -1, action: Action::Fall,        next: StateNum::TrooperDead },
    /* DemonStand   */ State { tics: 10, action: Action::Look,        next: StateNum::DemonStand },
    /* DemonRun     */ State { tics:  2, action: Action::Chase,       next: StateNum::DemonRun },
    /* DemonAttack  */ State { tics:  8, action: Action::Bite,        next: StateNum::DemonRun },
    /* DemonPain    */ State { tics:  2, action: Action::None,        next: StateNum::DemonRun },
    /* DemonDie     */ State { tics:  6, action: Action::Scream,      next: StateNum::DemonDead },
    /* DemonDead    */ State { tics: -1, action: Action::Fall,        next: StateNum::DemonDead },
    /* BarrelStand  */ State { tics: -1, action: Action::None,        next: StateNum::BarrelStand },
    /* BarrelDie    */ State { tics:  5, action: Action::Explode,     next: StateNum::Null },
    /* DogStand     */ State { tics: 10, action: Action::Look,        next: StateNum::DogStand },
    /* DogRun       */ State { tics:  2, action: Action::Chase,       next: StateNum::DogRun },
    /* DogAttack    */ State { tics:  8, action: Action::Bite,        next: StateNum::DogRun },
    /* DogPain      */ State { tics:  2, action: Action::None,        next: StateNum::DogRun },
    /* DogDie       */ State { tics:  6, action: Action::Scream,      next: StateNum::DogDead },
    /* DogDead      */ State { tics: -1, action: Action::Fall,        next: StateNum::DogDead },
];

/// Per-type static info, indexed by [`MobjType`] discriminant.
#[rustfmt::skip]
pub const MOBJ_INFO: [MobjInfo; NUM_MOBJ_TYPES] = [
    MobjInfo { // Player
        doomednum: -1, spawnhealth: 100, speed: 0,
        radius: 16 * FRACUNIT, height: 56 * FRACUNIT, painchance: 255,
        flags: flags::MF_SOLID | flags::MF_SHOOTABLE | flags::MF_DROPOFF,
        spawnstate: StateNum::PlayerStand, seestate: StateNum::PlayerStand,
        attackstate: StateNum::PlayerStand, painstate: StateNum::PlayerStand,
        deathstate: StateNum::PlayerStand,
    },
    MobjInfo { // Trooper
        doomednum: 3004, spawnhealth: 20, speed: 8,
        radius: 20 * FRACUNIT, height: 56 * FRACUNIT, painchance: 200,
        flags: flags::MF_SOLID | flags::MF_SHOOTABLE | flags::MF_COUNTKILL,
        spawnstate: StateNum::TrooperStand, seestate: StateNum::TrooperRun,
        attackstate: StateNum::TrooperAttack, painstate: StateNum::TrooperPain,
        deathstate: StateNum::TrooperDie,
    },
    MobjInfo { // Demon
        doomednum: 3002, spawnhealth: 150, speed: 10,
        radius: 30 * FRACUNIT, height: 56 * FRACUNIT, painchance: 180,
        flags: flags::MF_SOLID | flags::MF_SHOOTABLE | flags::MF_COUNTKILL,
        spawnstate: StateNum::DemonStand, seestate: StateNum::DemonRun,
        attackstate: StateNum::DemonAttack, painstate: StateNum::DemonPain,
        deathstate: StateNum::DemonDie,
    },
    MobjInfo { // Barrel
        doomednum: 2035, spawnhealth: 20, speed: 0,
        radius: 10 * FRACUNIT, height: 42 * FRACUNIT, painchance: 0,
        flags: flags::MF_SOLID | flags::MF_SHOOTABLE,
        spawnstate: StateNum::BarrelStand, seestate: StateNum::BarrelStand,
        attackstate: StateNum::BarrelStand, painstate: StateNum::BarrelStand,
        deathstate: StateNum::BarrelDie,
    },
    MobjInfo { // Dog (helper)
        doomednum: 888, spawnhealth: 500, speed: 10,
        radius: 12 * FRACUNIT, height: 28 * FRACUNIT, painchance: 180,
        flags: flags::MF_SOLID | flags::MF_SHOOTABLE | flags::MF_COUNTKILL
            | flags::MF_FRIEND,
        spawnstate: StateNum::DogStand, seestate: StateNum::DogRun,
        attackstate: StateNum::DogAttack, painstate: StateNum::DogPain,
        deathstate: StateNum::DogDie,
    },
];

/// Movement compass used by the chase logic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MoveDir {
    East = 0,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
    #[default]
    NoDir,
}

impl MoveDir {
    pub fn from_u8(v: u8) -> Option<MoveDir> {
        const DIRS: [MoveDir; 9] = [
            MoveDir::East,
            MoveDir::NorthEast,
            MoveDir::North,
            MoveDir::NorthWest,
            MoveDir::West,
            MoveDir::SouthWest,
            MoveDir::South,
            MoveDir::SouthEast,
            MoveDir::NoDir,
        ];
        DIRS.get(v as usize).copied()
    }
}

/// A map object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mobj {
    pub kind: MobjType,

    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub momx: Fixed,
    pub momy: Fixed,
    pub momz: Fixed,
    pub angle: Angle,

    pub flags: u32,
    pub health: i32,
    /// Sector this mobj stands in.
    pub sector: u16,

    pub state: StateNum,
    /// Tics until the next state; -1 parks the state machine.
    pub tics: i32,

    /// Tics before first thinking after spawn.
    pub reactiontime: i32,
    /// Tics of blind pursuit before re-checking targets.
    pub threshold: i32,
    pub movedir: MoveDir,
    pub movecount: i32,
    /// Player slot scanned last by Look.
    pub lastlook: u8,

    /// Current quarry. Weak: revalidate through the arena.
    pub target: Option<ThinkerId>,
    /// Homing reference. Weak: revalidate through the arena.
    pub tracer: Option<ThinkerId>,
    /// Back-reference to the player slot driving this mobj.
    pub player: Option<u8>,
}

impl Mobj {
    /// Spawn-time constructor; state and stats from the info table.
    pub fn new(kind: MobjType, x: Fixed, y: Fixed, z: Fixed) -> Self {
        let info = &MOBJ_INFO[kind as usize];
        let state = &STATES[info.spawnstate as usize];
        Self {
            kind,
            x,
            y,
            z,
            momx: 0,
            momy: 0,
            momz: 0,
            angle: 0,
            flags: info.flags,
            health: info.spawnhealth,
            sector: 0,
            state: info.spawnstate,
            tics: state.tics,
            reactiontime: 8,
            threshold: 0,
            movedir: MoveDir::NoDir,
            movecount: 0,
            lastlook: 0,
            target: None,
            tracer: None,
            player: None,
        }
    }

    /// Static info for this mobj's type.
    #[inline]
    pub fn info(&self) -> &'static MobjInfo {
        &MOBJ_INFO[self.kind as usize]
    }

    /// Enter a state; returns false when the state chain terminated in
    /// `Null` (the mobj should be removed).
    pub fn set_state(&mut self, state: StateNum) -> bool {
        self.state = state;
        if state == StateNum::Null {
            self.tics = -1;
            return false;
        }
        self.tics = STATES[state as usize].tics;
        true
    }

    /// This mobj still counts as an obstacle.
    #[inline]
    pub fn is_solid(&self) -> bool {
        self.flags & flags::MF_SOLID != 0
    }
}
