//! Behavior Vector Resolution
//!
//! Expands a compatibility level plus overrides into the full vector of
//! behavior toggles. The resolver is the *sole writer* of the vector;
//! every simulation check that differs across engine revisions reads
//! one of these fields.
//!
//! Resolution precedence, highest to lowest:
//! demo header -> savegame -> command line -> WAD `COMPLVL` -> user
//! default. The demo and savegame layers apply on top of a resolved
//! [`Behavior`] via [`Behavior::apply_level`] and the options-block
//! readers in the demo/save codecs; this module handles the lower
//! three layers in [`resolve`].

use serde::{Deserialize, Serialize};

use super::{CompatLevel, GameVersion};

/// Per-behavior compatibility toggles, indexed into [`Behavior::comp`].
///
/// `true` means "emulate the old quirk".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(usize)]
pub enum Comp {
    /// Any monster can telefrag on level 30
    Telefrag = 0,
    /// Monsters can get stuck hanging off ledges
    Dropoff,
    /// Arch-vile resurrects invincible ghosts
    Vile,
    /// Pain elemental limited to 21 lost souls
    Pain,
    /// Lost souls get stuck behind walls
    Skull,
    /// Blazing doors make double closing sounds
    Blazing,
    /// Tagged doors don't trigger special lighting
    Doorlight,
    /// Use exactly the old movement clipping code
    Model,
    /// God mode isn't absolute
    God,
    /// Objects never fall off ledges
    Falloff,
    /// Use exactly the old floor motion behavior
    Floors,
    /// Sky is unaffected by invulnerability
    Skymap,
    /// Monsters don't give up pursuit of targets
    Pursuit,
    /// Monsters get stuck on door tracks
    Doorstuck,
    /// Monsters randomly walk off of moving lifts
    Staylift,
    /// Zombie players can exit levels
    Zombie,
    /// Use exactly the old stair-building method
    Stairs,
    /// Powerup cheats are not infinite duration
    Infcheat,
    /// Linedef effects work with sector tag zero
    Zerotags,
    /// Creatures with no spawnpoint respawn at (0,0)
    Respawn,
    /// Lost souls don't bounce on floors
    Soul,
    /// One-sided walls block ledge cross-overs
    Ledgeblock,
    /// Friendly flag carried over by spawned things
    Friendlyspawn,
    /// Voodoo dolls ride scrolling sectors
    Voodooscroller,
    /// The reserved linedef flag zeroes extended flags
    Reservedlineflag,
}

/// Number of compatibility toggles.
pub const COMP_TOTAL: usize = Comp::Reservedlineflag as usize + 1;

/// Number of comp bytes an MBF21 demo records.
pub const MBF21_COMP_TOTAL: usize = COMP_TOTAL;

/// The resolved behavior vector. Everything the simulation consults
/// that differs between engine revisions lives here, and only the
/// resolver and the demo/save option readers write it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behavior {
    /// The resolved compatibility level.
    pub level: CompatLevel,
    /// Executable flavor within the vanilla lineage.
    pub gameversion: GameVersion,
    /// Vanilla blanket flag: true while running demo version < 200.
    pub compatibility: bool,
    /// Per-behavior quirk toggles.
    pub comp: [bool; COMP_TOTAL],

    // Discrete toggles stored in demo/save option blocks. Field order
    // here mirrors the wire order of the options block.
    /// Monsters remember their last attacker
    pub monsters_remember: bool,
    /// Ice and mud sector friction
    pub variable_friction: bool,
    /// Firing pushes the player backwards
    pub weapon_recoil: bool,
    /// Point pusher / puller things are active
    pub allow_pushers: bool,
    /// Player view bobbing
    pub player_bobbing: bool,
    /// `-respawn`: monsters respawn
    pub respawnparm: bool,
    /// `-fast`: fast monsters
    pub fastparm: bool,
    /// `-nomonsters`
    pub nomonsters: bool,
    /// Demo sync insurance (mix tic phase into random draws)
    pub demo_insurance: bool,
    /// Seed recorded into demos and savegames
    pub rngseed: u32,
    /// Monsters fight each other when hit by friendly fire
    pub monster_infighting: bool,
    /// Number of helper dogs to spawn
    pub dogs: u8,
    /// Pre-release BFG behavior
    pub classic_bfg: bool,
    /// Pre-release (beta) emulation
    pub beta_emulation: bool,
    /// Minimum distance friends keep from the player
    pub distfriend: i16,
    /// Monsters back away from melee when they have ranged attacks
    pub monster_backing: bool,
    /// Monsters avoid crushers and hazards
    pub monster_avoid_hazards: bool,
    /// Monsters are affected by sector friction
    pub monster_friction: bool,
    /// Friends assist each other when attacked
    pub help_friends: bool,
    /// Helper dogs can jump down
    pub dog_jumping: bool,
    /// Monsters can climb tall steps
    pub monkeys: bool,
}

/// User-configured defaults, loaded from the config file. These seed
/// the lowest-precedence layer of resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDefaults {
    pub complevel: CompatLevel,
    pub weapon_recoil: bool,
    pub player_bobbing: bool,
    pub monsters_remember: bool,
    pub monster_infighting: bool,
    pub dogs: u8,
    pub dog_jumping: bool,
    pub distfriend: i16,
    pub monster_backing: bool,
    pub monster_avoid_hazards: bool,
    pub monster_friction: bool,
    pub help_friends: bool,
    pub monkeys: bool,
    pub classic_bfg: bool,
    pub demo_insurance: bool,
    pub comp: [bool; COMP_TOTAL],
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            complevel: CompatLevel::Mbf21,
            weapon_recoil: false,
            player_bobbing: true,
            monsters_remember: true,
            monster_infighting: true,
            dogs: 0,
            dog_jumping: true,
            distfriend: 128,
            monster_backing: false,
            monster_avoid_hazards: true,
            monster_friction: true,
            help_friends: false,
            monkeys: false,
            classic_bfg: false,
            demo_insurance: false,
            comp: [false; COMP_TOTAL],
        }
    }
}

/// Command-line overrides relevant to resolution.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub complevel: Option<CompatLevel>,
    pub gameversion: Option<GameVersion>,
    pub respawn: bool,
    pub fast: bool,
    pub nomonsters: bool,
    pub beta: bool,
    pub dogs: Option<u8>,
}

impl Behavior {
    /// True when emulating MBF21.
    #[inline]
    pub fn mbf21(&self) -> bool {
        self.level == CompatLevel::Mbf21
    }

    /// True while the blanket vanilla compatibility flag is up.
    #[inline]
    pub fn demo_compatibility(&self) -> bool {
        self.compatibility
    }

    /// Read one comp toggle.
    #[inline]
    pub fn comp(&self, flag: Comp) -> bool {
        self.comp[flag as usize]
    }

    /// MBF fixups applied whenever the level is below MBF21
    /// (the options blocks of older demos don't carry these toggles).
    pub fn apply_mbf_fixups(&mut self) {
        self.comp[Comp::Respawn as usize] = true;
        self.comp[Comp::Ledgeblock as usize] = false;
        self.comp[Comp::Friendlyspawn as usize] = true;
        self.comp[Comp::Voodooscroller as usize] = true;
        self.comp[Comp::Reservedlineflag as usize] = false;
    }

    /// Boom fixups: the quirks Boom 2.02 still carried.
    pub fn apply_boom_fixups(&mut self) {
        for flag in [
            Comp::Telefrag,
            Comp::Falloff,
            Comp::Pursuit,
            Comp::Staylift,
            Comp::Zombie,
            Comp::Infcheat,
            Comp::Respawn,
            Comp::Friendlyspawn,
        ] {
            self.comp[flag as usize] = true;
        }
        self.comp[Comp::Dropoff as usize] = false;
        self.comp[Comp::Ledgeblock as usize] = false;
        self.comp[Comp::Voodooscroller as usize] = false;
        self.comp[Comp::Reservedlineflag as usize] = false;
    }

    /// Re-clamp the vector after the level changes (demo header or
    /// savegame wins over whatever was resolved before).
    pub fn apply_level(&mut self, level: CompatLevel) {
        self.level = level;
        self.compatibility = false;

        match level {
            CompatLevel::Vanilla => {
                self.compatibility = true;
                self.comp = [true; COMP_TOTAL];
                self.variable_friction = false;
                self.weapon_recoil = false;
                self.allow_pushers = false;
                self.monster_infighting = true;
                self.classic_bfg = false;
                self.beta_emulation = false;
                self.dogs = 0;
                self.dog_jumping = false;
                self.monster_backing = false;
                self.monster_avoid_hazards = false;
                self.monster_friction = false;
                self.help_friends = false;
                self.monkeys = false;
            }
            CompatLevel::Boom => {
                self.comp = [false; COMP_TOTAL];
                self.apply_boom_fixups();
                self.monster_infighting = true;
                self.monster_backing = false;
                self.monster_avoid_hazards = false;
                self.monster_friction = false;
                self.help_friends = false;
                self.classic_bfg = false;
                self.beta_emulation = false;
                self.dogs = 0;
                self.dog_jumping = false;
                self.monkeys = false;
            }
            CompatLevel::Mbf => {
                self.apply_mbf_fixups();
            }
            CompatLevel::Mbf21 => {
                // Not configurable in mbf21
                self.variable_friction = true;
                self.allow_pushers = true;
                self.demo_insurance = false;
                self.classic_bfg = false;
                self.beta_emulation = false;
            }
        }
    }
}

/// Overlay a WAD-embedded OPTIONS lump onto a resolved vector.
///
/// The lump is line-oriented `key value` text. It sits between the
/// user defaults and the demo/save layers: WAD authors pin the
/// behavior their maps need, demos still override everything. Only
/// applied at MBF and above, like the original loader.
pub fn apply_options_lump(b: &mut Behavior, data: &[u8]) {
    if b.level < CompatLevel::Mbf {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(['#', ';']) {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(num) = value.parse::<i32>() else {
            continue;
        };
        let on = num != 0;
        match key {
            "weapon_recoil" => b.weapon_recoil = on,
            "player_bobbing" => b.player_bobbing = on,
            "monsters_remember" => b.monsters_remember = on,
            "monster_infighting" => b.monster_infighting = on,
            "monster_backing" => b.monster_backing = on,
            "monster_avoid_hazards" => b.monster_avoid_hazards = on,
            "monster_friction" => b.monster_friction = on,
            "help_friends" => b.help_friends = on,
            "player_helpers" => b.dogs = num.clamp(0, 3) as u8,
            "friend_distance" => b.distfriend = num.clamp(0, 999) as i16,
            "dog_jumping" => b.dog_jumping = on,
            "monkeys" => b.monkeys = on,
            _ => {
                // comp_* toggles address the vector by name.
                if let Some(flag) = comp_flag_by_name(key) {
                    b.comp[flag as usize] = on;
                }
            }
        }
    }
}

fn comp_flag_by_name(name: &str) -> Option<Comp> {
    let table: &[(&str, Comp)] = &[
        ("comp_telefrag", Comp::Telefrag),
        ("comp_dropoff", Comp::Dropoff),
        ("comp_vile", Comp::Vile),
        ("comp_pain", Comp::Pain),
        ("comp_skull", Comp::Skull),
        ("comp_blazing", Comp::Blazing),
        ("comp_doorlight", Comp::Doorlight),
        ("comp_model", Comp::Model),
        ("comp_god", Comp::God),
        ("comp_falloff", Comp::Falloff),
        ("comp_floors", Comp::Floors),
        ("comp_skymap", Comp::Skymap),
        ("comp_pursuit", Comp::Pursuit),
        ("comp_doorstuck", Comp::Doorstuck),
        ("comp_staylift", Comp::Staylift),
        ("comp_zombie", Comp::Zombie),
        ("comp_stairs", Comp::Stairs),
        ("comp_infcheat", Comp::Infcheat),
        ("comp_zerotags", Comp::Zerotags),
        ("comp_respawn", Comp::Respawn),
        ("comp_soul", Comp::Soul),
        ("comp_ledgeblock", Comp::Ledgeblock),
        ("comp_friendlyspawn", Comp::Friendlyspawn),
        ("comp_voodooscroller", Comp::Voodooscroller),
        ("comp_reservedlineflag", Comp::Reservedlineflag),
    ];
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, flag)| flag)
}

/// Resolve the behavior vector from the lower three precedence layers.
///
/// For a given set of inputs this is a pure function: same inputs,
/// byte-identical vector. The demo header and savegame layers apply on
/// top via [`Behavior::apply_level`] plus their option-block readers.
pub fn resolve(
    defaults: &UserDefaults,
    wad_level: Option<CompatLevel>,
    overrides: &Overrides,
    rngseed: u32,
    netgame: bool,
) -> Behavior {
    // Precedence within this function: command line > WAD lump > user
    // default.
    let level = overrides
        .complevel
        .or(wad_level)
        .unwrap_or(defaults.complevel);

    let mut b = Behavior {
        level,
        gameversion: overrides.gameversion.unwrap_or(GameVersion::Doom19),
        compatibility: false,
        comp: defaults.comp,
        monsters_remember: defaults.monsters_remember,
        variable_friction: true,
        weapon_recoil: defaults.weapon_recoil,
        allow_pushers: true,
        player_bobbing: defaults.player_bobbing,
        respawnparm: overrides.respawn,
        fastparm: overrides.fast,
        nomonsters: overrides.nomonsters,
        demo_insurance: defaults.demo_insurance,
        rngseed,
        monster_infighting: defaults.monster_infighting,
        dogs: if netgame {
            0
        } else {
            overrides.dogs.unwrap_or(defaults.dogs)
        },
        classic_bfg: defaults.classic_bfg,
        beta_emulation: overrides.beta,
        distfriend: defaults.distfriend,
        monster_backing: defaults.monster_backing,
        monster_avoid_hazards: defaults.monster_avoid_hazards,
        monster_friction: defaults.monster_friction,
        help_friends: defaults.help_friends,
        dog_jumping: defaults.dog_jumping,
        monkeys: defaults.monkeys,
    };

    if !b.mbf21() {
        b.apply_mbf_fixups();
    }
    b.apply_level(level);

    b
}
