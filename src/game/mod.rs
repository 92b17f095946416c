//! Game Simulation
//!
//! The owned simulation value and the modules around it: input
//! construction, the thinker world, the per-frame ticker and the
//! game-action dispatcher. All mutable simulation state lives inside
//! [`Game`]; the tic loop borrows it mutably, the renderer borrows it
//! read-only between tics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compat::Behavior;
use crate::core::rng::Rng;
use crate::demo::playback::DemoPlayback;
use crate::demo::record::DemoRecorder;
use crate::game::player::Player;
use crate::game::rewind::Rewind;
use crate::game::screens::{Finale, Intermission, TitlePage};
use crate::game::thinker::ThinkerId;
use crate::game::world::{Level, LevelDef, MapEntry};
use crate::wad::WadDirectory;
use crate::{BACKUPTICS, MAXPLAYERS};

pub mod dispatcher;
pub mod input;
pub mod mobj;
pub mod player;
pub mod rewind;
pub mod screens;
pub mod sim;
pub mod specials;
pub mod thinker;
pub mod ticcmd;
pub mod ticker;
pub mod weapons;
pub mod world;

// Re-export key types
pub use dispatcher::GameAction;
pub use input::InputState;
pub use ticker::TicCmdSet;

/// Outer game state: which ticker family runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Level,
    Intermission,
    Finale,
    DemoScreen,
}

/// Which retail package is loaded; decides episode counts, the
/// super shotgun, and secret-exit routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Shareware,
    Registered,
    /// MAP01-MAP32 packaging.
    Commercial,
    /// Four-episode retail.
    Retail,
}

/// Skill levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Skill {
    Baby = 0,
    Easy = 1,
    Medium = 2,
    Hard = 3,
    Nightmare = 4,
}

impl Skill {
    pub fn from_index(i: u8) -> Option<Skill> {
        match i {
            0 => Some(Skill::Baby),
            1 => Some(Skill::Easy),
            2 => Some(Skill::Medium),
            3 => Some(Skill::Hard),
            4 => Some(Skill::Nightmare),
            _ => None,
        }
    }
}

/// A sound request queued during a tic and flushed to the audio
/// subsystem at tic end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundEvent {
    pub sfx: u16,
    pub origin: Option<ThinkerId>,
    pub volume: u8,
    pub separation: u8,
    pub priority: u8,
    pub pitch: u8,
}

/// Sound effect ids the core emits.
pub mod sfx {
    pub const PISTOL: u16 = 1;
    pub const SHOTGUN: u16 = 2;
    pub const SAWUP: u16 = 3;
    pub const PUNCH: u16 = 4;
    pub const SCREAM: u16 = 5;
    pub const EXPLODE: u16 = 6;
    pub const DOOR_OPEN: u16 = 7;
    pub const DOOR_CLOSE: u16 = 8;
    pub const SWITCH: u16 = 9;
}

/// Intermission input: the tally of the level just finished.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorldStats {
    /// Episode of the finished level (0-based).
    pub epsd: u32,
    /// Finished map (0-based).
    pub last: u32,
    /// Episode of the next level (0-based).
    pub nextep: u32,
    /// Next map (0-based).
    pub next: u32,
    pub didsecret: bool,
    pub maxkills: i32,
    pub maxitems: i32,
    pub maxsecret: i32,
    pub partime: u32,
    /// Per-player closing tallies.
    pub plyr_kills: [i32; MAXPLAYERS],
    pub plyr_items: [i32; MAXPLAYERS],
    pub plyr_secret: [i32; MAXPLAYERS],
    pub plyr_time: u32,
    pub totaltimes: u32,
    /// Routed through UMAPINFO rather than the built-in tables.
    pub from_mapinfo: bool,
}

/// The map tables available to the dispatcher, keyed by
/// (episode, map). BTreeMap for deterministic iteration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapSet {
    pub maps: BTreeMap<(u32, u32), LevelDef>,
    pub mapinfo: Vec<MapEntry>,
}

impl MapSet {
    /// A one-map set built around the synthetic arena, used by the
    /// headless driver when no map manifest is given.
    pub fn arena_only() -> MapSet {
        let mut maps = BTreeMap::new();
        let def = LevelDef::demo_arena();
        // Register the arena for every slot the built-in routing can
        // reach, so exits always have a destination.
        for episode in 1..=4u32 {
            for map in 1..=9u32 {
                maps.insert((episode, map), def.clone());
            }
        }
        for map in 1..=32u32 {
            maps.insert((1, map), def.clone());
        }
        MapSet {
            maps,
            mapinfo: Vec::new(),
        }
    }

    pub fn get(&self, episode: u32, map: u32) -> Option<&LevelDef> {
        self.maps.get(&(episode, map))
    }

    /// The UMAPINFO entry for a map, if one was provided.
    pub fn mapinfo(&self, episode: u32, map: u32) -> Option<&MapEntry> {
        self.mapinfo
            .iter()
            .find(|e| e.episode == episode && e.map == map)
    }
}

/// The whole owned simulation.
pub struct Game {
    // Resolved behavior and its pieces
    pub behavior: Behavior,
    pub mode: GameMode,
    pub rng: Rng,

    // Players
    pub players: [Player; MAXPLAYERS],
    pub playeringame: [bool; MAXPLAYERS],
    pub consoleplayer: usize,
    pub displayplayer: usize,

    // Clocks
    pub gametic: u32,
    /// Subtracted from gametic for the revenant-tracer / RNG phase;
    /// bumped instead of running tics while paused in demo playback.
    pub basetic: u32,
    pub leveltime: u32,
    pub levelstarttic: u32,
    pub totalleveltimes: u32,
    pub oldleveltime: u32,

    // Identity of the running level
    pub gameskill: Skill,
    pub gameepisode: u32,
    pub gamemap: u32,
    pub secretexit: bool,

    // Outer state machine
    pub gamestate: GameState,
    pub gameaction: GameAction,
    /// Parameters latched for the next NewGame action.
    pub d_skill: Skill,
    pub d_episode: u32,
    pub d_map: u32,

    /// Bit 1: user pause. Bit 2: demo-playback pause.
    pub paused: u8,
    /// Menu open (single-player pause semantics).
    pub menuactive: bool,
    /// Orderly shutdown requested (end of -playdemo run, quit key).
    pub quit_requested: bool,
    pub usergame: bool,
    pub netgame: bool,
    pub netdemo: bool,
    pub deathmatch: bool,
    pub ticdup: u32,

    /// Consistency history: low word of each player's mobj x.
    pub consistency: [[i16; BACKUPTICS]; MAXPLAYERS],

    // The world
    pub level: Option<Level>,
    pub maps: MapSet,
    pub wad: WadDirectory,
    pub wminfo: WorldStats,

    // Out-of-level tickers
    pub intermission: Option<Intermission>,
    pub finale: Option<Finale>,
    pub titlepage: TitlePage,

    // Demo machinery
    pub demo_playback: Option<DemoPlayback>,
    pub demo_recorder: Option<DemoRecorder>,
    pub singledemo: bool,
    pub timingdemo: bool,
    pub fastdemo: bool,
    /// Name latched for a deferred PlayDemo action.
    pub defdemoname: Option<String>,

    // Save machinery
    pub savegameslot: u8,
    pub savedescription: String,
    /// Path latched for a deferred LoadGame action.
    pub savename: Option<String>,
    pub forced_loadgame: bool,
    pub command_loadgame: bool,

    // Special-button latches set by the menu/bindings layer
    pub sendpause: bool,
    pub sendsave: bool,

    /// IDMUS music override (-1 = none); archived in saves.
    pub idmusnum: i8,
    /// Current MUSINFO lump name, or empty.
    pub music_lump: String,

    // Rewind keyframes
    pub rewind: Rewind,

    /// Base directory for saves and autosaves.
    pub base_path: String,
    /// Latched for the platform layer; cleared once taken.
    pub screenshot_requested: bool,

    // Per-tic output queues
    pub sounds: Vec<SoundEvent>,

    /// Set by a fatal simulation abort; the driver surfaces it and
    /// exits.
    pub fatal: Option<String>,

    /// `-levelstat`: append per-level statistics on completion.
    pub levelstat: Option<String>,
    pub levelstat_lines: Vec<String>,
}

impl Game {
    /// Build a fresh game around a resolved behavior vector.
    pub fn new(behavior: Behavior, mode: GameMode, wad: WadDirectory, maps: MapSet) -> Game {
        let mut rng = Rng::new();
        rng.clear(behavior.rngseed, behavior.level);
        rng.set_insurance(behavior.demo_insurance);
        Game {
            behavior,
            mode,
            rng,
            players: Default::default(),
            playeringame: [false; MAXPLAYERS],
            consoleplayer: 0,
            displayplayer: 0,
            gametic: 0,
            basetic: 0,
            leveltime: 0,
            levelstarttic: 0,
            totalleveltimes: 0,
            oldleveltime: 0,
            gameskill: Skill::Medium,
            gameepisode: 1,
            gamemap: 1,
            secretexit: false,
            gamestate: GameState::DemoScreen,
            gameaction: GameAction::Nothing,
            d_skill: Skill::Medium,
            d_episode: 1,
            d_map: 1,
            paused: 0,
            menuactive: false,
            quit_requested: false,
            usergame: false,
            netgame: false,
            netdemo: false,
            deathmatch: false,
            ticdup: 1,
            consistency: [[0; BACKUPTICS]; MAXPLAYERS],
            level: None,
            maps,
            wad,
            wminfo: WorldStats::default(),
            intermission: None,
            finale: None,
            titlepage: TitlePage::default(),
            demo_playback: None,
            demo_recorder: None,
            singledemo: false,
            timingdemo: false,
            fastdemo: false,
            defdemoname: None,
            savegameslot: 0,
            savedescription: String::new(),
            savename: None,
            forced_loadgame: false,
            command_loadgame: false,
            sendpause: false,
            sendsave: false,
            idmusnum: -1,
            music_lump: String::new(),
            rewind: Rewind::default(),
            base_path: ".".to_string(),
            screenshot_requested: false,
            sounds: Vec::new(),
            fatal: None,
            levelstat: None,
            levelstat_lines: Vec::new(),
        }
    }

    /// Queue a sound; flushed to the audio layer at tic end.
    pub fn start_sound(&mut self, sfx: u16, origin: Option<ThinkerId>) {
        self.sounds.push(SoundEvent {
            sfx,
            origin,
            volume: 127,
            separation: 128,
            priority: 64,
            pitch: 128,
        });
    }

    /// Drain the tic's sound queue (the audio flush point).
    pub fn take_sounds(&mut self) -> Vec<SoundEvent> {
        std::mem::take(&mut self.sounds)
    }

    /// Record a fatal simulation abort. The tic loop stops and the
    /// driver unwinds.
    pub fn fatal_error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::error!("{}", msg);
        if self.fatal.is_none() {
            self.fatal = Some(msg);
        }
    }

    /// True while demo playback is substituting for the net layer.
    #[inline]
    pub fn demoplayback(&self) -> bool {
        self.demo_playback.is_some()
    }

    /// True while a demo is being recorded.
    #[inline]
    pub fn demorecording(&self) -> bool {
        self.demo_recorder.is_some()
    }

    /// Request a level exit at the next dispatch.
    pub fn exit_level(&mut self) {
        self.secretexit = false;
        self.gameaction = GameAction::Completed;
    }

    /// Request a secret exit. If the commercial package was stripped
    /// of its secret levels, the exit behaves as a normal one.
    pub fn secret_exit_level(&mut self) {
        self.secretexit = self.mode != GameMode::Commercial || self.wad.has_wolf_levels();
        self.gameaction = GameAction::Completed;
    }

    /// Schedule a save from the menu layer (slot + 24-char text).
    pub fn save_game(&mut self, slot: u8, description: &str) {
        self.savegameslot = slot;
        self.savedescription = description.to_string();
        self.sendsave = true;
    }

    /// Schedule a load.
    pub fn load_game(&mut self, name: String, slot: u8, command_line: bool) {
        self.savename = Some(name);
        self.savegameslot = slot;
        self.gameaction = GameAction::LoadGame;
        self.forced_loadgame = false;
        self.command_loadgame = command_line;
    }

    /// Retry a load, overriding the version/signature checks.
    pub fn forced_load_game(&mut self) {
        self.gameaction = GameAction::LoadGame;
        self.forced_loadgame = true;
    }

    /// Schedule demo playback.
    pub fn defered_play_demo(&mut self, name: impl Into<String>) {
        self.defdemoname = Some(name.into());
        self.gameaction = GameAction::PlayDemo;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compat::{resolver, CompatLevel, UserDefaults};

    pub(crate) fn test_game(level: CompatLevel) -> Game {
        let mut defaults = UserDefaults::default();
        defaults.complevel = level;
        let behavior = resolver::resolve(
            &defaults,
            None,
            &resolver::Overrides::default(),
            1993,
            false,
        );
        Game::new(
            behavior,
            GameMode::Commercial,
            WadDirectory::default(),
            MapSet::arena_only(),
        )
    }

    #[test]
    fn test_new_game_is_quiescent() {
        let g = test_game(CompatLevel::Mbf);
        assert_eq!(g.gameaction, GameAction::Nothing);
        assert_eq!(g.gamestate, GameState::DemoScreen);
        assert_eq!(g.gametic, 0);
        assert!(g.level.is_none());
        assert!(!g.demoplayback() && !g.demorecording());
    }

    #[test]
    fn test_secret_exit_gating() {
        // Retail packages always take their secret exit.
        let mut g = test_game(CompatLevel::Mbf);
        g.mode = GameMode::Retail;
        g.secret_exit_level();
        assert!(g.secretexit);
        assert_eq!(g.gameaction, GameAction::Completed);

        // A commercial package without its secret levels downgrades
        // the secret exit to a normal one.
        let mut g = test_game(CompatLevel::Mbf);
        assert!(!g.wad.has_wolf_levels());
        g.secret_exit_level();
        assert!(!g.secretexit);
    }

    #[test]
    fn test_sound_queue_drain() {
        let mut g = test_game(CompatLevel::Boom);
        g.start_sound(sfx::PISTOL, None);
        g.start_sound(sfx::SCREAM, None);
        let sounds = g.take_sounds();
        assert_eq!(sounds.len(), 2);
        assert!(g.take_sounds().is_empty());
    }
}
