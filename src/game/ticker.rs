//! The Per-Frame Ticker
//!
//! Runs once per simulation tic: handle reborns, drain the action
//! dispatcher, fetch this tic's cmds (net buffer or demo), verify
//! consistency, dispatch special buttons, step the simulation, and
//! service whichever out-of-level ticker the game state selects.
//! The caller (net sync or the headless driver) advances `gametic`
//! after each call.

use tracing::warn;

use super::player::PlayerState;
use super::screens::ScreenResult;
use super::sim;
use super::ticcmd::{buttons, TicCmd};
use super::{Game, GameAction, GameState};
use crate::{BACKUPTICS, MAXPLAYERS};

/// Forward moves above this are turbo cheats worth warning about.
pub const TURBOTHRESHOLD: i8 = 0x32;

/// The merged cmds for one tic, as the net layer delivers them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TicCmdSet {
    pub cmds: [TicCmd; MAXPLAYERS],
    pub ingame: [bool; MAXPLAYERS],
}

impl Game {
    /// Advance the whole game by one tic using this tic's cmd set.
    pub fn ticker(&mut self, set: &TicCmdSet) {
        // Do player reborns if needed.
        for i in 0..MAXPLAYERS {
            if self.playeringame[i] && self.players[i].playerstate == PlayerState::Reborn {
                self.do_reborn(i);
            }
        }

        self.drain_actions();
        if self.fatal.is_some() {
            return;
        }

        // Allow games to be saved during demo playback, by the
        // playback user (not by the demo itself).
        if self.demoplayback() && self.sendsave {
            self.sendsave = false;
            self.gameaction = GameAction::SaveGame;
            self.drain_actions();
        }

        // Skip command processing while a played-back demo is paused,
        // or while the menu covers a non-net single-player game. The
        // basetic bump keeps the tracer/RNG phase in sync while no
        // tics run.
        if self.paused & 2 != 0 || (!self.demoplayback() && self.menuactive && !self.netgame) {
            self.basetic += 1;
        } else {
            self.consume_cmds(set);
            if self.fatal.is_some() {
                return;
            }
        }

        self.oldleveltime = self.leveltime;
        self.rng
            .set_phase(self.gametic.wrapping_sub(self.basetic));

        // Main actions: the level ticks under pause rules of its own;
        // the others freeze while the demo-pause bit is up.
        match self.gamestate {
            GameState::Level => {
                sim::p_ticker(self);
                self.auto_keyframe();
            }
            _ if self.paused & 2 != 0 => {}
            GameState::Intermission => {
                if let Some(mut wi) = self.intermission.take() {
                    if self.any_button_pressed() {
                        wi.accelerate();
                    }
                    match wi.ticker() {
                        ScreenResult::Done => self.world_done(),
                        ScreenResult::Running => self.intermission = Some(wi),
                    }
                }
            }
            GameState::Finale => {
                if let Some(mut fin) = self.finale.take() {
                    if self.any_button_pressed() {
                        fin.accelerate();
                    }
                    match fin.ticker() {
                        ScreenResult::Done => self.gameaction = GameAction::LoadLevel,
                        ScreenResult::Running => self.finale = Some(fin),
                    }
                }
            }
            GameState::DemoScreen => self.titlepage.ticker(),
        }
    }

    /// Get commands, check consistency, and build new consistency
    /// checks.
    fn consume_cmds(&mut self, set: &TicCmdSet) {
        let buf = (self.gametic / self.ticdup) as usize % BACKUPTICS;

        for i in 0..MAXPLAYERS {
            if !self.playeringame[i] {
                continue;
            }
            let mut cmd = set.cmds[i];

            if self.demoplayback() {
                self.read_demo_ticcmd(&mut cmd);
                if self.fatal.is_some() || !self.demoplayback() {
                    // Stream ended (or aborted) mid-fetch; this tic is
                    // abandoned.
                    return;
                }
            }

            if self.demorecording() {
                cmd = self.write_demo_ticcmd(&cmd);
            }

            // Check for turbo cheats. Only warn in netgames and demos,
            // and stagger the warnings across player indices.
            if (self.netgame || self.demoplayback())
                && cmd.forwardmove > TURBOTHRESHOLD
                && self.gametic & 31 == 0
                && ((self.gametic >> 5) & 3) as usize == i
            {
                let msg = format!("player {} is turbo!", i + 1);
                self.players[self.consoleplayer].message(msg);
            }

            if self.netgame && !self.netdemo && self.gametic % self.ticdup == 0 {
                if self.gametic > BACKUPTICS as u32
                    && self.consistency[i][buf] != cmd.consistency
                {
                    self.fatal_error(format!(
                        "consistency failure ({} should be {})",
                        cmd.consistency, self.consistency[i][buf]
                    ));
                    return;
                }
                self.consistency[i][buf] = self.player_consistency(i);
            }

            self.players[i].cmd = cmd;
        }

        // Check for special buttons.
        for i in 0..MAXPLAYERS {
            if !self.playeringame[i] || !self.players[i].cmd.is_special() {
                continue;
            }
            let cmd = self.players[i].cmd;

            if cmd.buttons & buttons::BTS_PAUSE != 0 {
                self.paused ^= 1;
                // The platform pauses/resumes the sound device off
                // this flag; nothing else to do here.
            }

            if cmd.buttons & buttons::BTS_SAVEGAME != 0 {
                if self.savedescription.is_empty() {
                    self.savedescription = "NET GAME".to_string();
                }
                self.savegameslot = cmd.save_slot();
                self.gameaction = GameAction::SaveGame;
            }

            if cmd.buttons & buttons::BTS_JOIN != 0 && self.demoplayback() {
                // Join-demo: take over from the recording.
                self.demo_playback = None;
                self.usergame = true;
                self.players[self.consoleplayer].message("joined the game.");
            }
        }
    }

    /// The consistency word for a player: low word of its mobj x.
    pub fn player_consistency(&self, pnum: usize) -> i16 {
        self.players[pnum]
            .mobj
            .and_then(|id| self.level.as_ref().and_then(|l| l.thinkers.mobj(id)))
            .map(|m| (m.x & 0xffff) as u16 as i16)
            .unwrap_or(0)
    }

    /// Overwrite a cmd with the next demo record.
    fn read_demo_ticcmd(&mut self, cmd: &mut TicCmd) {
        let Some(playback) = self.demo_playback.as_mut() else {
            return;
        };
        match playback.read_ticcmd() {
            Ok(Some(mut dcmd)) => {
                dcmd.consistency = cmd.consistency;

                // Ignore savegames in demos.
                if dcmd.buttons & buttons::BT_SPECIAL != 0
                    && dcmd.buttons & buttons::BTS_SAVEGAME != 0
                {
                    dcmd.buttons &= !buttons::BTS_SAVEGAME;
                    self.players[self.consoleplayer].message("Game Saved (Suppressed)");
                }

                *cmd = dcmd;
            }
            Ok(None) => {
                // End of demo data stream.
                self.check_demo_status();
            }
            Err(e) => {
                warn!("demo read error: {}", e);
                self.demo_playback = None;
                self.gamestate = GameState::DemoScreen;
            }
        }
    }

    /// Append a cmd to the recording and hand back the re-decoded
    /// bytes the simulation must run on.
    fn write_demo_ticcmd(&mut self, cmd: &TicCmd) -> TicCmd {
        let Some(recorder) = self.demo_recorder.as_mut() else {
            return *cmd;
        };
        recorder.write_ticcmd(cmd)
    }

    /// End of demo playback: restore the pre-demo state and either
    /// quit (single demo runs) or fall back to the title loop.
    pub fn check_demo_status(&mut self) {
        self.demo_playback = None;

        if self.singledemo || self.timingdemo || self.fastdemo {
            self.quit_requested = true;
            return;
        }

        self.netdemo = false;
        self.netgame = false;
        self.deathmatch = false;
        for slot in self.playeringame.iter_mut().skip(1) {
            *slot = false;
        }
        self.gamestate = GameState::DemoScreen;
    }

    /// Finish an active recording: marker, footer, file write.
    pub fn stop_recording(&mut self) {
        let Some(mut recorder) = self.demo_recorder.take() else {
            return;
        };
        let iwad = self.wad.iwad_name().to_string();
        let pwads: Vec<String> = self.wad.pwads().to_vec();
        match recorder.finish(&self.behavior, &iwad, &pwads, &[]) {
            Ok(path) => {
                self.players[self.consoleplayer]
                    .message(format!("Demo recorded: {}", path.display()));
            }
            Err(e) => {
                self.players[self.consoleplayer]
                    .message(format!("could not write demo: {}", e));
            }
        }
    }

    /// Death respawn: multiplayer respawns in place via the reborn
    /// lifecycle, single player reloads the level.
    fn do_reborn(&mut self, pnum: usize) {
        if !self.netgame {
            // Reload the level from scratch.
            self.gameaction = GameAction::ReloadLevel;
            return;
        }

        // Respawn at the player's start spot; the corpse stays as a
        // separate mobj.
        self.players[pnum].reborn();
        let start = self
            .level
            .as_ref()
            .and_then(|l| {
                l.thinkers
                    .mobjs()
                    .find(|(_, m)| m.player == Some(pnum as u8))
                    .map(|(id, _)| id)
            });
        if let (Some(id), Some(level)) = (start, self.level.as_mut()) {
            if let Some(m) = level.thinkers.mobj_mut(id) {
                m.health = super::player::INITIAL_HEALTH;
                m.flags &= !super::mobj::flags::MF_CORPSE;
                m.flags |= super::mobj::flags::MF_SOLID;
            }
            self.players[pnum].mobj = Some(id);
        }
    }

    fn any_button_pressed(&self) -> bool {
        self.players
            .iter()
            .zip(self.playeringame.iter())
            .any(|(p, &ingame)| {
                ingame && p.cmd.buttons & (buttons::BT_ATTACK | buttons::BT_USE) != 0
            })
    }

    fn auto_keyframe(&mut self) {
        if !self.usergame || self.demoplayback() {
            return;
        }
        let Some(level) = self.level.take() else {
            return;
        };
        let disabled_now = self
            .rewind
            .auto_keyframe(&level, &self.rng, self.leveltime, || 0);
        self.level = Some(level);
        if disabled_now {
            self.players[self.consoleplayer].message("Slow key framing: rewind disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::CompatLevel;
    use crate::demo::codec::DemoHeader;
    use crate::demo::{DemoPlayback, DemoRecorder};
    use crate::game::tests::test_game;
    use crate::game::{GameMode, Skill};

    fn level_game() -> Game {
        let mut g = test_game(CompatLevel::Mbf);
        g.mode = GameMode::Commercial;
        g.playeringame[0] = true;
        g.d_episode = 1;
        g.d_map = 1;
        g.gameaction = GameAction::NewGame;
        let set = TicCmdSet::default();
        g.ticker(&set);
        g.gametic += 1;
        g
    }

    fn run_tics(g: &mut Game, set: &TicCmdSet, n: u32) {
        for _ in 0..n {
            g.ticker(set);
            g.gametic += 1;
        }
    }

    #[test]
    fn test_gametic_strictly_increments() {
        let mut g = level_game();
        let t0 = g.gametic;
        run_tics(&mut g, &TicCmdSet::default(), 10);
        assert_eq!(g.gametic, t0 + 10);
        assert_eq!(g.leveltime, 11);
    }

    #[test]
    fn test_pause_special_button_toggles() {
        let mut g = level_game();
        let mut set = TicCmdSet::default();
        set.cmds[0].buttons = buttons::BT_SPECIAL | buttons::BTS_PAUSE;
        g.ticker(&set);
        assert_eq!(g.paused, 1);

        g.ticker(&set);
        assert_eq!(g.paused, 0);
    }

    #[test]
    fn test_save_special_button_queues_action() {
        let dir = std::env::temp_dir().join(format!("stygia-tick-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut g = level_game();
        g.base_path = dir.to_string_lossy().into_owned();

        let mut set = TicCmdSet::default();
        set.cmds[0].buttons =
            buttons::BT_SPECIAL | buttons::BTS_SAVEGAME | (3 << buttons::BTS_SAVESHIFT);
        g.ticker(&set);
        // The save is dispatched on the next drain.
        g.ticker(&TicCmdSet::default());
        assert!(g.players[0].messages.iter().any(|m| m.contains("saved")));
        assert_eq!(g.savegameslot, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_menu_pause_bumps_basetic() {
        let mut g = level_game();
        g.menuactive = true;
        let b0 = g.basetic;
        let l0 = g.leveltime;
        run_tics(&mut g, &TicCmdSet::default(), 5);
        // Cmd consumption skipped, world frozen, phase preserved.
        assert_eq!(g.basetic, b0 + 5);
        assert_eq!(g.leveltime, l0);
    }

    #[test]
    fn test_consistency_failure_aborts() {
        let mut g = level_game();
        g.netgame = true;
        g.gametic = BACKUPTICS as u32 + 10;
        let buf = (g.gametic / g.ticdup) as usize % BACKUPTICS;
        g.consistency[0][buf] = 0x5678;

        let mut set = TicCmdSet::default();
        set.cmds[0].consistency = 0x1234;
        g.ticker(&set);

        let msg = g.fatal.clone().expect("consistency abort");
        assert!(msg.contains("consistency failure"));
        assert!(msg.contains("4660")); // 0x1234
        assert!(msg.contains("22136")); // 0x5678
    }

    #[test]
    fn test_consistency_updates_from_mobj_x() {
        let mut g = level_game();
        g.netgame = true;
        let set = TicCmdSet::default();
        g.ticker(&set);
        let buf = (g.gametic / g.ticdup) as usize % BACKUPTICS;
        assert_eq!(g.consistency[0][buf], g.player_consistency(0));
    }

    #[test]
    fn test_turbo_warning_once_per_window() {
        let mut g = level_game();
        g.netgame = true;
        g.playeringame[1] = true;
        g.players[1].reborn();
        g.gametic = 32; // (32 >> 5) & 3 == 1: player 1's window

        let mut set = TicCmdSet::default();
        set.cmds[1].forwardmove = 0x33;
        g.ticker(&set);
        let count = g.players[0]
            .messages
            .iter()
            .filter(|m| m.contains("is turbo"))
            .count();
        assert_eq!(count, 1);

        // Off the 32-tic boundary: no further warning.
        g.gametic = 33;
        g.ticker(&set);
        let count = g.players[0]
            .messages
            .iter()
            .filter(|m| m.contains("is turbo"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_demo_save_suppressed_with_message() {
        let mut g = level_game();
        // A raw tic stream: one cmd with a save special.
        let mut data = Vec::new();
        crate::demo::codec::encode_ticcmd(
            &mut data,
            &TicCmd {
                buttons: buttons::BT_SPECIAL | buttons::BTS_SAVEGAME,
                ..Default::default()
            },
            false,
        );
        data.push(crate::demo::DEMOMARKER);
        g.demo_playback = Some(DemoPlayback::from_tic_bytes(data, false));

        g.ticker(&TicCmdSet::default());
        assert!(g.players[0]
            .messages
            .iter()
            .any(|m| m == "Game Saved (Suppressed)"));
        // The save action never fired.
        assert_eq!(g.gameaction, GameAction::Nothing);
    }

    #[test]
    fn test_demo_end_returns_to_title() {
        let mut g = level_game();
        g.demo_playback = Some(DemoPlayback::from_tic_bytes(
            vec![crate::demo::DEMOMARKER],
            false,
        ));
        g.ticker(&TicCmdSet::default());
        assert!(!g.demoplayback());
        assert_eq!(g.gamestate, GameState::DemoScreen);

        // A single-demo run quits instead.
        let mut g = level_game();
        g.singledemo = true;
        g.demo_playback = Some(DemoPlayback::from_tic_bytes(
            vec![crate::demo::DEMOMARKER],
            false,
        ));
        g.ticker(&TicCmdSet::default());
        assert!(g.quit_requested);
    }

    #[test]
    fn test_record_path_applies_reread_cmd() {
        let mut g = level_game();
        let header = DemoHeader {
            version: 203,
            level: CompatLevel::Mbf,
            longtics: false,
            skill: Skill::Medium,
            episode: 1,
            map: 1,
            deathmatch: 0,
            consoleplayer: 0,
            playeringame: [true, false, false, false],
            umapinfo_map: None,
        };
        let name = format!(
            "{}/stygia-ticker-rec-{}",
            std::env::temp_dir().display(),
            std::process::id()
        );
        g.demo_recorder = Some(DemoRecorder::begin(
            &name,
            None,
            &g.behavior,
            &header,
            false,
        ));

        let mut set = TicCmdSet::default();
        set.cmds[0].angleturn = 0x1280;
        g.ticker(&set);
        // The applied cmd carries the short-tics rounding.
        assert_eq!(g.players[0].cmd.angleturn, 0x1300);
    }
}
