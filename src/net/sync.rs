//! Tic Synchronization
//!
//! Owns the ticcmd backlog, decides how many tics may run, and drives
//! the game ticker. Two sync modes coexist:
//!
//! - **classic**: tics are built as fast as the real clock allows;
//!   peers drop or duplicate tics to catch up using a four-slot
//!   frameskip history;
//! - **new**: built tics are throttled by a time offset supplied by
//!   the transport, with a hard cap on how far ahead the local peer
//!   may run.
//!
//! `ticdup` reduces the input sample rate: one built cmd is run for
//! `ticdup` consecutive tics, with chat and special buttons squashed
//! on the replicas so a Save or Pause is not applied repeatedly.

use tracing::debug;

use super::protocol::GameSettings;
use crate::game::ticcmd::{buttons, TicCmd};
use crate::game::{Game, InputState, TicCmdSet};
use crate::{BACKUPTICS, MAXPLAYERS};

/// Maximum time that we wait in `try_run_tics` for netgame data
/// before giving the menu a chance to work, in real tics.
pub const MAX_NETGAME_STALL_TICS: u32 = 5;

/// The platform clock as the sync layer sees it. Supplied by the
/// driver; tests use a scripted fake.
pub trait GameClock {
    /// Real time in tics since startup.
    fn time(&self) -> u32;
    /// Real time in milliseconds.
    fn time_ms(&self) -> u64;
    /// Yield briefly while waiting for the net.
    fn sleep_ms(&self, ms: u64);
}

/// What the transport delivers into the sync layer.
#[derive(Debug, Clone)]
pub enum NetEvent {
    /// The merged cmds for one tic.
    CmdSet {
        tic: u32,
        cmds: Vec<TicCmd>,
        ingame: Vec<bool>,
    },
    /// Clock adjustment hint (new-sync throttling), in ms.
    Offset(i32),
    /// A peer left.
    PlayerLeft(u8),
}

/// The transport boundary. The sync layer pushes local cmds out and
/// pulls merged sets in; everything else about the wire is opaque.
pub trait CmdTransport {
    fn send_cmd(&mut self, tic: u32, cmd: &TicCmd);
    fn poll(&mut self) -> Vec<NetEvent>;
}

/// Reborrow helper: `Option::as_deref_mut` on a `dyn Trait` reference
/// unifies its lifetime across every call site when used repeatedly in
/// a loop (the trait object is invariant), which the borrow checker
/// can't shorten on its own. Going through a function boundary with an
/// explicit lifetime gives each call its own short-lived reborrow.
fn reborrow_transport<'a>(
    transport: &'a mut Option<&mut dyn CmdTransport>,
) -> Option<&'a mut dyn CmdTransport> {
    match transport {
        Some(t) => Some(&mut **t),
        None => None,
    }
}

/// Tic bookkeeping and the run loop.
pub struct NetSync {
    pub ticdup: u32,
    pub new_sync: bool,
    pub drone: bool,
    pub extratics: u32,
    pub localplayer: usize,
    pub net_connected: bool,

    /// Next tic to build locally.
    pub maketic: u32,
    /// Highest complete tic received from the server.
    pub recvtic: u32,

    ticdata: Vec<TicCmdSet>,
    local_playeringame: [bool; MAXPLAYERS],

    // Classic-sync state
    lasttime: i32,
    skiptics: i32,
    frameon: u32,
    frameskip: [bool; 4],
    oldnettics: u32,
    oldentertics: i32,

    /// Clock adjustment from the server (new sync), milliseconds.
    offsetms: i32,
}

impl NetSync {
    pub fn new(settings: &GameSettings, localplayer: usize, drone: bool) -> NetSync {
        NetSync {
            ticdup: settings.ticdup.clamp(1, 12),
            new_sync: settings.new_sync,
            drone,
            extratics: settings.extratics,
            localplayer,
            net_connected: false,
            maketic: 0,
            recvtic: 0,
            ticdata: vec![TicCmdSet::default(); BACKUPTICS],
            local_playeringame: [false; MAXPLAYERS],
            lasttime: 0,
            skiptics: 0,
            frameon: 0,
            frameskip: [false; 4],
            oldnettics: 0,
            oldentertics: 0,
            offsetms: 0,
        }
    }

    /// Single-player bookkeeping: one local slot, no transport.
    pub fn single_player(ticdup: u32) -> NetSync {
        let settings = GameSettings {
            ticdup,
            ..Default::default()
        };
        NetSync::new(&settings, 0, false)
    }

    /// The 35Hz clock, adjusted by the server offset in new-sync mode.
    fn adjusted_time(&self, clock: &dyn GameClock) -> u32 {
        if self.new_sync && self.net_connected {
            let ms = clock.time_ms() as i64 + self.offsetms as i64;
            ((ms.max(0) as u64) * crate::TICRATE as u64 / 1000) as u32
        } else {
            clock.time()
        }
    }

    /// Build one local tic if the throttle allows. Returns false when
    /// tics may not buffer further (or this peer is a drone).
    pub fn build_new_tic(
        &mut self,
        game: &mut Game,
        input: &mut InputState,
        transport: Option<&mut dyn CmdTransport>,
    ) -> bool {
        let gameticdiv = game.gametic / self.ticdup;

        if self.drone {
            // Drones do not generate any ticcmds.
            return false;
        }

        if self.new_sync {
            // If playing single player, do not allow tics to buffer
            // up very far.
            if !self.net_connected && self.maketic.saturating_sub(gameticdiv) > 2 {
                return false;
            }
            // Never go more than ~200ms ahead.
            if self.maketic.saturating_sub(gameticdiv) > 8 {
                return false;
            }
        } else if self.maketic.saturating_sub(gameticdiv) >= 5 {
            return false;
        }

        let cmd = input.build_ticcmd(game, self.maketic);

        if let Some(transport) = transport {
            transport.send_cmd(self.maketic, &cmd);
        }

        let set = &mut self.ticdata[self.maketic as usize % BACKUPTICS];
        set.cmds[self.localplayer] = cmd;
        set.ingame[self.localplayer] = true;

        self.maketic += 1;
        true
    }

    /// Build tics for the elapsed real time and apply everything the
    /// transport delivered.
    pub fn net_update(
        &mut self,
        game: &mut Game,
        input: &mut InputState,
        clock: &dyn GameClock,
        mut transport: Option<&mut dyn CmdTransport>,
    ) {
        // Build new tics as often as the clock says we should.
        let nowtime = (self.adjusted_time(clock) / self.ticdup) as i32;
        let mut newtics = nowtime - self.lasttime;
        self.lasttime = nowtime;

        if self.skiptics > 0 {
            let skipped = newtics.min(self.skiptics);
            newtics -= skipped;
            self.skiptics -= skipped;
        }

        for _ in 0..newtics.max(0) {
            if !self.build_new_tic(game, input, reborrow_transport(&mut transport)) {
                break;
            }
        }

        // Apply everything the wire delivered.
        if let Some(transport) = transport {
            for event in transport.poll() {
                match event {
                    NetEvent::CmdSet { tic, cmds, ingame } => {
                        let set = &mut self.ticdata[tic as usize % BACKUPTICS];
                        for (i, cmd) in cmds.into_iter().enumerate().take(MAXPLAYERS) {
                            if i != self.localplayer || self.drone {
                                set.cmds[i] = cmd;
                            }
                        }
                        for (i, ig) in ingame.into_iter().enumerate().take(MAXPLAYERS) {
                            set.ingame[i] = ig;
                        }
                        if tic >= self.recvtic {
                            self.recvtic = tic + 1;
                        }
                    }
                    NetEvent::Offset(ms) => self.offsetms = ms,
                    NetEvent::PlayerLeft(p) => {
                        self.local_playeringame[p as usize] = false;
                    }
                }
            }
        }
    }

    /// The lowest complete tic we may run up to.
    fn get_low_tic(&self) -> u32 {
        let mut lowtic = self.maketic;
        if self.net_connected && (self.drone || self.recvtic < lowtic) {
            lowtic = self.recvtic;
        }
        lowtic
    }

    /// Classic-mode catchup: ideally maketic runs 1-3 tics above
    /// lowtic; a peer consistently behind accelerates.
    fn old_net_sync(&mut self, game: &Game) {
        self.frameon += 1;

        let keyplayer = (0..MAXPLAYERS).find(|&i| game.playeringame[i]);
        let Some(keyplayer) = keyplayer else {
            return;
        };

        if self.localplayer != keyplayer {
            // The key player does not adapt.
            if self.maketic <= self.recvtic {
                self.lasttime -= 1;
            }
            self.frameskip[(self.frameon & 3) as usize] = self.oldnettics > self.recvtic;
            self.oldnettics = self.maketic;
            if self.frameskip.iter().all(|&s| s) {
                self.skiptics = 1;
            }
        }
    }

    /// Clear all ingame slots except the local player; single-player
    /// and demo-feed mode.
    fn single_player_clear(&self, set: &mut TicCmdSet) {
        for i in 0..MAXPLAYERS {
            if i != self.localplayer {
                set.ingame[i] = false;
            }
        }
    }

    /// Squash the values that must not repeat across `ticdup`
    /// replicas of one built cmd.
    fn ticdup_squash(set: &mut TicCmdSet) {
        for cmd in set.cmds.iter_mut() {
            cmd.chatchar = 0;
            if cmd.buttons & buttons::BT_SPECIAL != 0 {
                cmd.buttons = 0;
            }
        }
    }

    /// Run as many whole tics as the clock and the net allow. This is
    /// the engine's main pump: the driver calls it once per rendered
    /// frame.
    pub fn try_run_tics(
        &mut self,
        game: &mut Game,
        input: &mut InputState,
        clock: &dyn GameClock,
        mut transport: Option<&mut dyn CmdTransport>,
    ) {
        // Get real tics.
        let entertic = (clock.time() / self.ticdup) as i32;
        let realtics = entertic - self.oldentertics;
        self.oldentertics = entertic;

        self.net_update(game, input, clock, reborrow_transport(&mut transport));

        let mut lowtic = self.get_low_tic();
        let availabletics = lowtic.saturating_sub(game.gametic / self.ticdup) as i32;

        // Decide how many tics to run.
        let mut counts = if self.new_sync {
            availabletics
        } else {
            let c = if realtics < availabletics - 1 {
                realtics + 1
            } else if realtics < availabletics {
                realtics
            } else {
                availabletics
            };
            if self.net_connected {
                self.old_net_sync(game);
            }
            c.max(1)
        };
        if counts < 1 {
            counts = 1;
        }

        // Wait for new tics if needed.
        while lowtic < game.gametic / self.ticdup + counts as u32 {
            self.net_update(game, input, clock, reborrow_transport(&mut transport));
            lowtic = self.get_low_tic();

            if lowtic < game.gametic / self.ticdup {
                game.fatal_error("lowtic < gametic");
                return;
            }

            if lowtic < game.gametic / self.ticdup + counts as u32 {
                // Don't stay in here forever - give the menu a chance
                // to work.
                if (clock.time() / self.ticdup) as i32 - entertic
                    >= MAX_NETGAME_STALL_TICS as i32
                {
                    debug!("netgame stall; returning to the frame loop");
                    return;
                }
                clock.sleep_ms(1);
            }
        }

        // Run the counts * ticdup tics.
        while counts > 0 {
            counts -= 1;

            let mut set = self.ticdata[(game.gametic / self.ticdup) as usize % BACKUPTICS];
            if !self.net_connected {
                self.single_player_clear(&mut set);
            }

            for _ in 0..self.ticdup {
                if game.gametic / self.ticdup > lowtic {
                    game.fatal_error("gametic > lowtic");
                    return;
                }

                self.local_playeringame = set.ingame;
                game.ticker(&set);
                game.gametic += 1;
                if game.fatal.is_some() || game.quit_requested {
                    return;
                }

                // Modify command for duplicated tics.
                Self::ticdup_squash(&mut set);
            }

            // Check for new console commands.
            self.net_update(game, input, clock, reborrow_transport(&mut transport));
        }
    }
}
