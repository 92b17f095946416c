//! Local Ticcmd Construction
//!
//! Turns the platform layer's edge-triggered bindings, held-key bits,
//! mouse deltas and gamepad axes into one [`TicCmd`] per local tic.
//! Everything here happens *before* the cmd enters the deterministic
//! pipeline, so tuning values (sensitivity, acceleration) never touch
//! sync - only the resulting cmd bytes do.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::ticcmd::{buttons, TicCmd};
use super::weapons::{self, WeaponPrefs, WeaponType};
use super::Game;
use crate::core::fixed::{fixed_mul, Fixed, FRACUNIT};
use crate::BACKUPTICS;

/// Movement speeds: walk and run, in ticcmd units.
pub const FORWARDMOVE: [i32; 2] = [0x19, 0x32];
/// Strafe speeds: walk and run.
pub const SIDEMOVE: [i32; 2] = [0x18, 0x28];
/// Turn speeds: normal, fast, and the slow first stage.
pub const ANGLETURN: [i32; 3] = [640, 1280, 320];

/// The largest move a cmd may carry; anything above is a turbo cheat.
pub const MAXPLMOVE: i32 = FORWARDMOVE[1];
/// Tics of key-turn before full turn speed kicks in.
pub const SLOWTURNTICS: u32 = 6;
/// One-keystroke 180 degree turn.
pub const QUICKREVERSE: i16 = i16::MIN; // 0x8000

/// Held game actions, fed by the platform layer's key/button state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum GameKey {
    Forward = 0,
    Backward,
    TurnLeft,
    TurnRight,
    StrafeLeft,
    StrafeRight,
    Strafe,
    Speed,
    Fire,
    Use,
    Reverse,
    WeaponToggle,
    Weapon1,
    Weapon2,
    Weapon3,
    Weapon4,
    Weapon5,
    Weapon6,
    Weapon7,
    Weapon8,
    Weapon9,
    DemoQuit,
    JoinDemo,
}

/// Number of game keys tracked.
pub const NUM_GAME_KEYS: usize = GameKey::JoinDemo as usize + 1;

/// Gamepad axes consumed by cmd construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Axis {
    Forward = 0,
    Strafe,
    Turn,
}

/// User tuning for cmd construction; persisted in the config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub autorun: bool,
    /// Classic fist/chainsaw and shotgun/SSG slot toggles.
    pub doom_weapon_toggles: bool,
    pub analog_movement: bool,
    pub analog_turning: bool,
    /// Right-stick turn sensitivity, tenths.
    pub axis_turn_sens: i32,
    pub weapon_prefs: WeaponPrefs,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            autorun: true,
            doom_weapon_toggles: true,
            analog_movement: false,
            analog_turning: false,
            axis_turn_sens: 10,
            weapon_prefs: WeaponPrefs::default(),
        }
    }
}

/// All local input state between platform events and the cmd.
#[derive(Clone, Debug)]
pub struct InputState {
    pub config: InputConfig,
    keys: [bool; NUM_GAME_KEYS],
    /// Gamepad axes in fixed point, -FRACUNIT..FRACUNIT.
    pub axes: [Fixed; 3],
    pub mousex: i32,
    pub mousey: i32,
    /// Double-click acts as Use.
    pub dclick: bool,
    /// Pending next(+1)/prev(-1) weapon request.
    pub next_weapon: i32,
    /// Queued chat characters.
    chat_queue: VecDeque<u8>,
    /// Two-stage turn acceleration counter.
    turnheld: u32,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(InputConfig::default())
    }
}

impl InputState {
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            keys: [false; NUM_GAME_KEYS],
            axes: [0; 3],
            mousex: 0,
            mousey: 0,
            dclick: false,
            next_weapon: 0,
            chat_queue: VecDeque::new(),
            turnheld: 0,
        }
    }

    /// Platform layer reports a key/button edge.
    pub fn set_key(&mut self, key: GameKey, down: bool) {
        self.keys[key as usize] = down;
    }

    #[inline]
    pub fn key(&self, key: GameKey) -> bool {
        self.keys[key as usize]
    }

    /// Queue a chat character for transmission.
    pub fn queue_chat_char(&mut self, c: u8) {
        self.chat_queue.push_back(c & 0x3f);
    }

    fn dequeue_chat_char(&mut self) -> u8 {
        self.chat_queue.pop_front().unwrap_or(0)
    }

    /// Build the local player's cmd for tic `maketic`.
    ///
    /// Mirrors the classic construction order exactly: consistency
    /// word first, then turning, movement, buttons, weapon policy,
    /// mouse, clamping, and finally special-button overrides.
    pub fn build_ticcmd(&mut self, game: &mut Game, maketic: u32) -> TicCmd {
        let mut cmd = TicCmd {
            consistency: game.consistency[game.consoleplayer][maketic as usize % BACKUPTICS],
            ..Default::default()
        };

        let strafe = self.key(GameKey::Strafe);
        // Speed key inverts autorun.
        let speed = (self.config.autorun ^ self.key(GameKey::Speed)) as usize;

        let mut forward: i32 = 0;
        let mut side: i32 = 0;

        // Two-stage accelerative turning on keyboard and gamepad.
        if self.key(GameKey::TurnLeft) || self.key(GameKey::TurnRight) {
            self.turnheld += game.ticdup;
        } else {
            self.turnheld = 0;
        }
        let tspeed = if self.turnheld < SLOWTURNTICS { 2 } else { speed };

        // Turn 180 degrees in one keystroke.
        if self.key(GameKey::Reverse) {
            cmd.angleturn = cmd.angleturn.wrapping_add(QUICKREVERSE);
            self.set_key(GameKey::Reverse, false);
        }

        // Let movement keys cancel each other out.
        if strafe {
            if self.key(GameKey::TurnRight) {
                side += SIDEMOVE[speed];
            }
            if self.key(GameKey::TurnLeft) {
                side -= SIDEMOVE[speed];
            }
        } else {
            if self.key(GameKey::TurnRight) {
                cmd.angleturn = cmd.angleturn.wrapping_sub(ANGLETURN[tspeed] as i16);
            }
            if self.key(GameKey::TurnLeft) {
                cmd.angleturn = cmd.angleturn.wrapping_add(ANGLETURN[tspeed] as i16);
            }
        }

        if self.key(GameKey::Forward) {
            forward += FORWARDMOVE[speed];
        }
        if self.key(GameKey::Backward) {
            forward -= FORWARDMOVE[speed];
        }
        if self.key(GameKey::StrafeRight) {
            side += SIDEMOVE[speed];
        }
        if self.key(GameKey::StrafeLeft) {
            side -= SIDEMOVE[speed];
        }

        if self.config.analog_movement && self.axes[Axis::Forward as usize] != 0 {
            forward -= fixed_mul(FORWARDMOVE[speed], self.axes[Axis::Forward as usize] * 2);
        }
        if self.config.analog_movement && self.axes[Axis::Strafe as usize] != 0 {
            side += fixed_mul(SIDEMOVE[speed], self.axes[Axis::Strafe as usize] * 2);
        }

        if self.config.analog_turning && self.axes[Axis::Turn as usize] != 0 {
            let mut x = self.axes[Axis::Turn as usize] * 2;

            // Cubic response curve to compensate for lack of
            // near-centered accuracy.
            x = fixed_mul(fixed_mul(x, x), x);

            x = self.config.axis_turn_sens * (x / 10);
            cmd.angleturn = cmd
                .angleturn
                .wrapping_sub(fixed_mul(ANGLETURN[speed], x) as i16);
        }

        // Buttons
        cmd.chatchar = self.dequeue_chat_char();

        if self.key(GameKey::Fire) {
            cmd.buttons |= buttons::BT_ATTACK;
        }
        if self.key(GameKey::Use) {
            cmd.buttons |= buttons::BT_USE;
            // Clear double clicks if hit use button.
            self.dclick = false;
        }
        if self.key(GameKey::JoinDemo) {
            cmd.buttons |= buttons::BT_SPECIAL | buttons::BTS_JOIN;
            self.set_key(GameKey::JoinDemo, false);
        }

        // Weapon policy: the switch happens here rather than in the
        // player think so netgames and demos agree. Old demos keep the
        // switch sim-side.
        let newweapon = self.select_weapon(game);
        if let Some(w) = newweapon {
            cmd.buttons |= buttons::BT_CHANGE;
            cmd.buttons |= (w as u8) << buttons::BT_WEAPONSHIFT;
        }
        self.next_weapon = 0;

        // Double click acts as "use".
        if self.dclick {
            self.dclick = false;
            cmd.buttons |= buttons::BT_USE;
        }

        forward += self.mousey;
        if strafe {
            side += self.mousex * 2;
        } else {
            cmd.angleturn = cmd.angleturn.wrapping_sub((self.mousex * 0x8) as i16);
        }
        self.mousex = 0;
        self.mousey = 0;

        cmd.forwardmove = forward.clamp(-MAXPLMOVE, MAXPLMOVE) as i8;
        cmd.sidemove = side.clamp(-MAXPLMOVE, MAXPLMOVE) as i8;

        // Special buttons: single-frame requests that override the
        // whole buttons byte.
        if game.sendpause {
            game.sendpause = false;
            cmd.buttons = buttons::BT_SPECIAL | buttons::BTS_PAUSE;
        }

        // Suppress savegame requests while a demo is playing back;
        // the playback user saves through the dispatcher instead.
        if game.sendsave && !game.demoplayback() {
            game.sendsave = false;
            cmd.buttons = buttons::BT_SPECIAL
                | buttons::BTS_SAVEGAME
                | (game.savegameslot << buttons::BTS_SAVESHIFT);
        }

        cmd
    }

    /// The weapon-selection policy.
    fn select_weapon(&mut self, game: &Game) -> Option<WeaponType> {
        let player = &game.players[game.consoleplayer];
        let mode = game.mode;

        // Automatic switch when the ready weapon runs dry, done here
        // (not in the player think) outside demo compatibility.
        if (!game.behavior.demo_compatibility()
            && player.attackdown
            && !weapons::check_ammo(player))
            || self.key(GameKey::WeaponToggle)
        {
            return Some(weapons::switch_weapon(
                player,
                mode,
                &self.config.weapon_prefs,
            ));
        }

        if self.next_weapon != 0 {
            return Some(weapons::next_weapon(player, self.next_weapon, mode));
        }

        let slot_keys = [
            (GameKey::Weapon1, WeaponType::Fist),
            (GameKey::Weapon2, WeaponType::Pistol),
            (GameKey::Weapon3, WeaponType::Shotgun),
            (GameKey::Weapon4, WeaponType::Chaingun),
            (GameKey::Weapon5, WeaponType::Missile),
            (GameKey::Weapon6, WeaponType::Plasma),
            (GameKey::Weapon7, WeaponType::Bfg),
            (GameKey::Weapon8, WeaponType::Chainsaw),
            (GameKey::Weapon9, WeaponType::SuperShotgun),
        ];
        let requested = slot_keys.iter().find_map(|&(key, weapon)| {
            if self.key(key) && weapon.exists_in(mode) {
                Some(weapon)
            } else {
                None
            }
        })?;

        // Old demos resolve the toggles sim-side instead.
        let toggles = !game.behavior.demo_compatibility() && self.config.doom_weapon_toggles;
        Some(weapons::resolve_slot_request(
            player,
            requested,
            mode,
            &self.config.weapon_prefs,
            toggles,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::CompatLevel;
    use crate::game::tests::test_game;

    fn setup() -> (InputState, Game) {
        let mut game = test_game(CompatLevel::Mbf);
        game.playeringame[0] = true;
        game.players[0].reborn();
        (InputState::default(), game)
    }

    #[test]
    fn test_forward_clamped_to_maxplmove() {
        let (mut input, mut game) = setup();
        input.set_key(GameKey::Forward, true);
        input.mousey = 1000;
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_eq!(cmd.forwardmove as i32, MAXPLMOVE);

        // Exactly MAXPLMOVE is accepted unchanged.
        let mut input = InputState::default();
        input.mousey = MAXPLMOVE;
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_eq!(cmd.forwardmove as i32, MAXPLMOVE);
    }

    #[test]
    fn test_two_stage_turn_acceleration() {
        let (mut input, mut game) = setup();
        input.set_key(GameKey::TurnLeft, true);

        // First tics turn at the slow rate.
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_eq!(cmd.angleturn as i32, ANGLETURN[2]);

        // After SLOWTURNTICS held tics, full speed (autorun on).
        for t in 1..SLOWTURNTICS as u32 {
            input.build_ticcmd(&mut game, t);
        }
        let cmd = input.build_ticcmd(&mut game, SLOWTURNTICS);
        assert_eq!(cmd.angleturn as i32, ANGLETURN[1]);
    }

    #[test]
    fn test_quickreverse_is_180() {
        let (mut input, mut game) = setup();
        input.set_key(GameKey::Reverse, true);
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_eq!(cmd.angleturn as u16, 0x8000);
        // Edge-triggered: consumed on build.
        let cmd = input.build_ticcmd(&mut game, 1);
        assert_eq!(cmd.angleturn, 0);
    }

    #[test]
    fn test_strafe_reroutes_turn_keys() {
        let (mut input, mut game) = setup();
        input.set_key(GameKey::Strafe, true);
        input.set_key(GameKey::TurnRight, true);
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_eq!(cmd.angleturn, 0);
        assert_eq!(cmd.sidemove as i32, SIDEMOVE[1]);
    }

    #[test]
    fn test_cubic_gamepad_curve_center_precision() {
        let (mut input, mut game) = setup();
        input.config.analog_turning = true;

        // Small deflection: the cubic curve crushes it toward zero.
        input.axes[Axis::Turn as usize] = FRACUNIT / 8;
        let small = input.build_ticcmd(&mut game, 0).angleturn.unsigned_abs();

        input.axes[Axis::Turn as usize] = FRACUNIT / 2;
        let large = input.build_ticcmd(&mut game, 1).angleturn.unsigned_abs();

        assert!(small * 8 < large, "small {} large {}", small, large);
    }

    #[test]
    fn test_pause_override_wins_buttons() {
        let (mut input, mut game) = setup();
        input.set_key(GameKey::Fire, true);
        game.sendpause = true;
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_eq!(cmd.buttons, buttons::BT_SPECIAL | buttons::BTS_PAUSE);
        assert!(!game.sendpause);
    }

    #[test]
    fn test_save_suppressed_during_playback() {
        let (mut input, mut game) = setup();
        game.demo_playback = Some(crate::demo::playback::DemoPlayback::from_tic_bytes(
            Vec::new(),
            false,
        ));
        game.sendsave = true;
        game.savegameslot = 3;
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_eq!(cmd.buttons & buttons::BT_SPECIAL, 0);
        // The latch stays set for the dispatcher path.
        assert!(game.sendsave);

        game.demo_playback = None;
        let cmd = input.build_ticcmd(&mut game, 1);
        assert!(cmd.is_special());
        assert_eq!(cmd.save_slot(), 3);
    }

    #[test]
    fn test_weapon_slot_key_emits_change() {
        let (mut input, mut game) = setup();
        input.set_key(GameKey::Weapon2, true);
        let cmd = input.build_ticcmd(&mut game, 0);
        assert_ne!(cmd.buttons & buttons::BT_CHANGE, 0);
        assert_eq!(cmd.weapon_index(), WeaponType::Pistol as u8);
    }

    #[test]
    fn test_chat_chars_drain_one_per_tic() {
        let (mut input, mut game) = setup();
        input.queue_chat_char(b'h');
        input.queue_chat_char(b'i');
        assert_eq!(input.build_ticcmd(&mut game, 0).chatchar, b'h' & 0x3f);
        assert_eq!(input.build_ticcmd(&mut game, 1).chatchar, b'i' & 0x3f);
        assert_eq!(input.build_ticcmd(&mut game, 2).chatchar, 0);
    }
}
