//! Player State
//!
//! Everything the simulation tracks per player slot: vitals, arsenal,
//! power timers, tallies, and the reborn/finish-level lifecycles that
//! decide which of those survive a death or a level change.

use serde::{Deserialize, Serialize};

use super::thinker::ThinkerId;
use super::ticcmd::TicCmd;
use super::weapons::{WeaponType, MAX_AMMO, NUM_AMMO, NUM_WEAPONS};
use crate::MAXPLAYERS;

/// Health a fresh player spawns with.
pub const INITIAL_HEALTH: i32 = 100;
/// Bullets a fresh player spawns with.
pub const INITIAL_BULLETS: i32 = 50;

/// Power-up timer slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(usize)]
pub enum Power {
    Invulnerability = 0,
    /// Berserk.
    Strength = 1,
    Invisibility = 2,
    IronFeet = 3,
    Allmap = 4,
    Infrared = 5,
}

/// Number of power-up timer slots.
pub const NUM_POWERS: usize = 6;

/// Number of key-card slots.
pub const NUM_CARDS: usize = 6;

/// Lifecycle state of a player slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    /// Playing or camping.
    #[default]
    Live,
    /// Dead on the ground, view follows killer.
    Dead,
    /// Ready to respawn and restart the level.
    Reborn,
}

/// Cheat flag bits; preserved across reborns within a level.
pub mod cheats {
    /// No clipping.
    pub const NOCLIP: u32 = 1;
    /// God mode.
    pub const GODMODE: u32 = 2;
    /// No momentum.
    pub const NOMOMENTUM: u32 = 4;
}

/// One player slot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Player {
    /// The mobj carrying this player, by stable id. Weak: revalidate
    /// through the arena on every dereference.
    pub mobj: Option<ThinkerId>,
    pub playerstate: PlayerState,
    /// The cmd being applied this tic.
    pub cmd: TicCmd,

    pub health: i32,
    pub armorpoints: i32,
    /// 0 = none, 1 = green, 2 = blue.
    pub armortype: i32,

    /// Power-up tics remaining, indexed by [`Power`].
    pub powers: [i32; NUM_POWERS],
    pub cards: [bool; NUM_CARDS],
    pub backpack: bool,

    /// Frag counts against each opponent slot.
    pub frags: [i32; MAXPLAYERS],
    pub readyweapon: WeaponType,
    /// Weapon being raised, equal to `readyweapon` when no change is
    /// pending.
    pub pendingweapon: WeaponType,
    pub weaponowned: [bool; NUM_WEAPONS],
    pub ammo: [i32; NUM_AMMO],
    pub maxammo: [i32; NUM_AMMO],

    /// True while fire is held; used for autoswitch edge detection.
    pub attackdown: bool,
    pub usedown: bool,

    /// Cheat flag bits; see [`cheats`].
    pub cheats: u32,
    /// Power-up refire tics.
    pub refire: i32,

    pub killcount: i32,
    pub itemcount: i32,
    pub secretcount: i32,

    /// HUD flash tics.
    pub damagecount: i32,
    pub bonuscount: i32,

    /// Messages queued for the HUD; drained by the status layer.
    pub messages: Vec<String>,
    /// Recenter the view next frame (set on teleport).
    pub centering: bool,
    pub didsecret: bool,
}

impl Player {
    /// Push a HUD message.
    pub fn message(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }

    /// Reset for a respawn within the same level.
    ///
    /// Almost everything is cleared; cheats, frags and the tally
    /// counters survive so an in-level death doesn't erase progress.
    pub fn reborn(&mut self) {
        let cheats = self.cheats;
        let frags = self.frags;
        let killcount = self.killcount;
        let itemcount = self.itemcount;
        let secretcount = self.secretcount;
        let didsecret = self.didsecret;

        *self = Player::default();

        self.cheats = cheats;
        self.frags = frags;
        self.killcount = killcount;
        self.itemcount = itemcount;
        self.secretcount = secretcount;
        self.didsecret = didsecret;

        // Don't do anything immediately
        self.usedown = true;
        self.attackdown = true;

        self.playerstate = PlayerState::Live;
        self.health = INITIAL_HEALTH;
        self.readyweapon = WeaponType::Pistol;
        self.pendingweapon = WeaponType::Pistol;
        self.weaponowned[WeaponType::Fist as usize] = true;
        self.weaponowned[WeaponType::Pistol as usize] = true;
        self.ammo[0] = INITIAL_BULLETS;
        self.maxammo = MAX_AMMO;
    }

    /// Called when this player completes a level: take away cards and
    /// powers, cancel view effects.
    pub fn finish_level(&mut self) {
        self.powers = [0; NUM_POWERS];
        self.cards = [false; NUM_CARDS];
        self.damagecount = 0;
        self.bonuscount = 0;
        self.centering = false;
    }
}
