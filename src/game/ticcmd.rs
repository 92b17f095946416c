//! The Per-Player Per-Tic Input Record
//!
//! A `TicCmd` is the only way user intent reaches the simulation. It
//! is built locally once per tic, exchanged with peers, recorded into
//! demos, and consumed exactly once per live player per tic.

use serde::{Deserialize, Serialize};

/// Buttons bitfield: ordinary actions.
pub mod buttons {
    /// Press fire.
    pub const BT_ATTACK: u8 = 1;
    /// Use a switch or door.
    pub const BT_USE: u8 = 2;
    /// Weapon change requested; new weapon in the mask bits.
    pub const BT_CHANGE: u8 = 4;
    /// Weapon index field (four bits: nine slots).
    pub const BT_WEAPONMASK: u8 = 8 + 16 + 32 + 64;
    /// Shift for the weapon index field.
    pub const BT_WEAPONSHIFT: u8 = 3;
    /// The buttons byte carries a special request instead.
    pub const BT_SPECIAL: u8 = 128;

    /// Special: toggle pause.
    pub const BTS_PAUSE: u8 = 1;
    /// Special: save the game; slot in the mask bits.
    pub const BTS_SAVEGAME: u8 = 2;
    /// Savegame slot field.
    pub const BTS_SAVEMASK: u8 = 4 + 8 + 16;
    /// Shift for the savegame slot field.
    pub const BTS_SAVESHIFT: u8 = 2;
    /// Special: request to join a running net demo as a player.
    pub const BTS_JOIN: u8 = 32;
}

/// One player's input for one tic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicCmd {
    /// Forward/backward run, clamped to `MAXPLMOVE`.
    pub forwardmove: i8,
    /// Strafe, clamped to `MAXPLMOVE`.
    pub sidemove: i8,
    /// Turn delta. Demos store either the high byte (short tics) or
    /// the full 16 bits (longtics); the simulation always sees 16.
    pub angleturn: i16,
    /// Consistency word: the low word of this player's own mobj x
    /// position as predicted when the cmd was built.
    pub consistency: i16,
    /// Queued chat character (6-bit printable), 0 for none.
    pub chatchar: u8,
    /// Buttons bitfield; see [`buttons`].
    pub buttons: u8,
}

impl TicCmd {
    /// The cmd carries a special request (pause / save / ...).
    #[inline]
    pub fn is_special(&self) -> bool {
        self.buttons & buttons::BT_SPECIAL != 0
    }

    /// Weapon index from the change field.
    #[inline]
    pub fn weapon_index(&self) -> u8 {
        (self.buttons & buttons::BT_WEAPONMASK) >> buttons::BT_WEAPONSHIFT
    }

    /// Savegame slot from a special save request.
    #[inline]
    pub fn save_slot(&self) -> u8 {
        (self.buttons & buttons::BTS_SAVEMASK) >> buttons::BTS_SAVESHIFT
    }
}

#[cfg(test)]
mod tests {
    use super::buttons::*;
    use super::*;

    #[test]
    fn test_weapon_field_roundtrip() {
        for w in 0..7 {
            let cmd = TicCmd {
                buttons: BT_CHANGE | (w << BT_WEAPONSHIFT),
                ..Default::default()
            };
            assert_eq!(cmd.weapon_index(), w);
            assert!(!cmd.is_special());
        }
    }

    #[test]
    fn test_save_slot_roundtrip() {
        for slot in 0..7 {
            let cmd = TicCmd {
                buttons: BT_SPECIAL | BTS_SAVEGAME | (slot << BTS_SAVESHIFT),
                ..Default::default()
            };
            assert!(cmd.is_special());
            assert_eq!(cmd.save_slot(), slot);
        }
    }

    #[test]
    fn test_field_masks_disjoint() {
        assert_eq!(BT_ATTACK & BT_USE, 0);
        assert_eq!(BT_WEAPONMASK & (BT_ATTACK | BT_USE | BT_CHANGE), 0);
        assert_eq!(BT_WEAPONMASK & BT_SPECIAL, 0);
        assert_eq!(BTS_SAVEMASK & (BTS_PAUSE | BTS_SAVEGAME | BTS_JOIN), 0);
    }
}
