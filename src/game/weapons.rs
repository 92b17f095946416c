//! Weapon Slots and Selection Policy
//!
//! The nine-slot weapon table, ammo bookkeeping, and the selection
//! rules shared by the input pipeline (explicit slot keys, next/prev
//! cycling) and the simulation (out-of-ammo autoswitch). Selection
//! happens at ticcmd-build time so netgames and demos agree on the
//! result.

use serde::{Deserialize, Serialize};

use super::player::{Player, Power};
use super::GameMode;

/// Weapon slots. Discriminants are the wire encoding used in the
/// ticcmd weapon-change field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeaponType {
    Fist = 0,
    Pistol = 1,
    Shotgun = 2,
    Chaingun = 3,
    Missile = 4,
    Plasma = 5,
    Bfg = 6,
    Chainsaw = 7,
    SuperShotgun = 8,
}

/// Number of weapon slots.
pub const NUM_WEAPONS: usize = 9;

impl Default for WeaponType {
    fn default() -> Self {
        WeaponType::Pistol
    }
}

/// Ammo kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AmmoType {
    Clip = 0,
    Shell = 1,
    Cell = 2,
    Missile = 3,
    /// Fist and chainsaw.
    NoAmmo = 4,
}

/// Number of real ammo kinds (excludes [`AmmoType::NoAmmo`]).
pub const NUM_AMMO: usize = 4;

/// Default clip capacities per ammo kind.
pub const MAX_AMMO: [i32; NUM_AMMO] = [200, 50, 300, 50];

impl WeaponType {
    /// All weapons in slot order.
    pub const ALL: [WeaponType; NUM_WEAPONS] = [
        WeaponType::Fist,
        WeaponType::Pistol,
        WeaponType::Shotgun,
        WeaponType::Chaingun,
        WeaponType::Missile,
        WeaponType::Plasma,
        WeaponType::Bfg,
        WeaponType::Chainsaw,
        WeaponType::SuperShotgun,
    ];

    /// Decode a ticcmd weapon-change field.
    pub fn from_index(index: u8) -> Option<WeaponType> {
        Self::ALL.get(index as usize).copied()
    }

    /// The ammo this weapon consumes.
    pub fn ammo(self) -> AmmoType {
        match self {
            WeaponType::Fist | WeaponType::Chainsaw => AmmoType::NoAmmo,
            WeaponType::Pistol | WeaponType::Chaingun => AmmoType::Clip,
            WeaponType::Shotgun | WeaponType::SuperShotgun => AmmoType::Shell,
            WeaponType::Plasma | WeaponType::Bfg => AmmoType::Cell,
            WeaponType::Missile => AmmoType::Missile,
        }
    }

    /// Minimum ammo needed to fire once.
    pub fn ammo_per_shot(self) -> i32 {
        match self {
            WeaponType::Fist | WeaponType::Chainsaw => 0,
            WeaponType::Pistol | WeaponType::Chaingun | WeaponType::Missile => 1,
            WeaponType::Shotgun => 1,
            WeaponType::SuperShotgun => 2,
            WeaponType::Plasma => 1,
            WeaponType::Bfg => 40,
        }
    }

    /// Whether this weapon exists at all in the given game mode.
    pub fn exists_in(self, mode: GameMode) -> bool {
        match self {
            WeaponType::SuperShotgun => mode == GameMode::Commercial,
            WeaponType::Plasma | WeaponType::Bfg => mode != GameMode::Shareware,
            _ => true,
        }
    }
}

/// Preference order used for autoswitch and the fist/chainsaw and
/// shotgun/SSG toggles. Lower index = more preferred. The default is
/// the classic ordering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeaponPrefs(pub [WeaponType; NUM_WEAPONS]);

impl Default for WeaponPrefs {
    fn default() -> Self {
        WeaponPrefs([
            WeaponType::Plasma,
            WeaponType::SuperShotgun,
            WeaponType::Chaingun,
            WeaponType::Shotgun,
            WeaponType::Pistol,
            WeaponType::Chainsaw,
            WeaponType::Missile,
            WeaponType::Bfg,
            WeaponType::Fist,
        ])
    }
}

impl WeaponPrefs {
    /// True if `a` is preferred over `b`.
    pub fn preferred(&self, a: WeaponType, b: WeaponType) -> bool {
        let rank = |w| self.0.iter().position(|&p| p == w).unwrap_or(NUM_WEAPONS);
        rank(a) < rank(b)
    }
}

/// Enough ammo in hand to fire the ready weapon once.
pub fn check_ammo(player: &Player) -> bool {
    let weapon = player.readyweapon;
    match weapon.ammo() {
        AmmoType::NoAmmo => true,
        ammo => player.ammo[ammo as usize] >= weapon.ammo_per_shot(),
    }
}

/// A weapon the player could switch to right now: owned, fireable,
/// and present in this game mode.
pub fn weapon_selectable(player: &Player, weapon: WeaponType, mode: GameMode) -> bool {
    if !weapon.exists_in(mode) || !player.weaponowned[weapon as usize] {
        return false;
    }
    match weapon.ammo() {
        AmmoType::NoAmmo => true,
        ammo => player.ammo[ammo as usize] >= weapon.ammo_per_shot(),
    }
}

/// Cycle order for next/prev weapon keys: melee first, then the gun
/// ladder, matching what players expect from the scroll wheel.
const WEAPON_CYCLE: [WeaponType; NUM_WEAPONS] = [
    WeaponType::Fist,
    WeaponType::Chainsaw,
    WeaponType::Pistol,
    WeaponType::Shotgun,
    WeaponType::SuperShotgun,
    WeaponType::Chaingun,
    WeaponType::Missile,
    WeaponType::Plasma,
    WeaponType::Bfg,
];

/// Walk the cycle table from the current weapon until a selectable
/// one turns up. `direction` is +1 (next) or -1 (prev).
pub fn next_weapon(player: &Player, direction: i32, mode: GameMode) -> WeaponType {
    // Cycling is based on the pending weapon if a change is already
    // queued, so fast scrolls walk multiple slots.
    let current = if player.pendingweapon != player.readyweapon {
        player.pendingweapon
    } else {
        player.readyweapon
    };

    let start = WEAPON_CYCLE
        .iter()
        .position(|&w| w == current)
        .unwrap_or(0);

    let mut i = start;
    loop {
        i = (i as i32 + direction).rem_euclid(NUM_WEAPONS as i32) as usize;
        if i == start || weapon_selectable(player, WEAPON_CYCLE[i], mode) {
            return WEAPON_CYCLE[i];
        }
    }
}

/// Pick the best replacement when the ready weapon runs dry. Walks
/// the preference order and returns the first fireable weapon,
/// falling back to the fist.
pub fn switch_weapon(player: &Player, mode: GameMode, prefs: &WeaponPrefs) -> WeaponType {
    for &weapon in prefs.0.iter() {
        if weapon != player.readyweapon && weapon_selectable(player, weapon, mode) {
            return weapon;
        }
    }
    WeaponType::Fist
}

/// Resolve an explicit slot-key request into the actual weapon,
/// applying the classic toggles:
///
/// - slot 1 selects the chainsaw over the fist unless berserk is
///   active and the player prefers the fist,
/// - slot 3 selects the SSG over the shotgun when owned and preferred.
pub fn resolve_slot_request(
    player: &Player,
    requested: WeaponType,
    mode: GameMode,
    prefs: &WeaponPrefs,
    weapon_toggles: bool,
) -> WeaponType {
    let mut newweapon = requested;

    if !weapon_toggles {
        return newweapon;
    }

    // Only select chainsaw from '1' if it's owned, it's not already in
    // use, and the player prefers it or has no berserk strength.
    if newweapon == WeaponType::Fist
        && player.weaponowned[WeaponType::Chainsaw as usize]
        && player.readyweapon != WeaponType::Chainsaw
        && (player.readyweapon == WeaponType::Fist
            || player.powers[Power::Strength as usize] == 0
            || prefs.preferred(WeaponType::Chainsaw, WeaponType::Fist))
    {
        newweapon = WeaponType::Chainsaw;
    }

    // Select SSG from '3' only if it's owned and the player has no
    // shotgun, or the shotgun is in use, or the SSG is preferred.
    if newweapon == WeaponType::Shotgun
        && mode == GameMode::Commercial
        && player.weaponowned[WeaponType::SuperShotgun as usize]
        && (!player.weaponowned[WeaponType::Shotgun as usize]
            || player.readyweapon == WeaponType::Shotgun
            || (player.readyweapon != WeaponType::SuperShotgun
                && prefs.preferred(WeaponType::SuperShotgun, WeaponType::Shotgun)))
    {
        newweapon = WeaponType::SuperShotgun;
    }

    newweapon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_with(weapons: &[WeaponType]) -> Player {
        let mut p = Player::default();
        p.reborn();
        for &w in weapons {
            p.weaponowned[w as usize] = true;
        }
        p
    }

    #[test]
    fn test_ammo_assignments() {
        assert_eq!(WeaponType::Fist.ammo(), AmmoType::NoAmmo);
        assert_eq!(WeaponType::SuperShotgun.ammo(), AmmoType::Shell);
        assert_eq!(WeaponType::Bfg.ammo(), AmmoType::Cell);
        assert_eq!(WeaponType::Bfg.ammo_per_shot(), 40);
    }

    #[test]
    fn test_mode_gating() {
        assert!(!WeaponType::SuperShotgun.exists_in(GameMode::Retail));
        assert!(WeaponType::SuperShotgun.exists_in(GameMode::Commercial));
        assert!(!WeaponType::Plasma.exists_in(GameMode::Shareware));
        assert!(!WeaponType::Bfg.exists_in(GameMode::Shareware));
        assert!(WeaponType::Shotgun.exists_in(GameMode::Shareware));
    }

    #[test]
    fn test_chainsaw_over_fist_without_berserk() {
        let p = player_with(&[WeaponType::Chainsaw]);
        let got = resolve_slot_request(
            &p,
            WeaponType::Fist,
            GameMode::Commercial,
            &WeaponPrefs::default(),
            true,
        );
        assert_eq!(got, WeaponType::Chainsaw);
    }

    #[test]
    fn test_fist_with_berserk_when_preferred() {
        let mut p = player_with(&[WeaponType::Chainsaw]);
        p.powers[Power::Strength as usize] = 1;

        // Default prefs rank the chainsaw above the fist, so berserk
        // alone doesn't keep the fist.
        let got = resolve_slot_request(
            &p,
            WeaponType::Fist,
            GameMode::Commercial,
            &WeaponPrefs::default(),
            true,
        );
        assert_eq!(got, WeaponType::Chainsaw);

        // With the fist preferred, berserk keeps it.
        let mut prefs = WeaponPrefs::default();
        prefs.0.swap(5, 8); // swap chainsaw and fist ranks
        let got = resolve_slot_request(&p, WeaponType::Fist, GameMode::Commercial, &prefs, true);
        assert_eq!(got, WeaponType::Fist);
    }

    #[test]
    fn test_ssg_toggle() {
        let mut p = player_with(&[WeaponType::Shotgun, WeaponType::SuperShotgun]);
        p.ammo[AmmoType::Shell as usize] = 10;

        // SSG preferred by default, so '3' resolves to it outside use.
        let got = resolve_slot_request(
            &p,
            WeaponType::Shotgun,
            GameMode::Commercial,
            &WeaponPrefs::default(),
            true,
        );
        assert_eq!(got, WeaponType::SuperShotgun);

        // No SSG outside commercial.
        let got = resolve_slot_request(
            &p,
            WeaponType::Shotgun,
            GameMode::Retail,
            &WeaponPrefs::default(),
            true,
        );
        assert_eq!(got, WeaponType::Shotgun);

        // Toggle disabled: the raw request stands.
        let got = resolve_slot_request(
            &p,
            WeaponType::Shotgun,
            GameMode::Commercial,
            &WeaponPrefs::default(),
            false,
        );
        assert_eq!(got, WeaponType::Shotgun);
    }

    #[test]
    fn test_next_weapon_skips_unowned() {
        let mut p = player_with(&[WeaponType::Pistol, WeaponType::Chaingun]);
        p.ammo[AmmoType::Clip as usize] = 50;
        p.readyweapon = WeaponType::Pistol;
        p.pendingweapon = WeaponType::Pistol;

        // Next from pistol skips shotgun/SSG straight to chaingun.
        assert_eq!(next_weapon(&p, 1, GameMode::Commercial), WeaponType::Chaingun);
        // Prev from pistol wraps back through melee (fist is always
        // selectable).
        assert_eq!(next_weapon(&p, -1, GameMode::Commercial), WeaponType::Fist);
    }

    #[test]
    fn test_switch_weapon_prefers_loaded() {
        let mut p = player_with(&[WeaponType::Shotgun, WeaponType::Chaingun]);
        p.readyweapon = WeaponType::Chaingun;
        p.ammo[AmmoType::Clip as usize] = 0;
        p.ammo[AmmoType::Shell as usize] = 5;

        assert_eq!(
            switch_weapon(&p, GameMode::Commercial, &WeaponPrefs::default()),
            WeaponType::Shotgun
        );

        // Out of everything: fist.
        p.ammo[AmmoType::Shell as usize] = 0;
        p.weaponowned[WeaponType::Shotgun as usize] = false;
        assert_eq!(
            switch_weapon(&p, GameMode::Commercial, &WeaponPrefs::default()),
            WeaponType::Fist
        );
    }
}
