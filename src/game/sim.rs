//! The Per-Tic Simulation Step
//!
//! `p_ticker` advances the world exactly one tic: players first, then
//! every thinker in the snapshot taken at tic start, then the removal
//! sweep. The function is 100% deterministic:
//! - iteration is in arena spawn order,
//! - all randomness goes through the class-indexed PRNG,
//! - thinkers spawned mid-tic first run next tic,
//! - removal is deferred to the end-of-tic sweep and never draws from
//!   the PRNG, so delete order cannot perturb the random sequence.

use super::mobj::{flags, Action, MoveDir, StateNum, STATES};
use super::player::{PlayerState, Power};
use super::specials::SpecialStep;
use super::thinker::{Think, ThinkerId};
use super::ticcmd::buttons;
use super::weapons::{self, AmmoType, WeaponType};
use super::{sfx, Game, GameState};
use crate::compat::Comp;
use crate::core::angle::{fineangle, finecosine, finesine, point_to_angle, Angle, ANG45};
use crate::core::fixed::{fixed_mul, Fixed, FRACUNIT};
use crate::core::rng::RngClass;

/// Player/monster ground friction per tic.
const FRICTION: Fixed = 0xe800;
/// Thrust scale applied to ticcmd moves.
const MOVE_SCALE: Fixed = 2048;
/// Hitscan reach of player weapons, map units.
const MISSILERANGE: Fixed = 32 * 64 * FRACUNIT;
/// Monster melee reach.
const MELEERANGE: Fixed = 64 * FRACUNIT;

/// Advance the simulation one tic. This is the only entry point that
/// mutates world state.
pub fn p_ticker(game: &mut Game) {
    if game.gamestate != GameState::Level || game.level.is_none() {
        return;
    }

    // Pause stops the world but not the out-of-level tickers. The
    // menu pauses single-player games the same way.
    if game.paused != 0 || (!game.netgame && game.menuactive && !game.demoplayback()) {
        return;
    }

    // 1. Players.
    for i in 0..crate::MAXPLAYERS {
        if game.playeringame[i] {
            player_think(game, i);
        }
    }

    // 2. Thinkers, over the tic-start snapshot.
    let snapshot = game.level.as_ref().map(|l| l.thinkers.snapshot()).unwrap_or_default();
    for id in snapshot {
        run_thinker(game, id);
    }

    // 3. Sweep removals; back-references go stale via generations.
    if let Some(level) = game.level.as_mut() {
        level.thinkers.sweep();
    }

    game.leveltime += 1;
}

// =============================================================================
// PLAYERS
// =============================================================================

fn player_think(game: &mut Game, pnum: usize) {
    let cmd = game.players[pnum].cmd;

    if game.players[pnum].playerstate == PlayerState::Dead {
        // Corpse view; wait for the use key to schedule a reborn.
        if cmd.buttons & buttons::BT_USE != 0 {
            game.players[pnum].playerstate = PlayerState::Reborn;
        }
        return;
    }

    // Weapon change latched last tic takes effect now.
    if game.players[pnum].pendingweapon != game.players[pnum].readyweapon {
        game.players[pnum].readyweapon = game.players[pnum].pendingweapon;
    }

    // Movement and facing.
    let Some(mobj_id) = game.players[pnum].mobj else {
        return;
    };
    let Some(level) = game.level.as_mut() else {
        return;
    };
    let Some(mobj) = level.thinkers.mobj_mut(mobj_id) else {
        // The mobj went away (level transition edge); drop the ref.
        game.players[pnum].mobj = None;
        return;
    };

    mobj.angle = mobj
        .angle
        .wrapping_add((cmd.angleturn as i32 as u32) << 16);

    let fine = fineangle(mobj.angle);
    if cmd.forwardmove != 0 {
        let thrust = cmd.forwardmove as Fixed * MOVE_SCALE;
        mobj.momx += fixed_mul(thrust, finecosine(fine));
        mobj.momy += fixed_mul(thrust, finesine(fine));
    }
    if cmd.sidemove != 0 {
        let fine = fineangle(mobj.angle.wrapping_sub(crate::core::angle::ANG90));
        let thrust = cmd.sidemove as Fixed * MOVE_SCALE;
        mobj.momx += fixed_mul(thrust, finecosine(fine));
        mobj.momy += fixed_mul(thrust, finesine(fine));
    }
    // Position integration happens in the mobj's own thinker step.

    // Power timers count down.
    for t in game.players[pnum].powers.iter_mut() {
        if *t > 0 {
            *t -= 1;
        }
    }
    if game.players[pnum].damagecount > 0 {
        game.players[pnum].damagecount -= 1;
    }
    if game.players[pnum].bonuscount > 0 {
        game.players[pnum].bonuscount -= 1;
    }

    // Weapon change from the cmd; old demos also resolve the classic
    // slot toggles here instead of at build time.
    if cmd.buttons & buttons::BT_CHANGE != 0 {
        if let Some(mut w) = WeaponType::from_index(cmd.weapon_index()) {
            if game.behavior.demo_compatibility() {
                w = weapons::resolve_slot_request(
                    &game.players[pnum],
                    w,
                    game.mode,
                    &crate::game::weapons::WeaponPrefs::default(),
                    true,
                );
            }
            if game.players[pnum].weaponowned[w as usize] {
                game.players[pnum].pendingweapon = w;
            }
            // Selecting an unowned weapon is silently ignored.
        }
    }

    // Use.
    if cmd.buttons & buttons::BT_USE != 0 {
        if !game.players[pnum].usedown {
            game.players[pnum].usedown = true;
            use_lines(game, pnum);
        }
    } else {
        game.players[pnum].usedown = false;
    }

    // Attack.
    if cmd.buttons & buttons::BT_ATTACK != 0 {
        if !game.players[pnum].attackdown || holds_autofire(game.players[pnum].readyweapon) {
            fire_weapon(game, pnum);
        }
        game.players[pnum].attackdown = true;
    } else {
        game.players[pnum].attackdown = false;
    }
}

fn holds_autofire(weapon: WeaponType) -> bool {
    matches!(
        weapon,
        WeaponType::Chaingun | WeaponType::Plasma | WeaponType::Chainsaw
    )
}

/// Integrate momentum, apply friction, clamp into the level bounds and
/// settle onto the floor.
fn apply_momentum(level: &mut crate::game::world::Level, id: ThinkerId) {
    let Some(mobj) = level.thinkers.mobj(id) else {
        return;
    };
    let nx = mobj.x.wrapping_add(mobj.momx);
    let ny = mobj.y.wrapping_add(mobj.momy);
    let floor = level.sectors[mobj.sector as usize].floorheight;
    let (cx, cy) = level.clamp_to_bounds(nx, ny);

    let mobj = level.thinkers.mobj_mut(id).unwrap();
    mobj.x = cx;
    mobj.y = cy;
    mobj.z = floor;
    mobj.momx = fixed_mul(mobj.momx, FRICTION);
    mobj.momy = fixed_mul(mobj.momy, FRICTION);
    // Kill the crawl once momentum is inaudible.
    if mobj.momx.abs() < 0x100 {
        mobj.momx = 0;
    }
    if mobj.momy.abs() < 0x100 {
        mobj.momy = 0;
    }
}

/// Push use activations at lines tagged around the player. The core
/// carries only tag-driven sector specials.
fn use_lines(game: &mut Game, pnum: usize) {
    let Some(level) = game.level.as_mut() else {
        return;
    };
    let mut activations: Vec<(i16, i16)> = Vec::new();
    for line in &level.lines {
        if line.special != 0 {
            activations.push((line.special, line.tag));
        }
    }
    let mut any = false;
    for (special, tag) in activations {
        if activate_special(game, special, tag) {
            any = true;
        }
    }
    if any {
        game.start_sound(sfx::SWITCH, game.players[pnum].mobj);
    }
}

/// Spawn the thinker for a line special. Returns true if something
/// started.
pub fn activate_special(game: &mut Game, special: i16, tag: i16) -> bool {
    use crate::game::specials::{Door, DoorKind, FloorMover, Platform};

    let Some(level) = game.level.as_mut() else {
        return false;
    };
    let sectors: Vec<u16> = level
        .sectors
        .iter()
        .enumerate()
        .filter(|(_, s)| s.tag == tag)
        .map(|(i, _)| i as u16)
        .collect();
    if sectors.is_empty() {
        return false;
    }

    let mut started = false;
    for sec in sectors {
        let ceiling = level.sectors[sec as usize].ceilingheight;
        let floor = level.sectors[sec as usize].floorheight;
        let think = match special {
            1 | 31 => Think::Door(Door::new(sec, DoorKind::Normal, ceiling + 72 * FRACUNIT)),
            117 => Think::Door(Door::new(sec, DoorKind::BlazeRaise, ceiling + 72 * FRACUNIT)),
            62 => Think::Plat(Platform::new(sec, floor - 64 * FRACUNIT, floor)),
            23 => Think::Floor(FloorMover::new(sec, floor - 32 * FRACUNIT)),
            _ => continue,
        };
        level.thinkers.spawn(think);
        started = true;
    }
    started
}

/// Fire the ready weapon: spend ammo, draw damage, hit the first live
/// shootable in range.
fn fire_weapon(game: &mut Game, pnum: usize) {
    let weapon = game.players[pnum].readyweapon;

    if !weapons::check_ammo(&game.players[pnum]) {
        // Out of ammo: the build-side autoswitch will catch it next
        // tic; old demos switch here.
        if game.behavior.demo_compatibility() {
            let w = weapons::switch_weapon(
                &game.players[pnum],
                game.mode,
                &crate::game::weapons::WeaponPrefs::default(),
            );
            game.players[pnum].pendingweapon = w;
        }
        return;
    }

    match weapon.ammo() {
        AmmoType::NoAmmo => {}
        ammo => game.players[pnum].ammo[ammo as usize] -= weapon.ammo_per_shot(),
    }

    let (class, base_damage, sound) = match weapon {
        WeaponType::Fist => (RngClass::Punch, 2, sfx::PUNCH),
        WeaponType::Chainsaw => (RngClass::Saw, 2, sfx::SAWUP),
        WeaponType::Pistol => (RngClass::Gunshot, 5, sfx::PISTOL),
        WeaponType::Chaingun => (RngClass::Gunshot, 5, sfx::PISTOL),
        WeaponType::Shotgun => (RngClass::Shotgun, 5, sfx::SHOTGUN),
        WeaponType::SuperShotgun => (RngClass::Shotgun, 5, sfx::SHOTGUN),
        WeaponType::Missile => (RngClass::Missile, 20, sfx::EXPLODE),
        WeaponType::Plasma => (RngClass::Plasma, 5, sfx::PISTOL),
        WeaponType::Bfg => (RngClass::Bfg, 100, sfx::EXPLODE),
    };

    // Berserk multiplies melee damage.
    let berserk = weapon == WeaponType::Fist
        && game.players[pnum].powers[Power::Strength as usize] > 0;

    let roll = (game.rng.random(class) % 10 + 1) as i32;
    let mut damage = base_damage * roll;
    if berserk {
        damage *= 10;
    }

    game.start_sound(sound, game.players[pnum].mobj);

    // Recoil thrusts the shooter backwards (MBF option).
    if game.behavior.weapon_recoil {
        if let (Some(id), Some(level)) = (game.players[pnum].mobj, game.level.as_mut()) {
            if let Some(mobj) = level.thinkers.mobj_mut(id) {
                let fine = fineangle(mobj.angle.wrapping_add(crate::core::angle::ANG180));
                mobj.momx += fixed_mul(2048 * 4, finecosine(fine));
                mobj.momy += fixed_mul(2048 * 4, finesine(fine));
            }
        }
    }

    let range = match weapon {
        WeaponType::Fist | WeaponType::Chainsaw => MELEERANGE,
        _ => MISSILERANGE,
    };
    if let Some(victim) = find_shoot_target(game, pnum, range) {
        let attacker = game.players[pnum].mobj;
        damage_mobj(game, victim, attacker, Some(pnum), damage);
    }
}

/// First live shootable within range of the player, in spawn order.
fn find_shoot_target(game: &Game, pnum: usize, range: Fixed) -> Option<ThinkerId> {
    let level = game.level.as_ref()?;
    let shooter = game.players[pnum].mobj?;
    let (sx, sy) = {
        let m = level.thinkers.mobj(shooter)?;
        (m.x, m.y)
    };
    for (id, m) in level.thinkers.mobjs() {
        if id == shooter || m.flags & flags::MF_SHOOTABLE == 0 || m.health <= 0 {
            continue;
        }
        if approx_dist(m.x - sx, m.y - sy) <= range {
            return Some(id);
        }
    }
    None
}

/// The classic coarse distance: max + half min of the axis deltas.
fn approx_dist(dx: Fixed, dy: Fixed) -> Fixed {
    let dx = dx.abs();
    let dy = dy.abs();
    if dx < dy {
        dy + dx / 2
    } else {
        dx + dy / 2
    }
}

/// Apply damage; handles pain states, death, tallies and infighting.
pub fn damage_mobj(
    game: &mut Game,
    target_id: ThinkerId,
    attacker: Option<ThinkerId>,
    attacker_player: Option<usize>,
    damage: i32,
) {
    let Some(level) = game.level.as_mut() else {
        return;
    };
    let Some(target) = level.thinkers.mobj_mut(target_id) else {
        return;
    };

    target.health -= damage;

    if let Some(p) = target.player {
        let pnum = p as usize;
        let died = target.health <= 0;
        game.players[pnum].health = level
            .thinkers
            .mobj(target_id)
            .map(|m| m.health.max(0))
            .unwrap_or(0);
        game.players[pnum].damagecount += damage.min(100);
        if died {
            game.players[pnum].playerstate = PlayerState::Dead;
            if let Some(ap) = attacker_player {
                if ap != pnum {
                    game.players[ap].frags[pnum] += 1;
                } else {
                    // Suicide counts against yourself.
                    game.players[ap].frags[pnum] -= 1;
                }
            }
            if let Some(m) = level.thinkers.mobj_mut(target_id) {
                m.flags |= flags::MF_CORPSE;
                m.flags &= !flags::MF_SOLID;
            }
            game.start_sound(sfx::SCREAM, Some(target_id));
        }
        return;
    }

    let info = *target.info();
    let died = target.health <= 0;
    if died {
        let countkill = target.flags & flags::MF_COUNTKILL != 0;
        target.flags |= flags::MF_CORPSE;
        target.flags &= !(flags::MF_SOLID | flags::MF_SHOOTABLE);
        target.set_state(info.deathstate);
        if countkill {
            if let Some(p) = attacker_player {
                game.players[p].killcount += 1;
            } else {
                // Kills with no player credit (infighting, crushers)
                // still close the tally on some revisions.
                level.extrakills += 1;
            }
        }
        return;
    }

    // Pain: chance in painchance/256.
    let pain_roll = game.rng.random(RngClass::PainChance);
    let target = level.thinkers.mobj_mut(target_id).unwrap();
    if (pain_roll as i32) < info.painchance as i32 {
        target.set_state(info.painstate);
    }

    // Retarget the attacker; monster infighting permitting.
    if let Some(attacker_id) = attacker {
        if attacker_id != target_id {
            let attacker_is_player = attacker_player.is_some();
            if attacker_is_player || game.behavior.monster_infighting {
                let target = level.thinkers.mobj_mut(target_id).unwrap();
                target.target = Some(attacker_id);
                target.threshold = 100;
            }
        }
    }
}

// =============================================================================
// THINKERS
// =============================================================================

fn run_thinker(game: &mut Game, id: ThinkerId) {
    let Some(level) = game.level.as_mut() else {
        return;
    };
    let Some(think) = level.thinkers.get_mut(id) else {
        return; // removed earlier this tic
    };

    match think {
        Think::Mobj(_) => run_mobj(game, id),
        Think::Door(door) => {
            let mut door = door.clone();
            let step = door.step(&mut level.sectors);
            match level.thinkers.get_mut(id) {
                Some(Think::Door(slot)) => *slot = door,
                _ => return,
            }
            if step == SpecialStep::Done {
                level.thinkers.mark_remove(id);
                game.start_sound(sfx::DOOR_CLOSE, None);
            }
        }
        Think::Plat(plat) => {
            let mut plat = plat.clone();
            let step = plat.step(&mut level.sectors, &mut game.rng);
            match level.thinkers.get_mut(id) {
                Some(Think::Plat(slot)) => *slot = plat,
                _ => return,
            }
            if step == SpecialStep::Done {
                level.thinkers.mark_remove(id);
            }
        }
        Think::Floor(floor) => {
            let mut floor = floor.clone();
            let step = floor.step(&mut level.sectors);
            match level.thinkers.get_mut(id) {
                Some(Think::Floor(slot)) => *slot = floor,
                _ => return,
            }
            if step == SpecialStep::Done {
                level.thinkers.mark_remove(id);
            }
        }
        Think::Ceiling(ceiling) => {
            let mut ceiling = ceiling.clone();
            let step = ceiling.step(&mut level.sectors);
            match level.thinkers.get_mut(id) {
                Some(Think::Ceiling(slot)) => *slot = ceiling,
                _ => return,
            }
            if step == SpecialStep::Done {
                level.thinkers.mark_remove(id);
            }
        }
        Think::Light(light) => {
            let mut light = light.clone();
            let step = light.step(&mut level.sectors, &mut game.rng);
            match level.thinkers.get_mut(id) {
                Some(Think::Light(slot)) => *slot = light,
                _ => return,
            }
            if step == SpecialStep::Done {
                level.thinkers.mark_remove(id);
            }
        }
        Think::Scroller(s) => {
            let (affectee, dx, dy, carry) = (s.affectee, s.dx, s.dy, s.carry);
            if carry {
                // Carrying floors push everything standing in the
                // sector.
                let riders: Vec<ThinkerId> = level
                    .thinkers
                    .mobjs()
                    .filter(|(_, m)| m.sector == affectee && m.health > 0)
                    .map(|(id, _)| id)
                    .collect();
                for rid in riders {
                    if let Some(m) = level.thinkers.mobj_mut(rid) {
                        m.momx += dx;
                        m.momy += dy;
                    }
                }
            } else if let Some(side) = level.sides.get_mut(affectee as usize) {
                side.textureoffset += dx;
                side.rowoffset += dy;
            }
        }
        Think::Pusher(p) => {
            let (sector, x_mag, y_mag) = (p.sector, p.x_mag, p.y_mag);
            if game.behavior.allow_pushers {
                let pushed: Vec<ThinkerId> = level
                    .thinkers
                    .mobjs()
                    .filter(|(_, m)| m.sector == sector && m.health > 0)
                    .map(|(id, _)| id)
                    .collect();
                for pid in pushed {
                    if let Some(m) = level.thinkers.mobj_mut(pid) {
                        m.momx += x_mag;
                        m.momy += y_mag;
                    }
                }
            }
        }
    }
}

/// One tic for a map object: momentum, then the state countdown.
fn run_mobj(game: &mut Game, id: ThinkerId) {
    {
        let Some(level) = game.level.as_mut() else {
            return;
        };
        let Some(mobj) = level.thinkers.mobj(id) else {
            return;
        };
        if mobj.momx != 0 || mobj.momy != 0 {
            apply_momentum(level, id);
        }
    }

    // Count down the state clock; dispatch on entry to the next state.
    let next_action = {
        let level = game.level.as_mut().unwrap();
        let Some(mobj) = level.thinkers.mobj_mut(id) else {
            return;
        };
        if mobj.player.is_some() || mobj.tics == -1 {
            // Player state machines are driven by player_think; parked
            // states never advance.
            run_standing_action(mobj.state)
        } else {
            mobj.tics -= 1;
            if mobj.tics > 0 {
                None
            } else {
                let next = STATES[mobj.state as usize].next;
                if !mobj.set_state(next) {
                    level.thinkers.mark_remove(id);
                    return;
                }
                Some(STATES[next as usize].action)
            }
        }
    };

    // Per-tic actions for looping states fire every entry; Chase also
    // acts on every tic it occupies the state.
    let action = match next_action {
        Some(a) => a,
        None => return,
    };

    dispatch_action(game, id, action);
}

/// Actions that repeat while a -1-tic state is parked.
fn run_standing_action(_state: StateNum) -> Option<Action> {
    None
}

/// The single dispatch point for state actions.
pub fn dispatch_action(game: &mut Game, id: ThinkerId, action: Action) {
    match action {
        Action::None => {}
        Action::Look => a_look(game, id),
        Action::Chase => a_chase(game, id),
        Action::FaceTarget => a_face_target(game, id),
        Action::ShootTarget => a_shoot_target(game, id),
        Action::Bite => a_bite(game, id),
        Action::Scream => {
            game.start_sound(sfx::SCREAM, Some(id));
        }
        Action::Explode => a_explode(game, id),
        Action::Fall => {
            // Final rest: nothing left to do; corpse flags were set at
            // death.
        }
    }
}

/// Scan for a player to target, one slot per call.
fn a_look(game: &mut Game, id: ThinkerId) {
    let Some(level) = game.level.as_ref() else {
        return;
    };
    let Some(mobj) = level.thinkers.mobj(id) else {
        return;
    };
    let lastlook = mobj.lastlook;
    let is_friend = mobj.flags & flags::MF_FRIEND != 0;
    let seestate = mobj.info().seestate;

    // Rotate through player slots; the draw keeps vanilla's uneven
    // scan cadence.
    let start = (lastlook as usize + 1) % crate::MAXPLAYERS;
    let mut found = None;
    for off in 0..crate::MAXPLAYERS {
        let slot = (start + off) % crate::MAXPLAYERS;
        if !game.playeringame[slot] {
            continue;
        }
        if game.players[slot].playerstate != PlayerState::Live {
            continue;
        }
        found = Some(slot);
        break;
    }

    let level = game.level.as_mut().unwrap();
    let Some(mobj) = level.thinkers.mobj_mut(id) else {
        return;
    };
    mobj.lastlook = found.map(|s| s as u8).unwrap_or(lastlook);

    // Friends fight alongside, they don't hunt players.
    if is_friend {
        return;
    }

    if let Some(slot) = found {
        if let Some(target) = game.players[slot].mobj {
            // Reaction delay varies per revision through the see draw.
            let delay = (game.rng.random(RngClass::See) & 3) as i32;
            let level = game.level.as_mut().unwrap();
            let mobj = level.thinkers.mobj_mut(id).unwrap();
            mobj.target = Some(target);
            mobj.reactiontime = delay;
            mobj.set_state(seestate);
        }
    }
}

/// Pursue the current target.
fn a_chase(game: &mut Game, id: ThinkerId) {
    // Validate the target through the arena; stale handles drop back
    // to the stand state.
    let (target_id, spawnstate, attackstate, speed, ppos) = {
        let Some(level) = game.level.as_ref() else {
            return;
        };
        let Some(mobj) = level.thinkers.mobj(id) else {
            return;
        };
        let info = mobj.info();
        let target = mobj.target.filter(|&t| {
            level
                .thinkers
                .mobj(t)
                .map(|m| m.health > 0)
                .unwrap_or(false)
        });
        let ppos = target.and_then(|t| level.thinkers.mobj(t).map(|m| (m.x, m.y)));
        (target, info.spawnstate, info.attackstate, info.speed, ppos)
    };

    let Some(target_id) = target_id else {
        let level = game.level.as_mut().unwrap();
        if let Some(mobj) = level.thinkers.mobj_mut(id) {
            mobj.target = None;
            mobj.set_state(spawnstate);
        }
        return;
    };
    let (tx, ty) = ppos.unwrap();

    // Reaction time gates the first move.
    {
        let level = game.level.as_mut().unwrap();
        let mobj = level.thinkers.mobj_mut(id).unwrap();
        if mobj.reactiontime > 0 {
            mobj.reactiontime -= 1;
            return;
        }
    }

    a_face_target(game, id);

    // Melee range check.
    let (mx, my) = {
        let level = game.level.as_ref().unwrap();
        let m = level.thinkers.mobj(id).unwrap();
        (m.x, m.y)
    };
    if approx_dist(tx - mx, ty - my) <= MELEERANGE {
        let level = game.level.as_mut().unwrap();
        let mobj = level.thinkers.mobj_mut(id).unwrap();
        mobj.set_state(attackstate);
        return;
    }

    // Occasionally pick a fresh direction; the draw cadence matters
    // for sync, the chosen direction is derived from the target.
    let redirect = {
        let level = game.level.as_ref().unwrap();
        let mobj = level.thinkers.mobj(id).unwrap();
        mobj.movecount <= 0 || mobj.movedir == MoveDir::NoDir
    };
    if redirect {
        let fresh = game.rng.random(RngClass::NewChaseDir);
        let angle = point_to_angle(tx - mx, ty - my);
        let dir = dir_from_angle(angle);
        let level = game.level.as_mut().unwrap();
        let mobj = level.thinkers.mobj_mut(id).unwrap();
        mobj.movedir = dir;
        mobj.movecount = (fresh & 15) as i32;
    }

    try_walk(game, id, target_id, speed);
}

/// Step in the current move direction, honoring the blocking quirks.
fn try_walk(game: &mut Game, id: ThinkerId, _target: ThinkerId, speed: i32) {
    // The try-walk draw fires even when the move is trivially clear;
    // dropping it would desync demos.
    let _ = game.rng.random(RngClass::TryWalk);

    let Some(level) = game.level.as_mut() else {
        return;
    };
    let Some(mobj) = level.thinkers.mobj_mut(id) else {
        return;
    };
    let (dx, dy) = dir_delta(mobj.movedir);
    let step = speed as Fixed * FRACUNIT;
    let nx = mobj.x + fixed_mul(step, dx);
    let ny = mobj.y + fixed_mul(step, dy);

    // Ledge check: without the dropoff quirk, monsters refuse moves
    // over a tall floor drop. The arena's single sector keeps this
    // trivially true, but the check reads the vector like every other
    // revision-sensitive branch.
    let allowed = if game.behavior.comp(Comp::Dropoff) {
        true
    } else {
        let here = level.sectors[mobj.sector as usize].floorheight;
        let there = level.sectors[level.sector_at(nx, ny) as usize].floorheight;
        here - there <= 24 * FRACUNIT
    };

    if allowed {
        let (cx, cy) = level.clamp_to_bounds(nx, ny);
        let mobj = level.thinkers.mobj_mut(id).unwrap();
        mobj.x = cx;
        mobj.y = cy;
        mobj.movecount -= 1;
    } else {
        let mobj = level.thinkers.mobj_mut(id).unwrap();
        mobj.movedir = MoveDir::NoDir;
    }
}

fn a_face_target(game: &mut Game, id: ThinkerId) {
    let Some(level) = game.level.as_mut() else {
        return;
    };
    let Some(mobj) = level.thinkers.mobj(id) else {
        return;
    };
    let Some(target) = mobj.target else {
        return;
    };
    let Some(t) = level.thinkers.mobj(target) else {
        return;
    };
    let angle = point_to_angle(t.x - mobj.x, t.y - mobj.y);
    level.thinkers.mobj_mut(id).unwrap().angle = angle;
}

fn a_shoot_target(game: &mut Game, id: ThinkerId) {
    a_face_target(game, id);
    let target = {
        let Some(level) = game.level.as_ref() else {
            return;
        };
        let Some(mobj) = level.thinkers.mobj(id) else {
            return;
        };
        mobj.target
    };
    let Some(target) = target else {
        return;
    };
    game.start_sound(sfx::PISTOL, Some(id));
    let damage = ((game.rng.random(RngClass::PosAttack) % 5) + 1) as i32 * 3;
    damage_mobj(game, target, Some(id), None, damage);
}

fn a_bite(game: &mut Game, id: ThinkerId) {
    a_face_target(game, id);
    let (target, in_range) = {
        let Some(level) = game.level.as_ref() else {
            return;
        };
        let Some(mobj) = level.thinkers.mobj(id) else {
            return;
        };
        let Some(t) = mobj.target.and_then(|t| level.thinkers.mobj(t)) else {
            return;
        };
        (
            mobj.target,
            approx_dist(t.x - mobj.x, t.y - mobj.y) <= MELEERANGE,
        )
    };
    if !in_range {
        return;
    }
    let damage = ((game.rng.random(RngClass::SargAttack) % 10) + 1) as i32 * 4;
    damage_mobj(game, target.unwrap(), Some(id), None, damage);
}

/// Barrel burst: radius damage around the corpse, then removal via the
/// Null successor state.
fn a_explode(game: &mut Game, id: ThinkerId) {
    const BLAST_RADIUS: Fixed = 128 * FRACUNIT;
    let (bx, by) = {
        let Some(level) = game.level.as_ref() else {
            return;
        };
        let Some(mobj) = level.thinkers.mobj(id) else {
            return;
        };
        (mobj.x, mobj.y)
    };

    game.start_sound(sfx::EXPLODE, Some(id));

    let victims: Vec<ThinkerId> = {
        let level = game.level.as_ref().unwrap();
        level
            .thinkers
            .mobjs()
            .filter(|&(vid, m)| {
                vid != id
                    && m.flags & flags::MF_SHOOTABLE != 0
                    && m.health > 0
                    && approx_dist(m.x - bx, m.y - by) <= BLAST_RADIUS
            })
            .map(|(vid, _)| vid)
            .collect()
    };
    for vid in victims {
        let damage = ((game.rng.random(RngClass::Explode) % 9) + 1) as i32 * 8;
        damage_mobj(game, vid, Some(id), None, damage);
    }
}

/// Compass direction nearest to a BAM angle.
fn dir_from_angle(angle: Angle) -> MoveDir {
    const DIRS: [MoveDir; 8] = [
        MoveDir::East,
        MoveDir::NorthEast,
        MoveDir::North,
        MoveDir::NorthWest,
        MoveDir::West,
        MoveDir::SouthWest,
        MoveDir::South,
        MoveDir::SouthEast,
    ];
    DIRS[(angle.wrapping_add(ANG45 / 2) >> 29) as usize]
}

/// Unit vector per compass direction, in fixed point.
fn dir_delta(dir: MoveDir) -> (Fixed, Fixed) {
    const DIAG: Fixed = 47000; // ~0.717
    match dir {
        MoveDir::East => (FRACUNIT, 0),
        MoveDir::NorthEast => (DIAG, DIAG),
        MoveDir::North => (0, FRACUNIT),
        MoveDir::NorthWest => (-DIAG, DIAG),
        MoveDir::West => (-FRACUNIT, 0),
        MoveDir::SouthWest => (-DIAG, -DIAG),
        MoveDir::South => (0, -FRACUNIT),
        MoveDir::SouthEast => (DIAG, -DIAG),
        MoveDir::NoDir => (0, 0),
    }
}
