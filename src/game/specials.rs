//! Sector Specials
//!
//! The non-mobj thinkers: vertical doors, lifts, moving floors and
//! ceilings, light effects, scrollers and pushers. Each advances one
//! step per tic against the sector it animates and removes itself
//! when its animation completes.

use serde::{Deserialize, Serialize};

use super::world::Sector;
use crate::core::fixed::{Fixed, FRACUNIT};
use crate::core::rng::{Rng, RngClass};
use crate::TICRATE;

/// Result of stepping a special one tic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialStep {
    /// Keep running.
    Running,
    /// Animation complete; remove the thinker.
    Done,
}

/// Outcome of a single plane move attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlaneResult {
    Ok,
    ReachedDest,
}

/// Move a plane (floor or ceiling) toward a destination height at a
/// fixed speed, clamping on arrival.
fn move_plane(current: &mut Fixed, speed: Fixed, dest: Fixed) -> PlaneResult {
    if *current < dest {
        *current = (*current + speed).min(dest);
    } else {
        *current = (*current - speed).max(dest);
    }
    if *current == dest {
        PlaneResult::ReachedDest
    } else {
        PlaneResult::Ok
    }
}

// =============================================================================
// DOORS
// =============================================================================

/// Door behavior kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorKind {
    /// Open, wait, close.
    Normal = 0,
    /// Open and stay open.
    Open = 1,
    /// Close and stay closed.
    Close = 2,
    /// Double-speed variant of Normal.
    BlazeRaise = 3,
}

impl DoorKind {
    pub fn from_u8(v: u8) -> Option<DoorKind> {
        match v {
            0 => Some(DoorKind::Normal),
            1 => Some(DoorKind::Open),
            2 => Some(DoorKind::Close),
            3 => Some(DoorKind::BlazeRaise),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum DoorDir {
    Opening = 0,
    Waiting = 1,
    Closing = 2,
}

impl DoorDir {
    pub(crate) fn from_u8(v: u8) -> Option<DoorDir> {
        match v {
            0 => Some(DoorDir::Opening),
            1 => Some(DoorDir::Waiting),
            2 => Some(DoorDir::Closing),
            _ => None,
        }
    }
}

/// A vertical door animating a sector ceiling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Door {
    pub sector: u16,
    pub kind: DoorKind,
    pub topheight: Fixed,
    pub speed: Fixed,
    pub(crate) dir: DoorDir,
    /// Tics to stay open.
    pub(crate) topwait: i32,
    pub(crate) topcount: i32,
}

impl Door {
    /// Default open wait, in tics.
    pub const WAIT: i32 = 150;
    /// Normal door speed.
    pub const SPEED: Fixed = 2 * FRACUNIT;

    pub fn new(sector: u16, kind: DoorKind, topheight: Fixed) -> Self {
        let speed = match kind {
            DoorKind::BlazeRaise => Self::SPEED * 4,
            _ => Self::SPEED,
        };
        let dir = match kind {
            DoorKind::Close => DoorDir::Closing,
            _ => DoorDir::Opening,
        };
        Self {
            sector,
            kind,
            topheight,
            speed,
            dir,
            topwait: Self::WAIT,
            topcount: Self::WAIT,
        }
    }

    pub fn step(&mut self, sectors: &mut [Sector]) -> SpecialStep {
        let sec = &mut sectors[self.sector as usize];
        match self.dir {
            DoorDir::Opening => {
                if move_plane(&mut sec.ceilingheight, self.speed, self.topheight)
                    == PlaneResult::ReachedDest
                {
                    match self.kind {
                        DoorKind::Open => return SpecialStep::Done,
                        _ => {
                            self.dir = DoorDir::Waiting;
                            self.topcount = self.topwait;
                        }
                    }
                }
                SpecialStep::Running
            }
            DoorDir::Waiting => {
                self.topcount -= 1;
                if self.topcount <= 0 {
                    self.dir = DoorDir::Closing;
                }
                SpecialStep::Running
            }
            DoorDir::Closing => {
                if move_plane(&mut sec.ceilingheight, self.speed, sec.floorheight)
                    == PlaneResult::ReachedDest
                {
                    return SpecialStep::Done;
                }
                SpecialStep::Running
            }
        }
    }
}

// =============================================================================
// PLATFORMS (LIFTS)
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum PlatDir {
    Down = 0,
    Waiting = 1,
    Up = 2,
}

impl PlatDir {
    pub(crate) fn from_u8(v: u8) -> Option<PlatDir> {
        match v {
            0 => Some(PlatDir::Down),
            1 => Some(PlatDir::Waiting),
            2 => Some(PlatDir::Up),
            _ => None,
        }
    }
}

/// A lift: floor descends, waits, rises back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Platform {
    pub sector: u16,
    pub speed: Fixed,
    pub low: Fixed,
    pub high: Fixed,
    pub(crate) wait: i32,
    pub(crate) count: i32,
    pub(crate) dir: PlatDir,
}

impl Platform {
    pub const SPEED: Fixed = FRACUNIT;
    pub const WAIT: i32 = 3 * TICRATE as i32;

    pub fn new(sector: u16, low: Fixed, high: Fixed) -> Self {
        Self {
            sector,
            speed: Self::SPEED * 4,
            low,
            high,
            wait: Self::WAIT,
            count: 0,
            dir: PlatDir::Down,
        }
    }

    pub fn step(&mut self, sectors: &mut [Sector], rng: &mut Rng) -> SpecialStep {
        let sec = &mut sectors[self.sector as usize];
        match self.dir {
            PlatDir::Down => {
                if move_plane(&mut sec.floorheight, self.speed, self.low)
                    == PlaneResult::ReachedDest
                {
                    self.dir = PlatDir::Waiting;
                    // Classic engines drew here for the restart delay
                    // jitter on generalized lifts.
                    self.count = self.wait + (rng.random(RngClass::GenLift) & 7) as i32;
                }
                SpecialStep::Running
            }
            PlatDir::Waiting => {
                self.count -= 1;
                if self.count <= 0 {
                    self.dir = PlatDir::Up;
                }
                SpecialStep::Running
            }
            PlatDir::Up => {
                if move_plane(&mut sec.floorheight, self.speed, self.high)
                    == PlaneResult::ReachedDest
                {
                    return SpecialStep::Done;
                }
                SpecialStep::Running
            }
        }
    }
}

// =============================================================================
// FLOORS AND CEILINGS
// =============================================================================

/// A one-way floor move (raise or lower to a destination).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FloorMover {
    pub sector: u16,
    pub speed: Fixed,
    pub dest: Fixed,
}

impl FloorMover {
    pub const SPEED: Fixed = FRACUNIT;

    pub fn new(sector: u16, dest: Fixed) -> Self {
        Self {
            sector,
            speed: Self::SPEED,
            dest,
        }
    }

    pub fn step(&mut self, sectors: &mut [Sector]) -> SpecialStep {
        let sec = &mut sectors[self.sector as usize];
        match move_plane(&mut sec.floorheight, self.speed, self.dest) {
            PlaneResult::ReachedDest => SpecialStep::Done,
            PlaneResult::Ok => SpecialStep::Running,
        }
    }
}

/// A crusher-style ceiling: descends to near the floor, returns, and
/// repeats until stopped externally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CeilingMover {
    pub sector: u16,
    pub speed: Fixed,
    pub bottom: Fixed,
    pub top: Fixed,
    pub(crate) going_down: bool,
}

impl CeilingMover {
    pub const SPEED: Fixed = FRACUNIT;

    pub fn new(sector: u16, bottom: Fixed, top: Fixed) -> Self {
        Self {
            sector,
            speed: Self::SPEED,
            bottom,
            top,
            going_down: true,
        }
    }

    pub fn step(&mut self, sectors: &mut [Sector]) -> SpecialStep {
        let sec = &mut sectors[self.sector as usize];
        let dest = if self.going_down { self.bottom } else { self.top };
        if move_plane(&mut sec.ceilingheight, self.speed, dest) == PlaneResult::ReachedDest {
            self.going_down = !self.going_down;
        }
        SpecialStep::Running
    }
}

// =============================================================================
// LIGHTS
// =============================================================================

/// Random light flicker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightFlicker {
    pub sector: u16,
    pub maxlight: i16,
    pub minlight: i16,
    pub(crate) count: i32,
}

impl LightFlicker {
    pub fn new(sector: u16, maxlight: i16, minlight: i16) -> Self {
        Self {
            sector,
            maxlight,
            minlight,
            count: 4,
        }
    }

    pub fn step(&mut self, sectors: &mut [Sector], rng: &mut Rng) -> SpecialStep {
        self.count -= 1;
        if self.count > 0 {
            return SpecialStep::Running;
        }
        let sec = &mut sectors[self.sector as usize];
        if sec.lightlevel == self.maxlight {
            sec.lightlevel = self.minlight;
            self.count = (rng.random(RngClass::Lights) & 7) as i32 + 1;
        } else {
            sec.lightlevel = self.maxlight;
            self.count = (rng.random(RngClass::Lights) & 31) as i32 + 1;
        }
        SpecialStep::Running
    }
}

// =============================================================================
// SCROLLERS AND PUSHERS
// =============================================================================

/// A scroller: shifts a side's texture offsets, or carries objects on
/// a floor, a constant amount per tic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scroller {
    /// Side or sector index, depending on `carry`.
    pub affectee: u16,
    pub dx: Fixed,
    pub dy: Fixed,
    /// True for carrying floors, false for wall texture scroll.
    pub carry: bool,
}

impl Scroller {
    pub fn new(affectee: u16, dx: Fixed, dy: Fixed, carry: bool) -> Self {
        Self {
            affectee,
            dx,
            dy,
            carry,
        }
    }
}

/// Point pusher / puller, or a wind/current field over a sector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pusher {
    pub sector: u16,
    pub x_mag: Fixed,
    pub y_mag: Fixed,
    /// True for point source, false for a whole-sector field.
    pub point: bool,
}

impl Pusher {
    pub fn new(sector: u16, x_mag: Fixed, y_mag: Fixed, point: bool) -> Self {
        Self {
            sector,
            x_mag,
            y_mag,
            point,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::CompatLevel;

    fn sectors() -> Vec<Sector> {
        vec![Sector {
            floorheight: 0,
            ceilingheight: 0,
            lightlevel: 255,
            special: 0,
            tag: 1,
            soundtarget: None,
        }]
    }

    #[test]
    fn test_door_full_cycle() {
        let mut secs = sectors();
        let top = 72 * FRACUNIT;
        let mut door = Door::new(0, DoorKind::Normal, top);

        // Opens to the top...
        let mut steps = 0;
        while secs[0].ceilingheight < top {
            assert_eq!(door.step(&mut secs), SpecialStep::Running);
            steps += 1;
            assert!(steps < 1000);
        }
        assert_eq!(secs[0].ceilingheight, top);

        // ...waits...
        for _ in 0..Door::WAIT {
            assert_eq!(door.step(&mut secs), SpecialStep::Running);
        }

        // ...and closes down to the floor, then finishes.
        let mut last = SpecialStep::Running;
        for _ in 0..1000 {
            last = door.step(&mut secs);
            if last == SpecialStep::Done {
                break;
            }
        }
        assert_eq!(last, SpecialStep::Done);
        assert_eq!(secs[0].ceilingheight, secs[0].floorheight);
    }

    #[test]
    fn test_blaze_door_is_faster() {
        let mut secs_a = sectors();
        let mut secs_b = sectors();
        let top = 64 * FRACUNIT;
        let mut normal = Door::new(0, DoorKind::Normal, top);
        let mut blaze = Door::new(0, DoorKind::BlazeRaise, top);
        normal.step(&mut secs_a);
        blaze.step(&mut secs_b);
        assert!(secs_b[0].ceilingheight > secs_a[0].ceilingheight);
    }

    #[test]
    fn test_platform_round_trip() {
        let mut secs = sectors();
        secs[0].floorheight = 32 * FRACUNIT;
        let mut rng = Rng::new();
        rng.clear(1, CompatLevel::Mbf);
        let mut plat = Platform::new(0, 0, 32 * FRACUNIT);

        let mut done = false;
        for _ in 0..2000 {
            if plat.step(&mut secs, &mut rng) == SpecialStep::Done {
                done = true;
                break;
            }
        }
        assert!(done);
        assert_eq!(secs[0].floorheight, 32 * FRACUNIT);
    }

    #[test]
    fn test_floor_mover_stops_at_dest() {
        let mut secs = sectors();
        let mut floor = FloorMover::new(0, 24 * FRACUNIT);
        let mut last = SpecialStep::Running;
        for _ in 0..100 {
            last = floor.step(&mut secs);
            if last == SpecialStep::Done {
                break;
            }
        }
        assert_eq!(last, SpecialStep::Done);
        assert_eq!(secs[0].floorheight, 24 * FRACUNIT);
    }

    #[test]
    fn test_crusher_reverses() {
        let mut secs = sectors();
        secs[0].ceilingheight = 64 * FRACUNIT;
        let mut crusher = CeilingMover::new(0, 8 * FRACUNIT, 64 * FRACUNIT);
        // Never finishes on its own.
        let mut reached_bottom = false;
        for _ in 0..500 {
            assert_eq!(crusher.step(&mut secs), SpecialStep::Running);
            if secs[0].ceilingheight == 8 * FRACUNIT {
                reached_bottom = true;
            }
        }
        assert!(reached_bottom);
        assert!(secs[0].ceilingheight > 8 * FRACUNIT);
    }

    #[test]
    fn test_light_flicker_uses_lights_class_only() {
        let mut secs = sectors();
        let mut rng = Rng::new();
        rng.clear(9, CompatLevel::Mbf);
        let before = *rng.indices();
        let mut light = LightFlicker::new(0, 255, 64);
        for _ in 0..64 {
            light.step(&mut secs, &mut rng);
        }
        let after = *rng.indices();
        for (i, (&b, &a)) in before.iter().zip(after.iter()).enumerate() {
            if i == RngClass::Lights as usize {
                assert!(a != b);
            } else {
                assert_eq!(a, b);
            }
        }
    }
}
