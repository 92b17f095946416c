//! Thinker Arena
//!
//! Every animated entity - map objects, moving planes, lights,
//! scrollers - is a *thinker*: it advances one step per tic. Thinkers
//! live in a generational arena; a [`ThinkerId`] packs a generation in
//! the high 32 bits and a slot index in the low 32, so stale handles
//! (targets of removed monsters, for example) are detected on every
//! dereference instead of dangling.
//!
//! Lifecycle rules the rest of the simulation relies on:
//! - thinkers spawned during a tic are not in that tic's iteration
//!   snapshot, so they first run on the next tic;
//! - removal only marks; the actual free happens in the end-of-tic
//!   sweep, after all stepping is done, so removal order can never
//!   perturb the random-number sequence.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::mobj::Mobj;
use super::specials::{CeilingMover, Door, FloorMover, LightFlicker, Platform, Pusher, Scroller};

/// A generational thinker handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThinkerId(u64);

impl ThinkerId {
    #[inline]
    fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw u64 form, used by the save serializer.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from the raw form.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for ThinkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThinkerId({}v{})", self.index(), self.generation())
    }
}

/// The thinker variants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Think {
    Mobj(Mobj),
    Door(Door),
    Plat(Platform),
    Ceiling(CeilingMover),
    Floor(FloorMover),
    Light(LightFlicker),
    Scroller(Scroller),
    Pusher(Pusher),
}

impl Think {
    /// The mobj payload, if this is a map object.
    pub fn as_mobj(&self) -> Option<&Mobj> {
        match self {
            Think::Mobj(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable mobj payload.
    pub fn as_mobj_mut(&mut self) -> Option<&mut Mobj> {
        match self {
            Think::Mobj(m) => Some(m),
            _ => None,
        }
    }
}

/// The thinker list: arena slots plus the spawn-order index the tic
/// loop iterates in.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Thinkers {
    slots: Vec<Option<Think>>,
    generations: Vec<u32>,
    /// Recyclable slot indices (FIFO so generations spread out).
    free: VecDeque<u32>,
    /// Live ids in spawn order; this IS the deterministic iteration
    /// order.
    order: Vec<ThinkerId>,
    /// Marked for removal, swept at the tic boundary.
    pending_remove: Vec<ThinkerId>,
}

impl Thinkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live thinkers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Add a thinker; it becomes part of the iteration order
    /// immediately but is only reached by snapshots taken after this
    /// call (i.e. next tic).
    pub fn spawn(&mut self, think: Think) -> ThinkerId {
        let id = if let Some(index) = self.free.pop_front() {
            self.slots[index as usize] = Some(think);
            ThinkerId::new(index, self.generations[index as usize])
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(think));
            self.generations.push(0);
            ThinkerId::new(index, 0)
        };
        self.order.push(id);
        id
    }

    /// True if `id` still refers to a live thinker.
    pub fn contains(&self, id: ThinkerId) -> bool {
        let idx = id.index() as usize;
        idx < self.slots.len()
            && self.generations[idx] == id.generation()
            && self.slots[idx].is_some()
    }

    /// Resolve a handle. Stale or removed handles yield `None`; the
    /// caller treats that as "referent gone" and clears its back-ref.
    pub fn get(&self, id: ThinkerId) -> Option<&Think> {
        let idx = id.index() as usize;
        if idx >= self.slots.len() || self.generations[idx] != id.generation() {
            return None;
        }
        self.slots[idx].as_ref()
    }

    /// Mutable resolve.
    pub fn get_mut(&mut self, id: ThinkerId) -> Option<&mut Think> {
        let idx = id.index() as usize;
        if idx >= self.slots.len() || self.generations[idx] != id.generation() {
            return None;
        }
        self.slots[idx].as_mut()
    }

    /// Resolve a handle expected to be a mobj.
    pub fn mobj(&self, id: ThinkerId) -> Option<&Mobj> {
        self.get(id).and_then(Think::as_mobj)
    }

    /// Mutable mobj resolve.
    pub fn mobj_mut(&mut self, id: ThinkerId) -> Option<&mut Mobj> {
        self.get_mut(id).and_then(Think::as_mobj_mut)
    }

    /// Mark a thinker for removal at the next sweep. Marking twice is
    /// harmless; marking a stale id is ignored.
    pub fn mark_remove(&mut self, id: ThinkerId) {
        if self.contains(id) && !self.pending_remove.contains(&id) {
            self.pending_remove.push(id);
        }
    }

    /// Free everything marked since the last sweep. Called exactly
    /// once per tic, after all thinkers have stepped.
    pub fn sweep(&mut self) {
        if self.pending_remove.is_empty() {
            return;
        }
        for id in std::mem::take(&mut self.pending_remove) {
            let idx = id.index() as usize;
            if self.generations[idx] != id.generation() {
                continue;
            }
            self.slots[idx] = None;
            // Bump the generation so outstanding handles go stale.
            self.generations[idx] = self.generations[idx].wrapping_add(1);
            self.free.push_back(id.index());
        }
        let slots = &self.slots;
        self.order.retain(|id| slots[id.index() as usize].is_some());
    }

    /// Iteration snapshot for this tic: the ids live right now, in
    /// spawn order.
    pub fn snapshot(&self) -> Vec<ThinkerId> {
        self.order.clone()
    }

    /// Iterate live thinkers in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = (ThinkerId, &Think)> {
        self.order
            .iter()
            .filter_map(move |&id| self.get(id).map(|t| (id, t)))
    }

    /// Iterate live mobjs in spawn order.
    pub fn mobjs(&self) -> impl Iterator<Item = (ThinkerId, &Mobj)> {
        self.iter().filter_map(|(id, t)| t.as_mobj().map(|m| (id, m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mobj::{Mobj, MobjType};

    fn mobj() -> Think {
        Think::Mobj(Mobj::new(MobjType::Barrel, 0, 0, 0))
    }

    #[test]
    fn test_spawn_and_resolve() {
        let mut th = Thinkers::new();
        let id = th.spawn(mobj());
        assert!(th.contains(id));
        assert!(th.mobj(id).is_some());
        assert_eq!(th.len(), 1);
    }

    #[test]
    fn test_stale_handle_detection() {
        let mut th = Thinkers::new();
        let id = th.spawn(mobj());
        th.mark_remove(id);
        // Marked but not yet swept: still resolvable this tic.
        assert!(th.contains(id));

        th.sweep();
        assert!(!th.contains(id));
        assert!(th.get(id).is_none());

        // The slot is recycled with a new generation; the old handle
        // stays stale.
        let id2 = th.spawn(mobj());
        assert_eq!(id2.index(), id.index());
        assert_ne!(id2.generation(), id.generation());
        assert!(th.get(id).is_none());
        assert!(th.get(id2).is_some());
    }

    #[test]
    fn test_snapshot_excludes_mid_tic_spawns() {
        let mut th = Thinkers::new();
        let a = th.spawn(mobj());
        let snap = th.snapshot();
        let b = th.spawn(mobj());

        assert_eq!(snap, vec![a]);
        assert!(th.contains(b));
        // Next snapshot sees both, in spawn order.
        assert_eq!(th.snapshot(), vec![a, b]);
    }

    #[test]
    fn test_sweep_preserves_order() {
        let mut th = Thinkers::new();
        let a = th.spawn(mobj());
        let b = th.spawn(mobj());
        let c = th.spawn(mobj());
        th.mark_remove(b);
        th.sweep();
        assert_eq!(th.snapshot(), vec![a, c]);

        // Recycled slot appends at the end of the order.
        let d = th.spawn(mobj());
        assert_eq!(d.index(), b.index());
        assert_eq!(th.snapshot(), vec![a, c, d]);
    }

    #[test]
    fn test_double_mark_is_harmless() {
        let mut th = Thinkers::new();
        let a = th.spawn(mobj());
        th.mark_remove(a);
        th.mark_remove(a);
        th.sweep();
        assert_eq!(th.len(), 0);
        th.sweep();
        assert_eq!(th.len(), 0);
    }
}
