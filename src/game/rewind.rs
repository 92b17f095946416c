//! Rewind Keyframes
//!
//! A bounded queue of world snapshots captured on an interval, newest
//! first. The `Rewind` game action pops back to the most recent frame
//! older than one interval; the tic-0 frame is never discarded so the
//! level start stays reachable. Capturing that turns slow disables
//! itself rather than dragging the tic rate down.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::world::Level;
use crate::core::rng::Rng;
use crate::TICRATE;

/// One rewind snapshot.
#[derive(Clone, Serialize, Deserialize)]
pub struct Keyframe {
    pub tic: u32,
    pub leveltime: u32,
    /// bincode blob of the level + RNG, kept opaque so the queue stays
    /// cheap to shuffle.
    pub data: Vec<u8>,
}

/// Serialized payload of a keyframe.
#[derive(Serialize, Deserialize)]
struct KeyframePayload {
    level: Level,
    rng: Rng,
}

/// User-tunable rewind settings (config file).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindConfig {
    /// Capture interval in milliseconds of game time.
    pub interval_ms: u32,
    /// Number of key frames kept.
    pub depth: usize,
    /// Capture-time budget in milliseconds; exceeded = disable.
    pub timeout_ms: u32,
    /// Store frames automatically.
    pub auto: bool,
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            depth: 60,
            timeout_ms: 10,
            auto: true,
        }
    }
}

/// The keyframe queue.
#[derive(Default)]
pub struct Rewind {
    pub config: RewindConfig,
    frames: VecDeque<Keyframe>,
    current_tic: u32,
    disabled: bool,
}

impl Rewind {
    pub fn new(config: RewindConfig) -> Rewind {
        Rewind {
            config,
            frames: VecDeque::new(),
            current_tic: 0,
            disabled: false,
        }
    }

    fn interval_tics(&self) -> u32 {
        (TICRATE * self.config.interval_ms / 1000).max(1)
    }

    /// Number of stored frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Rewind capture disabled (slow machine or by config).
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Called once per simulated tic; captures on the interval.
    ///
    /// `capture_cost_ms` reports how long the previous capture took,
    /// measured by the platform layer; exceeding the budget disables
    /// further captures with a one-shot notice (the returned flag).
    pub fn auto_keyframe(
        &mut self,
        level: &Level,
        rng: &Rng,
        leveltime: u32,
        capture_cost_ms: impl FnOnce() -> u32,
    ) -> bool {
        if !self.config.auto || self.disabled {
            self.current_tic += 1;
            return false;
        }

        let mut just_disabled = false;
        if self.current_tic % self.interval_tics() == 0 {
            self.push(Keyframe {
                tic: self.current_tic,
                leveltime,
                data: encode_payload(level, rng),
            });
            if capture_cost_ms() > self.config.timeout_ms {
                self.disabled = true;
                just_disabled = true;
            }
        }

        self.current_tic += 1;
        just_disabled
    }

    fn push(&mut self, frame: Keyframe) {
        // Drop the oldest when full, except the tic-0 anchor.
        if self.frames.len() == self.config.depth {
            let back_is_anchor = self.frames.back().map(|f| f.tic == 0).unwrap_or(false);
            if back_is_anchor && self.frames.len() >= 2 {
                let idx = self.frames.len() - 2;
                self.frames.remove(idx);
            } else {
                self.frames.pop_back();
            }
        }
        self.frames.push_front(frame);
    }

    /// Pop the frame to restore: the newest one at least a full
    /// interval older than now. The tic-0 frame is re-queued instead
    /// of consumed.
    pub fn pop_restore(&mut self) -> Option<Keyframe> {
        let interval = self.interval_tics();
        while let Some(frame) = self.frames.pop_front() {
            if frame.tic > 0 && self.current_tic.saturating_sub(frame.tic) < interval {
                continue;
            }
            if frame.tic == 0 {
                self.frames.push_front(frame.clone());
            }
            self.current_tic = frame.tic;
            return Some(frame);
        }
        None
    }

    /// Restore a popped keyframe into live state.
    pub fn restore(frame: &Keyframe) -> Option<(Level, Rng)> {
        let payload: KeyframePayload = bincode::deserialize(&frame.data).ok()?;
        Some((payload.level, payload.rng))
    }

    /// Drop everything (level transition).
    pub fn reset(&mut self) {
        self.frames.clear();
        self.current_tic = 0;
        self.disabled = false;
    }
}

fn encode_payload(level: &Level, rng: &Rng) -> Vec<u8> {
    bincode::serialize(&KeyframePayload {
        level: level.clone(),
        rng: rng.clone(),
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::{resolver, CompatLevel, UserDefaults};
    use crate::game::world::LevelDef;
    use crate::game::Skill;

    fn level() -> Level {
        let mut d = UserDefaults::default();
        d.complevel = CompatLevel::Mbf;
        let b = resolver::resolve(&d, None, &resolver::Overrides::default(), 0, false);
        Level::load(&LevelDef::demo_arena(), Skill::Medium, &b, false).0
    }

    fn rng() -> Rng {
        let mut r = Rng::new();
        r.clear(99, CompatLevel::Mbf);
        r
    }

    #[test]
    fn test_capture_on_interval() {
        let mut rw = Rewind::new(RewindConfig {
            interval_ms: 1000,
            depth: 8,
            timeout_ms: 100,
            auto: true,
        });
        let level = level();
        let rng = rng();
        for _ in 0..TICRATE * 3 {
            rw.auto_keyframe(&level, &rng, 0, || 0);
        }
        assert_eq!(rw.len(), 3);
    }

    #[test]
    fn test_depth_bound_keeps_anchor() {
        let mut rw = Rewind::new(RewindConfig {
            interval_ms: 1000,
            depth: 4,
            timeout_ms: 100,
            auto: true,
        });
        let level = level();
        let rng = rng();
        for _ in 0..TICRATE * 20 {
            rw.auto_keyframe(&level, &rng, 0, || 0);
        }
        assert_eq!(rw.len(), 4);
        // The tic-0 anchor survives the churn.
        let mut frames = Vec::new();
        while let Some(f) = rw.pop_restore() {
            let tic = f.tic;
            frames.push(tic);
            if tic == 0 {
                break;
            }
        }
        assert_eq!(frames.last(), Some(&0));
    }

    #[test]
    fn test_restore_roundtrip() {
        let mut rw = Rewind::new(RewindConfig::default());
        let level = level();
        let rng = rng();
        rw.auto_keyframe(&level, &rng, 0, || 0);
        // Advance past one interval so the frame is eligible.
        for _ in 0..rw.interval_tics() + 1 {
            rw.current_tic += 1;
        }
        let frame = rw.pop_restore().expect("frame");
        let (restored_level, restored_rng) = Rewind::restore(&frame).expect("decode");
        assert_eq!(restored_level.thinkers.len(), level.thinkers.len());
        assert_eq!(restored_rng, rng);
    }

    #[test]
    fn test_slow_capture_disables() {
        let mut rw = Rewind::new(RewindConfig {
            timeout_ms: 5,
            ..Default::default()
        });
        let level = level();
        let rng = rng();
        let disabled_now = rw.auto_keyframe(&level, &rng, 0, || 50);
        assert!(disabled_now);
        assert!(rw.disabled());
        // Further calls store nothing and stay quiet.
        assert!(!rw.auto_keyframe(&level, &rng, 0, || 50));
        assert_eq!(rw.len(), 1);
    }
}
