//! Demo Playback
//!
//! Substitutes decoded tic records for the net layer. The header has
//! already reconfigured the behavior vector by the time the first cmd
//! is read; from there playback is a pure byte-stream walk until the
//! end marker.

use tracing::info;

use super::codec::{self, DemoHeader};
use super::{DemoError, DEMOMARKER};
use crate::compat::Behavior;
use crate::game::ticcmd::TicCmd;

/// Minimum bytes a demo lump can hold and still carry a header.
const MIN_DEMO_LUMP: usize = 0xd;

/// An in-progress demo playback.
pub struct DemoPlayback {
    data: Vec<u8>,
    pos: usize,
    longtics: bool,
    /// Parsed header; absent for raw tic streams fed by tests.
    pub header: Option<DemoHeader>,
    finished: bool,
}

impl DemoPlayback {
    /// Parse the header and stand ready to read tics.
    ///
    /// The behavior vector is overwritten by the header's recorded
    /// level and options (the demo is the highest-precedence
    /// resolution layer).
    pub fn parse(
        data: Vec<u8>,
        behavior: &mut Behavior,
        beta_allowed: bool,
    ) -> Result<DemoPlayback, DemoError> {
        // Ignore too-short demo lumps.
        if data.len() < MIN_DEMO_LUMP {
            return Err(DemoError::Truncated);
        }

        let (header, pos) = {
            let mut cur = codec::DemoCursor::new(&data);
            let header = codec::read_header(&mut cur, behavior, beta_allowed)?;
            (header, cur.pos())
        };

        info!(
            "playing demo with {} ({}) compatibility",
            behavior.level.name(),
            header.version
        );

        Ok(DemoPlayback {
            data,
            pos,
            longtics: header.longtics,
            header: Some(header),
            finished: false,
        })
    }

    /// Wrap a raw tic stream with no header. Test and join-demo use.
    pub fn from_tic_bytes(data: Vec<u8>, longtics: bool) -> DemoPlayback {
        DemoPlayback {
            data,
            pos: 0,
            longtics,
            header: None,
            finished: false,
        }
    }

    /// Long angle deltas in use.
    pub fn longtics(&self) -> bool {
        self.longtics
    }

    /// True once the end marker (or end of lump) was reached.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Read the next cmd.
    ///
    /// `Ok(None)` is the clean end of stream (marker or lump end);
    /// a truncated record mid-stream is an error and aborts playback.
    pub fn read_ticcmd(&mut self) -> Result<Option<TicCmd>, DemoError> {
        if self.finished {
            return Ok(None);
        }
        if self.pos >= self.data.len() || self.data[self.pos] == DEMOMARKER {
            self.finished = true;
            return Ok(None);
        }
        let mut cur = codec::DemoCursor::new(&self.data[self.pos..]);
        match codec::decode_ticcmd(&mut cur, self.longtics) {
            Ok(Some(cmd)) => {
                self.pos += cur.pos();
                Ok(Some(cmd))
            }
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Bytes of tic records remaining (approximate until the marker).
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::resolver::{self, Overrides, UserDefaults};
    use crate::compat::CompatLevel;
    use crate::game::Skill;

    fn behavior(level: CompatLevel) -> Behavior {
        let mut d = UserDefaults::default();
        d.complevel = level;
        resolver::resolve(&d, None, &Overrides::default(), 11, false)
    }

    fn demo_bytes(level: CompatLevel, tics: &[TicCmd], with_marker: bool) -> Vec<u8> {
        let b = behavior(level);
        let header = DemoHeader {
            version: level.demo_version(false),
            level,
            longtics: level == CompatLevel::Mbf21,
            skill: Skill::Medium,
            episode: 1,
            map: 2,
            deathmatch: 0,
            consoleplayer: 0,
            playeringame: [true, false, false, false],
            umapinfo_map: None,
        };
        let mut buf = Vec::new();
        let longtics = codec::write_header(&mut buf, &b, &header, false);
        for cmd in tics {
            codec::encode_ticcmd(&mut buf, cmd, longtics);
        }
        if with_marker {
            buf.push(DEMOMARKER);
        }
        buf
    }

    #[test]
    fn test_playback_reads_recorded_tics() {
        let tics = vec![
            TicCmd {
                forwardmove: 25,
                ..Default::default()
            },
            TicCmd {
                sidemove: -10,
                ..Default::default()
            },
        ];
        let bytes = demo_bytes(CompatLevel::Mbf, &tics, true);
        let mut b = behavior(CompatLevel::Boom);
        let mut pb = DemoPlayback::parse(bytes, &mut b, false).unwrap();
        assert_eq!(b.level, CompatLevel::Mbf);

        let first = pb.read_ticcmd().unwrap().unwrap();
        assert_eq!(first.forwardmove, 25);
        let second = pb.read_ticcmd().unwrap().unwrap();
        assert_eq!(second.sidemove, -10);
        assert!(pb.read_ticcmd().unwrap().is_none());
        assert!(pb.finished());
    }

    #[test]
    fn test_marker_only_demo_is_valid_empty() {
        let bytes = demo_bytes(CompatLevel::Mbf21, &[], true);
        let mut b = behavior(CompatLevel::Boom);
        let mut pb = DemoPlayback::parse(bytes, &mut b, false).unwrap();
        assert!(pb.read_ticcmd().unwrap().is_none());
        assert!(pb.finished());
    }

    #[test]
    fn test_lump_end_without_marker_ends_cleanly() {
        let tics = vec![TicCmd::default()];
        let bytes = demo_bytes(CompatLevel::Boom, &tics, false);
        let mut b = behavior(CompatLevel::Boom);
        let mut pb = DemoPlayback::parse(bytes, &mut b, false).unwrap();
        assert!(pb.read_ticcmd().unwrap().is_some());
        assert!(pb.read_ticcmd().unwrap().is_none());
    }

    #[test]
    fn test_too_short_lump_rejected() {
        let mut b = behavior(CompatLevel::Boom);
        assert!(matches!(
            DemoPlayback::parse(vec![109, 2, 1], &mut b, false),
            Err(DemoError::Truncated)
        ));
    }

    #[test]
    fn test_finished_sticks() {
        let bytes = demo_bytes(CompatLevel::Mbf, &[], true);
        let mut b = behavior(CompatLevel::Mbf);
        let mut pb = DemoPlayback::parse(bytes, &mut b, false).unwrap();
        assert!(pb.read_ticcmd().unwrap().is_none());
        assert!(pb.read_ticcmd().unwrap().is_none());
    }
}
