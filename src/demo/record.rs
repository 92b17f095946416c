//! Demo Recording
//!
//! Owns the growing demo buffer. Cmds are appended as they are
//! consumed by the tic loop, then immediately re-decoded so the
//! simulation runs on exactly the bytes a future playback will see -
//! short-tic rounding included.

use std::path::{Path, PathBuf};

use tracing::info;

use super::codec::{self, DemoHeader};
use super::{DemoError, DEMOMARKER};
use crate::compat::Behavior;
use crate::game::ticcmd::TicCmd;

/// Lower bound of the demo buffer, and the growth step.
pub const MIN_DEMO_SIZE: usize = 128 * 1024;
/// Regrow when fewer than this many bytes remain.
pub const GROW_MARGIN: usize = 16;

/// An in-progress demo recording.
pub struct DemoRecorder {
    buf: Vec<u8>,
    /// Current ceiling; raised in 128 KiB steps.
    maxsize: usize,
    longtics: bool,
    path: PathBuf,
    finished: bool,
}

impl DemoRecorder {
    /// Start recording: allocate the buffer and write the header.
    ///
    /// `maxdemo_kib` is the `-maxdemo` override, clamped below to the
    /// 128 KiB floor.
    pub fn begin(
        name: &str,
        maxdemo_kib: Option<usize>,
        behavior: &Behavior,
        header: &DemoHeader,
        force_longtics: bool,
    ) -> DemoRecorder {
        let maxsize = maxdemo_kib
            .map(|k| k * 1024)
            .unwrap_or(0)
            .max(MIN_DEMO_SIZE);

        let path = unique_demo_name(name);
        let mut buf = Vec::with_capacity(maxsize);
        let longtics = codec::write_header(&mut buf, behavior, header, force_longtics);

        info!(
            "recording demo to {} ({} compatibility, longtics={})",
            path.display(),
            behavior.level.name(),
            longtics
        );

        DemoRecorder {
            buf,
            maxsize,
            longtics,
            path,
            finished: false,
        }
    }

    /// Long angle deltas in use for this recording.
    pub fn longtics(&self) -> bool {
        self.longtics
    }

    /// Where the demo will be written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes recorded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one cmd and read it straight back, so the caller applies
    /// exactly what playback will decode.
    pub fn write_ticcmd(&mut self, cmd: &TicCmd) -> TicCmd {
        let start = self.buf.len();
        codec::encode_ticcmd(&mut self.buf, cmd, self.longtics);

        if self.buf.len() + GROW_MARGIN > self.maxsize {
            // No more space: add another 128K.
            self.maxsize += MIN_DEMO_SIZE;
            self.buf.reserve(self.maxsize - self.buf.len());
        }

        // Make SURE it is exactly the same.
        let mut cur = codec::DemoCursor::new(&self.buf[start..]);
        let mut reread = codec::decode_ticcmd(&mut cur, self.longtics)
            .expect("just-encoded cmd must decode")
            .expect("just-encoded cmd is not a marker");
        reread.consistency = cmd.consistency;
        reread.chatchar = cmd.chatchar;
        reread
    }

    /// Terminate the stream and flush to disk: end marker, footer,
    /// file write. Returns the final path.
    pub fn finish(
        &mut self,
        behavior: &Behavior,
        iwad: &str,
        pwads: &[String],
        dehs: &[String],
    ) -> Result<PathBuf, DemoError> {
        if self.finished {
            return Ok(self.path.clone());
        }
        self.buf.push(DEMOMARKER);
        codec::write_footer(&mut self.buf, behavior, iwad, pwads, dehs);
        std::fs::write(&self.path, &self.buf)?;
        self.finished = true;
        info!("demo written: {} ({} bytes)", self.path.display(), self.buf.len());
        Ok(self.path.clone())
    }

    /// The raw recorded bytes (marker and footer only after finish).
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Current buffer ceiling (grows in 128 KiB steps).
    pub fn maxsize(&self) -> usize {
        self.maxsize
    }
}

/// Pick a non-clobbering file name: `name.lmp`, else `name-00000.lmp`
/// counting up.
fn unique_demo_name(name: &str) -> PathBuf {
    let base = name.strip_suffix(".lmp").unwrap_or(name);
    let plain = PathBuf::from(format!("{}.lmp", base));
    if !plain.exists() {
        return plain;
    }
    for j in 0..=99999u32 {
        let candidate = PathBuf::from(format!("{}-{:05}.lmp", base, j));
        if !candidate.exists() {
            return candidate;
        }
    }
    plain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::resolver::{self, Overrides, UserDefaults};
    use crate::compat::CompatLevel;
    use crate::game::Skill;

    fn recorder(level: CompatLevel) -> (DemoRecorder, Behavior) {
        let mut d = UserDefaults::default();
        d.complevel = level;
        let b = resolver::resolve(&d, None, &Overrides::default(), 7, false);
        let header = DemoHeader {
            version: level.demo_version(false),
            level,
            longtics: false,
            skill: Skill::Medium,
            episode: 1,
            map: 1,
            deathmatch: 0,
            consoleplayer: 0,
            playeringame: [true, false, false, false],
            umapinfo_map: None,
        };
        let name = format!(
            "{}/stygia-test-{}-{:?}",
            std::env::temp_dir().display(),
            std::process::id(),
            level
        );
        (
            DemoRecorder::begin(&name, None, &b, &header, false),
            b,
        )
    }

    #[test]
    fn test_reread_matches_shortics_rounding() {
        let (mut rec, _) = recorder(CompatLevel::Mbf);
        assert!(!rec.longtics());
        let cmd = TicCmd {
            forwardmove: 10,
            angleturn: 0x1280,
            ..Default::default()
        };
        let reread = rec.write_ticcmd(&cmd);
        // The cmd the sim applies carries the rounded angle.
        assert_eq!(reread.angleturn, 0x1300);
        assert_eq!(reread.forwardmove, 10);
    }

    #[test]
    fn test_growth_policy_floor_and_step() {
        let (rec, _) = recorder(CompatLevel::Boom);
        assert_eq!(rec.maxsize(), MIN_DEMO_SIZE);

        // -maxdemo below the floor clamps up.
        let mut d = UserDefaults::default();
        d.complevel = CompatLevel::Boom;
        let b = resolver::resolve(&d, None, &Overrides::default(), 7, false);
        let header = DemoHeader {
            version: 202,
            level: CompatLevel::Boom,
            longtics: false,
            skill: Skill::Medium,
            episode: 1,
            map: 1,
            deathmatch: 0,
            consoleplayer: 0,
            playeringame: [true, false, false, false],
            umapinfo_map: None,
        };
        let name = format!(
            "{}/stygia-test-grow-{}",
            std::env::temp_dir().display(),
            std::process::id()
        );
        let rec = DemoRecorder::begin(&name, Some(4), &b, &header, false);
        assert_eq!(rec.maxsize(), MIN_DEMO_SIZE);
    }

    #[test]
    fn test_regrow_at_sixteen_byte_margin() {
        let (mut rec, _) = recorder(CompatLevel::Mbf);
        let cmd = TicCmd::default();
        // Fill until just under the margin triggers the bump.
        while rec.len() + GROW_MARGIN <= MIN_DEMO_SIZE && rec.maxsize() == MIN_DEMO_SIZE {
            rec.write_ticcmd(&cmd);
        }
        assert_eq!(rec.maxsize(), 2 * MIN_DEMO_SIZE);
        // And writes keep working after the regrow.
        rec.write_ticcmd(&cmd);
    }

    #[test]
    fn test_finish_appends_marker_and_footer() {
        let (mut rec, b) = recorder(CompatLevel::Mbf);
        rec.write_ticcmd(&TicCmd::default());
        let path = rec
            .finish(&b, "DOOM2.WAD", &[], &[])
            .expect("finish writes");
        let bytes = std::fs::read(&path).unwrap();
        let text_start = bytes
            .iter()
            .position(|&x| x == DEMOMARKER)
            .expect("marker present");
        let footer = String::from_utf8_lossy(&bytes[text_start + 1..]);
        assert!(footer.contains("-complevel mbf"));
        std::fs::remove_file(path).ok();
    }
}
