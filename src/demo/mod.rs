//! Demo Record/Playback
//!
//! The versioned binary demo format: a header naming the engine
//! lineage and its behavior options, one compact record per tic, a
//! `0x80` end marker, and a text footer identifying the recording
//! setup. Playback substitutes decoded cmds for the net layer;
//! recording encodes the merged cmds as they are consumed.

use thiserror::Error;

pub mod codec;
pub mod playback;
pub mod record;

pub use codec::DemoHeader;
pub use playback::DemoPlayback;
pub use record::DemoRecorder;

/// Sentinel byte marking the end of the per-tic stream.
pub const DEMOMARKER: u8 = 0x80;

/// Demo codec failures. Any of these aborts playback and returns to
/// the title screen.
#[derive(Debug, Error)]
pub enum DemoError {
    /// The version byte names a lineage this engine does not emulate.
    #[error("unknown demo format {0}")]
    UnknownFormat(u8),

    /// The lump ended before the header or a tic record did.
    #[error("truncated demo lump")]
    Truncated,

    /// A Boom/MBF-family demo without its magic signature bytes.
    #[error("bad demo signature")]
    BadSignature,

    /// Extended header present but malformed.
    #[error("extended demo format found, but \"PR+UM\" string not found")]
    BadExtension,

    /// Beta-emulation demo without `-beta` on the command line.
    #[error("the -beta option is required to play back beta emulation demos")]
    BetaRequired,

    /// MBF21 comp vector longer than this engine knows.
    #[error("encountered unknown mbf21 compatibility options")]
    UnknownCompOptions,

    #[error("demo i/o error: {0}")]
    Io(#[from] std::io::Error),
}
