//! Savegame Serialization
//!
//! A save is one forward-only byte stream: description, version,
//! compatibility, the WAD signature binding the save to its WAD set,
//! the options block, then the archived world, checked by a marker
//! byte. Reading is strictly sequential; there are no offsets to seek
//! to and no struct punning.

use thiserror::Error;

pub mod cursor;
pub mod serializer;

pub use cursor::{SaveReader, SaveWriter};

/// Save codec failures.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The stream ended early.
    #[error("unexpected end of savegame")]
    UnexpectedEof,

    /// The trailing consistency marker is wrong: corrupt stream.
    #[error("bad savegame marker (expected {expected:#x}, got {got:#x})")]
    BadMarker { expected: u8, got: u8 },

    /// Version string mismatch without a usable compat byte.
    /// User-recoverable via forced load.
    #[error("different savegame version")]
    VersionMismatch,

    /// WAD signature mismatch: the save belongs to another WAD set.
    /// User-recoverable via forced load.
    #[error("incompatible savegame")]
    WrongSignature { expected: u64, got: u64 },

    /// A structural field held an impossible value.
    #[error("corrupt savegame field: {0}")]
    Corrupt(&'static str),

    #[error("savegame i/o error: {0}")]
    Io(#[from] std::io::Error),
}
