//! # Stygia Simulation Core
//!
//! Deterministic fixed-tic simulation core for the Stygia source port.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       STYGIA CORE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                 │
//! │  ├── fixed.rs    - 16.16 fixed-point arithmetic             │
//! │  ├── angle.rs    - BAM angles and trig tables               │
//! │  └── rng.rs      - Class-indexed deterministic PRNG         │
//! │                                                             │
//! │  compat/         - Compatibility-level resolver             │
//! │                                                             │
//! │  game/           - Tic loop, input, players, thinkers       │
//! │  ├── ticcmd.rs   - The per-player per-tic input record      │
//! │  ├── input.rs    - Local ticcmd construction                │
//! │  ├── ticker.rs   - The per-frame ticker                     │
//! │  └── ...         - Dispatcher, simulation, rewind           │
//! │                                                             │
//! │  demo/           - Versioned demo record/playback codec     │
//! │  save/           - Forward-only checksummed save stream     │
//! │                                                             │
//! │  net/            - Consistency sync and cmd transport       │
//! │                    (transport is non-deterministic; the     │
//! │                    simulation only ever sees merged cmds)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/`, `compat/`, `game/`, `demo/` and `save/` modules are
//! **100% deterministic**:
//! - No floating-point arithmetic in simulation state transitions
//! - No system time dependencies inside a tic
//! - All randomness from the seeded, class-indexed PRNG
//!
//! Given identical WADs, options and ticcmds, the simulation produces
//! identical per-tic consistency words on any platform.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod compat;
pub mod core;
pub mod demo;
pub mod game;
pub mod net;
pub mod options;
pub mod save;
pub mod wad;

// Re-export commonly used types
pub use crate::compat::{Behavior, CompatLevel};
pub use crate::core::fixed::{Fixed, FRACBITS, FRACUNIT};
pub use crate::core::rng::{Rng, RngClass};
pub use crate::game::ticcmd::TicCmd;
pub use crate::game::Game;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name, as written into demo footers and savegame version strings.
pub const ENGINE_NAME: &str = "Stygia";

/// Simulation tick rate (Hz). Every duration in the core is counted in tics.
pub const TICRATE: u32 = 35;

/// Number of tics of ticcmd backlog kept for net games and consistency
/// checking. Must be a power of two.
pub const BACKUPTICS: usize = 128;

/// Number of player slots in the simulation.
pub const MAXPLAYERS: usize = 4;

/// Number of playeringame bytes stored in demos and savegames, so the
/// formats survive a future MAXPLAYERS bump.
pub const MIN_MAXPLAYERS: usize = 32;
