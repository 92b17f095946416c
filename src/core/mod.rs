//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform
//! determinism. Every value the simulation touches flows through the
//! fixed-point math, the BAM angle tables, or the class-indexed PRNG
//! defined here.

pub mod angle;
pub mod fixed;
pub mod rng;

// Re-export core types
pub use self::angle::{Angle, ANG180, ANG45, ANG90};
pub use self::fixed::{Fixed, FRACBITS, FRACUNIT};
pub use self::rng::{Rng, RngClass};
