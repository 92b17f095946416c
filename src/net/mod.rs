//! Networking
//!
//! The sync module is deterministic bookkeeping: which tics are
//! complete, how many to run, how `ticdup` replication behaves. The
//! transport (WebSocket server/client) is **non-deterministic** and
//! only ever moves `TicCmd` bytes; the simulation never sees it.

pub mod client;
pub mod protocol;
pub mod server;
pub mod sync;

pub use protocol::{ClientMessage, GameSettings, ServerMessage};
pub use sync::{CmdTransport, GameClock, NetEvent, NetSync};
