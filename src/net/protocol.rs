//! Protocol Messages
//!
//! Wire format for the cmd relay. Messages are bincode-serialized
//! into binary WebSocket frames; the payloads are plain serde types
//! so the format stays explicit and versionable.

use serde::{Deserialize, Serialize};

use crate::game::ticcmd::TicCmd;
use crate::game::Skill;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Introduce this peer.
    Join {
        name: String,
        /// Engine version string; mismatches are refused.
        version: String,
        /// Drone peers observe without generating cmds.
        drone: bool,
    },

    /// Local cmds starting at `starttic`. `extratics` older cmds are
    /// resent ahead of the new one to ride out packet loss.
    Cmds { starttic: u32, cmds: Vec<TicCmd> },

    /// Orderly departure.
    Quit,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Join accepted; the slot and the game parameters everyone must
    /// run with.
    Accepted { player: u8, settings: GameSettings },

    /// Join refused with a reason.
    Refused { reason: String },

    /// All expected players are in; start the simulation.
    Start,

    /// The merged cmds for one tic.
    CmdSet {
        tic: u32,
        cmds: Vec<TicCmd>,
        ingame: Vec<bool>,
    },

    /// A peer left; its slot goes quiet.
    PlayerLeft { player: u8 },
}

/// The parameters a netgame must agree on before the first tic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub ticdup: u32,
    pub extratics: u32,
    pub new_sync: bool,
    pub deathmatch: bool,
    pub skill: Skill,
    pub episode: u32,
    pub map: u32,
    pub rngseed: u32,
    /// Demo-version id of the agreed compatibility level.
    pub complevel: u8,
    pub nomonsters: bool,
    pub respawn: bool,
    pub fast: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            ticdup: 1,
            extratics: 1,
            new_sync: true,
            deathmatch: false,
            skill: Skill::Medium,
            episode: 1,
            map: 1,
            rngseed: 0,
            complevel: 221,
            nomonsters: false,
            respawn: false,
            fast: false,
        }
    }
}

/// Serialize a message into a binary frame.
pub fn encode<T: Serialize>(msg: &T) -> Vec<u8> {
    bincode::serialize(msg).unwrap_or_default()
}

/// Parse a binary frame; `None` on malformed input (the connection
/// gets dropped, the simulation never sees it).
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Option<T> {
    bincode::deserialize(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip() {
        let msg = ClientMessage::Cmds {
            starttic: 42,
            cmds: vec![TicCmd {
                forwardmove: 25,
                angleturn: -640,
                ..Default::default()
            }],
        };
        let bytes = encode(&msg);
        let back: ClientMessage = decode(&bytes).expect("decode");
        match back {
            ClientMessage::Cmds { starttic, cmds } => {
                assert_eq!(starttic, 42);
                assert_eq!(cmds.len(), 1);
                assert_eq!(cmds[0].forwardmove, 25);
                assert_eq!(cmds[0].angleturn, -640);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_settings_roundtrip() {
        let msg = ServerMessage::Accepted {
            player: 2,
            settings: GameSettings {
                ticdup: 3,
                rngseed: 0xdeadbeef,
                ..Default::default()
            },
        };
        let bytes = encode(&msg);
        let back: ServerMessage = decode(&bytes).expect("decode");
        match back {
            ServerMessage::Accepted { player, settings } => {
                assert_eq!(player, 2);
                assert_eq!(settings.ticdup, 3);
                assert_eq!(settings.rngseed, 0xdeadbeef);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_frame_rejected() {
        assert!(decode::<ServerMessage>(&[0xff; 3]).is_none());
    }
}
