//! WebSocket Cmd Relay Server
//!
//! The authoritative merge point for netgames: accepts peers, agrees
//! the game settings, then relays merged per-tic cmd sets. The server
//! never simulates; it only merges and forwards, so a slow peer can
//! stall its own view without desyncing anyone.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::protocol::{decode, encode, ClientMessage, GameSettings, ServerMessage};
use crate::game::ticcmd::TicCmd;
use crate::MAXPLAYERS;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Players to wait for before starting.
    pub min_players: usize,
    /// Refuse peers beyond this count (observers still connect as
    /// drones).
    pub max_players: usize,
    /// The settings every peer must run with.
    pub settings: GameSettings,
    /// Unlisted server (direct connections only).
    pub private: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:2342".parse().expect("static addr"),
            min_players: 2,
            max_players: MAXPLAYERS,
            settings: GameSettings::default(),
            private: false,
        }
    }
}

/// A connected peer.
struct Peer {
    /// Player slot; `None` for drones.
    slot: Option<u8>,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Merge state for the in-flight tics.
#[derive(Default)]
struct MergeState {
    /// Received cmds per tic, keyed so old tics drain in order.
    pending: BTreeMap<u32, [Option<TicCmd>; MAXPLAYERS]>,
    ingame: [bool; MAXPLAYERS],
    started: bool,
    /// Next tic to broadcast.
    next_tic: u32,
}

struct Shared {
    config: ServerConfig,
    peers: Mutex<Vec<Peer>>,
    merge: Mutex<MergeState>,
}

/// The relay server. `run` blocks on the accept loop.
pub struct GameServer {
    shared: Arc<Shared>,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> GameServer {
        GameServer {
            shared: Arc::new(Shared {
                config,
                peers: Mutex::new(Vec::new()),
                merge: Mutex::new(MergeState::default()),
            }),
        }
    }

    /// Accept and serve peers until the process exits.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.shared.config.bind_addr).await?;
        info!(
            "cmd relay listening on {} ({} players to start)",
            self.shared.config.bind_addr, self.shared.config.min_players
        );

        loop {
            let (stream, addr) = listener.accept().await?;
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(shared, stream, addr).await {
                    debug!("peer {} closed: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    shared: Arc<Shared>,
    stream: TcpStream,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Writer task: everything queued for this peer goes out in order.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx
                .send(Message::Binary(encode(&msg)))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let mut my_index: Option<usize> = None;

    while let Some(frame) = ws_rx.next().await {
        let frame = frame?;
        let Message::Binary(bytes) = frame else {
            continue;
        };
        let Some(msg) = decode::<ClientMessage>(&bytes) else {
            warn!("undecodable frame from {}; dropping peer", addr);
            break;
        };

        match msg {
            ClientMessage::Join {
                name,
                version,
                drone,
            } => {
                if version != crate::VERSION {
                    let _ = tx.send(ServerMessage::Refused {
                        reason: format!(
                            "version mismatch: server {} client {}",
                            crate::VERSION,
                            version
                        ),
                    });
                    break;
                }

                // Lock order is always merge before peers; the slot
                // assignment needs only the peer list.
                let (slot, player_count) = {
                    let mut peers = shared.peers.lock().await;
                    let players = peers.iter().filter(|p| p.slot.is_some()).count();
                    let slot = if drone || players >= shared.config.max_players {
                        None
                    } else {
                        Some(players as u8)
                    };
                    my_index = Some(peers.len());
                    peers.push(Peer {
                        slot,
                        sender: tx.clone(),
                    });
                    (slot, peers.iter().filter(|p| p.slot.is_some()).count())
                };

                info!(
                    "{} joined from {} as {}",
                    name,
                    addr,
                    slot.map(|s| format!("player {}", s + 1))
                        .unwrap_or_else(|| "drone".into())
                );

                let _ = tx.send(ServerMessage::Accepted {
                    player: slot.unwrap_or(u8::MAX),
                    settings: shared.config.settings.clone(),
                });

                // Enough players: mark slots live and start everyone.
                if player_count >= shared.config.min_players {
                    let mut merge = shared.merge.lock().await;
                    if !merge.started {
                        merge.started = true;
                        let peers = shared.peers.lock().await;
                        for p in peers.iter() {
                            if let Some(s) = p.slot {
                                merge.ingame[s as usize] = true;
                            }
                        }
                        for p in peers.iter() {
                            let _ = p.sender.send(ServerMessage::Start);
                        }
                        info!("netgame started with {} players", player_count);
                    }
                }
            }

            ClientMessage::Cmds { starttic, cmds } => {
                let slot = {
                    let peers = shared.peers.lock().await;
                    my_index
                        .and_then(|i| peers.get(i))
                        .and_then(|p| p.slot)
                };
                let Some(slot) = slot else {
                    continue; // drones never contribute cmds
                };

                let mut merge = shared.merge.lock().await;
                for (off, cmd) in cmds.into_iter().enumerate() {
                    let tic = starttic + off as u32;
                    if tic < merge.next_tic {
                        continue; // resend of an already-merged tic
                    }
                    merge.pending.entry(tic).or_default()[slot as usize] = Some(cmd);
                }
                flush_complete_tics(&shared, &mut merge).await;
            }

            ClientMessage::Quit => break,
        }
    }

    // Departure: free the slot and tell the others. Same merge-then-
    // peers lock order as everywhere else.
    if let Some(i) = my_index {
        let slot = {
            let mut peers = shared.peers.lock().await;
            peers.get_mut(i).and_then(|p| p.slot.take())
        };
        if let Some(slot) = slot {
            let mut merge = shared.merge.lock().await;
            merge.ingame[slot as usize] = false;
            let peers = shared.peers.lock().await;
            for p in peers.iter() {
                let _ = p.sender.send(ServerMessage::PlayerLeft { player: slot });
            }
        }
    }

    writer.abort();
    Ok(())
}

/// Broadcast every tic whose cmd set is complete.
async fn flush_complete_tics(shared: &Arc<Shared>, merge: &mut MergeState) {
    loop {
        let tic = merge.next_tic;
        let complete = match merge.pending.get(&tic) {
            Some(slots) => (0..MAXPLAYERS)
                .all(|i| !merge.ingame[i] || slots[i].is_some()),
            None => false,
        };
        if !complete || !merge.started {
            return;
        }

        let slots = merge.pending.remove(&tic).expect("checked above");
        let cmds: Vec<TicCmd> = slots
            .into_iter()
            .map(|c| c.unwrap_or_default())
            .collect();
        let msg = ServerMessage::CmdSet {
            tic,
            cmds,
            ingame: merge.ingame.to_vec(),
        };

        let peers = shared.peers.lock().await;
        for p in peers.iter() {
            let _ = p.sender.send(msg.clone());
        }
        merge.next_tic += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.max_players, MAXPLAYERS);
        assert_eq!(c.min_players, 2);
        assert!(!c.private);
    }

    #[tokio::test]
    async fn test_flush_waits_for_all_players() {
        let shared = Arc::new(Shared {
            config: ServerConfig::default(),
            peers: Mutex::new(Vec::new()),
            merge: Mutex::new(MergeState::default()),
        });

        let mut merge = MergeState {
            started: true,
            ..Default::default()
        };
        merge.ingame[0] = true;
        merge.ingame[1] = true;

        // Only player 0's cmd for tic 0: incomplete.
        merge.pending.entry(0).or_default()[0] = Some(TicCmd::default());
        flush_complete_tics(&shared, &mut merge).await;
        assert_eq!(merge.next_tic, 0);

        // Player 1 arrives: tic 0 flushes.
        merge.pending.entry(0).or_default()[1] = Some(TicCmd::default());
        flush_complete_tics(&shared, &mut merge).await;
        assert_eq!(merge.next_tic, 1);
        assert!(merge.pending.is_empty());
    }
}
