//! WebSocket Client Transport
//!
//! Bridges the async wire to the synchronous tic loop: a background
//! tokio task owns the socket, std channels carry messages both ways,
//! and the [`CmdTransport`] impl the sync layer sees never blocks.

use std::sync::mpsc as std_mpsc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc as tokio_mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use super::protocol::{decode, encode, ClientMessage, GameSettings, ServerMessage};
use super::sync::{CmdTransport, NetEvent};
use crate::game::ticcmd::TicCmd;

/// The outcome of connecting and joining.
pub struct JoinedGame {
    pub client: NetClient,
    /// Assigned slot; `u8::MAX` marks a drone.
    pub player: u8,
    pub settings: GameSettings,
}

/// The synchronous handle the tic loop talks to.
pub struct NetClient {
    to_net: tokio_mpsc::UnboundedSender<ClientMessage>,
    from_net: std_mpsc::Receiver<ServerMessage>,
    extratics: u32,
    /// Recent cmds kept for loss-riding resends.
    history: Vec<(u32, TicCmd)>,
    started: bool,
}

impl NetClient {
    /// Connect, join, and wait for the settings handshake. Runs its
    /// own tokio runtime on a background thread so the caller stays
    /// synchronous.
    pub fn connect(
        addr: &str,
        name: &str,
        drone: bool,
        extratics: u32,
    ) -> anyhow::Result<JoinedGame> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("ws://{}", addr)
        };

        let (to_net, mut net_rx) = tokio_mpsc::unbounded_channel::<ClientMessage>();
        let (net_tx, from_net) = std_mpsc::channel::<ServerMessage>();

        let join_name = name.to_string();
        let url_for_task = url.clone();
        std::thread::Builder::new()
            .name("net-client".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        warn!("net runtime failed: {}", e);
                        return;
                    }
                };
                rt.block_on(async move {
                    let (ws, _) = match connect_async(&url_for_task).await {
                        Ok(ok) => ok,
                        Err(e) => {
                            warn!("connect to {} failed: {}", url_for_task, e);
                            return;
                        }
                    };
                    let (mut ws_tx, mut ws_rx) = ws.split();

                    let join = ClientMessage::Join {
                        name: join_name,
                        version: crate::VERSION.to_string(),
                        drone,
                    };
                    if ws_tx.send(Message::Binary(encode(&join))).await.is_err() {
                        return;
                    }

                    loop {
                        tokio::select! {
                            out = net_rx.recv() => {
                                match out {
                                    Some(msg) => {
                                        let quitting = matches!(msg, ClientMessage::Quit);
                                        if ws_tx.send(Message::Binary(encode(&msg))).await.is_err() {
                                            break;
                                        }
                                        if quitting {
                                            break;
                                        }
                                    }
                                    None => break,
                                }
                            }
                            frame = ws_rx.next() => {
                                match frame {
                                    Some(Ok(Message::Binary(bytes))) => {
                                        if let Some(msg) = decode::<ServerMessage>(&bytes) {
                                            if net_tx.send(msg).is_err() {
                                                break;
                                            }
                                        }
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                        }
                    }
                });
            })?;

        // Synchronous handshake: the first message decides.
        let first = from_net
            .recv_timeout(std::time::Duration::from_secs(10))
            .map_err(|_| anyhow::anyhow!("no response from server"))?;

        match first {
            ServerMessage::Accepted { player, settings } => {
                info!(
                    "joined {} as {}",
                    url,
                    if player == u8::MAX {
                        "drone".to_string()
                    } else {
                        format!("player {}", player + 1)
                    }
                );
                Ok(JoinedGame {
                    client: NetClient {
                        to_net,
                        from_net,
                        extratics,
                        history: Vec::new(),
                        started: false,
                    },
                    player,
                    settings,
                })
            }
            ServerMessage::Refused { reason } => {
                Err(anyhow::anyhow!("server refused join: {}", reason))
            }
            other => Err(anyhow::anyhow!("unexpected handshake reply: {:?}", other)),
        }
    }

    /// Block until the server starts the game (all peers present).
    pub fn wait_for_start(&mut self, timeout: std::time::Duration) -> bool {
        if self.started {
            return true;
        }
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            match self.from_net.recv_timeout(std::time::Duration::from_millis(100)) {
                Ok(ServerMessage::Start) => {
                    self.started = true;
                    return true;
                }
                Ok(_) => continue,
                Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return false,
            }
        }
        false
    }

    /// Orderly departure.
    pub fn quit(&self) {
        let _ = self.to_net.send(ClientMessage::Quit);
    }
}

impl CmdTransport for NetClient {
    fn send_cmd(&mut self, tic: u32, cmd: &TicCmd) {
        // Keep extratics older cmds in the packet so one lost frame
        // doesn't stall the merge.
        self.history.push((tic, *cmd));
        let keep = (self.extratics + 1) as usize;
        if self.history.len() > keep {
            let drop = self.history.len() - keep;
            self.history.drain(..drop);
        }

        let starttic = self.history.first().map(|&(t, _)| t).unwrap_or(tic);
        let cmds: Vec<TicCmd> = self.history.iter().map(|&(_, c)| c).collect();
        let _ = self.to_net.send(ClientMessage::Cmds { starttic, cmds });
    }

    fn poll(&mut self) -> Vec<NetEvent> {
        let mut events = Vec::new();
        while let Ok(msg) = self.from_net.try_recv() {
            match msg {
                ServerMessage::CmdSet { tic, cmds, ingame } => {
                    events.push(NetEvent::CmdSet { tic, cmds, ingame });
                }
                ServerMessage::PlayerLeft { player } => {
                    events.push(NetEvent::PlayerLeft(player));
                }
                ServerMessage::Start => {
                    self.started = true;
                }
                ServerMessage::Accepted { .. } | ServerMessage::Refused { .. } => {
                    // Handshake replays are harmless.
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> (NetClient, std_mpsc::Sender<ServerMessage>) {
        let (to_net, _net_rx) = tokio_mpsc::unbounded_channel();
        let (net_tx, from_net) = std_mpsc::channel();
        (
            NetClient {
                to_net,
                from_net,
                extratics: 2,
                history: Vec::new(),
                started: false,
            },
            net_tx,
        )
    }

    #[test]
    fn test_extratics_resend_window() {
        let (mut client, _tx) = test_client();
        for tic in 0..5 {
            client.send_cmd(tic, &TicCmd::default());
        }
        // extratics=2 keeps three cmds: the new one plus two older.
        assert_eq!(client.history.len(), 3);
        assert_eq!(client.history.first().unwrap().0, 2);
    }

    #[test]
    fn test_poll_translates_messages() {
        let (mut client, tx) = test_client();
        tx.send(ServerMessage::Start).unwrap();
        tx.send(ServerMessage::CmdSet {
            tic: 7,
            cmds: vec![TicCmd::default(); crate::MAXPLAYERS],
            ingame: vec![true; crate::MAXPLAYERS],
        })
        .unwrap();
        tx.send(ServerMessage::PlayerLeft { player: 1 }).unwrap();

        let events = client.poll();
        assert!(client.started);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], NetEvent::CmdSet { tic: 7, .. }));
        assert!(matches!(events[1], NetEvent::PlayerLeft(1)));
    }
}
