use futures_util::{SinkExt, StreamExt};
use procsim_core::{
    socketio::{self, Inbound, OpenHandshake},
    wire::{Command, FrameDecoder, PushEvent, DEFAULT_MAX_FRAME_BYTES},
};
use std::{path::PathBuf, time::Duration};
use tokio::{io::AsyncReadExt, sync::mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    /// The replay source has no more events.
    Exhausted,
    Push(PushEvent),
}

/// Keeps a Socket.IO session with the backend open, forwarding decoded push
/// events and sending queued commands. Reconnects with backoff; the app keeps
/// its cache across the gap and the backend resends state on connect.
pub async fn hub_loop(
    url: Url,
    tx: mpsc::Sender<ChannelEvent>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    let mut backoff = Duration::from_secs(1);
    let mut command_open = true;

    loop {
        let mut ws = match connect_async(url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(err) => {
                warn!(event = "hub_connect_error", url = %url, error = %err);
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                continue;
            }
        };
        info!(event = "hub_transport_open", url = %url);

        let mut joined = false;
        // Until the open packet says otherwise, allow a generous first wait.
        let mut ping_window = HANDSHAKE_TIMEOUT;
        let liveness = tokio::time::sleep(HANDSHAKE_TIMEOUT);
        tokio::pin!(liveness);

        loop {
            tokio::select! {
                incoming = ws.next() => {
                    let text = match incoming {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            warn!(event = "hub_read_error", error = %err);
                            break;
                        }
                    };
                    let packet = match socketio::decode_packet(&text, DEFAULT_MAX_FRAME_BYTES) {
                        Ok(packet) => packet,
                        Err(err) => {
                            warn!(event = "push_decode_error", error = %err);
                            continue;
                        }
                    };
                    match packet {
                        Inbound::Open(handshake) => {
                            ping_window = ping_deadline(&handshake);
                            liveness.as_mut().reset(tokio::time::Instant::now() + ping_window);
                            if ws.send(Message::Text(socketio::CONNECT_PACKET.to_string())).await.is_err() {
                                warn!(event = "hub_write_error", packet = "connect");
                                break;
                            }
                        }
                        Inbound::Ping(payload) => {
                            liveness.as_mut().reset(tokio::time::Instant::now() + ping_window);
                            if ws.send(Message::Text(socketio::pong(&payload))).await.is_err() {
                                warn!(event = "hub_write_error", packet = "pong");
                                break;
                            }
                        }
                        Inbound::Connected => {
                            joined = true;
                            backoff = Duration::from_secs(1);
                            info!(event = "hub_connected", url = %url);
                            if tx.send(ChannelEvent::Connected).await.is_err() {
                                return;
                            }
                        }
                        Inbound::Event(event) => {
                            if tx.send(ChannelEvent::Push(event)).await.is_err() {
                                return;
                            }
                        }
                        Inbound::ConnectError(message) => {
                            warn!(event = "hub_connect_error", url = %url, error = %message);
                            break;
                        }
                        Inbound::Disconnected | Inbound::Close => break,
                        Inbound::Ignored(what) => debug!(event = "hub_packet_ignored", packet = %what),
                    }
                }
                _ = &mut liveness => {
                    warn!(event = "hub_ping_timeout", joined);
                    break;
                }
                maybe_command = command_rx.recv(), if command_open => {
                    let Some(command) = maybe_command else {
                        command_open = false;
                        continue;
                    };
                    if !joined {
                        warn!(event = "command_dropped", reason = "not_joined", command = command.name());
                        continue;
                    }
                    let text = match socketio::encode_event(&command, DEFAULT_MAX_FRAME_BYTES) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(event = "command_encode_error", command = command.name(), error = %err);
                            continue;
                        }
                    };
                    if ws.send(Message::Text(text)).await.is_err() {
                        warn!(event = "hub_write_error", command = command.name());
                        break;
                    }
                }
            }
        }

        let _ = ws.close(None).await;
        if joined && tx.send(ChannelEvent::Disconnected).await.is_err() {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

/// How long to wait for the next server ping before declaring the link dead.
fn ping_deadline(handshake: &OpenHandshake) -> Duration {
    Duration::from_millis(handshake.ping_interval.saturating_add(handshake.ping_timeout))
}

/// Feeds a recorded NDJSON session to the app, one event per `pace`.
/// Commands have nowhere to go and are dropped.
pub async fn replay_loop(
    path: PathBuf,
    pace: Duration,
    tx: mpsc::Sender<ChannelEvent>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            warn!(event = "replay_open_error", path = %path.display(), error = %err);
            let _ = tx.send(ChannelEvent::Exhausted).await;
            drain_commands(&mut command_rx).await;
            return;
        }
    };
    if tx.send(ChannelEvent::Connected).await.is_err() {
        return;
    }

    let mut decoder = FrameDecoder::<PushEvent>::new(DEFAULT_MAX_FRAME_BYTES);
    let mut read_buf = vec![0u8; 8192];
    loop {
        let read = match file.read(&mut read_buf).await {
            Ok(read) => read,
            Err(err) => {
                warn!(event = "replay_read_error", error = %err);
                break;
            }
        };
        let decoded = if read == 0 {
            decoder.finish()
        } else {
            decoder.feed(&read_buf[..read])
        };
        for err in decoded.errors {
            warn!(event = "push_decode_error", source = "replay", error = %err);
        }
        for event in decoded.frames {
            if tx.send(ChannelEvent::Push(event)).await.is_err() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(pace) => {}
                Some(command) = command_rx.recv() => {
                    info!(event = "command_dropped", reason = "replay", command = command.name());
                }
            }
        }
        if read == 0 {
            break;
        }
    }

    info!(event = "replay_finished", path = %path.display());
    if tx.send(ChannelEvent::Exhausted).await.is_err() {
        return;
    }
    drain_commands(&mut command_rx).await;
}

async fn drain_commands(command_rx: &mut mpsc::Receiver<Command>) {
    while let Some(command) = command_rx.recv().await {
        info!(event = "command_dropped", reason = "replay", command = command.name());
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(Duration::from_secs(10))
}
