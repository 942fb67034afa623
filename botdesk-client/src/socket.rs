/// Push-channel client: exactly one logical WebSocket per dashboard lifetime
///
/// Provides automatic reconnection with a bounded attempt budget, heartbeat,
/// and envelope parsing. The retry delay starts at the configured floor and
/// doubles toward the ceiling on successive failures; once the budget is
/// exhausted the channel stays Disconnected and no further automatic
/// attempts occur. The state is user-visible through the watch channel.

use crate::config::SocketConfig;
use crate::types::{ClientCommand, ConnectionState, PushEnvelope};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// WebSocket client for dashboard push events
pub struct SocketClient {
    config: SocketConfig,
}

/// Control surface for a started [`SocketClient`]
///
/// `send` never surfaces transport errors to the caller: a dead connection
/// shows up as a state transition, not as a send failure.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    command_tx: mpsc::Sender<ClientCommand>,
    shutdown_tx: watch::Sender<bool>,
}

impl SocketHandle {
    /// Emit a command over the push channel
    pub fn send(&self, command: ClientCommand) {
        if self.command_tx.try_send(command).is_err() {
            warn!("dropping {} command, channel unavailable", command.event_name());
        }
    }

    /// Cooperative shutdown: no callbacks fire after close
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl SocketClient {
    pub fn new() -> Self {
        Self::with_config(SocketConfig::default())
    }

    pub fn with_config(config: SocketConfig) -> Self {
        Self { config }
    }

    /// Start the connection loop
    ///
    /// Returns a receiver for push envelopes, a watch receiver for the
    /// connection state, and the control handle.
    pub fn start(
        self,
    ) -> (
        mpsc::Receiver<PushEnvelope>,
        watch::Receiver<ConnectionState>,
        SocketHandle,
    ) {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = SocketHandle {
            command_tx,
            shutdown_tx,
        };

        tokio::spawn(run_socket_loop(
            self.config,
            event_tx,
            state_tx,
            command_rx,
            shutdown_rx,
        ));

        (event_rx, state_rx, handle)
    }
}

impl Default for SocketClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before reconnect attempt `attempt` (1-based): floor doubled per
/// failure, clamped to the ceiling.
fn backoff_delay(config: &SocketConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    config
        .reconnect_floor
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(config.reconnect_ceiling)
}

/// Main connection loop with bounded auto-reconnect
async fn run_socket_loop(
    config: SocketConfig,
    event_tx: mpsc::Sender<PushEnvelope>,
    state_tx: watch::Sender<ConnectionState>,
    mut command_rx: mpsc::Receiver<ClientCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("starting push-channel client for {}", config.url);
    let mut failed_attempts: u32 = 0;

    'lifecycle: loop {
        if *shutdown_rx.borrow() {
            break;
        }
        let _ = state_tx.send(ConnectionState::Connecting);

        let delay = match connect_async(&config.url).await {
            Ok((ws_stream, _)) => {
                info!("connected to {}", config.url);
                let _ = state_tx.send(ConnectionState::Connected);

                let (mut write, mut read) = ws_stream.split();

                // Ask the server to push the current snapshots right away
                // rather than waiting for its next broadcast cycle.
                if let Ok(text) =
                    serde_json::to_string(&ClientCommand::RequestInitialData.envelope())
                {
                    let _ = write.send(Message::Text(text.into())).await;
                }

                let mut ping = tokio::time::interval(config.ping_interval);
                // First tick completes immediately; the connection is
                // obviously alive at this point.
                ping.tick().await;

                loop {
                    tokio::select! {
                        msg = read.next() => {
                            let Some(msg) = msg else {
                                warn!("server closed the stream");
                                break;
                            };
                            match msg {
                                Ok(Message::Text(text)) => {
                                    match serde_json::from_str::<PushEnvelope>(&text) {
                                        Ok(envelope) => {
                                            if event_tx.send(envelope).await.is_err() {
                                                warn!("event receiver dropped, stopping client");
                                                break 'lifecycle;
                                            }
                                        }
                                        Err(e) => {
                                            error!("failed to parse push message: {}", e);
                                            debug!("raw message: {}", &text[..text.len().min(200)]);
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) => {
                                    info!("server closed connection");
                                    break;
                                }
                                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                                    // Heartbeat - tungstenite answers pings automatically
                                }
                                Err(e) => {
                                    error!("push-channel error: {}", e);
                                    break;
                                }
                                _ => {}
                            }
                        }
                        command = command_rx.recv() => {
                            let Some(command) = command else {
                                // All handles dropped: page teardown.
                                break 'lifecycle;
                            };
                            match serde_json::to_string(&command.envelope()) {
                                Ok(text) => {
                                    if let Err(e) = write.send(Message::Text(text.into())).await {
                                        // Never surfaced to the caller of send();
                                        // the drop shows up as a state change.
                                        error!("failed to emit {}: {}", command.event_name(), e);
                                        break;
                                    }
                                    debug!("emitted {}", command.event_name());
                                }
                                Err(e) => error!("failed to encode {}: {}", command.event_name(), e),
                            }
                        }
                        _ = ping.tick() => {
                            if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                                debug!("failed to send ping, connection likely dead");
                                break;
                            }
                        }
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                debug!("closing push channel");
                                let _ = write.send(Message::Close(None)).await;
                                break 'lifecycle;
                            }
                        }
                    }
                }

                let _ = state_tx.send(ConnectionState::Disconnected);

                // Unexpected drop of an established connection: a fresh
                // retry budget for the new outage, starting at the floor.
                failed_attempts = 0;
                config.reconnect_floor
            }
            Err(e) => {
                error!("failed to connect to {}: {}", config.url, e);
                let _ = state_tx.send(ConnectionState::Disconnected);

                failed_attempts += 1;
                if failed_attempts >= config.max_reconnect_attempts {
                    warn!(
                        "reconnect budget exhausted after {} attempts, staying disconnected",
                        failed_attempts
                    );
                    break;
                }
                backoff_delay(&config, failed_attempts)
            }
        };

        debug!("waiting {:?} before reconnecting", delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    let _ = state_tx.send(ConnectionState::Disconnected);
}
