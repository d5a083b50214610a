// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! WebSocket server for viewers and control commands

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::{ConnectionId, Envelope, Viewer};
use crate::config::StreamingConfig;
use crate::core::SchedulerHandle;
use crate::error::DeliveryError;
use crate::simulation::SimulationRequest;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Commands a viewer may send
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
enum Command {
    Ping,
    Simulate(SimulationRequest),
}

/// WebSocket server
pub struct WebSocketServer {
    config: StreamingConfig,
    handle: SchedulerHandle,
}

impl WebSocketServer {
    pub fn new(config: StreamingConfig, handle: SchedulerHandle) -> Self {
        Self { config, handle }
    }

    /// Bind and accept in the background. Returns the bound address.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.websocket_port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!("WebSocket server listening on ws://{}", local_addr);

        let handle = self.handle.clone();
        let max_clients = self.config.max_clients;
        let send_timeout = Duration::from_millis(self.config.send_timeout_ms);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                if handle.connection_count() >= max_clients {
                                    warn!("Max clients reached, rejecting connection from {}", addr);
                                    continue;
                                }

                                tokio::spawn(handle_connection(stream, addr, handle.clone(), send_timeout));
                            }
                            Err(e) => {
                                error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("WebSocket server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(local_addr)
    }
}

/// Write half of one WebSocket connection
struct WsViewer {
    id: ConnectionId,
    addr: SocketAddr,
    sink: Mutex<WsSink>,
    send_timeout: Duration,
    /// Signalled when the registry drops this viewer
    closing: Notify,
}

#[async_trait]
impl Viewer for WsViewer {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.send_message(Message::Text(text.to_string())).await
    }

    async fn close(&self) {
        self.closing.notify_one();

        let close = async { self.sink.lock().await.close().await };
        match tokio::time::timeout(self.send_timeout, close).await {
            Ok(Ok(())) => debug!("Closed socket for {}", self.addr),
            Ok(Err(e)) => debug!("Close handshake with {} failed: {}", self.addr, e),
            Err(_) => debug!("Close handshake with {} timed out", self.addr),
        }
    }
}

impl WsViewer {
    async fn send_message(&self, message: Message) -> Result<(), DeliveryError> {
        let send = async {
            let mut sink = self.sink.lock().await;
            sink.send(message).await
        };

        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Transport {
                id: format!("{} ({})", self.id, self.addr),
                message: e.to_string(),
            }),
            Err(_) => Err(DeliveryError::Timeout(self.id.to_string())),
        }
    }

    async fn reply(&self, envelope: serde_json::Result<Envelope>) {
        let result = match envelope.and_then(|envelope| envelope.to_text()) {
            Ok(text) => self.send(&text).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Reply to {} failed: {}", self.addr, e);
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, handle: SchedulerHandle, send_timeout: Duration) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let viewer = Arc::new(WsViewer {
        id: ConnectionId::new(),
        addr,
        sink: Mutex::new(ws_sender),
        send_timeout,
        closing: Notify::new(),
    });
    let id = viewer.id;

    info!("New WebSocket connection from {} (id: {})", addr, id);

    if let Err(e) = handle.connect(viewer.clone()).await {
        warn!("Entry snapshot to {} failed: {}", addr, e);
        return;
    }

    loop {
        let received = tokio::select! {
            received = ws_receiver.next() => received,
            _ = viewer.closing.notified() => {
                info!("Dropped unresponsive viewer {}", addr);
                break;
            }
        };

        match received {
            Some(Ok(Message::Text(text))) => {
                debug!("Received from {}: {}", addr, text);
                handle_command(&text, &viewer, &handle).await;
            }
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = viewer.send_message(Message::Pong(data)).await {
                    debug!("Pong to {} failed: {}", addr, e);
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("WebSocket closed by client {}", addr);
                break;
            }
            Some(Err(e)) => {
                warn!("WebSocket error from {}: {}", addr, e);
                break;
            }
            None => break,
            _ => {}
        }
    }

    handle.disconnect(id);
}

async fn handle_command(text: &str, viewer: &WsViewer, handle: &SchedulerHandle) {
    let command = match serde_json::from_str::<Command>(text) {
        Ok(command) => command,
        Err(e) => {
            viewer.reply(Envelope::error(&format!("invalid command: {}", e))).await;
            return;
        }
    };

    match command {
        Command::Ping => viewer.reply(Envelope::pong()).await,
        Command::Simulate(request) => match handle.start_simulation(&request) {
            Ok(ack) => viewer.reply(Envelope::simulation_ack(&ack)).await,
            Err(e) => viewer.reply(Envelope::error(&e.to_string())).await,
        },
    }
}
