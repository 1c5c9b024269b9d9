// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport to the control plane.
//!
//! Inbound text frames are decoded as [`Packet`]s and pushed onto the command
//! queue. Everything on the response queue is written back as text frames.
//! While the connection is down, responses accumulate in a bounded
//! [`ReplayBuffer`] and are flushed first after reconnecting.

mod replay;

pub use replay::ReplayBuffer;

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use kagent_core::Packet;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{InvalidHeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Header identifying this cluster to the control plane.
const CLUSTER_ID_HEADER: &str = "x-cluster-id";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub token: Option<String>,
    pub cluster_id: String,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub replay_capacity: usize,
}

impl TransportConfig {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        cluster_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            token,
            cluster_id: cluster_id.into(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            replay_capacity: crate::env::replay_capacity(),
        }
    }
}

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    /// Delay to wait now; doubles the next one up to the cap.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// How a connected session ended.
enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

/// Bridges the channel pair to a WebSocket connection.
pub struct Transport {
    config: TransportConfig,
    commands: mpsc::Sender<Packet>,
    responses: mpsc::Receiver<Packet>,
    responses_open: bool,
    replay: ReplayBuffer,
}

impl Transport {
    pub fn new(
        config: TransportConfig,
        commands: mpsc::Sender<Packet>,
        responses: mpsc::Receiver<Packet>,
    ) -> Self {
        let replay = ReplayBuffer::new(config.replay_capacity);
        Self { config, commands, responses, responses_open: true, replay }
    }

    /// Keep a connection up until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match self.connect().await {
                Ok(ws) => {
                    info!(url = %self.config.url, "connected to control plane");
                    backoff.reset();
                    match self.serve(ws, &shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Disconnected(reason) => {
                            let buffered = self.replay.len();
                            warn!(%reason, buffered, "control plane disconnected")
                        }
                    }
                }
                Err(e) => warn!(url = %self.config.url, error = %e, "connect failed"),
            }
            let delay = backoff.next_delay();
            debug!(?delay, "reconnecting");
            if !self.buffer_for(delay, &shutdown).await {
                break;
            }
        }
        info!(dropped = self.replay.len(), "transport stopped");
    }

    async fn connect(&self) -> Result<WsStream, TransportError> {
        let mut request = self.config.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        if let Some(token) = &self.config.token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
        }
        headers.insert(CLUSTER_ID_HEADER, HeaderValue::from_str(&self.config.cluster_id)?);
        let (ws, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(ws)
    }

    /// Collect responses into the replay buffer for `delay`. Returns false on
    /// shutdown.
    async fn buffer_for(&mut self, delay: Duration, shutdown: &CancellationToken) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return false,
                _ = &mut sleep => return true,
                packet = self.responses.recv(), if self.responses_open => match packet {
                    Some(packet) => self.buffer(packet),
                    None => self.responses_open = false,
                },
            }
        }
    }

    fn buffer(&mut self, packet: Packet) {
        if let Some(dropped) = self.replay.push(packet) {
            warn!(key = %dropped.key, packet_type = %dropped.packet_type, "replay buffer full");
        }
    }

    async fn serve(&mut self, ws: WsStream, shutdown: &CancellationToken) -> SessionEnd {
        let (mut writer, mut reader) = ws.split();

        while let Some(packet) = self.replay.pop() {
            if let Err(e) = send_packet(&mut writer, &packet).await {
                self.replay.push_front(packet);
                return SessionEnd::Disconnected(e.to_string());
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = writer.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
                frame = reader.next() => match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<Packet>(&text) {
                        Ok(packet) => {
                            debug!(key = %packet.key, packet_type = %packet.packet_type, "inbound");
                            if self.commands.send(packet).await.is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => warn!(error = %e, "discarding malformed frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return SessionEnd::Disconnected(format!("closed by peer: {:?}", frame));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                    None => return SessionEnd::Disconnected("stream ended".to_string()),
                },
                packet = self.responses.recv(), if self.responses_open => match packet {
                    Some(packet) => {
                        if let Err(e) = send_packet(&mut writer, &packet).await {
                            self.replay.push_front(packet);
                            return SessionEnd::Disconnected(e.to_string());
                        }
                    }
                    None => self.responses_open = false,
                },
            }
        }
    }
}

async fn send_packet<S>(writer: &mut S, packet: &Packet) -> Result<(), TransportError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = match serde_json::to_string(packet) {
        Ok(text) => text,
        Err(e) => {
            warn!(key = %packet.key, error = %e, "dropping unencodable packet");
            return Ok(());
        }
    };
    writer.send(Message::Text(text.into())).await?;
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
