// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport to the broadcaster.
//!
//! [`WsConnector::open`] connects, authenticates, then splits the socket
//! into two tasks:
//! 1. Writer: drains an mpsc queue of frames into the socket.
//! 2. Reader: parses server frames into [`TransportSignal`]s.
//!
//! The inbound channel closes when the socket does.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use soporte_core::{
    Connector, InboundEvent, RealtimeTransport, ScopeId, SoporteError, TransportSession,
    TransportSignal,
};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::wire::{ClientFrame, ServerFrame};

const OUTBOUND_CAPACITY: usize = 64;
const INBOUND_CAPACITY: usize = 256;

/// Opens authenticated WebSocket transports.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            handshake_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, credential: &str) -> Result<TransportSession, SoporteError> {
        tokio::time::timeout(self.handshake_timeout, self.handshake(credential))
            .await
            .map_err(|_| SoporteError::Timeout {
                duration: self.handshake_timeout,
            })?
    }
}

impl WsConnector {
    async fn handshake(&self, credential: &str) -> Result<TransportSession, SoporteError> {
        let (stream, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            SoporteError::Connection {
                message: format!("failed to connect to {}: {e}", self.url),
                source: Some(Box::new(e)),
            }
        })?;
        let (mut sink, mut source) = stream.split();

        let auth = ClientFrame::Authenticate {
            token: credential.to_string(),
        };
        sink.send(Message::text(auth.to_json()?))
            .await
            .map_err(|e| SoporteError::connection(format!("failed to send credential: {e}")))?;

        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => match ServerFrame::parse(text.as_str()) {
                    Ok(ServerFrame::Authenticated) => break,
                    Ok(ServerFrame::Error { message }) => {
                        return Err(SoporteError::CredentialInvalid(message));
                    }
                    Ok(other) => debug!(frame = ?other, "ignoring frame before authentication"),
                    Err(e) => warn!(error = %e, "ignoring unreadable frame during handshake"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(SoporteError::connection(
                        "socket closed during authentication",
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(SoporteError::connection(format!(
                        "socket error during authentication: {e}"
                    )));
                }
            }
        }
        info!(url = %self.url, "realtime transport authenticated");

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<TransportSignal>(INBOUND_CAPACITY);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "websocket send failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let signal = match message {
                    Ok(Message::Text(text)) => match ServerFrame::parse(text.as_str()) {
                        Ok(ServerFrame::Event { event, payload }) => {
                            TransportSignal::Event(InboundEvent::new(event, payload))
                        }
                        Ok(ServerFrame::Error { message }) => TransportSignal::Error(message),
                        Ok(ServerFrame::Authenticated) => continue,
                        Err(e) => {
                            warn!(error = %e, "dropping unreadable frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "websocket closed by server");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = in_tx
                            .send(TransportSignal::Error(format!("websocket error: {e}")))
                            .await;
                        break;
                    }
                };
                if in_tx.send(signal).await.is_err() {
                    break;
                }
            }
        });

        Ok(TransportSession {
            transport: Arc::new(WsTransport { outbound: out_tx }),
            inbound: in_rx,
        })
    }
}

/// Sending half of an open WebSocket.
#[derive(Debug)]
pub struct WsTransport {
    outbound: mpsc::Sender<Message>,
}

impl WsTransport {
    async fn send(&self, frame: ClientFrame) -> Result<(), SoporteError> {
        self.outbound
            .send(Message::text(frame.to_json()?))
            .await
            .map_err(|_| SoporteError::connection("websocket is closed"))
    }
}

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn join(&self, scope: &ScopeId) -> Result<(), SoporteError> {
        self.send(ClientFrame::Join {
            scope: scope.clone(),
        })
        .await
        .map_err(|e| SoporteError::SubscriptionFailed {
            scope: scope.to_string(),
            message: e.to_string(),
        })
    }

    async fn leave(&self, scope: &ScopeId) -> Result<(), SoporteError> {
        self.send(ClientFrame::Leave {
            scope: scope.clone(),
        })
        .await
        .map_err(|e| SoporteError::SubscriptionFailed {
            scope: scope.to_string(),
            message: e.to_string(),
        })
    }

    async fn emit(
        &self,
        event: &str,
        scope: Option<&ScopeId>,
        payload: Value,
    ) -> Result<(), SoporteError> {
        self.send(ClientFrame::Emit {
            event: event.to_string(),
            scope: scope.cloned(),
            payload,
        })
        .await
    }

    async fn close(&self) -> Result<(), SoporteError> {
        self.outbound
            .send(Message::Close(None))
            .await
            .map_err(|_| SoporteError::connection("websocket is already closed"))
    }
}
