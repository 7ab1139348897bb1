// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time pub/sub collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::SoporteError;
use crate::types::{InboundEvent, ScopeId};

/// An open, authenticated transport to the pub/sub collaborator.
///
/// Scope membership lives server-side and is tied to this transport; a
/// replacement transport starts with no memberships.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Requests membership of a broadcast scope.
    async fn join(&self, scope: &ScopeId) -> Result<(), SoporteError>;

    /// Drops membership of a broadcast scope.
    async fn leave(&self, scope: &ScopeId) -> Result<(), SoporteError>;

    /// Publishes an event, to one scope or to the server's default fan-out.
    async fn emit(
        &self,
        event: &str,
        scope: Option<&ScopeId>,
        payload: Value,
    ) -> Result<(), SoporteError>;

    /// Closes the transport. Further calls fail with a connection error.
    async fn close(&self) -> Result<(), SoporteError>;
}

/// Signals produced by a transport's inbound side.
///
/// The stream ending (sender dropped) means the transport is gone.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    Event(InboundEvent),
    Error(String),
}

/// A freshly opened transport and its inbound stream.
pub struct TransportSession {
    pub transport: Arc<dyn RealtimeTransport>,
    pub inbound: mpsc::Receiver<TransportSignal>,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// Opens transports. Implemented by the WebSocket connector and by the
/// in-memory broker used in tests.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs the connect + authenticate handshake.
    async fn open(&self, credential: &str) -> Result<TransportSession, SoporteError>;
}
