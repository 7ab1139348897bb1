// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle of the single real-time connection.
//!
//! State machine: `disconnected -> connecting -> connected -> disconnected`,
//! with `connecting -> disconnected` on a failed handshake. Reconnection is
//! never automatic; the caller invokes [`ConnectionManager::connect`] again
//! and re-joins its scopes when [`LifecycleEvent::Connected`] arrives.
//!
//! Every connection gets a fresh listener set. Disconnecting clears that set
//! before the transport closes, so no listener outlives its connection.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use serde_json::Value;
use soporte_core::{
    ConnectionStatus, Connector, InboundEvent, RealtimeTransport, ScopeId, SoporteError,
    TransportSignal,
};
use soporte_identity::Identity;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LIFECYCLE_CAPACITY: usize = 32;

/// Lifecycle notifications. Receivers unsubscribe by being dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Connected { generation: u64 },
    Disconnected {
        generation: u64,
        reason: Option<String>,
    },
    Error { message: String },
}

/// Listeners attached to one connection.
#[derive(Default)]
struct ListenerSet {
    state: StdMutex<Listeners>,
}

#[derive(Default)]
struct Listeners {
    closed: bool,
    senders: Vec<mpsc::UnboundedSender<InboundEvent>>,
}

impl ListenerSet {
    fn add(&self) -> mpsc::UnboundedReceiver<InboundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut state) = self.state.lock()
            && !state.closed
        {
            state.senders.push(tx);
        }
        rx
    }

    /// Delivers to every live listener and forgets the dropped ones.
    fn dispatch(&self, event: &InboundEvent) -> usize {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        state.senders.retain(|tx| tx.send(event.clone()).is_ok());
        state.senders.len()
    }

    fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
            state.senders.clear();
        }
    }

    fn len(&self) -> usize {
        self.state.lock().map(|s| s.senders.len()).unwrap_or(0)
    }
}

/// Shared, read-only view of an open connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    generation: u64,
    transport: Arc<dyn RealtimeTransport>,
    listeners: Arc<ListenerSet>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("generation", &self.generation)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && Arc::ptr_eq(&self.transport, &other.transport)
    }
}

impl ConnectionHandle {
    /// Increments with every successful connect.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn transport(&self) -> &Arc<dyn RealtimeTransport> {
        &self.transport
    }

    /// Publishes an event to one scope or to the server's default fan-out.
    pub async fn emit(
        &self,
        event: &str,
        scope: Option<&ScopeId>,
        payload: Value,
    ) -> Result<(), SoporteError> {
        self.transport.emit(event, scope, payload).await
    }

    /// Inbound events of this connection. The stream ends when the
    /// connection is torn down.
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<InboundEvent> {
        self.listeners.add()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

struct Active {
    handle: ConnectionHandle,
    reader: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    active: Option<Active>,
    generation: u64,
}

struct Shared {
    connector: Arc<dyn Connector>,
    handshake_timeout: Duration,
    inner: Mutex<Inner>,
    status: watch::Sender<ConnectionStatus>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    last_error: StdMutex<Option<String>>,
}

impl Shared {
    fn set_error(&self, message: Option<String>) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = message;
        }
    }

    fn notify(&self, event: LifecycleEvent) {
        // No receivers is fine.
        let _ = self.lifecycle.send(event);
    }

    async fn transport_lost(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.active.take_if(|a| a.handle.generation == generation) else {
            return;
        };
        drop(inner);

        active.handle.listeners.clear();
        let reason = "transport closed".to_string();
        warn!(generation, "realtime transport lost");
        self.set_error(Some(reason.clone()));
        self.status.send_replace(ConnectionStatus::Disconnected);
        self.notify(LifecycleEvent::Disconnected {
            generation,
            reason: Some(reason),
        });
    }
}

/// Owns the one connection of a session.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, handshake_timeout: Duration) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                connector,
                handshake_timeout,
                inner: Mutex::new(Inner::default()),
                status,
                lifecycle,
                last_error: StdMutex::new(None),
            }),
        }
    }

    /// Connects and authenticates, or returns the existing handle when
    /// already connected. Concurrent callers wait for one handshake.
    pub async fn connect(
        &self,
        identity: &Identity,
        credential: &str,
    ) -> Result<ConnectionHandle, SoporteError> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock().await;
        if let Some(active) = &inner.active {
            return Ok(active.handle.clone());
        }

        if !identity.is_valid_at(chrono::Utc::now()) {
            let err = SoporteError::CredentialInvalid("credential has expired".into());
            shared.set_error(Some(err.to_string()));
            return Err(err);
        }

        shared.status.send_replace(ConnectionStatus::Connecting);
        debug!(user_id = %identity.user_id, role = %identity.role, "opening realtime transport");

        let opened = tokio::time::timeout(shared.handshake_timeout, shared.connector.open(credential))
            .await
            .unwrap_or(Err(SoporteError::Timeout {
                duration: shared.handshake_timeout,
            }));
        let session = match opened {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "realtime handshake failed");
                shared.set_error(Some(err.to_string()));
                shared.status.send_replace(ConnectionStatus::Disconnected);
                shared.notify(LifecycleEvent::Error {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        inner.generation += 1;
        let generation = inner.generation;
        let handle = ConnectionHandle {
            generation,
            transport: session.transport,
            listeners: Arc::new(ListenerSet::default()),
        };
        let reader = tokio::spawn(read_loop(
            Arc::downgrade(shared),
            generation,
            Arc::clone(&handle.listeners),
            session.inbound,
        ));
        inner.active = Some(Active {
            handle: handle.clone(),
            reader,
        });
        drop(inner);

        shared.set_error(None);
        shared.status.send_replace(ConnectionStatus::Connected);
        shared.notify(LifecycleEvent::Connected { generation });
        info!(generation, role = %identity.role, "realtime connection established");
        Ok(handle)
    }

    /// Tears down `handle`'s connection: listeners first, then the reader,
    /// then the transport. A stale handle is a no-op.
    pub async fn disconnect(&self, handle: &ConnectionHandle) -> Result<(), SoporteError> {
        let mut inner = self.shared.inner.lock().await;
        let Some(active) = inner
            .active
            .take_if(|a| a.handle.generation == handle.generation)
        else {
            return Ok(());
        };
        drop(inner);
        self.teardown(active).await;
        Ok(())
    }

    /// Disconnects whatever connection is current.
    pub async fn shutdown(&self) {
        let active = self.shared.inner.lock().await.active.take();
        if let Some(active) = active {
            self.teardown(active).await;
        }
    }

    async fn teardown(&self, active: Active) {
        let generation = active.handle.generation;
        active.handle.listeners.clear();
        active.reader.abort();
        if let Err(e) = active.handle.transport.close().await {
            debug!(error = %e, "transport close failed");
        }
        self.shared.status.send_replace(ConnectionStatus::Disconnected);
        self.shared.notify(LifecycleEvent::Disconnected {
            generation,
            reason: None,
        });
        info!(generation, "realtime connection closed");
    }

    pub async fn current(&self) -> Option<ConnectionHandle> {
        self.shared
            .inner
            .lock()
            .await
            .active
            .as_ref()
            .map(|a| a.handle.clone())
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.shared.lifecycle.subscribe()
    }

    /// Message of the most recent failure, for a user-visible banner.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().ok().and_then(|e| e.clone())
    }
}

async fn read_loop(
    shared: Weak<Shared>,
    generation: u64,
    listeners: Arc<ListenerSet>,
    mut inbound: mpsc::Receiver<TransportSignal>,
) {
    while let Some(signal) = inbound.recv().await {
        match signal {
            TransportSignal::Event(event) => {
                let delivered = listeners.dispatch(&event);
                debug!(event = %event.name, delivered, "inbound event");
            }
            TransportSignal::Error(message) => {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                warn!(generation, error = %message, "transport reported an error");
                shared.set_error(Some(message.clone()));
                shared.notify(LifecycleEvent::Error { message });
            }
        }
    }
    if let Some(shared) = shared.upgrade() {
        shared.transport_lost(generation).await;
    }
}
