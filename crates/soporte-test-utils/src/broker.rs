// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process pub/sub broker.
//!
//! `MemoryBroker` implements `Connector`. Every `open` creates a client with
//! its own scope memberships; emits and server-side publishes are delivered
//! only to clients joined to the target scope, never back to the sender.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use soporte_core::{
    Connector, InboundEvent, RealtimeTransport, ScopeId, SoporteError, TransportSession,
    TransportSignal,
};
use tokio::sync::mpsc;

const CLIENT_QUEUE: usize = 1024;

/// An event a client emitted through the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub client: u64,
    pub event: String,
    pub scope: Option<ScopeId>,
    pub payload: Value,
}

struct Client {
    scopes: BTreeSet<ScopeId>,
    tx: mpsc::Sender<TransportSignal>,
}

#[derive(Default)]
struct BrokerState {
    clients: HashMap<u64, Client>,
    next_client: u64,
    opens: usize,
    joins: Vec<(u64, ScopeId)>,
    leaves: Vec<(u64, ScopeId)>,
    emitted: Vec<Emitted>,
    failing_scopes: HashSet<ScopeId>,
    reject_credentials: bool,
    open_delay: Duration,
}

impl BrokerState {
    fn deliver(&mut self, from: Option<u64>, scope: Option<&ScopeId>, event: &InboundEvent) -> usize {
        let mut delivered = 0;
        for (id, client) in &self.clients {
            if Some(*id) == from {
                continue;
            }
            if scope.is_some_and(|s| !client.scopes.contains(s)) {
                continue;
            }
            if client.tx.try_send(TransportSignal::Event(event.clone())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

/// Shared in-memory broadcaster. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker").finish_non_exhaustive()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Server-side publish to every client joined to `scope`.
    pub fn publish(&self, scope: &ScopeId, event: &str, payload: Value) -> usize {
        self.lock()
            .deliver(None, Some(scope), &InboundEvent::new(event, payload))
    }

    /// Server-side publish to every connected client.
    pub fn publish_all(&self, event: &str, payload: Value) -> usize {
        self.lock()
            .deliver(None, None, &InboundEvent::new(event, payload))
    }

    /// Pushes a transport error signal to every client.
    pub fn report_error(&self, message: &str) {
        for client in self.lock().clients.values() {
            let _ = client.tx.try_send(TransportSignal::Error(message.to_string()));
        }
    }

    /// Drops every client, as a network failure would. Their inbound streams
    /// end and further calls on their transports fail.
    pub fn drop_all_clients(&self) {
        self.lock().clients.clear();
    }

    /// Future joins of `scope` fail.
    pub fn fail_joins_for(&self, scope: ScopeId) {
        self.lock().failing_scopes.insert(scope);
    }

    pub fn clear_join_failures(&self) {
        self.lock().failing_scopes.clear();
    }

    /// Future opens fail as if the credential were refused.
    pub fn reject_credentials(&self, reject: bool) {
        self.lock().reject_credentials = reject;
    }

    /// Future opens wait this long before completing.
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = delay;
    }

    /// Number of `open` calls so far, successful or not.
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    pub fn connected_clients(&self) -> usize {
        self.lock().clients.len()
    }

    /// Join requests for `scope` across all clients.
    pub fn join_count(&self, scope: &ScopeId) -> usize {
        self.lock().joins.iter().filter(|(_, s)| s == scope).count()
    }

    pub fn total_joins(&self) -> usize {
        self.lock().joins.len()
    }

    pub fn leave_count(&self, scope: &ScopeId) -> usize {
        self.lock().leaves.iter().filter(|(_, s)| s == scope).count()
    }

    /// Clients currently joined to `scope`.
    pub fn members(&self, scope: &ScopeId) -> usize {
        self.lock()
            .clients
            .values()
            .filter(|c| c.scopes.contains(scope))
            .count()
    }

    pub fn emitted(&self) -> Vec<Emitted> {
        self.lock().emitted.clone()
    }

    pub fn emitted_named(&self, event: &str) -> Vec<Emitted> {
        self.lock()
            .emitted
            .iter()
            .filter(|e| e.event == event)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Connector for MemoryBroker {
    async fn open(&self, _credential: &str) -> Result<TransportSession, SoporteError> {
        let delay = {
            let mut state = self.lock();
            state.opens += 1;
            state.open_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.reject_credentials {
            return Err(SoporteError::CredentialInvalid(
                "credential rejected by broker".into(),
            ));
        }
        state.next_client += 1;
        let client = state.next_client;
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        state.clients.insert(
            client,
            Client {
                scopes: BTreeSet::new(),
                tx,
            },
        );
        drop(state);

        Ok(TransportSession {
            transport: Arc::new(MemoryTransport {
                client,
                broker: self.clone(),
            }),
            inbound: rx,
        })
    }
}

/// One client's side of the broker.
struct MemoryTransport {
    client: u64,
    broker: MemoryBroker,
}

impl MemoryTransport {
    fn closed(&self) -> SoporteError {
        SoporteError::connection(format!("client {} is disconnected", self.client))
    }
}

#[async_trait]
impl RealtimeTransport for MemoryTransport {
    async fn join(&self, scope: &ScopeId) -> Result<(), SoporteError> {
        let mut state = self.broker.lock();
        state.joins.push((self.client, scope.clone()));
        if state.failing_scopes.contains(scope) {
            return Err(SoporteError::SubscriptionFailed {
                scope: scope.to_string(),
                message: "join refused by broker".into(),
            });
        }
        match state.clients.get_mut(&self.client) {
            Some(client) => {
                client.scopes.insert(scope.clone());
                Ok(())
            }
            None => Err(self.closed()),
        }
    }

    async fn leave(&self, scope: &ScopeId) -> Result<(), SoporteError> {
        let mut state = self.broker.lock();
        state.leaves.push((self.client, scope.clone()));
        match state.clients.get_mut(&self.client) {
            Some(client) => {
                client.scopes.remove(scope);
                Ok(())
            }
            None => Err(self.closed()),
        }
    }

    async fn emit(
        &self,
        event: &str,
        scope: Option<&ScopeId>,
        payload: Value,
    ) -> Result<(), SoporteError> {
        let mut state = self.broker.lock();
        if !state.clients.contains_key(&self.client) {
            return Err(self.closed());
        }
        state.emitted.push(Emitted {
            client: self.client,
            event: event.to_string(),
            scope: scope.cloned(),
            payload: payload.clone(),
        });
        state.deliver(
            Some(self.client),
            scope,
            &InboundEvent::new(event, payload),
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), SoporteError> {
        match self.broker.lock().clients.remove(&self.client) {
            Some(_) => Ok(()),
            None => Err(self.closed()),
        }
    }
}
