// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One logged-in dashboard.
//!
//! [`DashboardSession`] wires the pieces together: the connection, the
//! event pump feeding the store, scope membership that follows the store's
//! ticket set and the open views, the refresh orchestrator, and optimistic
//! actions. Every new connection generation gets a fresh event pump and a
//! full re-join of its scopes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use soporte_config::SoporteConfig;
use soporte_core::{
    Collection, ConnectionStatus, Connector, Domain, EntityId, InboundEvent, ScopeId, SoporteError,
    TicketApi,
};
use soporte_identity::{CredentialStore, Identity, require_valid};
use soporte_realtime::{
    ConnectionHandle, ConnectionManager, LifecycleEvent, OpenView, ReconcileReport,
    RoomMembershipTracker, ViewKind, WsConnector, normalize_event, scopes_for,
};
use soporte_store::{
    Entity, Notification, NotificationLog, StoreHandle, TicketAction, TicketView,
    available_actions,
};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::HttpTicketApi;
use crate::optimistic::{Action, OptimisticCoordinator};
use crate::orchestrator::{OrchestratorSettings, RefreshOutcome, SyncOrchestrator};

/// Tunables of a session, usually taken from [`SoporteConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
    pub optimistic_match_window: Duration,
    pub notification_capacity: usize,
    /// Polling interval, or `None` to rely on events alone.
    pub polling: Option<Duration>,
    pub orchestrator: OrchestratorSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SoporteConfig::default())
    }
}

impl From<&SoporteConfig> for SessionSettings {
    fn from(config: &SoporteConfig) -> Self {
        Self {
            handshake_timeout: config.realtime.handshake_timeout(),
            request_timeout: config.api.request_timeout(),
            optimistic_match_window: config.sync.optimistic_match_window(),
            notification_capacity: config.store.notification_capacity,
            polling: config
                .sync
                .polling_enabled
                .then(|| config.sync.poll_interval()),
            orchestrator: OrchestratorSettings::from(&config.sync),
        }
    }
}

#[derive(Default)]
struct Rooms {
    tracker: RoomMembershipTracker,
    views: BTreeSet<OpenView>,
    /// Connection generation the tracker and event pump belong to.
    generation: Option<u64>,
}

struct Shared {
    identity: Identity,
    credential: String,
    connection: ConnectionManager,
    store: StoreHandle,
    orchestrator: SyncOrchestrator,
    coordinator: OptimisticCoordinator,
    rooms: Mutex<Rooms>,
    notifications: StdMutex<NotificationLog>,
    polling: Option<Duration>,
    cancel: CancellationToken,
    followers: AtomicBool,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

/// A running dashboard. Clones share the session.
#[derive(Clone)]
pub struct DashboardSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("user_id", &self.shared.identity.user_id)
            .field("role", &self.shared.identity.role)
            .field("status", &self.shared.connection.status())
            .finish_non_exhaustive()
    }
}

impl DashboardSession {
    /// Builds a session for `credential`. Fails with
    /// [`SoporteError::CredentialInvalid`] when it is malformed or expired.
    pub fn new(
        credential: &str,
        api: Arc<dyn TicketApi>,
        connector: Arc<dyn Connector>,
        settings: SessionSettings,
    ) -> Result<Self, SoporteError> {
        let identity = require_valid(credential)?;
        let store = StoreHandle::new();
        let connection = ConnectionManager::new(connector, settings.handshake_timeout);
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&api),
            store.clone(),
            &identity,
            settings.orchestrator.clone(),
        );
        let coordinator = OptimisticCoordinator::new(
            api,
            orchestrator.clone(),
            connection.clone(),
            identity.user_id.clone(),
        )
        .with_request_timeout(settings.request_timeout)
        .with_match_window(settings.optimistic_match_window);

        Ok(Self {
            shared: Arc::new(Shared {
                identity,
                credential: credential.to_string(),
                connection,
                store,
                orchestrator,
                coordinator,
                rooms: Mutex::new(Rooms::default()),
                notifications: StdMutex::new(NotificationLog::new(settings.notification_capacity)),
                polling: settings.polling,
                cancel: CancellationToken::new(),
                followers: AtomicBool::new(false),
                tasks: StdMutex::new(Vec::new()),
            }),
        })
    }

    /// Builds a session against the configured HTTP and WebSocket endpoints.
    pub fn from_config(config: &SoporteConfig, credential: &str) -> Result<Self, SoporteError> {
        let api = HttpTicketApi::new(&config.api.base_url, credential, config.api.request_timeout())?;
        let connector = WsConnector::new(config.realtime.url.clone(), config.realtime.handshake_timeout());
        Self::new(
            credential,
            Arc::new(api),
            Arc::new(connector),
            SessionSettings::from(config),
        )
    }

    pub fn identity(&self) -> &Identity {
        &self.shared.identity
    }

    pub fn store(&self) -> &StoreHandle {
        &self.shared.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.shared.connection
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.shared.orchestrator
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.connection.status()
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.shared.tasks.lock().unwrap_or_else(|p| p.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn notifications_log(&self) -> MutexGuard<'_, NotificationLog> {
        self.shared
            .notifications
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    /// Connects, loads every domain, joins the resulting scopes, and starts
    /// the background followers. A connection failure is returned after the
    /// initial load, so the dashboard still has data to show.
    pub async fn start(&self) -> Result<ConnectionHandle, SoporteError> {
        self.spawn_followers();
        let connected = self.connect().await;
        for (domain, outcome) in self.shared.orchestrator.refresh_all().await {
            if let RefreshOutcome::Failed(message) = outcome {
                warn!(domain = %domain, error = %message, "initial load failed");
            }
        }
        self.sync_rooms().await;
        connected
    }

    /// Connects (or returns the live connection) and attaches the event
    /// pump and scope membership to it.
    pub async fn connect(&self) -> Result<ConnectionHandle, SoporteError> {
        let handle = self
            .shared
            .connection
            .connect(&self.shared.identity, &self.shared.credential)
            .await?;
        self.reconcile_rooms(&handle).await;
        Ok(handle)
    }

    /// Reconnects after a transport loss. Scope membership is rebuilt from
    /// scratch because it does not survive the old transport.
    pub async fn reconnect(&self) -> Result<ConnectionHandle, SoporteError> {
        self.connect().await
    }

    /// Brings scope membership in line with the current ticket set and
    /// open views. No-op while disconnected.
    pub async fn sync_rooms(&self) -> ReconcileReport {
        match self.shared.connection.current().await {
            Some(handle) => self.reconcile_rooms(&handle).await,
            None => ReconcileReport::default(),
        }
    }

    async fn reconcile_rooms(&self, handle: &ConnectionHandle) -> ReconcileReport {
        let mut rooms = self.shared.rooms.lock().await;
        if rooms.generation != Some(handle.generation()) {
            rooms.tracker.reset();
            rooms.generation = Some(handle.generation());
            self.spawn_pump(handle);
        }

        let working_set: BTreeSet<EntityId> = self
            .shared
            .store
            .read(|s| s.ids(Collection::Tickets).into_iter().collect())
            .await;
        let views: Vec<OpenView> = rooms.views.iter().cloned().collect();
        let target = scopes_for(&self.shared.identity, &working_set, &views);
        let report = rooms
            .tracker
            .reconcile(handle.transport().as_ref(), &target)
            .await;
        if !report.joined.is_empty() || !report.left.is_empty() {
            debug!(
                joined = report.joined.len(),
                left = report.left.len(),
                failed = report.failed.len(),
                "scope membership reconciled"
            );
        }
        report
    }

    /// Scopes the current connection has joined.
    pub async fn joined_scopes(&self) -> BTreeSet<ScopeId> {
        self.shared.rooms.lock().await.tracker.joined().clone()
    }

    fn spawn_pump(&self, handle: &ConnectionHandle) {
        let mut events = handle.subscribe_events();
        let generation = handle.generation();
        let session = self.clone();
        self.track(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                session.handle_event(event).await;
            }
            debug!(generation, "event pump stopped");
        }));
    }

    /// Applies one inbound event: log it, normalize it, merge it into the
    /// store, and let the orchestrator react.
    pub async fn handle_event(&self, event: InboundEvent) {
        self.notifications_log().record(&event);
        let Some(change) = normalize_event(&event) else {
            return;
        };
        let action = self.shared.coordinator.absorb(&change).await;
        let outcome = self.shared.store.apply(action).await;
        debug!(event = %event.name, id = %change.id(), ?outcome, "inbound event applied");
        self.shared.orchestrator.on_event(&change);
    }

    /// Starts the working-set follower, the lifecycle watcher, and polling.
    /// Idempotent per session.
    fn spawn_followers(&self) {
        if self.shared.followers.swap(true, Ordering::SeqCst) {
            return;
        }

        let cancel = self.shared.cancel.clone();

        let session = self.clone();
        let mut revisions = self.shared.store.subscribe();
        let stop = cancel.clone();
        self.track(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        session.sync_rooms().await;
                    }
                }
            }
        }));

        let session = self.clone();
        let mut lifecycle = self.shared.connection.lifecycle();
        let stop = cancel.clone();
        self.track(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = stop.cancelled() => break,
                    event = lifecycle.recv() => event,
                };
                match event {
                    Ok(LifecycleEvent::Connected { generation }) => {
                        debug!(generation, "connected, re-joining scopes");
                        session.sync_rooms().await;
                    }
                    Ok(LifecycleEvent::Disconnected { generation, reason }) => {
                        info!(generation, reason = reason.as_deref().unwrap_or("closed"), "realtime connection lost");
                    }
                    Ok(LifecycleEvent::Error { message }) => {
                        warn!(error = %message, "realtime connection error");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed, "lifecycle watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        if let Some(interval) = self.shared.polling {
            let polling = self.shared.orchestrator.spawn_polling(interval, cancel);
            self.track(polling);
        }
    }

    /// Opens a detail, comment, or chat view of a ticket.
    pub async fn open_view(&self, view: OpenView) -> ReconcileReport {
        if let Some(ticket) = self
            .shared
            .store
            .get(Collection::Tickets, &view.ticket_id)
            .await
            && let Err(e) = self
                .shared
                .store
                .set_detail(Collection::Tickets, ticket.into_value())
                .await
        {
            debug!(error = %e, "ticket detail not set");
        }
        if view.kind == ViewKind::Comments {
            self.shared.orchestrator.watch_comments(view.ticket_id.clone());
        }
        self.shared.rooms.lock().await.views.insert(view.clone());
        if view.kind == ViewKind::Comments {
            self.shared.orchestrator.refresh(Domain::Comments).await;
        }
        self.sync_rooms().await
    }

    pub async fn close_view(&self, view: &OpenView) -> ReconcileReport {
        let (still_open, still_watching) = {
            let mut rooms = self.shared.rooms.lock().await;
            rooms.views.remove(view);
            let remaining: Vec<ViewKind> = rooms
                .views
                .iter()
                .filter(|v| v.ticket_id == view.ticket_id)
                .map(|v| v.kind)
                .collect();
            (
                !remaining.is_empty(),
                remaining.contains(&ViewKind::Comments),
            )
        };
        if view.kind == ViewKind::Comments && !still_watching {
            self.shared.orchestrator.unwatch_comments(&view.ticket_id);
        }
        let showing = self
            .shared
            .store
            .detail(Collection::Tickets)
            .await
            .is_some_and(|d| d.id() == &view.ticket_id);
        if showing && !still_open {
            self.shared.store.clear_detail(Collection::Tickets).await;
        }
        self.sync_rooms().await
    }

    /// Runs a user action optimistically.
    pub async fn perform(&self, action: Action) -> Result<Entity, SoporteError> {
        self.shared.coordinator.perform(action).await
    }

    /// Explicit "sync now".
    pub async fn manual_sync(&self) -> Vec<(Domain, RefreshOutcome)> {
        let handle = self.shared.connection.current().await;
        self.shared.orchestrator.manual_sync(handle.as_ref()).await
    }

    /// Actions this session's role may take on a ticket right now.
    pub async fn actions_for(&self, ticket_id: &EntityId) -> Vec<TicketAction> {
        let role = self.shared.identity.role;
        self.shared
            .store
            .read(|s| {
                s.get(Collection::Tickets, ticket_id)
                    .and_then(TicketView::from_entity)
                    .map(|view| available_actions(role, &view))
                    .unwrap_or_default()
            })
            .await
    }

    /// The most recent `n` inbound events, oldest first.
    pub fn recent_notifications(&self, n: usize) -> Vec<Notification> {
        self.notifications_log().recent(n)
    }

    /// Stops background work and closes the connection.
    pub async fn stop(&self) {
        self.shared.cancel.cancel();
        self.shared.orchestrator.cancel_scheduled();
        self.shared.connection.shutdown().await;
        let tasks = std::mem::take(&mut *self.shared.tasks.lock().unwrap_or_else(|p| p.into_inner()));
        for task in tasks {
            task.abort();
        }
        self.shared.rooms.lock().await.tracker.reset();
        info!(user_id = %self.shared.identity.user_id, "session stopped");
    }

    /// Stops the session and forgets every persisted credential.
    pub async fn logout(&self, credentials: &dyn CredentialStore) -> Result<(), SoporteError> {
        self.stop().await;
        credentials.clear_all()
    }
}
