// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refresh orchestration.
//!
//! Each data domain (tickets, comments, analysts) has one in-flight guard:
//! a refresh requested while another is outstanding is coalesced into it,
//! never queued. Refreshes are triggered by inbound events, by an optional
//! polling timer, by the debounced re-fetch after a confirmed action, and
//! by an explicit manual sync. A failed refresh leaves the store as it was.
//!
//! Observers follow progress through [`SyncOrchestrator::subscribe`].

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Value, json};
use soporte_core::{Collection, Domain, EntityId, Role, SoporteError, TicketApi};
use soporte_identity::Identity;
use soporte_realtime::{ConnectionHandle, Normalized};
use soporte_store::{StoreAction, StoreHandle};
use strum::IntoEnumIterator;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::optimistic::is_temporary;

const SIGNAL_CAPACITY: usize = 64;

/// Event emitted to ask the server to push fresh state.
pub const REQUEST_SYNC_EVENT: &str = "request_sync";

/// What one refresh request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The collection was replaced with this many entities.
    Refreshed(usize),
    /// Another refresh of the domain was already running.
    Coalesced,
    /// Nothing to fetch for this session (no watched tickets, or a role
    /// that does not see the domain).
    Skipped,
    /// The fetch failed; the store was left untouched.
    Failed(String),
}

/// Notifications for in-process observers. Receivers unsubscribe by being
/// dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncSignal {
    Refreshed { domain: Domain, count: usize },
    RefreshFailed {
        domain: Domain,
        message: String,
        forces_logout: bool,
    },
    /// A manual sync finished for every domain.
    SyncCompleted,
}

/// Construction parameters for [`SyncOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub refresh_on_event: bool,
    pub reconcile_debounce: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            refresh_on_event: true,
            reconcile_debounce: Duration::from_millis(750),
        }
    }
}

impl From<&soporte_config::model::SyncConfig> for OrchestratorSettings {
    fn from(config: &soporte_config::model::SyncConfig) -> Self {
        Self {
            refresh_on_event: config.refresh_on_event,
            reconcile_debounce: config.reconcile_debounce(),
        }
    }
}

/// Pending debounced refresh. `timer` is only set while the timer is still
/// sleeping; once it fires it owns the domains it took and runs to the end.
#[derive(Default)]
struct Debounce {
    domains: BTreeSet<Domain>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct Inner {
    api: Arc<dyn TicketApi>,
    store: StoreHandle,
    role: Role,
    user_id: String,
    settings: OrchestratorSettings,
    in_flight: Mutex<HashSet<Domain>>,
    comment_tickets: Mutex<BTreeSet<EntityId>>,
    debounce: Mutex<Debounce>,
    signals: broadcast::Sender<SyncSignal>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Releases a domain's in-flight slot when the refresh ends, however it ends.
struct InFlight<'a> {
    inner: &'a Inner,
    domain: Domain,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(&self.inner.in_flight).remove(&self.domain);
    }
}

/// Coordinates refreshes of the store from the REST collaborator.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("role", &self.inner.role)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    pub fn new(
        api: Arc<dyn TicketApi>,
        store: StoreHandle,
        identity: &Identity,
        settings: OrchestratorSettings,
    ) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                role: identity.role,
                user_id: identity.user_id.clone(),
                settings,
                in_flight: Mutex::new(HashSet::new()),
                comment_tickets: Mutex::new(BTreeSet::new()),
                debounce: Mutex::new(Debounce::default()),
                signals,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncSignal> {
        self.inner.signals.subscribe()
    }

    pub fn store(&self) -> &StoreHandle {
        &self.inner.store
    }

    /// Includes `ticket_id`'s comments in the comments domain.
    pub fn watch_comments(&self, ticket_id: EntityId) {
        lock(&self.inner.comment_tickets).insert(ticket_id);
    }

    pub fn unwatch_comments(&self, ticket_id: &EntityId) {
        lock(&self.inner.comment_tickets).remove(ticket_id);
    }

    pub fn is_refreshing(&self, domain: Domain) -> bool {
        lock(&self.inner.in_flight).contains(&domain)
    }

    /// Re-fetches one domain and replaces its collection.
    pub async fn refresh(&self, domain: Domain) -> RefreshOutcome {
        if !lock(&self.inner.in_flight).insert(domain) {
            debug!(domain = %domain, "refresh already in flight, coalescing");
            return RefreshOutcome::Coalesced;
        }
        let _slot = InFlight {
            inner: &self.inner,
            domain,
        };

        let fetched = match domain {
            Domain::Tickets => self
                .inner
                .api
                .list_tickets(self.inner.role)
                .await
                .map(|tickets| Some((Collection::Tickets, tickets))),
            Domain::Comments => self.fetch_comments().await,
            Domain::Analysts if self.inner.role.has_cross_ticket_awareness() => self
                .inner
                .api
                .list_analysts()
                .await
                .map(|analysts| Some((Collection::Analysts, analysts))),
            Domain::Analysts => Ok(None),
        };

        match fetched {
            Ok(Some((collection, entities))) => {
                let count = entities.len();
                self.inner
                    .store
                    .apply(StoreAction::set_list(collection, entities))
                    .await;
                debug!(domain = %domain, count, "domain refreshed");
                let _ = self.inner.signals.send(SyncSignal::Refreshed { domain, count });
                RefreshOutcome::Refreshed(count)
            }
            Ok(None) => RefreshOutcome::Skipped,
            Err(err) => {
                warn!(domain = %domain, error = %err, "refresh failed, keeping current data");
                let _ = self.inner.signals.send(SyncSignal::RefreshFailed {
                    domain,
                    message: err.to_string(),
                    forces_logout: err.forces_logout(),
                });
                RefreshOutcome::Failed(err.to_string())
            }
        }
    }

    /// Comments of every watched ticket, with unconfirmed optimistic
    /// comments kept at the front.
    async fn fetch_comments(&self) -> Result<Option<(Collection, Vec<Value>)>, SoporteError> {
        let tickets: Vec<EntityId> = lock(&self.inner.comment_tickets).iter().cloned().collect();
        if tickets.is_empty() {
            return Ok(None);
        }

        let results = join_all(tickets.iter().map(|id| self.inner.api.list_comments(id))).await;
        let mut fetched = Vec::new();
        for result in results {
            fetched.extend(result?);
        }

        let mut comments: Vec<Value> = self
            .inner
            .store
            .list(Collection::Comments)
            .await
            .into_iter()
            .filter(|c| is_temporary(c.id()))
            .map(|c| c.into_value())
            .collect();
        comments.extend(fetched);
        Ok(Some((Collection::Comments, comments)))
    }

    /// Refreshes every domain concurrently.
    pub async fn refresh_all(&self) -> Vec<(Domain, RefreshOutcome)> {
        let domains: Vec<Domain> = Domain::iter().collect();
        let outcomes = join_all(domains.iter().map(|d| self.refresh(*d))).await;
        domains.into_iter().zip(outcomes).collect()
    }

    /// Explicit "sync now": refreshes every domain regardless of what
    /// changed and, when connected, asks the server to push fresh state.
    pub async fn manual_sync(
        &self,
        connection: Option<&ConnectionHandle>,
    ) -> Vec<(Domain, RefreshOutcome)> {
        if let Some(handle) = connection {
            let payload = json!({
                "role": self.inner.role.as_ref(),
                "user_id": self.inner.user_id,
                "sync_type": "total",
            });
            if let Err(e) = handle.emit(REQUEST_SYNC_EVENT, None, payload).await {
                warn!(error = %e, "sync request could not be sent");
            }
        }
        let outcomes = self.refresh_all().await;
        info!(role = %self.inner.role, "manual sync finished");
        let _ = self.inner.signals.send(SyncSignal::SyncCompleted);
        outcomes
    }

    /// Reacts to an applied inbound change by refreshing its domain in the
    /// background. Returns the spawned task, if any.
    pub fn on_event(&self, change: &Normalized) -> Option<JoinHandle<RefreshOutcome>> {
        if !self.inner.settings.refresh_on_event {
            return None;
        }
        let domain = change.domain()?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.refresh(domain).await }))
    }

    /// Queues a reconciling refresh of `domain` after the debounce delay.
    /// Requests inside the delay restart it and share one refresh. A request
    /// arriving after the timer fired starts a new timer and leaves the
    /// running refreshes alone.
    pub fn schedule_refresh(&self, domain: Domain) {
        let mut debounce = lock(&self.inner.debounce);
        debounce.domains.insert(domain);
        debounce.generation += 1;
        if let Some(timer) = debounce.timer.take() {
            timer.abort();
        }

        let this = self.clone();
        let delay = self.inner.settings.reconcile_debounce;
        let generation = debounce.generation;
        debounce.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let domains = {
                let mut debounce = lock(&this.inner.debounce);
                if debounce.generation != generation {
                    return;
                }
                debounce.timer = None;
                std::mem::take(&mut debounce.domains)
            };
            for domain in domains {
                this.refresh(domain).await;
            }
        }));
    }

    /// Refreshes every domain each `interval` until `cancel` fires.
    pub fn spawn_polling(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the session has just
            // done its initial load.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!("polling refresh");
                        this.refresh_all().await;
                    }
                }
            }
            debug!("polling stopped");
        })
    }

    /// Cancels a pending debounced refresh.
    pub fn cancel_scheduled(&self) {
        let mut debounce = lock(&self.inner.debounce);
        debounce.domains.clear();
        debounce.generation += 1;
        if let Some(timer) = debounce.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soporte_identity::decode;
    use soporte_test_utils::{MockTicketApi, mint_valid_token};

    fn orchestrator(api: Arc<MockTicketApi>, role: Role) -> SyncOrchestrator {
        let identity = decode(&mint_valid_token("1", role)).unwrap();
        SyncOrchestrator::new(api, StoreHandle::new(), &identity, OrchestratorSettings::default())
    }

    #[tokio::test]
    async fn refresh_replaces_the_collection() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![
            json!({"id": 1, "estado": "en_espera"}),
            json!({"id": 2, "estado": "escalado"}),
        ]));
        let orch = orchestrator(api.clone(), Role::Supervisor);
        let mut signals = orch.subscribe();

        assert_eq!(orch.refresh(Domain::Tickets).await, RefreshOutcome::Refreshed(2));
        assert_eq!(orch.store().list(Collection::Tickets).await.len(), 2);
        assert_eq!(api.calls(), vec!["list_tickets:supervisor"]);
        assert_eq!(
            signals.recv().await.unwrap(),
            SyncSignal::Refreshed {
                domain: Domain::Tickets,
                count: 2
            }
        );
    }

    #[tokio::test]
    async fn refresh_follows_server_side_additions_and_removals() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![
            json!({"id": 1, "estado": "en_espera"}),
            json!({"id": 2, "estado": "escalado"}),
        ]));
        let orch = orchestrator(api.clone(), Role::Supervisor);
        orch.refresh(Domain::Tickets).await;

        api.remove_ticket(&EntityId::Int(1));
        api.insert_ticket(json!({"id": 2, "estado": "en_espera"}));
        api.insert_ticket(json!({"id": 3, "estado": "creado"}));
        assert_eq!(orch.refresh(Domain::Tickets).await, RefreshOutcome::Refreshed(2));

        let tickets = orch.store().list(Collection::Tickets).await;
        let ids: Vec<&EntityId> = tickets.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![&EntityId::Int(2), &EntityId::Int(3)]);
        assert_eq!(tickets[0].get("estado"), Some(&json!("en_espera")));
    }

    #[tokio::test]
    async fn concurrent_refreshes_coalesce() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1})]));
        api.set_delay(Duration::from_millis(50));
        let orch = orchestrator(api.clone(), Role::Analista);

        let (a, b) = tokio::join!(orch.refresh(Domain::Tickets), orch.refresh(Domain::Tickets));
        let outcomes = [a, b];
        assert!(outcomes.contains(&RefreshOutcome::Coalesced));
        assert!(outcomes.contains(&RefreshOutcome::Refreshed(1)));
        assert_eq!(api.call_count("list_tickets"), 1);
        assert!(!orch.is_refreshing(Domain::Tickets));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_prior_data() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1, "estado": "en_espera"})]));
        let orch = orchestrator(api.clone(), Role::Supervisor);
        orch.refresh(Domain::Tickets).await;
        let before = orch.store().snapshot().await;

        api.set_failure(Some(500));
        assert!(matches!(orch.refresh(Domain::Tickets).await, RefreshOutcome::Failed(_)));
        assert_eq!(orch.store().snapshot().await, before);
    }

    #[tokio::test]
    async fn unauthorized_refresh_signals_logout() {
        let api = Arc::new(MockTicketApi::new());
        api.set_failure(Some(401));
        let orch = orchestrator(api, Role::Cliente);
        let mut signals = orch.subscribe();

        orch.refresh(Domain::Tickets).await;
        assert!(matches!(
            signals.recv().await.unwrap(),
            SyncSignal::RefreshFailed {
                forces_logout: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn comments_follow_watched_tickets() {
        let api = Arc::new(MockTicketApi::new());
        api.add_comment(json!({"id": 1, "id_ticket": 42, "texto": "a"}));
        api.add_comment(json!({"id": 2, "id_ticket": 43, "texto": "b"}));
        let orch = orchestrator(api.clone(), Role::Analista);

        assert_eq!(orch.refresh(Domain::Comments).await, RefreshOutcome::Skipped);
        orch.watch_comments(EntityId::Int(42));
        assert_eq!(orch.refresh(Domain::Comments).await, RefreshOutcome::Refreshed(1));
        assert_eq!(api.call_count("list_comments"), 1);
    }

    #[tokio::test]
    async fn analysts_are_skipped_for_clients() {
        let api = Arc::new(MockTicketApi::new());
        let orch = orchestrator(api.clone(), Role::Cliente);
        assert_eq!(orch.refresh(Domain::Analysts).await, RefreshOutcome::Skipped);
        assert_eq!(api.call_count("list_analysts"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_refreshes_debounce_into_one() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1})]));
        let orch = orchestrator(api.clone(), Role::Supervisor);

        orch.schedule_refresh(Domain::Tickets);
        tokio::time::sleep(Duration::from_millis(100)).await;
        orch.schedule_refresh(Domain::Tickets);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(api.call_count("list_tickets"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn request_after_the_timer_fired_does_not_cut_its_refreshes() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1, "estado": "en_espera"})]));
        api.set_delay(Duration::from_millis(500));
        let identity = decode(&mint_valid_token("1", Role::Supervisor)).unwrap();
        let orch = SyncOrchestrator::new(
            api.clone(),
            StoreHandle::new(),
            &identity,
            OrchestratorSettings {
                refresh_on_event: true,
                reconcile_debounce: Duration::from_millis(100),
            },
        );
        orch.watch_comments(EntityId::Int(1));

        orch.schedule_refresh(Domain::Tickets);
        orch.schedule_refresh(Domain::Comments);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(api.call_count("list_tickets"), 1);

        orch.schedule_refresh(Domain::Analysts);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(api.call_count("list_tickets"), 1);
        assert_eq!(api.call_count("list_comments"), 1);
        assert_eq!(api.call_count("list_analysts"), 1);
        assert_eq!(orch.store().list(Collection::Tickets).await.len(), 1);
        assert!(!orch.is_refreshing(Domain::Tickets));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_schedule_fetches_nothing() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1})]));
        let orch = orchestrator(api.clone(), Role::Supervisor);

        orch.schedule_refresh(Domain::Tickets);
        orch.cancel_scheduled();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.call_count("list_tickets"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_runs_until_cancelled() {
        let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1})]));
        let orch = orchestrator(api.clone(), Role::Supervisor);
        let cancel = CancellationToken::new();

        let task = orch.spawn_polling(Duration::from_secs(30), cancel.clone());
        tokio::time::sleep(Duration::from_secs(95)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(api.call_count("list_tickets"), 3);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.call_count("list_tickets"), 3);
    }
}
