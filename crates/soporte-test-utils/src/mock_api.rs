// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory REST collaborator.
//!
//! `MockTicketApi` keeps tickets, comments and analysts in memory and
//! applies mutations the way the backend does, so several dashboards can
//! share one instance. Failures and latency are injectable.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use soporte_core::{EntityId, Role, SoporteError, TicketApi, TicketStatus};

const FIRST_COMMENT_ID: i64 = 1000;

#[derive(Default)]
struct ApiState {
    tickets: Vec<Value>,
    comments: Vec<Value>,
    analysts: Vec<Value>,
    recommendations: HashMap<EntityId, Value>,
    recommendation_delays: HashMap<EntityId, Duration>,
    failure: Option<u16>,
    delay: Duration,
    calls: Vec<String>,
    next_comment_id: i64,
}

fn id_of(value: &Value) -> Option<EntityId> {
    value.get("id").and_then(EntityId::from_value)
}

/// Mock backend API for deterministic testing.
pub struct MockTicketApi {
    state: Mutex<ApiState>,
}

impl Default for MockTicketApi {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTicketApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTicketApi").finish_non_exhaustive()
    }
}

impl MockTicketApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ApiState {
                next_comment_id: FIRST_COMMENT_ID,
                ..ApiState::default()
            }),
        }
    }

    /// A backend preloaded with `tickets`.
    pub fn with_tickets(tickets: Vec<Value>) -> Self {
        let api = Self::new();
        api.lock().tickets = tickets;
        api
    }

    fn lock(&self) -> MutexGuard<'_, ApiState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_ticket(&self, ticket: Value) {
        let mut state = self.lock();
        let id = id_of(&ticket);
        state.tickets.retain(|t| id_of(t) != id);
        state.tickets.push(ticket);
    }

    pub fn remove_ticket(&self, id: &EntityId) {
        self.lock().tickets.retain(|t| id_of(t).as_ref() != Some(id));
    }

    pub fn ticket(&self, id: &EntityId) -> Option<Value> {
        self.lock()
            .tickets
            .iter()
            .find(|t| id_of(t).as_ref() == Some(id))
            .cloned()
    }

    pub fn add_analyst(&self, analyst: Value) {
        self.lock().analysts.push(analyst);
    }

    pub fn add_comment(&self, comment: Value) {
        self.lock().comments.push(comment);
    }

    pub fn set_recommendation(&self, ticket_id: EntityId, recommendation: Value) {
        self.lock().recommendations.insert(ticket_id, recommendation);
    }

    /// Delays the recommendation fetch of one ticket.
    pub fn set_recommendation_delay(&self, ticket_id: EntityId, delay: Duration) {
        self.lock().recommendation_delays.insert(ticket_id, delay);
    }

    /// Every call fails with `status` until cleared with `None`.
    pub fn set_failure(&self, status: Option<u16>) {
        self.lock().failure = status;
    }

    /// Latency added to every call.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// Calls received so far, e.g. `list_tickets:analista`, `assign:42`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls whose name starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Records the call, waits out the latency, then checks for an injected
    /// failure. The state lock is never held across the wait.
    async fn enter(&self, call: String) -> Result<(), SoporteError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(call);
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.lock().failure {
            Some(status) => Err(SoporteError::request(
                Some(status),
                format!("mock backend returned {status}"),
            )),
            None => Ok(()),
        }
    }

    fn update_ticket(
        &self,
        ticket_id: &EntityId,
        apply: impl FnOnce(&mut serde_json::Map<String, Value>),
    ) -> Result<Value, SoporteError> {
        let mut state = self.lock();
        let ticket = state
            .tickets
            .iter_mut()
            .find(|t| id_of(t).as_ref() == Some(ticket_id))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| SoporteError::request(Some(404), format!("ticket {ticket_id} not found")))?;
        apply(ticket);
        Ok(Value::Object(ticket.clone()))
    }
}

#[async_trait]
impl TicketApi for MockTicketApi {
    async fn list_tickets(&self, role: Role) -> Result<Vec<Value>, SoporteError> {
        self.enter(format!("list_tickets:{role}")).await?;
        Ok(self.lock().tickets.clone())
    }

    async fn change_status(
        &self,
        ticket_id: &EntityId,
        estado: TicketStatus,
    ) -> Result<Value, SoporteError> {
        self.enter(format!("change_status:{ticket_id}")).await?;
        self.update_ticket(ticket_id, |ticket| {
            ticket.insert("estado".into(), Value::from(estado.as_ref()));
        })
    }

    async fn assign(
        &self,
        ticket_id: &EntityId,
        analyst_id: &EntityId,
        reassignment: bool,
    ) -> Result<Value, SoporteError> {
        self.enter(format!("assign:{ticket_id}")).await?;
        self.update_ticket(ticket_id, |ticket| {
            ticket.insert(
                "asignacion_actual".into(),
                json!({
                    "id_analista": analyst_id.to_value(),
                    "es_reasignacion": reassignment,
                }),
            );
            ticket.insert("estado".into(), Value::from(TicketStatus::EnEspera.as_ref()));
        })
    }

    async fn create_comment(
        &self,
        ticket_id: &EntityId,
        texto: &str,
    ) -> Result<Value, SoporteError> {
        self.enter(format!("create_comment:{ticket_id}")).await?;
        let mut state = self.lock();
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        let comment = json!({
            "id": id,
            "id_ticket": ticket_id.to_value(),
            "texto": texto,
        });
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, ticket_id: &EntityId) -> Result<Vec<Value>, SoporteError> {
        self.enter(format!("list_comments:{ticket_id}")).await?;
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|c| c.get("id_ticket").and_then(EntityId::from_value).as_ref() == Some(ticket_id))
            .cloned()
            .collect())
    }

    async fn list_analysts(&self) -> Result<Vec<Value>, SoporteError> {
        self.enter("list_analysts".into()).await?;
        Ok(self.lock().analysts.clone())
    }

    async fn fetch_recommendation(&self, ticket_id: &EntityId) -> Result<Value, SoporteError> {
        self.enter(format!("fetch_recommendation:{ticket_id}")).await?;
        let delay = self.lock().recommendation_delays.get(ticket_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lock()
            .recommendations
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| SoporteError::request(Some(404), "no recommendation"))
    }
}
