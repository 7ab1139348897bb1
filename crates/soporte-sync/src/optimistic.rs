// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic ticket actions.
//!
//! [`OptimisticCoordinator::perform`] applies the expected result of an
//! action to the store at once, then calls the REST collaborator. On
//! success the server's record replaces the optimistic one, the change is
//! broadcast to the ticket's scope, and a debounced refresh is queued. On
//! failure the touched entity is restored to exactly what it was and the
//! error is returned. Nothing is retried.
//!
//! Overlapping actions on one entity share a single rollback point: the
//! state before the first of them, moved forward by each confirmation. A
//! failure only writes it back once no other action on the entity is
//! outstanding.
//!
//! New comments get a `tmp-` id until confirmed. An inbound event for the
//! persisted comment that arrives first is matched to the temporary one by
//! ticket and text, so the comment is never shown twice.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use soporte_core::{Collection, Domain, EntityId, ScopeId, SoporteError, TicketApi, TicketStatus};
use soporte_realtime::{ConnectionManager, Normalized};
use soporte_store::{
    Entity, Placement, Positioned, StoreAction, StoreHandle, TicketAction, target_status,
};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::orchestrator::SyncOrchestrator;

/// Prefix of client-generated ids.
pub const TEMP_PREFIX: &str = "tmp-";

/// Whether `id` was generated locally for an unconfirmed entity.
pub fn is_temporary(id: &EntityId) -> bool {
    matches!(id, EntityId::Str(s) if s.starts_with(TEMP_PREFIX))
}

fn temporary_id() -> EntityId {
    EntityId::Str(format!("{TEMP_PREFIX}{}", Uuid::new_v4()))
}

/// Action names accepted from callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    #[strum(serialize = "asignar", serialize = "assign")]
    Assign,
    #[strum(serialize = "reasignar", serialize = "reassign")]
    Reassign,
    #[strum(serialize = "cambiar_estado", serialize = "estado", serialize = "change_status")]
    ChangeStatus,
    #[strum(serialize = "comentar", serialize = "comment")]
    Comment,
}

/// One user action against a ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Assign {
        ticket_id: EntityId,
        analyst_id: EntityId,
        reassignment: bool,
    },
    ChangeStatus {
        ticket_id: EntityId,
        estado: TicketStatus,
    },
    Comment {
        ticket_id: EntityId,
        texto: String,
    },
}

impl Action {
    pub fn assign(ticket_id: impl Into<EntityId>, analyst_id: impl Into<EntityId>) -> Self {
        Self::Assign {
            ticket_id: ticket_id.into(),
            analyst_id: analyst_id.into(),
            reassignment: false,
        }
    }

    pub fn reassign(ticket_id: impl Into<EntityId>, analyst_id: impl Into<EntityId>) -> Self {
        Self::Assign {
            ticket_id: ticket_id.into(),
            analyst_id: analyst_id.into(),
            reassignment: true,
        }
    }

    pub fn change_status(ticket_id: impl Into<EntityId>, estado: TicketStatus) -> Self {
        Self::ChangeStatus {
            ticket_id: ticket_id.into(),
            estado,
        }
    }

    pub fn comment(ticket_id: impl Into<EntityId>, texto: impl Into<String>) -> Self {
        Self::Comment {
            ticket_id: ticket_id.into(),
            texto: texto.into(),
        }
    }

    /// Builds an action from its name and single argument (analyst id,
    /// status, or comment text). Unknown names and bad arguments are
    /// [`SoporteError::InvalidAction`].
    pub fn parse(name: &str, ticket_id: EntityId, argument: &str) -> Result<Self, SoporteError> {
        let kind = ActionKind::from_str(name)
            .map_err(|_| SoporteError::InvalidAction(format!("unknown action `{name}`")))?;
        match kind {
            ActionKind::Assign | ActionKind::Reassign => {
                let analyst_id = EntityId::from_value(&Value::from(argument)).ok_or_else(|| {
                    SoporteError::InvalidAction(format!("`{name}` needs an analyst id"))
                })?;
                Ok(Self::Assign {
                    ticket_id,
                    analyst_id,
                    reassignment: kind == ActionKind::Reassign,
                })
            }
            ActionKind::ChangeStatus => {
                let estado = TicketStatus::from_str(argument.trim()).map_err(|_| {
                    SoporteError::InvalidAction(format!("unknown status `{argument}`"))
                })?;
                Ok(Self::ChangeStatus { ticket_id, estado })
            }
            ActionKind::Comment => Ok(Self::comment(ticket_id, argument)),
        }
    }

    /// The ticket action a dashboard button maps to. `argument` is the
    /// analyst id for assignments and the text for comments.
    pub fn from_ticket_action(
        action: TicketAction,
        ticket_id: EntityId,
        argument: Option<&str>,
    ) -> Result<Self, SoporteError> {
        match action {
            TicketAction::Assign => Self::parse("asignar", ticket_id, argument.unwrap_or_default()),
            TicketAction::Reassign => {
                Self::parse("reasignar", ticket_id, argument.unwrap_or_default())
            }
            TicketAction::Comment => Ok(Self::comment(ticket_id, argument.unwrap_or_default())),
            other => target_status(other)
                .map(|estado| Self::ChangeStatus { ticket_id, estado })
                .ok_or_else(|| SoporteError::InvalidAction(other.to_string())),
        }
    }

    pub fn ticket_id(&self) -> &EntityId {
        match self {
            Self::Assign { ticket_id, .. }
            | Self::ChangeStatus { ticket_id, .. }
            | Self::Comment { ticket_id, .. } => ticket_id,
        }
    }

    /// Event broadcast to the ticket's scope once the action is confirmed.
    pub fn broadcast_event(&self) -> &'static str {
        use TicketStatus::*;
        match self {
            Self::Assign { .. } => "ticket_asignado",
            Self::ChangeStatus { estado, .. } => match estado {
                Escalado => "ticket_escalado",
                Solucionado => "ticket_solucionado",
                Cerrado | CerradoPorCliente | CerradoPorSupervisor => "ticket_cerrado",
                Reabierto => "ticket_reabierto",
                SolicitudReapertura => "solicitud_reapertura",
                _ => "ticket_updated",
            },
            Self::Comment { .. } => "nuevo_comentario",
        }
    }

    fn collection(&self) -> Collection {
        match self {
            Self::Comment { .. } => Collection::Comments,
            _ => Collection::Tickets,
        }
    }
}

/// Unresolved actions on one entity and the state a failure falls back to.
#[derive(Debug)]
struct Outstanding {
    base: Option<Positioned>,
    count: usize,
}

type EntityKey = (Collection, EntityId);

#[derive(Debug, Clone)]
struct PendingComment {
    temp_id: EntityId,
    ticket_id: EntityId,
    texto: String,
    created: Instant,
}

/// Runs actions optimistically against the shared store.
pub struct OptimisticCoordinator {
    api: Arc<dyn TicketApi>,
    store: StoreHandle,
    orchestrator: SyncOrchestrator,
    connection: ConnectionManager,
    author: String,
    request_timeout: Duration,
    match_window: Duration,
    pending: Mutex<Vec<PendingComment>>,
    outstanding: tokio::sync::Mutex<HashMap<EntityKey, Outstanding>>,
}

impl std::fmt::Debug for OptimisticCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticCoordinator")
            .field("author", &self.author)
            .field("pending", &self.lock_pending().len())
            .finish_non_exhaustive()
    }
}

impl OptimisticCoordinator {
    pub fn new(
        api: Arc<dyn TicketApi>,
        orchestrator: SyncOrchestrator,
        connection: ConnectionManager,
        author: impl Into<String>,
    ) -> Self {
        Self {
            api,
            store: orchestrator.store().clone(),
            orchestrator,
            connection,
            author: author.into(),
            request_timeout: Duration::from_secs(15),
            match_window: Duration::from_secs(30),
            pending: Mutex::new(Vec::new()),
            outstanding: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_match_window(mut self, window: Duration) -> Self {
        self.match_window = window;
        self
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<PendingComment>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Unconfirmed optimistic comments.
    pub fn pending_comments(&self) -> usize {
        self.lock_pending().len()
    }

    /// Applies `action` locally, confirms it with the backend, and either
    /// keeps the server's record or rolls the local change back.
    pub async fn perform(&self, action: Action) -> Result<Entity, SoporteError> {
        if let Action::Comment { texto, .. } = &action
            && texto.trim().is_empty()
        {
            return Err(SoporteError::InvalidAction("comment text is empty".into()));
        }

        let collection = action.collection();
        let (target, optimistic) = self.optimistic_change(&action);
        let key = (collection, target.clone());
        {
            let mut outstanding = self.outstanding.lock().await;
            let (prior, _) = self
                .store
                .apply_captured(collection, &target, optimistic)
                .await;
            outstanding
                .entry(key.clone())
                .and_modify(|o| o.count += 1)
                .or_insert(Outstanding {
                    base: prior,
                    count: 1,
                });
        }
        debug!(ticket_id = %action.ticket_id(), event = action.broadcast_event(), "optimistic change applied");

        let confirmed = tokio::time::timeout(self.request_timeout, self.call(&action))
            .await
            .unwrap_or(Err(SoporteError::Timeout {
                duration: self.request_timeout,
            }));

        match confirmed {
            Ok(server) => Ok(self.confirm(&action, &key, server).await),
            Err(err) => {
                self.roll_back(&key).await;
                self.lock_pending().retain(|p| p.temp_id != target);
                warn!(
                    ticket_id = %action.ticket_id(),
                    error = %err,
                    "action failed, optimistic change rolled back"
                );
                self.orchestrator.schedule_refresh(domain_of(collection));
                Err(err)
            }
        }
    }

    /// Restores the entity's rollback point if this was its last
    /// outstanding action.
    async fn roll_back(&self, key: &EntityKey) {
        let mut outstanding = self.outstanding.lock().await;
        let Some(entry) = outstanding.get_mut(key) else {
            return;
        };
        entry.count -= 1;
        if entry.count > 0 {
            debug!(id = %key.1, remaining = entry.count, "other actions outstanding, rollback deferred");
            return;
        }
        let prior = outstanding.remove(key).and_then(|entry| entry.base);
        self.store
            .apply(StoreAction::Restore {
                collection: key.0,
                id: key.1.clone(),
                prior,
            })
            .await;
    }

    /// The id the action touches and the store mutation that shows its
    /// expected result.
    fn optimistic_change(&self, action: &Action) -> (EntityId, StoreAction) {
        match action {
            Action::Assign {
                ticket_id,
                analyst_id,
                reassignment,
            } => {
                let patch = json!({
                    "id": ticket_id.to_value(),
                    "estado": TicketStatus::EnEspera.as_ref(),
                    "asignacion_actual": {
                        "id_analista": analyst_id.to_value(),
                        "es_reasignacion": reassignment,
                    },
                });
                (
                    ticket_id.clone(),
                    StoreAction::patch(Collection::Tickets, patch),
                )
            }
            Action::ChangeStatus { ticket_id, estado } => {
                let patch = json!({ "id": ticket_id.to_value(), "estado": estado.as_ref() });
                (
                    ticket_id.clone(),
                    StoreAction::patch(Collection::Tickets, patch),
                )
            }
            Action::Comment { ticket_id, texto } => {
                let temp_id = temporary_id();
                self.lock_pending().push(PendingComment {
                    temp_id: temp_id.clone(),
                    ticket_id: ticket_id.clone(),
                    texto: texto.clone(),
                    created: Instant::now(),
                });
                let comment = json!({
                    "id": temp_id.to_value(),
                    "id_ticket": ticket_id.to_value(),
                    "texto": texto,
                    "autor": self.author,
                    "pendiente": true,
                });
                (
                    temp_id,
                    StoreAction::Upsert {
                        collection: Collection::Comments,
                        entity: comment,
                        placement: Placement::Front,
                    },
                )
            }
        }
    }

    async fn call(&self, action: &Action) -> Result<Value, SoporteError> {
        match action {
            Action::Assign {
                ticket_id,
                analyst_id,
                reassignment,
            } => self.api.assign(ticket_id, analyst_id, *reassignment).await,
            Action::ChangeStatus { ticket_id, estado } => {
                self.api.change_status(ticket_id, *estado).await
            }
            Action::Comment { ticket_id, texto } => self.api.create_comment(ticket_id, texto).await,
        }
    }

    /// Keeps the server's record, broadcasts it, and queues a refresh.
    async fn confirm(&self, action: &Action, key: &EntityKey, server: Value) -> Entity {
        let (collection, target) = (key.0, &key.1);
        let mut outstanding = self.outstanding.lock().await;
        let canonical = match Entity::from_value(server) {
            Ok(entity) => {
                let write = if is_temporary(target) {
                    StoreAction::ReplaceId {
                        collection,
                        from: target.clone(),
                        entity: entity.to_value(),
                    }
                } else {
                    StoreAction::upsert(collection, entity.to_value())
                };
                self.store.apply(write).await;
                self.lock_pending().retain(|p| &p.temp_id != target);
                Some(entity)
            }
            Err(err) => {
                debug!(error = %err, "server response carries no record, keeping optimistic state");
                None
            }
        };
        if let Some(entry) = outstanding.get_mut(key) {
            entry.count -= 1;
            if entry.count == 0 {
                outstanding.remove(key);
            } else {
                entry.base = self
                    .store
                    .read(|store| store.capture(collection, target))
                    .await;
            }
        }
        drop(outstanding);

        let entity = match canonical {
            Some(entity) => entity,
            None => match self.store.get(collection, target).await {
                Some(entity) => entity,
                None => Entity::with_fields(target.clone(), Map::new()),
            },
        };

        self.broadcast(action, &entity).await;
        self.orchestrator.schedule_refresh(domain_of(collection));
        info!(ticket_id = %action.ticket_id(), event = action.broadcast_event(), "action confirmed");
        entity
    }

    async fn broadcast(&self, action: &Action, entity: &Entity) {
        let Some(handle) = self.connection.current().await else {
            debug!("not connected, skipping broadcast");
            return;
        };
        let ticket_id = action.ticket_id();
        let payload = match action {
            Action::Comment { .. } => json!({
                "ticket_id": ticket_id.to_value(),
                "comentario": entity.to_value(),
            }),
            _ => json!({
                "ticket_id": ticket_id.to_value(),
                "ticket": entity.to_value(),
            }),
        };
        let scope = ScopeId::ticket(ticket_id);
        if let Err(e) = handle
            .emit(action.broadcast_event(), Some(&scope), payload)
            .await
        {
            warn!(scope = %scope, error = %e, "broadcast after action failed");
        }
    }

    /// Turns an inbound change into the store write that applies it. A
    /// persisted comment matching a pending optimistic one takes over the
    /// temporary entry instead of being inserted beside it.
    pub async fn absorb(&self, change: &Normalized) -> StoreAction {
        let action = change.to_action();
        if change.collection() != Collection::Comments || is_temporary(change.id()) {
            return action;
        }
        let Some(incoming) = change.entity() else {
            return action;
        };

        let Some(pending) = self.take_match(incoming) else {
            return action;
        };

        let entity = match change {
            Normalized::Patch { entity, .. } => {
                match self.store.get(Collection::Comments, &pending.temp_id).await {
                    Some(mut temp) => {
                        temp.merge(entity);
                        temp.with_id(entity.id().clone())
                    }
                    None => entity.clone(),
                }
            }
            _ => incoming.clone(),
        };
        debug!(temp_id = %pending.temp_id, id = %entity.id(), "inbound comment matched an optimistic one");
        StoreAction::ReplaceId {
            collection: Collection::Comments,
            from: pending.temp_id,
            entity: entity.into_value(),
        }
    }

    fn take_match(&self, incoming: &Entity) -> Option<PendingComment> {
        let ticket_id = incoming.get("id_ticket").and_then(EntityId::from_value)?;
        let texto = incoming.get("texto").and_then(Value::as_str)?;
        let window = self.match_window;

        let mut pending = self.lock_pending();
        pending.retain(|p| p.created.elapsed() <= window);
        let index = pending
            .iter()
            .position(|p| p.ticket_id == ticket_id && p.texto == texto)?;
        Some(pending.remove(index))
    }
}

fn domain_of(collection: Collection) -> Domain {
    match collection {
        Collection::Comments => Domain::Comments,
        _ => Domain::Tickets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_parse() {
        assert_eq!(
            Action::parse("asignar", EntityId::Int(42), "7").unwrap(),
            Action::assign(42, 7)
        );
        assert_eq!(
            Action::parse("estado", EntityId::Int(1), "solucionado").unwrap(),
            Action::change_status(1, TicketStatus::Solucionado)
        );
        assert!(matches!(
            Action::parse("teletransportar", EntityId::Int(1), ""),
            Err(SoporteError::InvalidAction(_))
        ));
        assert!(matches!(
            Action::parse("estado", EntityId::Int(1), "volando"),
            Err(SoporteError::InvalidAction(_))
        ));
    }

    #[test]
    fn ticket_actions_map_to_status_changes() {
        assert_eq!(
            Action::from_ticket_action(TicketAction::Solve, EntityId::Int(3), None).unwrap(),
            Action::change_status(3, TicketStatus::Solucionado)
        );
        assert_eq!(
            Action::from_ticket_action(TicketAction::Reassign, EntityId::Int(3), Some("9")).unwrap(),
            Action::reassign(3, 9)
        );
        assert!(Action::from_ticket_action(TicketAction::Assign, EntityId::Int(3), None).is_err());
    }

    #[test]
    fn broadcast_events_follow_status() {
        assert_eq!(Action::assign(1, 2).broadcast_event(), "ticket_asignado");
        assert_eq!(
            Action::change_status(1, TicketStatus::CerradoPorCliente).broadcast_event(),
            "ticket_cerrado"
        );
        assert_eq!(
            Action::change_status(1, TicketStatus::EnProceso).broadcast_event(),
            "ticket_updated"
        );
        assert_eq!(Action::comment(1, "x").broadcast_event(), "nuevo_comentario");
    }

    #[test]
    fn temporary_ids_are_recognised() {
        assert!(is_temporary(&temporary_id()));
        assert!(!is_temporary(&EntityId::Int(5)));
        assert!(!is_temporary(&EntityId::Str("abc".into())));
    }
}
