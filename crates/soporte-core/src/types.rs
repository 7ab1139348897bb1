// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the identity, store, realtime, and sync crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Dashboard role carried by the session credential.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Cliente,
    Analista,
    Supervisor,
    Administrador,
}

impl Role {
    /// Roles that oversee every ticket rather than an assigned subset.
    pub fn has_cross_ticket_awareness(self) -> bool {
        matches!(self, Role::Supervisor | Role::Administrador)
    }
}

/// Entity identifier: integer or non-empty string.
///
/// Strings holding an integer (`"42"`) normalize to [`EntityId::Int`], so a
/// flat notification carrying `"ticket_id": "42"` addresses the same record
/// as a REST payload carrying `"id": 42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// Extracts an id from a JSON scalar. Returns `None` for null, floats,
    /// booleans, empty strings, arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntityId::Int),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else if let Ok(n) = trimmed.parse::<i64>() {
                    Some(EntityId::Int(n))
                } else {
                    Some(EntityId::Str(trimmed.to_string()))
                }
            }
            _ => None,
        }
    }

    /// JSON representation used when writing the id back into an entity.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Int(n) => Value::from(*n),
            EntityId::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(n) => write!(f, "{n}"),
            EntityId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Int(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::from_value(&Value::from(s)).unwrap_or_else(|| EntityId::Str(s.to_string()))
    }
}

/// Named collections held by the entity store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Tickets,
    Comments,
    Analysts,
    Supervisors,
    Clients,
    Assignments,
    Administrators,
    Gestiones,
    ChatMessages,
}

impl Collection {
    /// The refresh domain whose fetch rebuilds this collection, if any.
    pub fn domain(self) -> Option<Domain> {
        match self {
            Collection::Tickets | Collection::Assignments => Some(Domain::Tickets),
            Collection::Comments => Some(Domain::Comments),
            Collection::Analysts => Some(Domain::Analysts),
            _ => None,
        }
    }
}

/// Data domains the sync orchestrator refreshes independently.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Tickets,
    Comments,
    Analysts,
}

/// Ticket status as reported by the backend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Creado,
    SinAsignar,
    EnEspera,
    EnProceso,
    Escalado,
    Solucionado,
    Reabierto,
    SolicitudReapertura,
    Cerrado,
    CerradoPorSupervisor,
    CerradoPorCliente,
}

impl TicketStatus {
    /// Parses the `estado` field of a ticket record.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| s.trim().parse().ok())
    }

    /// Terminal states accept no further work other than a reopen request.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TicketStatus::Cerrado
                | TicketStatus::CerradoPorSupervisor
                | TicketStatus::CerradoPorCliente
        )
    }
}

/// Logical broadcast channel on the real-time transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    /// Wraps a raw scope name as received from or sent to the transport.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// `ticket:<id>`
    pub fn ticket(id: &EntityId) -> Self {
        Self(format!("ticket:{id}"))
    }

    /// `chat_analista_cliente:<ticketId>`
    pub fn chat_analista_cliente(ticket_id: &EntityId) -> Self {
        Self(format!("chat_analista_cliente:{ticket_id}"))
    }

    /// `chat_supervisor_analista:<ticketId>`
    pub fn chat_supervisor_analista(ticket_id: &EntityId) -> Self {
        Self(format!("chat_supervisor_analista:{ticket_id}"))
    }

    /// `role:<role>`
    pub fn role(role: Role) -> Self {
        Self(format!("role:{role}"))
    }

    /// `role:<group>` for groups that are not a single role (`supervisores`).
    pub fn role_group(group: &str) -> Self {
        Self(format!("role:{group}"))
    }

    /// `role:<role>:<userId>`
    pub fn role_user(role: Role, user_id: &str) -> Self {
        Self(format!("role:{role}:{user_id}"))
    }

    /// `global:<name>`
    pub fn global(name: &str) -> Self {
        Self(format!("global:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// A named event delivered by the pub/sub collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Event name, e.g. `ticket_asignado`.
    pub name: String,
    /// Raw JSON payload, either a full embedded entity or flat fields.
    #[serde(default)]
    pub payload: Value,
}

impl InboundEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_id_accepts_scalars_only() {
        assert_eq!(EntityId::from_value(&json!(42)), Some(EntityId::Int(42)));
        assert_eq!(EntityId::from_value(&json!("42")), Some(EntityId::Int(42)));
        assert_eq!(
            EntityId::from_value(&json!("tmp-1")),
            Some(EntityId::Str("tmp-1".into()))
        );
        assert_eq!(EntityId::from_value(&json!(null)), None);
        assert_eq!(EntityId::from_value(&json!("")), None);
        assert_eq!(EntityId::from_value(&json!(1.5)), None);
        assert_eq!(EntityId::from_value(&json!({"id": 1})), None);
        assert_eq!(EntityId::from_value(&json!([1])), None);
        assert_eq!(EntityId::from_value(&json!(true)), None);
    }

    #[test]
    fn role_round_trips_through_strings() {
        use std::str::FromStr;
        for role in [
            Role::Cliente,
            Role::Analista,
            Role::Supervisor,
            Role::Administrador,
        ] {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), role);
        }
        assert!(Role::from_str("root").is_err());
    }

    #[test]
    fn ticket_status_parses_case_insensitively() {
        assert_eq!(
            TicketStatus::from_value(&json!("EN_ESPERA")),
            Some(TicketStatus::EnEspera)
        );
        assert_eq!(
            TicketStatus::from_value(&json!("solicitud_reapertura")),
            Some(TicketStatus::SolicitudReapertura)
        );
        assert_eq!(TicketStatus::from_value(&json!("archivado")), None);
        assert_eq!(TicketStatus::EnProceso.to_string(), "en_proceso");
    }

    #[test]
    fn scope_names() {
        let id = EntityId::Int(42);
        assert_eq!(ScopeId::ticket(&id).as_str(), "ticket:42");
        assert_eq!(
            ScopeId::chat_supervisor_analista(&id).as_str(),
            "chat_supervisor_analista:42"
        );
        assert_eq!(ScopeId::role(Role::Analista).as_str(), "role:analista");
        assert_eq!(
            ScopeId::role_user(Role::Analista, "7").as_str(),
            "role:analista:7"
        );
        assert_eq!(ScopeId::global("tickets").as_str(), "global:tickets");
    }

    #[test]
    fn collection_domains() {
        assert_eq!(Collection::Tickets.domain(), Some(Domain::Tickets));
        assert_eq!(Collection::Comments.domain(), Some(Domain::Comments));
        assert_eq!(Collection::Analysts.domain(), Some(Domain::Analysts));
        assert_eq!(Collection::ChatMessages.domain(), None);
    }
}
