// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps inbound events onto store mutations.
//!
//! A payload that embeds the full record (`payload.ticket`,
//! `payload.comentario`, ...) replaces the stored record. A payload with
//! only flat notification fields (`ticket_id`, `ticket_estado`, ...) becomes
//! a partial record that is merged field by field, so fields it does not
//! mention keep their stored values. Unknown events and payloads without a
//! usable id normalize to `None`.

use serde_json::{Map, Value};
use soporte_core::{Collection, Domain, EntityId, InboundEvent, TicketStatus};
use soporte_store::{Entity, StoreAction};
use tracing::warn;

/// Canonical form of an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Replace {
        collection: Collection,
        entity: Entity,
    },
    Patch {
        collection: Collection,
        entity: Entity,
    },
    Remove {
        collection: Collection,
        id: EntityId,
    },
}

impl Normalized {
    pub fn collection(&self) -> Collection {
        match self {
            Self::Replace { collection, .. }
            | Self::Patch { collection, .. }
            | Self::Remove { collection, .. } => *collection,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Self::Replace { entity, .. } | Self::Patch { entity, .. } => entity.id(),
            Self::Remove { id, .. } => id,
        }
    }

    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Self::Replace { entity, .. } | Self::Patch { entity, .. } => Some(entity),
            Self::Remove { .. } => None,
        }
    }

    /// Refresh domain this change belongs to.
    pub fn domain(&self) -> Option<Domain> {
        self.collection().domain()
    }

    pub fn to_action(&self) -> StoreAction {
        match self {
            Self::Replace { collection, entity } => {
                StoreAction::upsert(*collection, entity.to_value())
            }
            Self::Patch { collection, entity } => StoreAction::patch(*collection, entity.to_value()),
            Self::Remove { collection, id } => StoreAction::remove(*collection, id.clone()),
        }
    }
}

/// What an event name means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Ticket { implied: Option<TicketStatus> },
    TicketAssigned,
    TicketRemoved,
    Comment,
    Analyst,
    AnalystRemoved,
    ChatMessage,
}

fn classify(name: &str) -> Option<EventKind> {
    use TicketStatus::*;

    let ticket = |implied| Some(EventKind::Ticket { implied });
    match name {
        "ticket_created" | "nuevo_ticket" | "ticket_updated" | "ticket_actualizado" => ticket(None),
        "ticket_asignado" => Some(EventKind::TicketAssigned),
        "ticket_escalado" => ticket(Some(Escalado)),
        "ticket_solucionado" => ticket(Some(Solucionado)),
        "ticket_cerrado" => ticket(Some(Cerrado)),
        "ticket_reabierto" => ticket(Some(Reabierto)),
        "solicitud_reapertura" => ticket(Some(SolicitudReapertura)),
        "ticket_eliminado" => Some(EventKind::TicketRemoved),
        "nuevo_comentario" => Some(EventKind::Comment),
        "analista_creado" | "analista_actualizado" => Some(EventKind::Analyst),
        "analista_eliminado" => Some(EventKind::AnalystRemoved),
        "nuevo_mensaje_chat_supervisor_analista" | "nuevo_mensaje_chat_analista_cliente" => {
            Some(EventKind::ChatMessage)
        }
        _ => None,
    }
}

/// Whether `name` is an event this client understands.
pub fn is_known(name: &str) -> bool {
    classify(name).is_some()
}

pub fn normalize_event(event: &InboundEvent) -> Option<Normalized> {
    normalize(&event.name, &event.payload)
}

/// Canonical change for one event, or `None` when the event is unknown or
/// its payload is unusable.
pub fn normalize(name: &str, payload: &Value) -> Option<Normalized> {
    let kind = classify(name)?;
    let Some(fields) = payload.as_object() else {
        warn!(event = name, "dropping event without an object payload");
        return None;
    };

    let normalized = match kind {
        EventKind::Ticket { implied } => ticket_change(fields, implied, false),
        EventKind::TicketAssigned => ticket_change(fields, None, true),
        EventKind::TicketRemoved => removal(fields, Collection::Tickets, "ticket", "ticket_id"),
        EventKind::Comment => record_change(fields, Collection::Comments, "comentario", "comentario_id"),
        EventKind::Analyst => record_change(fields, Collection::Analysts, "analista", "analista_id"),
        EventKind::AnalystRemoved => {
            removal(fields, Collection::Analysts, "analista", "analista_id")
        }
        EventKind::ChatMessage => record_change(fields, Collection::ChatMessages, "mensaje", "mensaje_id"),
    };

    if normalized.is_none() {
        warn!(event = name, "dropping event without a usable id");
    }
    normalized
}

/// Embedded full record under `key`, if present and valid.
fn embedded(fields: &Map<String, Value>, key: &str) -> Option<Entity> {
    match fields.get(key) {
        Some(value @ Value::Object(_)) => Entity::from_value(value.clone()).ok(),
        _ => None,
    }
}

fn ticket_change(
    fields: &Map<String, Value>,
    implied: Option<TicketStatus>,
    assignment: bool,
) -> Option<Normalized> {
    if let Some(entity) = embedded(fields, "ticket") {
        return Some(Normalized::Replace {
            collection: Collection::Tickets,
            entity,
        });
    }

    let id = fields
        .get("ticket_id")
        .or_else(|| fields.get("id"))
        .and_then(EntityId::from_value)?;

    let mut partial = Map::new();
    for (key, value) in fields {
        if key == "ticket_id" || key == "id" {
            continue;
        }
        if let Some(field) = key.strip_prefix("ticket_") {
            partial.insert(field.to_string(), value.clone());
        } else if key == "asignacion_actual" {
            partial.insert(key.clone(), value.clone());
        }
    }

    if assignment
        && let Some(analyst) = fields.get("analista_id").or_else(|| fields.get("id_analista"))
    {
        let mut assigned = Map::new();
        assigned.insert("id_analista".into(), analyst.clone());
        partial.insert("asignacion_actual".into(), Value::Object(assigned));
    }

    if let Some(status) = implied
        && !partial.contains_key("estado")
    {
        partial.insert("estado".into(), Value::from(status.as_ref()));
    }

    Some(Normalized::Patch {
        collection: Collection::Tickets,
        entity: Entity::with_fields(id, partial),
    })
}

/// Comments, analysts and chat messages: embedded record or flat fields.
fn record_change(
    fields: &Map<String, Value>,
    collection: Collection,
    embed_key: &str,
    id_key: &str,
) -> Option<Normalized> {
    if let Some(entity) = embedded(fields, embed_key) {
        return Some(Normalized::Replace { collection, entity });
    }

    let id = fields
        .get(id_key)
        .or_else(|| fields.get("id"))
        .and_then(EntityId::from_value)?;

    let mut partial = Map::new();
    for (key, value) in fields {
        match key.as_str() {
            "id" => {}
            k if k == id_key => {}
            "ticket_id" => {
                partial.insert("id_ticket".into(), value.clone());
            }
            _ => {
                partial.insert(key.clone(), value.clone());
            }
        }
    }

    Some(Normalized::Patch {
        collection,
        entity: Entity::with_fields(id, partial),
    })
}

fn removal(
    fields: &Map<String, Value>,
    collection: Collection,
    embed_key: &str,
    id_key: &str,
) -> Option<Normalized> {
    let id = fields
        .get(id_key)
        .or_else(|| fields.get(embed_key).and_then(|e| e.get("id")))
        .or_else(|| fields.get("id"))
        .and_then(EntityId::from_value)?;
    Some(Normalized::Remove { collection, id })
}
