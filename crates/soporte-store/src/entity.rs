// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validated entity records.

use serde_json::{Map, Value};
use soporte_core::{EntityId, SoporteError, TicketStatus};

/// A JSON object with a usable `id`.
///
/// Fields the client does not know about are kept as-is so a record read
/// from the backend round-trips unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    fields: Map<String, Value>,
}

impl Entity {
    /// Validates a raw record. Fails with [`SoporteError::MalformedEntity`]
    /// when the value is not an object or its `id` is missing or not a
    /// usable scalar.
    pub fn from_value(value: Value) -> Result<Self, SoporteError> {
        let Value::Object(fields) = value else {
            return Err(SoporteError::MalformedEntity(format!(
                "expected an object, got {}",
                type_name(&value)
            )));
        };
        Self::from_map(fields)
    }

    pub fn from_map(fields: Map<String, Value>) -> Result<Self, SoporteError> {
        let id = match fields.get("id") {
            None => return Err(SoporteError::MalformedEntity("missing `id`".into())),
            Some(raw) => EntityId::from_value(raw).ok_or_else(|| {
                SoporteError::MalformedEntity(format!("unusable `id`: {raw}"))
            })?,
        };
        Ok(Self { id, fields })
    }

    /// Builds an entity from an id and the remaining fields. `id` in
    /// `fields` is overwritten.
    pub fn with_fields(id: EntityId, mut fields: Map<String, Value>) -> Self {
        fields.insert("id".into(), id.to_value());
        Self { id, fields }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Ticket status, when the record carries a recognised `estado`.
    pub fn status(&self) -> Option<TicketStatus> {
        self.get("estado").and_then(TicketStatus::from_value)
    }

    /// Shallow field-level merge: every field in `patch` overwrites, every
    /// field absent from `patch` is kept. The id never changes.
    ///
    /// A nested object in `patch` that only restates values the stored
    /// object already holds leaves the stored object alone, so a flat event
    /// carrying `{"id_analista": 7}` does not wipe the rest of a known
    /// assignment.
    pub fn merge(&mut self, patch: &Entity) {
        for (key, value) in &patch.fields {
            if key == "id" {
                continue;
            }
            if let Some(current) = self.fields.get(key)
                && restates(current, value)
            {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Same record under a new id, used when a temporary id is reconciled.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.fields.insert("id".into(), id.to_value());
        self.id = id;
        self
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// True when `partial` is an object whose every field is present in
/// `current` with an equal value.
fn restates(current: &Value, partial: &Value) -> bool {
    match (current, partial) {
        (Value::Object(current), Value::Object(partial)) => partial
            .iter()
            .all(|(key, value)| current.get(key) == Some(value)),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
