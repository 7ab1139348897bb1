// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the broadcaster.
//!
//! Client -> server:
//! ```json
//! {"type": "authenticate", "token": "<credential>"}
//! {"type": "join", "scope": "ticket:42"}
//! {"type": "leave", "scope": "ticket:42"}
//! {"type": "emit", "event": "ticket_asignado", "scope": "ticket:42", "payload": {}}
//! ```
//!
//! Server -> client:
//! ```json
//! {"type": "authenticated"}
//! {"type": "event", "event": "nuevo_comentario", "payload": {}}
//! {"type": "error", "message": "..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use soporte_core::{InboundEvent, ScopeId, SoporteError};

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Authenticate {
        token: String,
    },
    Join {
        scope: ScopeId,
    },
    Leave {
        scope: ScopeId,
    },
    Emit {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<ScopeId>,
        #[serde(default)]
        payload: Value,
    },
}

impl std::fmt::Debug for ClientFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authenticate { .. } => f
                .debug_struct("Authenticate")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::Join { scope } => f.debug_struct("Join").field("scope", scope).finish(),
            Self::Leave { scope } => f.debug_struct("Leave").field("scope", scope).finish(),
            Self::Emit {
                event,
                scope,
                payload,
            } => f
                .debug_struct("Emit")
                .field("event", event)
                .field("scope", scope)
                .field("payload", payload)
                .finish(),
        }
    }
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, SoporteError> {
        serde_json::to_string(self)
            .map_err(|e| SoporteError::Internal(format!("failed to encode frame: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Authenticated,
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
    Error {
        message: String,
    },
}

impl ServerFrame {
    /// Parses a text frame. Unknown frame types are an error the caller
    /// logs and skips.
    pub fn parse(text: &str) -> Result<Self, SoporteError> {
        serde_json::from_str(text)
            .map_err(|e| SoporteError::MalformedEntity(format!("unreadable server frame: {e}")))
    }

    pub fn into_event(self) -> Option<InboundEvent> {
        match self {
            Self::Event { event, payload } => Some(InboundEvent::new(event, payload)),
            _ => None,
        }
    }
}
