// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SoporteError;
use crate::types::{EntityId, Role, TicketStatus};

/// Backend ticket API consumed by the sync layer.
///
/// Every method returns raw JSON entities; validation happens at the store
/// boundary so malformed records are dropped in one place.
#[async_trait]
pub trait TicketApi: Send + Sync {
    /// `GET /api/tickets/{role}`
    async fn list_tickets(&self, role: Role) -> Result<Vec<Value>, SoporteError>;

    /// `POST /api/tickets/{id}/estado` with `{estado}`.
    async fn change_status(
        &self,
        ticket_id: &EntityId,
        estado: TicketStatus,
    ) -> Result<Value, SoporteError>;

    /// `POST /api/tickets/{id}/asignar` with `{id_analista, es_reasignacion}`.
    async fn assign(
        &self,
        ticket_id: &EntityId,
        analyst_id: &EntityId,
        reassignment: bool,
    ) -> Result<Value, SoporteError>;

    /// `POST /api/comentarios` with `{id_ticket, texto}`.
    async fn create_comment(&self, ticket_id: &EntityId, texto: &str)
    -> Result<Value, SoporteError>;

    /// `GET /api/tickets/{id}/comentarios`
    async fn list_comments(&self, ticket_id: &EntityId) -> Result<Vec<Value>, SoporteError>;

    /// `GET /api/analistas`
    async fn list_analysts(&self) -> Result<Vec<Value>, SoporteError>;

    /// `GET /api/tickets/{id}/recomendaciones-similares`, an opaque record.
    async fn fetch_recommendation(&self, ticket_id: &EntityId) -> Result<Value, SoporteError>;
}
