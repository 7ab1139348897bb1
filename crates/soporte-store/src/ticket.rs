// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket lifecycle policy.
//!
//! The backend enforces transitions. The client only needs to render them
//! consistently, so the action set offered for a ticket is a pure function
//! of role, status, assignment, and whether a reopen request is pending.

use serde::Serialize;
use serde_json::Value;
use soporte_core::{Role, TicketStatus};
use strum::{AsRefStr, Display};

use crate::entity::Entity;

/// Something a dashboard may offer to do with a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketAction {
    Assign,
    Reassign,
    Start,
    Escalate,
    Solve,
    Close,
    RequestReopen,
    ApproveReopen,
    DenyReopen,
    Comment,
}

/// The parts of a ticket that decide which actions are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketView {
    pub status: TicketStatus,
    pub assigned: bool,
    pub reopen_pending: bool,
}

impl TicketView {
    /// Reads the view from a ticket record. `None` when `estado` is
    /// missing or unknown.
    pub fn from_entity(ticket: &Entity) -> Option<Self> {
        let status = ticket.status()?;
        let assigned = ticket
            .get("asignacion_actual")
            .is_some_and(|a| !a.is_null() && a != &Value::Object(Default::default()));
        let reopen_pending = status == TicketStatus::SolicitudReapertura
            || ticket
                .get("solicitud_reapertura_pendiente")
                .and_then(Value::as_bool)
                .unwrap_or(false);
        Some(Self {
            status,
            assigned,
            reopen_pending,
        })
    }
}

/// Status a ticket moves to when `action` succeeds, for actions that
/// change status.
pub fn target_status(action: TicketAction) -> Option<TicketStatus> {
    match action {
        TicketAction::Assign | TicketAction::Reassign => Some(TicketStatus::EnEspera),
        TicketAction::Start => Some(TicketStatus::EnProceso),
        TicketAction::Escalate => Some(TicketStatus::Escalado),
        TicketAction::Solve => Some(TicketStatus::Solucionado),
        TicketAction::Close | TicketAction::DenyReopen => Some(TicketStatus::Cerrado),
        TicketAction::RequestReopen => Some(TicketStatus::SolicitudReapertura),
        TicketAction::ApproveReopen => Some(TicketStatus::Reabierto),
        TicketAction::Comment => None,
    }
}

/// Actions offered to `role` for a ticket in `view`, in display order.
pub fn available_actions(role: Role, view: &TicketView) -> Vec<TicketAction> {
    use TicketStatus::*;

    let mut actions = Vec::new();
    match role {
        Role::Supervisor | Role::Administrador => match view.status {
            Creado | SinAsignar => actions.push(TicketAction::Assign),
            EnEspera if !view.assigned => actions.push(TicketAction::Assign),
            Escalado => actions.push(TicketAction::Reassign),
            Reabierto => actions.extend([TicketAction::Reassign, TicketAction::Close]),
            SolicitudReapertura => {
                actions.extend([TicketAction::ApproveReopen, TicketAction::DenyReopen])
            }
            Solucionado => actions.push(TicketAction::Close),
            _ => {}
        },
        Role::Analista => match view.status {
            EnEspera if view.assigned => {
                actions.extend([TicketAction::Start, TicketAction::Escalate])
            }
            EnProceso => actions.extend([TicketAction::Solve, TicketAction::Escalate]),
            _ => {}
        },
        Role::Cliente => match view.status {
            Solucionado => actions.extend([TicketAction::Close, TicketAction::RequestReopen]),
            status if status.is_terminal() && !view.reopen_pending => {
                actions.push(TicketAction::RequestReopen)
            }
            _ => {}
        },
    }
    actions.push(TicketAction::Comment);
    actions
}
