// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scope membership.
//!
//! [`scopes_for`] derives the full target set from the identity, the working
//! ticket set and the open views. [`RoomMembershipTracker::reconcile`] then
//! issues only the joins and leaves needed to get there. Failures are
//! logged; the next reconcile (working-set change, view change, reconnect)
//! tries again.

use std::collections::BTreeSet;

use soporte_core::{EntityId, RealtimeTransport, Role, ScopeId};
use soporte_identity::Identity;
use tracing::{debug, warn};

/// Global scopes joined by roles that oversee every ticket.
pub const GLOBAL_SCOPES: &[&str] = &["system", "tickets", "ticket_status_changes"];

/// Role group shared by supervisors and administrators.
pub const SUPERVISOR_GROUP: &str = "supervisores";

/// Kind of per-ticket view a dashboard can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewKind {
    Comments,
    ChatAnalistaCliente,
    ChatSupervisorAnalista,
}

/// A ticket detail, comment or chat view currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpenView {
    pub ticket_id: EntityId,
    pub kind: ViewKind,
}

impl OpenView {
    pub fn new(ticket_id: EntityId, kind: ViewKind) -> Self {
        Self { ticket_id, kind }
    }
}

/// Every scope the session should be a member of.
pub fn scopes_for(
    identity: &Identity,
    working_set: &BTreeSet<EntityId>,
    views: &[OpenView],
) -> BTreeSet<ScopeId> {
    let mut scopes = BTreeSet::new();
    scopes.insert(ScopeId::role(identity.role));

    match identity.role {
        Role::Supervisor | Role::Administrador => {
            scopes.insert(ScopeId::role_group(SUPERVISOR_GROUP));
        }
        Role::Analista => {
            scopes.insert(ScopeId::role_user(Role::Analista, &identity.user_id));
        }
        Role::Cliente => {}
    }

    if identity.role.has_cross_ticket_awareness() {
        scopes.extend(GLOBAL_SCOPES.iter().map(|name| ScopeId::global(name)));
    }

    scopes.extend(working_set.iter().map(ScopeId::ticket));

    for view in views {
        scopes.insert(ScopeId::ticket(&view.ticket_id));
        match view.kind {
            ViewKind::Comments => {}
            ViewKind::ChatAnalistaCliente => {
                scopes.insert(ScopeId::chat_analista_cliente(&view.ticket_id));
            }
            ViewKind::ChatSupervisorAnalista => {
                scopes.insert(ScopeId::chat_supervisor_analista(&view.ticket_id));
            }
        }
    }

    scopes
}

/// Joins and leaves needed to move from one scope set to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopePlan {
    pub join: BTreeSet<ScopeId>,
    pub leave: BTreeSet<ScopeId>,
}

impl ScopePlan {
    pub fn is_empty(&self) -> bool {
        self.join.is_empty() && self.leave.is_empty()
    }
}

pub fn plan(previous: &BTreeSet<ScopeId>, target: &BTreeSet<ScopeId>) -> ScopePlan {
    ScopePlan {
        join: target.difference(previous).cloned().collect(),
        leave: previous.difference(target).cloned().collect(),
    }
}

/// Result of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub joined: Vec<ScopeId>,
    pub left: Vec<ScopeId>,
    pub failed: Vec<ScopeId>,
}

/// Remembers which scopes the current transport has joined.
#[derive(Debug, Default)]
pub struct RoomMembershipTracker {
    joined: BTreeSet<ScopeId>,
}

impl RoomMembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joined(&self) -> &BTreeSet<ScopeId> {
        &self.joined
    }

    /// Forgets all memberships. Called when the transport is replaced,
    /// since membership does not survive it.
    pub fn reset(&mut self) {
        self.joined.clear();
    }

    /// Moves membership to `target`. A failed join is not recorded, and a
    /// failed leave stays recorded, so the next pass retries either.
    pub async fn reconcile(
        &mut self,
        transport: &dyn RealtimeTransport,
        target: &BTreeSet<ScopeId>,
    ) -> ReconcileReport {
        let plan = plan(&self.joined, target);
        let mut report = ReconcileReport::default();
        if plan.is_empty() {
            return report;
        }

        for scope in plan.leave {
            match transport.leave(&scope).await {
                Ok(()) => {
                    debug!(scope = %scope, "left scope");
                    self.joined.remove(&scope);
                    report.left.push(scope);
                }
                Err(e) => {
                    warn!(scope = %scope, error = %e, "scope leave failed");
                    report.failed.push(scope);
                }
            }
        }

        for scope in plan.join {
            match transport.join(&scope).await {
                Ok(()) => {
                    debug!(scope = %scope, "joined scope");
                    self.joined.insert(scope.clone());
                    report.joined.push(scope);
                }
                Err(e) => {
                    warn!(scope = %scope, error = %e, "scope join failed");
                    report.failed.push(scope);
                }
            }
        }

        report
    }
}
