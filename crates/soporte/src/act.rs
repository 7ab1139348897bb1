// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `soporte act` command implementation.
//!
//! Performs one ticket action through the same optimistic path a dashboard
//! uses, so the confirmation is broadcast to the ticket's scope when the
//! real-time connection is available.

use soporte_config::SoporteConfig;
use soporte_core::{EntityId, SoporteError};
use soporte_sync::{Action, DashboardSession};
use tracing::{info, warn};

use crate::render;

/// Run the `soporte act` command.
pub async fn run_act(
    config: &SoporteConfig,
    credential: &str,
    ticket: &str,
    action: &str,
    argument: &str,
) -> Result<(), SoporteError> {
    let ticket_id = EntityId::from(ticket);
    let action = Action::parse(action, ticket_id.clone(), argument)?;

    let session = DashboardSession::from_config(config, credential)?;
    if let Err(e) = session.start().await {
        if e.forces_logout() {
            session.stop().await;
            return Err(e);
        }
        warn!(error = %e, "real-time connection unavailable, confirmation will not be broadcast");
    }

    let allowed = session.actions_for(&ticket_id).await;
    info!(ticket_id = %ticket_id, ?allowed, "available actions");

    let result = session.perform(action).await;
    session.stop().await;

    let confirmed = result?;
    println!("{}", render::ticket_line(&confirmed));
    Ok(())
}
