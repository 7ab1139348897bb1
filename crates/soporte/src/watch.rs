// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `soporte watch` command implementation.
//!
//! Runs a full dashboard session: initial refresh, real-time connection,
//! scope membership, optimistic reconciliation and periodic polling. Every
//! time the store settles on a new revision the tickets that changed are
//! printed. Runs until interrupted or until the backend rejects the
//! credential.

use std::collections::BTreeSet;

use soporte_config::SoporteConfig;
use soporte_core::{Collection, EntityId, SoporteError};
use soporte_realtime::{OpenView, ViewKind};
use soporte_sync::{DashboardSession, SyncSignal};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::render;

/// Lines present in `next` but not in `previous`, in `next` order.
pub fn changed_lines<'a>(previous: &BTreeSet<String>, next: &'a [String]) -> Vec<&'a String> {
    next.iter().filter(|line| !previous.contains(*line)).collect()
}

async fn ticket_lines(session: &DashboardSession) -> Vec<String> {
    session
        .store()
        .read(|s| {
            s.list(Collection::Tickets)
                .iter()
                .map(render::ticket_line)
                .collect()
        })
        .await
}

/// Run the `soporte watch` command.
pub async fn run_watch(
    config: &SoporteConfig,
    credential: &str,
    tickets: &[String],
) -> Result<(), SoporteError> {
    let session = DashboardSession::from_config(config, credential)?;
    let identity = session.identity().clone();
    info!(user_id = %identity.user_id, role = %identity.role, "starting dashboard session");

    let mut signals = session.orchestrator().subscribe();
    let mut revisions = session.store().subscribe();
    let mut status = session.connection().watch_status();

    match session.start().await {
        Ok(handle) => info!(generation = handle.generation(), "real-time connection established"),
        Err(e) if e.forces_logout() => {
            session.stop().await;
            return Err(e);
        }
        Err(e) => warn!(error = %e, "real-time connection unavailable, relying on refreshes"),
    }

    for ticket in tickets {
        let view = OpenView::new(EntityId::from(ticket.as_str()), ViewKind::Comments);
        let report = session.open_view(view).await;
        debug!(ticket = %ticket, ?report, "ticket view opened");
    }

    let mut shown = BTreeSet::new();
    let initial = ticket_lines(&session).await;
    println!("{} tickets", initial.len());
    for line in &initial {
        println!("{line}");
    }
    shown.extend(initial);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupt received, shutting down");
                break Ok(());
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let lines = ticket_lines(&session).await;
                for line in changed_lines(&shown, &lines) {
                    println!("{line}");
                }
                shown = lines.into_iter().collect();
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = *status.borrow_and_update();
                info!(status = %current, "connection status changed");
            }
            signal = signals.recv() => match signal {
                Ok(SyncSignal::RefreshFailed { domain, message, forces_logout: true }) => {
                    error!(%domain, %message, "backend rejected the credential");
                    break Err(SoporteError::CredentialInvalid(message));
                }
                Ok(SyncSignal::RefreshFailed { domain, message, .. }) => {
                    warn!(%domain, %message, "refresh failed, keeping current state");
                }
                Ok(other) => debug!(?other, "sync signal"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "sync signals lagged"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    session.stop().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_new_or_changed_lines_are_reported() {
        let previous: BTreeSet<String> = ["#1 en_proceso", "#2 cerrado"]
            .into_iter()
            .map(String::from)
            .collect();
        let next = vec![
            "#1 en_proceso".to_string(),
            "#2 reabierto".to_string(),
            "#3 creado".to_string(),
        ];
        assert_eq!(changed_lines(&previous, &next), vec!["#2 reabierto", "#3 creado"]);
    }

    #[test]
    fn unchanged_store_reports_nothing() {
        let next = vec!["#1 en_proceso".to_string()];
        let previous: BTreeSet<String> = next.iter().cloned().collect();
        assert!(changed_lines(&previous, &next).is_empty());
    }
}
