// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `soporte sync` command implementation.
//!
//! One reconciling refresh of every domain over REST, without opening the
//! real-time connection, followed by a dump of the ticket list.

use std::sync::Arc;

use serde_json::{Value, json};
use soporte_config::SoporteConfig;
use soporte_core::{Collection, Domain, SoporteError};
use soporte_sync::{DashboardSession, HttpTicketApi, RecommendationProbe, RefreshOutcome, SyncSignal};
use tracing::{info, warn};

use crate::render;

/// Run the `soporte sync` command.
pub async fn run_sync(
    config: &SoporteConfig,
    credential: &str,
    recommendations: bool,
    json: bool,
) -> Result<(), SoporteError> {
    let session = DashboardSession::from_config(config, credential)?;
    let mut signals = session.orchestrator().subscribe();
    let outcomes = session.manual_sync().await;
    let logout_required = std::iter::from_fn(|| signals.try_recv().ok()).any(|signal| {
        matches!(
            signal,
            SyncSignal::RefreshFailed {
                forces_logout: true,
                ..
            }
        )
    });

    for (domain, outcome) in &outcomes {
        match outcome {
            RefreshOutcome::Refreshed(count) => info!(%domain, count, "refreshed"),
            RefreshOutcome::Failed(message) => warn!(%domain, %message, "refresh failed"),
            RefreshOutcome::Skipped | RefreshOutcome::Coalesced => {}
        }
    }
    if let Some((_, RefreshOutcome::Failed(message))) =
        outcomes.iter().find(|(domain, _)| *domain == Domain::Tickets)
    {
        session.stop().await;
        if logout_required {
            return Err(SoporteError::CredentialInvalid(message.clone()));
        }
        return Err(SoporteError::request(
            None,
            format!("ticket list unavailable ({message})"),
        ));
    }

    let tickets = session.store().list(Collection::Tickets).await;

    let found = if recommendations {
        let api = HttpTicketApi::new(&config.api.base_url, credential, config.api.request_timeout())?;
        let probe = RecommendationProbe::new(Arc::new(api), config.api.recommendation_timeout());
        probe.probe_open_tickets(session.store()).await
    } else {
        Vec::new()
    };

    if json {
        let mut body = json!({
            "role": session.identity().role.as_ref(),
            "tickets": tickets.iter().map(|t| t.to_value()).collect::<Vec<Value>>(),
        });
        if recommendations {
            body["recomendaciones"] = found
                .iter()
                .map(|r| json!({"ticket_id": r.ticket_id.to_value(), "record": r.record}))
                .collect::<Vec<Value>>()
                .into();
        }
        let rendered = serde_json::to_string_pretty(&body)
            .map_err(|e| SoporteError::Internal(format!("failed to render tickets: {e}")))?;
        println!("{rendered}");
    } else {
        println!(
            "{} tickets ({})",
            tickets.len(),
            render::status_summary(&tickets)
        );
        for ticket in &tickets {
            println!("{}", render::ticket_line(ticket));
        }
        for recommendation in &found {
            println!("similar to #{}: {}", recommendation.ticket_id, recommendation.record);
        }
    }

    session.stop().await;
    Ok(())
}
