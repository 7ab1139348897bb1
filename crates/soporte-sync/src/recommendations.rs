// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similar-ticket recommendation probe.
//!
//! Recommendations are fetched for many tickets at once. Each lookup has
//! its own timeout; a slow or failing lookup only drops that ticket.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use soporte_core::{Collection, EntityId, SoporteError, TicketApi};
use soporte_store::StoreHandle;
use tracing::debug;

/// An opaque recommendation record for one ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub ticket_id: EntityId,
    pub record: Value,
}

#[derive(Clone)]
pub struct RecommendationProbe {
    api: Arc<dyn TicketApi>,
    timeout: Duration,
}

impl std::fmt::Debug for RecommendationProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationProbe")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RecommendationProbe {
    pub fn new(api: Arc<dyn TicketApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Looks up one ticket. Errors and timeouts are returned, not logged.
    pub async fn fetch(&self, ticket_id: &EntityId) -> Result<Recommendation, SoporteError> {
        let record = tokio::time::timeout(self.timeout, self.api.fetch_recommendation(ticket_id))
            .await
            .unwrap_or(Err(SoporteError::Timeout {
                duration: self.timeout,
            }))?;
        Ok(Recommendation {
            ticket_id: ticket_id.clone(),
            record,
        })
    }

    /// Looks up every ticket concurrently, in input order, skipping the
    /// ones that failed or timed out.
    pub async fn probe(&self, ticket_ids: &[EntityId]) -> Vec<Recommendation> {
        let results = join_all(ticket_ids.iter().map(|id| self.fetch(id))).await;
        results
            .into_iter()
            .zip(ticket_ids)
            .filter_map(|(result, id)| match result {
                Ok(found) => Some(found),
                Err(e) => {
                    debug!(ticket_id = %id, error = %e, "recommendation skipped");
                    None
                }
            })
            .collect()
    }

    /// Probes the open (non-terminal) tickets currently in the store.
    pub async fn probe_open_tickets(&self, store: &StoreHandle) -> Vec<Recommendation> {
        let ids: Vec<EntityId> = store
            .read(|s| {
                s.list(Collection::Tickets)
                    .iter()
                    .filter(|t| t.status().is_some_and(|status| !status.is_terminal()))
                    .map(|t| t.id().clone())
                    .collect()
            })
            .await;
        self.probe(&ids).await
    }
}
