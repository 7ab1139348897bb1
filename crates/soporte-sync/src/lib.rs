// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync policy for Soporte dashboards.
//!
//! Optimistic actions with exact rollback, coalesced refreshes from the
//! REST collaborator, the similar-ticket probe, and [`DashboardSession`],
//! which wires the store, the connection and scope membership together.

pub mod api;
pub mod optimistic;
pub mod orchestrator;
pub mod recommendations;
pub mod session;

pub use api::HttpTicketApi;
pub use optimistic::{Action, ActionKind, OptimisticCoordinator, TEMP_PREFIX, is_temporary};
pub use orchestrator::{
    OrchestratorSettings, REQUEST_SYNC_EVENT, RefreshOutcome, SyncOrchestrator, SyncSignal,
};
pub use recommendations::{Recommendation, RecommendationProbe};
pub use session::{DashboardSession, SessionSettings};
