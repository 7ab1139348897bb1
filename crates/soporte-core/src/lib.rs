// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Soporte ticket sync client.
//!
//! This crate provides the error taxonomy, the identifiers shared across the
//! workspace, and the traits through which the sync layer reaches its two
//! external collaborators: the REST ticket API and the pub/sub broadcaster.

pub mod error;
pub mod traits;
pub mod types;

pub use error::SoporteError;
pub use types::{
    Collection, ConnectionStatus, Domain, EntityId, InboundEvent, Role, ScopeId, TicketStatus,
};

pub use traits::{Connector, RealtimeTransport, TicketApi, TransportSession, TransportSignal};
