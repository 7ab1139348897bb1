// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits. The backend REST API and the pub/sub broadcaster are
//! external; the sync layer only sees them through these seams.

pub mod api;
pub mod transport;

pub use api::TicketApi;
pub use transport::{Connector, RealtimeTransport, TransportSession, TransportSignal};
