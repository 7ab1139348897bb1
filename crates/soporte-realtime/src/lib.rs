// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time plumbing for the Soporte sync client.
//!
//! - [`ConnectionManager`] owns the single authenticated transport.
//! - [`RoomMembershipTracker`] keeps scope membership in line with the
//!   identity and working ticket set.
//! - [`normalize`] turns heterogeneous event payloads into store changes.
//! - [`WsConnector`] is the production WebSocket transport.

pub mod connection;
pub mod normalizer;
pub mod rooms;
pub mod wire;
pub mod ws;

pub use connection::{ConnectionHandle, ConnectionManager, LifecycleEvent};
pub use normalizer::{Normalized, is_known, normalize, normalize_event};
pub use rooms::{
    OpenView, ReconcileReport, RoomMembershipTracker, ScopePlan, ViewKind, plan, scopes_for,
};
pub use wire::{ClientFrame, ServerFrame};
pub use ws::{WsConnector, WsTransport};
