// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side state for the Soporte sync client.
//!
//! [`EntityStore`] is the single shared mutable resource: tickets, comments,
//! analysts and the other collections, each keyed by `id` and kept in
//! insertion order. [`ticket`] derives the actions a dashboard offers, and
//! [`NotificationLog`] keeps a capped record of inbound events.

pub mod entity;
pub mod notifications;
pub mod store;
pub mod ticket;

pub use entity::Entity;
pub use notifications::{Notification, NotificationLog};
pub use store::{ApplyOutcome, EntityStore, Placement, Positioned, StoreAction, StoreHandle};
pub use ticket::{TicketAction, TicketView, available_actions, target_status};
