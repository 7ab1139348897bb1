// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Soporte integration tests.
//!
//! Provides in-process stand-ins for the two external collaborators so
//! tests run fast and deterministically without a backend.
//!
//! # Components
//!
//! - [`MemoryBroker`] - Pub/sub broadcaster honouring scope membership
//! - [`MockTicketApi`] - REST collaborator with failure and latency injection
//! - [`mint_token`] - Unsigned credentials with chosen claims

pub mod broker;
pub mod mock_api;
pub mod tokens;

pub use broker::{Emitted, MemoryBroker};
pub use mock_api::MockTicketApi;
pub use tokens::{mint_expired_token, mint_token, mint_valid_token};
