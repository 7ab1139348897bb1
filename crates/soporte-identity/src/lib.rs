// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session identity for the Soporte sync client.
//!
//! Every component consumes a decoded [`Identity`]; raw credential parsing
//! happens only in [`token`]. Persisted credentials live under a key derived
//! from the role through a fixed table in [`credential`].

pub mod credential;
pub mod token;

pub use credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore, storage_key};
pub use token::{
    EXPIRY_HORIZON, Identity, decode, get_email, get_role, get_user_id, is_expiring_soon,
    is_valid, is_valid_at, require_valid,
};
