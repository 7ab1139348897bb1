// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential decoding.
//!
//! The credential is a three-segment `header.payload.signature` token minted
//! by the backend. Only the payload is read; the signature is the backend's
//! concern. All functions are pure and never panic on malformed input.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use soporte_core::{Role, SoporteError};

/// Remaining lifetime below which a session should be refreshed.
pub const EXPIRY_HORIZON: Duration = Duration::from_secs(300);

/// Who the session belongs to, derived read-only from the credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Whether the credential is still usable at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Deserialize)]
struct Claims {
    user_id: Value,
    role: String,
    #[serde(default)]
    email: Option<String>,
    exp: i64,
}

/// Decodes the payload segment. `None` on a wrong segment count, bad
/// base64, bad JSON, an unknown role, or a missing claim.
pub fn decode(token: &str) -> Option<Identity> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;

    let user_id = match claims.user_id {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return None,
    };
    let role = claims.role.trim().to_lowercase().parse::<Role>().ok()?;
    let expires_at = Utc.timestamp_opt(claims.exp, 0).single()?;

    Some(Identity {
        user_id,
        role,
        email: claims.email.unwrap_or_default(),
        expires_at,
    })
}

/// `false` when decoding fails or the credential has expired.
pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, Utc::now())
}

/// [`is_valid`] against an explicit clock.
pub fn is_valid_at(token: &str, now: DateTime<Utc>) -> bool {
    decode(token).is_some_and(|identity| identity.is_valid_at(now))
}

pub fn get_role(token: &str) -> Option<Role> {
    decode(token).map(|identity| identity.role)
}

pub fn get_user_id(token: &str) -> Option<String> {
    decode(token).map(|identity| identity.user_id)
}

pub fn get_email(token: &str) -> Option<String> {
    decode(token).map(|identity| identity.email)
}

/// `true` when fewer than `within` remain before expiry. Undecodable
/// credentials count as expiring.
pub fn is_expiring_soon(token: &str, within: Duration) -> bool {
    let Some(identity) = decode(token) else {
        return true;
    };
    let horizon = chrono::Duration::from_std(within).unwrap_or(chrono::Duration::MAX);
    identity.expires_at - Utc::now() < horizon
}

/// Decodes and checks expiry, mapping failure to
/// [`SoporteError::CredentialInvalid`], which forces a logout.
pub fn require_valid(token: &str) -> Result<Identity, SoporteError> {
    let identity = decode(token)
        .ok_or_else(|| SoporteError::CredentialInvalid("credential is malformed".into()))?;
    if !identity.is_valid_at(Utc::now()) {
        return Err(SoporteError::CredentialInvalid(format!(
            "credential expired at {}",
            identity.expires_at.to_rfc3339()
        )));
    }
    Ok(identity)
}
