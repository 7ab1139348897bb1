// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential minting. Signatures are placeholders; the client never
//! verifies them.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::{Value, json};
use soporte_core::Role;

/// A three-segment credential carrying the given claims. Numeric user ids
/// are encoded as JSON numbers, as the backend does.
pub fn mint_token(user_id: &str, role: Role, email: &str, exp: i64) -> String {
    let user_id = user_id
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(user_id));
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({
        "user_id": user_id,
        "role": role.as_ref(),
        "email": email,
        "exp": exp,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Valid for one hour.
pub fn mint_valid_token(user_id: &str, role: Role) -> String {
    let email = format!("{}.{user_id}@soporte.test", role.as_ref());
    mint_token(user_id, role, &email, Utc::now().timestamp() + 3600)
}

/// Expired one hour ago.
pub fn mint_expired_token(user_id: &str, role: Role) -> String {
    let email = format!("{}.{user_id}@soporte.test", role.as_ref());
    mint_token(user_id, role, &email, Utc::now().timestamp() - 3600)
}
