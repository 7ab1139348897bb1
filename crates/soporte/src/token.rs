// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `soporte token` command implementation.
//!
//! Decodes a credential locally and reports the identity it carries.
//! Nothing is sent to the backend.

use chrono::{DateTime, Utc};
use serde_json::json;
use soporte_core::SoporteError;
use soporte_identity::{EXPIRY_HORIZON, Identity, decode, is_expiring_soon};

/// What the command reports about one credential.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenReport {
    pub identity: Identity,
    pub valid: bool,
    pub expiring_soon: bool,
    pub remaining_secs: i64,
}

impl TokenReport {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "user_id": self.identity.user_id,
            "role": self.identity.role.as_ref(),
            "email": self.identity.email,
            "expires_at": self.identity.expires_at.to_rfc3339(),
            "valid": self.valid,
            "expiring_soon": self.expiring_soon,
            "remaining_secs": self.remaining_secs,
        })
    }
}

/// Evaluates a credential at `now`. Expiry proximity is judged against
/// the wall clock.
pub fn inspect(credential: &str, now: DateTime<Utc>) -> Result<TokenReport, SoporteError> {
    let identity = decode(credential)
        .ok_or_else(|| SoporteError::CredentialInvalid("credential is malformed".into()))?;
    Ok(TokenReport {
        valid: identity.is_valid_at(now),
        expiring_soon: is_expiring_soon(credential, EXPIRY_HORIZON),
        remaining_secs: (identity.expires_at - now).num_seconds(),
        identity,
    })
}

/// Run the `soporte token` command.
///
/// Prints the report even for an expired credential, then fails so scripts
/// can branch on the exit status.
pub fn run_token(credential: &str, json: bool) -> Result<(), SoporteError> {
    let report = inspect(credential, Utc::now())?;

    if json {
        let rendered = serde_json::to_string_pretty(&report.to_json())
            .map_err(|e| SoporteError::Internal(format!("failed to render report: {e}")))?;
        println!("{rendered}");
    } else {
        println!("user:     {}", report.identity.user_id);
        println!("role:     {}", report.identity.role);
        println!("email:    {}", report.identity.email);
        println!("expires:  {}", report.identity.expires_at.to_rfc3339());
        let state = match (report.valid, report.expiring_soon) {
            (false, _) => "expired".to_string(),
            (true, true) => format!("expiring soon ({}s left)", report.remaining_secs),
            (true, false) => format!("valid ({}s left)", report.remaining_secs),
        };
        println!("status:   {state}");
    }

    if report.valid {
        Ok(())
    } else {
        Err(SoporteError::CredentialInvalid(format!(
            "credential expired at {}",
            report.identity.expires_at.to_rfc3339()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soporte_core::Role;
    use soporte_test_utils::mint_token;

    #[test]
    fn fresh_credential_is_valid() {
        let now = Utc::now();
        let token = mint_token("12", Role::Analista, "ana@soporte.test", now.timestamp() + 3600);
        let report = inspect(&token, now).unwrap();
        assert!(report.valid);
        assert!(!report.expiring_soon);
        assert_eq!(report.identity.user_id, "12");
        assert_eq!(report.identity.role, Role::Analista);
        assert_eq!(report.to_json()["role"], "analista");
    }

    #[test]
    fn credential_inside_the_horizon_is_expiring_soon() {
        let now = Utc::now();
        let token = mint_token("12", Role::Cliente, "c@soporte.test", now.timestamp() + 120);
        let report = inspect(&token, now).unwrap();
        assert!(report.valid);
        assert!(report.expiring_soon);
    }

    #[test]
    fn expired_credential_reports_and_fails() {
        let now = Utc::now();
        let token = mint_token("12", Role::Cliente, "c@soporte.test", now.timestamp() - 10);
        let report = inspect(&token, now).unwrap();
        assert!(!report.valid);
        assert!(report.remaining_secs < 0);
        assert!(run_token(&token, false).unwrap_err().forces_logout());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            inspect("not-a-token", Utc::now()),
            Err(SoporteError::CredentialInvalid(_))
        ));
    }
}
