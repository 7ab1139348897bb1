// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential selection for commands that talk to the backend.

use soporte_config::SoporteConfig;
use soporte_core::SoporteError;
use soporte_identity::{CredentialStore, FileCredentialStore, require_valid};
use tracing::{info, warn};

fn store_for(config: &SoporteConfig) -> FileCredentialStore {
    FileCredentialStore::new(&config.session.credential_dir)
}

/// Picks the credential for a command.
///
/// An explicit credential wins and is persisted when `remember` is set.
/// Otherwise the stored session is restored. A stored credential that no
/// longer validates is cleared so the next run starts from a clean slate.
pub fn resolve(
    config: &SoporteConfig,
    explicit: Option<String>,
    remember: bool,
) -> Result<String, SoporteError> {
    resolve_with(&store_for(config), explicit, remember)
}

pub fn resolve_with(
    store: &dyn CredentialStore,
    explicit: Option<String>,
    remember: bool,
) -> Result<String, SoporteError> {
    if let Some(credential) = explicit {
        let identity = require_valid(&credential)?;
        if remember {
            store.save(identity.role, &credential)?;
            info!(role = %identity.role, "credential stored");
        }
        return Ok(credential);
    }

    let Some((role, credential)) = store.restore()? else {
        return Err(SoporteError::CredentialInvalid(
            "no stored session; pass --credential".into(),
        ));
    };
    match require_valid(&credential) {
        Ok(_) => Ok(credential),
        Err(e) => {
            warn!(role = %role, error = %e, "stored credential rejected, clearing session");
            store.clear_all()?;
            Err(e)
        }
    }
}

/// Removes every stored credential.
pub fn logout(config: &SoporteConfig) -> Result<(), SoporteError> {
    let store = store_for(config);
    store.clear_all()?;
    println!("soporte: stored sessions cleared ({})", store.dir().display());
    Ok(())
}
