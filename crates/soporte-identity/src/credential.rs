// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted session credentials.
//!
//! A credential is stored under a key derived from the session role rather
//! than a single fixed key. The derivation is the table below; call sites
//! never build key names themselves. Logout clears every key in the table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use soporte_core::{Role, SoporteError};
use tracing::{debug, warn};

/// Role to storage key. Every role has exactly one entry.
const STORAGE_KEYS: &[(Role, &str)] = &[
    (Role::Cliente, "sesion_cliente"),
    (Role::Analista, "sesion_analista"),
    (Role::Supervisor, "sesion_supervisor"),
    (Role::Administrador, "sesion_administrador"),
];

/// Storage key for a role's credential.
pub fn storage_key(role: Role) -> &'static str {
    STORAGE_KEYS
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, key)| *key)
        .unwrap_or("sesion")
}

/// Backing store for role-keyed credentials.
pub trait CredentialStore: Send + Sync {
    fn save(&self, role: Role, credential: &str) -> Result<(), SoporteError>;

    fn load(&self, role: Role) -> Result<Option<String>, SoporteError>;

    /// Removes the credential of every role.
    fn clear_all(&self) -> Result<(), SoporteError>;

    /// First stored credential whose decoded role matches the key it was
    /// stored under. Mismatched or undecodable entries are skipped.
    fn restore(&self) -> Result<Option<(Role, String)>, SoporteError> {
        for (role, key) in STORAGE_KEYS {
            let Some(credential) = self.load(*role)? else {
                continue;
            };
            match crate::token::get_role(&credential) {
                Some(decoded) if decoded == *role => return Ok(Some((*role, credential))),
                _ => warn!(key, "ignoring stored credential that does not match its key"),
            }
        }
        Ok(None)
    }
}

/// One file per role key inside a directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, role: Role) -> PathBuf {
        self.dir.join(storage_key(role))
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> SoporteError {
    SoporteError::Internal(format!("failed to {action} {}: {err}", path.display()))
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, role: Role, credential: &str) -> Result<(), SoporteError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error("create", &self.dir, e))?;
        let path = self.path_for(role);
        std::fs::write(&path, credential).map_err(|e| io_error("write", &path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| io_error("restrict", &path, e))?;
        }

        debug!(role = %role, "credential stored");
        Ok(())
    }

    fn load(&self, role: Role) -> Result<Option<String>, SoporteError> {
        let path = self.path_for(role);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let trimmed = content.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    fn clear_all(&self) -> Result<(), SoporteError> {
        for (role, _) in STORAGE_KEYS {
            let path = self.path_for(*role);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error("remove", &path, e)),
            }
        }
        debug!("all stored credentials cleared");
        Ok(())
    }
}

/// In-process store for tests and short-lived sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<&'static str, String>>, SoporteError> {
        self.entries
            .lock()
            .map_err(|_| SoporteError::Internal("credential store lock poisoned".into()))
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCredentialStore")
            .field("entries", &"[REDACTED]")
            .finish()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, role: Role, credential: &str) -> Result<(), SoporteError> {
        self.entries()?
            .insert(storage_key(role), credential.to_string());
        Ok(())
    }

    fn load(&self, role: Role) -> Result<Option<String>, SoporteError> {
        Ok(self.entries()?.get(storage_key(role)).cloned())
    }

    fn clear_all(&self) -> Result<(), SoporteError> {
        self.entries()?.clear();
        Ok(())
    }
}
