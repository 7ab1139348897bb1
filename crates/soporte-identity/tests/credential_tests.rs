// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed credential persistence.

use soporte_core::Role;
use soporte_identity::{CredentialStore, FileCredentialStore, decode, storage_key};
use soporte_test_utils::{mint_token, mint_valid_token};

#[test]
fn credential_is_stored_under_role_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path());
    let token = mint_valid_token("7", Role::Analista);

    store.save(Role::Analista, &token).unwrap();

    assert!(dir.path().join(storage_key(Role::Analista)).exists());
    assert!(!dir.path().join(storage_key(Role::Supervisor)).exists());
    assert_eq!(store.load(Role::Analista).unwrap(), Some(token));
}

#[test]
fn logout_clears_every_role_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path());
    store
        .save(Role::Supervisor, &mint_valid_token("1", Role::Supervisor))
        .unwrap();
    store
        .save(Role::Cliente, &mint_valid_token("2", Role::Cliente))
        .unwrap();

    store.clear_all().unwrap();

    assert_eq!(store.load(Role::Supervisor).unwrap(), None);
    assert_eq!(store.load(Role::Cliente).unwrap(), None);
    // Clearing an already empty store is fine.
    store.clear_all().unwrap();
}

#[test]
fn restore_skips_credentials_filed_under_the_wrong_role() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path());
    store
        .save(Role::Cliente, &mint_valid_token("9", Role::Supervisor))
        .unwrap();
    assert_eq!(store.restore().unwrap(), None);

    let analyst = mint_valid_token("7", Role::Analista);
    store.save(Role::Analista, &analyst).unwrap();
    assert_eq!(store.restore().unwrap(), Some((Role::Analista, analyst)));
}

#[test]
fn minted_tokens_decode() {
    let token = mint_token("42", Role::Administrador, "admin@example.com", 4_102_444_800);
    let identity = decode(&token).unwrap();
    assert_eq!(identity.user_id, "42");
    assert_eq!(identity.role, Role::Administrador);
    assert_eq!(identity.email, "admin@example.com");
    assert_eq!(identity.expires_at.timestamp(), 4_102_444_800);
}
