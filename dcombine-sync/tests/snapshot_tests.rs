//! Snapshot store file behaviour

use dcombine_sync::models::{RemediationEntry, RemediationLedger};
use dcombine_sync::services::{SaveMode, Snapshot, SnapshotStore};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SnapshotStore {
    SnapshotStore::new(dir.path().join("snapshot.json"))
}

#[test]
fn test_merge_keeps_existing_entry_for_same_id() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let first = Snapshot {
        contacts: vec![json!({"id": "1648", "first_name": "Original"})],
        ..Default::default()
    };
    store.save(&first, SaveMode::Merge).unwrap();

    let second = Snapshot {
        contacts: vec![
            json!({"id": "1648", "first_name": "Changed"}),
            json!({"id": "1700", "first_name": "New"}),
        ],
        ..Default::default()
    };
    let written = store.save(&second, SaveMode::Merge).unwrap();

    assert_eq!(written.contacts.len(), 2);
    let loaded = store.load().unwrap();
    assert_eq!(loaded, written);
    assert_eq!(loaded.contacts[0]["first_name"], "Original");
    assert_eq!(loaded.contacts[1]["id"], "1700");
}

#[test]
fn test_replace_overwrites_file() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store
        .save(&Snapshot { cclists: vec![json!({"id": "1"})], ..Default::default() }, SaveMode::Replace)
        .unwrap();
    store
        .save(&Snapshot { cclists: vec![json!({"id": "2"})], ..Default::default() }, SaveMode::Replace)
        .unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.cclists, vec![json!({"id": "2"})]);
    assert!(!dir.path().join("snapshot.json.tmp").exists());
}

#[test]
fn test_empty_file_loads_as_empty_snapshot() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::write(store.path(), "").unwrap();

    let loaded = store.load().unwrap();
    assert!(loaded.is_empty());
    assert!(loaded.to_remediate.is_empty());
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::write(store.path(), "{\"contacts\": [").unwrap();

    assert!(matches!(store.load(), Err(dcombine_common::Error::Json(_))));
}

#[test]
fn test_historical_ledger_key_is_accepted() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::write(
        store.path(),
        r#"{"contacts": [], "cclists": [], "to_remidate": {"bad_phone_nums": {"1001": [{"fax": "1"}]}, "bad_m2m": {}}}"#,
    )
    .unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.to_remediate.bad_phone_nums["1001"], vec![json!({"fax": "1"})]);
}

#[test]
fn test_load_into_preserves_populated_target() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .save(&Snapshot { contacts: vec![json!({"id": "on-disk"})], ..Default::default() }, SaveMode::Replace)
        .unwrap();

    let mut target = Snapshot {
        contacts: vec![json!({"id": "in-memory"})],
        ..Default::default()
    };
    assert!(!store.load_into(&mut target, false).unwrap());
    assert_eq!(target.contacts[0]["id"], "in-memory");

    assert!(store.load_into(&mut target, true).unwrap());
    assert_eq!(target.contacts[0]["id"], "on-disk");
}

#[test]
fn test_merge_combines_remediation_ledgers() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut ledger = RemediationLedger::default();
    ledger.record(&RemediationEntry::phone(1001, "fax", "1"));
    store
        .save(&Snapshot { to_remediate: ledger.clone(), ..Default::default() }, SaveMode::Merge)
        .unwrap();

    ledger.record(&RemediationEntry::relation(1002, "lists", json!({"id": "9999"})));
    let written = store
        .save(&Snapshot { to_remediate: ledger, ..Default::default() }, SaveMode::Merge)
        .unwrap();

    assert_eq!(written.to_remediate.len(), 2);
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert!(raw.get("to_remediate").is_some());
}
