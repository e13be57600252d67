//! Tests for the document store.

use super::*;
use crate::error::CrewError;
use crate::locks::{LockManager, LockOptions, lock_path_for};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    name: String,
    value: u64,
}

impl Validate for Counter {
    fn validate(&self) -> Result<(), FieldError> {
        require_non_empty("name", &self.name)
    }
}

fn store() -> DocumentStore {
    DocumentStore::new(LockManager::new(LockOptions {
        poll_interval: Duration::from_millis(1),
        stale_minutes: 120,
    }))
}

fn counter(name: &str) -> Counter {
    Counter {
        name: name.to_string(),
        value: 0,
    }
}

#[test]
fn test_read_missing_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let err = store()
        .read::<Counter>(&temp_dir.path().join("missing.json"))
        .unwrap_err();
    assert!(matches!(err, CrewError::NotFound(_)));
}

#[test]
fn test_read_malformed_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.json");
    fs::write(&path, "{\"name\": \"x\",").unwrap();

    let err = store().read::<Counter>(&path).unwrap_err();
    assert!(matches!(err, CrewError::Parse { .. }));
}

#[test]
fn test_read_wrong_shape_names_field() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("shape.json");

    fs::write(&path, r#"{"name": "x"}"#).unwrap();
    let err = store().read::<Counter>(&path).unwrap_err();
    match err {
        CrewError::Validation { message, .. } => assert!(message.contains("value"), "{}", message),
        other => panic!("expected validation error, got {:?}", other),
    }

    fs::write(&path, r#"{"name": "", "value": 1}"#).unwrap();
    let err = store().read::<Counter>(&path).unwrap_err();
    match err {
        CrewError::Validation { message, .. } => assert!(message.contains("`name`"), "{}", message),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_write_validates_before_touching_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("c.json");

    let err = store().write(&path, &counter("")).unwrap_err();
    assert!(matches!(err, CrewError::Validation { .. }));
    assert!(!path.exists());

    store().write(&path, &counter("ok")).unwrap();
    assert_eq!(store().read::<Counter>(&path).unwrap(), counter("ok"));
}

#[test]
fn test_transaction_uses_default_when_absent() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("c.json");

    let value = store()
        .update(&path, "init", || Some(counter("hits")), |c: &mut Counter| {
            c.value += 1;
            Ok(c.value)
        })
        .unwrap();

    assert_eq!(value, 1);
    assert!(!lock_path_for(&path).exists());
}

#[test]
fn test_transaction_without_default_requires_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("c.json");

    let err = store()
        .update(&path, "bump", || None, |c: &mut Counter| {
            c.value += 1;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, CrewError::NotFound(_)));
}

#[test]
fn test_failed_mutator_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("c.json");
    store().write(&path, &counter("hits")).unwrap();
    let before = fs::read(&path).unwrap();

    let err = store()
        .update(&path, "reject", || None, |c: &mut Counter| -> crate::error::Result<()> {
            c.value = 99;
            Err(CrewError::Conflict("refused".to_string()))
        })
        .unwrap_err();

    assert!(matches!(err, CrewError::Conflict(_)));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!lock_path_for(&path).exists());
}

#[test]
fn test_invalid_mutation_is_not_written() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("c.json");
    store().write(&path, &counter("hits")).unwrap();

    let err = store()
        .update(&path, "blank", || None, |c: &mut Counter| {
            c.name.clear();
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, CrewError::Validation { .. }));
    assert_eq!(store().read::<Counter>(&path).unwrap().name, "hits");
}

#[test]
fn test_concurrent_transactions_lose_no_updates() {
    let temp_dir = TempDir::new().unwrap();
    let path = Arc::new(temp_dir.path().join("counter.json"));
    let store = store();
    let workers = 16;

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let path = Arc::clone(&path);
            let store = store.clone();
            thread::spawn(move || {
                store
                    .update(&path, "increment", || Some(counter("shared")), |c: &mut Counter| {
                        c.value += 1;
                        Ok(())
                    })
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.read::<Counter>(&path).unwrap().value, workers);
}

#[test]
fn test_list_skips_temp_and_lock_files() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let store = store();
    store.write(&dir.join("b.json"), &counter("b")).unwrap();
    store.write(&dir.join("a.json"), &counter("a")).unwrap();
    fs::write(dir.join(".a.json.1234.tmp"), "garbage").unwrap();
    fs::write(dir.join("a.json.lock"), "{}").unwrap();

    let listed: Vec<Counter> = store.list(dir).unwrap();
    let names: Vec<_> = listed.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    let empty: Vec<Counter> = store.list(&dir.join("nope")).unwrap();
    assert!(empty.is_empty());
}

#[test]
fn test_vec_validation_reports_index() {
    let items = vec![counter("ok"), counter(" ")];
    let err = items.validate().unwrap_err();
    assert_eq!(err.field, "[1].name");
}
