//! Unit tests for the RuleStore public API.
//!
//! These tests exercise persistence of domain rules through `rules.json`
//! in a temporary directory.

use instapaper_sort::model::FolderId;
use instapaper_sort::rules::RuleStore;
use instapaper_sort::Error;
use std::fs;

/// Helper: a fresh directory and the rule file path inside it.
fn setup() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("rules.json");
    (dir, path)
}

/// Saving rules and reloading the store yields the same mapping.
#[test]
fn test_save_then_reload_round_trips() {
    let (_dir, path) = setup();
    let mut store = RuleStore::load(&path).unwrap();
    assert!(store.rules().is_empty());

    store.save(".news.com", FolderId(1)).unwrap();
    store.save("tech.blog.com", FolderId(2)).unwrap();
    store.learn("www.example.com", FolderId(3)).unwrap();

    let reloaded = RuleStore::load(&path).unwrap();
    assert_eq!(reloaded.rules(), store.rules());
    assert_eq!(reloaded.suggest("api.news.com"), Some(FolderId(1)));
    assert_eq!(reloaded.suggest("tech.blog.com"), Some(FolderId(2)));
    assert_eq!(reloaded.suggest("other.com"), None);
}

/// The file is a flat JSON object of pattern -> numeric folder id.
#[test]
fn test_file_format_is_pattern_to_id_object() {
    let (_dir, path) = setup();
    let mut store = RuleStore::empty(&path);
    store.save("Example.com", FolderId(42)).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value, serde_json::json!({ "example.com": 42 }));
}

/// Files written by hand (or by older versions) load as-is.
#[test]
fn test_existing_file_is_loaded() {
    let (_dir, path) = setup();
    fs::write(&path, r#"{"github.com": 7, ".substack.com": 9}"#).unwrap();

    let store = RuleStore::load(&path).unwrap();
    assert_eq!(store.suggest("github.com"), Some(FolderId(7)));
    assert_eq!(store.suggest("someone.substack.com"), Some(FolderId(9)));
}

/// Every save is persisted immediately, not batched.
#[test]
fn test_each_change_is_written_through() {
    let (_dir, path) = setup();
    let mut store = RuleStore::empty(&path);

    store.learn("a.com", FolderId(1)).unwrap();
    assert_eq!(RuleStore::load(&path).unwrap().rules().len(), 1);

    store.learn("a.com", FolderId(2)).unwrap();
    assert_eq!(
        RuleStore::load(&path).unwrap().suggest("a.com"),
        Some(FolderId(2))
    );
}

/// Malformed files are reported by `load` and recovered by `open`.
#[test]
fn test_corrupt_file_is_surfaced_then_recovered() {
    let (dir, path) = setup();
    fs::write(&path, r#"{"a.com": "not-a-number"}"#).unwrap();

    match RuleStore::load(&path) {
        Err(Error::CorruptRuleFile { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected CorruptRuleFile, got {other:?}"),
    }

    let mut store = RuleStore::open(&path).unwrap();
    assert!(store.rules().is_empty());
    assert!(dir.path().join("rules.json.corrupt").exists());

    store.save("b.com", FolderId(5)).unwrap();
    assert_eq!(RuleStore::load(&path).unwrap().suggest("b.com"), Some(FolderId(5)));
}

/// Invalid patterns are refused without touching the file.
#[test]
fn test_invalid_pattern_is_rejected() {
    let (_dir, path) = setup();
    let mut store = RuleStore::empty(&path);
    assert!(matches!(store.save(".", FolderId(1)), Err(Error::InvalidRule(_))));
    assert!(!path.exists());
}
