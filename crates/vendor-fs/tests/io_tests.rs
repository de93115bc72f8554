//! Tests for snapshots, staged writes and the config store

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use vendor_fs::{
    ConfigStore, Error, Fingerprint, NormalizedPath, ProjectFile, RobustnessConfig, Transaction, io,
};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Registry {
    version: String,
    vendored: Vec<String>,
}

#[test]
fn test_snapshot_fingerprint_matches_disk() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join(ProjectFile::Manifest.as_str()));
    std::fs::write(path.to_native(), "{\n    \"type\": \"application\"\n}\n").unwrap();

    let snapshot = io::read_snapshot(&path).unwrap();

    assert!(snapshot.exists());
    assert_eq!(
        snapshot.fingerprint,
        Fingerprint::of_file(&path.to_native()).unwrap()
    );
}

/// Commit `content` to a file that did not exist yet.
fn create(path: &NormalizedPath, content: &str) {
    let lock = NormalizedPath::new(format!("{}.lock", path.as_str()));
    let mut tx = Transaction::begin(&lock, RobustnessConfig::default()).unwrap();
    tx.stage(path, &Fingerprint::Absent, content.as_bytes()).unwrap();
    tx.commit().unwrap();
}

#[test]
fn test_staged_write_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("nested/dir/elm.json"));

    create(&path, "{}\n");

    assert_eq!(io::read_text(&path).unwrap(), "{}\n");
}

#[test]
fn test_committed_transaction_leaves_no_temp_files() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("elm.json"));

    create(&path, "one");
    let lock = NormalizedPath::new(temp.path().join(".elm-vendor.lock"));
    let mut tx = Transaction::begin(&lock, RobustnessConfig::default()).unwrap();
    tx.stage(&path, &Fingerprint::of(b"one"), b"two").unwrap();
    tx.commit().unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {leftovers:?}");
    assert_eq!(io::read_text(&path).unwrap(), "two");
}

#[test]
fn test_verify_rejects_edited_file() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("elm-vendor.json"));
    create(&path, "{}\n");

    let lock = NormalizedPath::new(temp.path().join(".elm-vendor.lock"));
    let tx = Transaction::begin(&lock, RobustnessConfig::default()).unwrap();
    tx.verify(&path, &Fingerprint::of(b"{}\n")).unwrap();
    std::fs::write(path.to_native(), "{ }\n").unwrap();

    let err = tx.verify(&path, &Fingerprint::of(b"{}\n")).unwrap_err();
    assert!(matches!(err, Error::WriteConflict { .. }));
}

#[test]
fn test_read_text_missing_file_is_not_found() {
    let temp = TempDir::new().unwrap();
    let err = io::read_text(&NormalizedPath::new(temp.path().join("absent"))).unwrap_err();
    assert!(err.is_not_found());
}

#[rstest]
#[case("elm-vendor.json")]
#[case("elm-vendor.toml")]
fn test_config_store_render_then_load(#[case] file_name: &str) {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join(file_name));
    let store = ConfigStore::new();
    let registry = Registry {
        version: "1".into(),
        vendored: vec!["vendor/elm-ui".into()],
    };

    let rendered = store.render(&path, &registry).unwrap();
    create(&path, &rendered);
    let loaded: Registry = store.load(&path).unwrap();

    assert_eq!(loaded, registry);
}

#[test]
fn test_config_store_reports_parse_errors() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("elm-vendor.toml"));
    std::fs::write(path.to_native(), "version = ").unwrap();

    let err = ConfigStore::new().load::<Registry>(&path).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
}
