//! Concurrent access tests for the guarded write path
//!
//! Two writers racing for the same project lock must serialize, and a
//! writer that read a stale fingerprint must lose instead of overwriting.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tempfile::tempdir;
use vendor_fs::{Error, Fingerprint, NormalizedPath, RobustnessConfig, Transaction, io};

/// Replace `path` under `lock`, re-reading its fingerprint once locked.
fn replace(path: &NormalizedPath, lock: &NormalizedPath, content: &str) -> vendor_fs::Result<()> {
    let mut tx = Transaction::begin(lock, RobustnessConfig::default())?;
    let seen = io::read_snapshot(path)?.fingerprint;
    tx.stage(path, &seen, content.as_bytes())?;
    tx.commit()
}

#[test]
fn test_concurrent_transactions_never_interleave() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("elm.json");
    let path = Arc::new(NormalizedPath::new(&file_path));
    let lock = Arc::new(NormalizedPath::new(dir.path().join(".elm-vendor.lock")));

    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let lock = Arc::clone(&lock);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    let content = format!("{{\"writer\": \"{thread_id}-{i}\"}}\n");
                    let _ = replace(&path, &lock, &content);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    let content = std::fs::read_to_string(&file_path).unwrap();
    assert_eq!(content.matches("writer").count(), 1, "got: {content}");
    assert!(content.ends_with("}\n"));
}

#[test]
fn test_stale_transaction_loses_to_earlier_commit() {
    let dir = tempdir().unwrap();
    let manifest = NormalizedPath::new(dir.path().join("elm.json"));
    let lock = NormalizedPath::new(dir.path().join(".elm-vendor.lock"));
    std::fs::write(manifest.to_native(), "v0").unwrap();

    // Both invocations read the same state
    let seen = io::read_snapshot(&manifest).unwrap().fingerprint;

    let mut first = Transaction::begin(&lock, RobustnessConfig::default()).unwrap();
    first.stage(&manifest, &seen, b"first").unwrap();
    first.commit().unwrap();

    let mut second = Transaction::begin(&lock, RobustnessConfig::default()).unwrap();
    let err = second.stage(&manifest, &seen, b"second").unwrap_err();

    assert!(matches!(err, Error::WriteConflict { .. }));
    assert_eq!(std::fs::read_to_string(manifest.to_native()).unwrap(), "first");
}

#[test]
fn test_held_lock_times_out() {
    let dir = tempdir().unwrap();
    let lock = NormalizedPath::new(dir.path().join(".elm-vendor.lock"));
    let config = RobustnessConfig {
        lock_timeout: Duration::from_millis(200),
        enable_fsync: false,
    };

    let _held = Transaction::begin(&lock, config).unwrap();

    let lock_path = lock.clone();
    let result = thread::spawn(move || Transaction::begin(&lock_path, config).map(|_| ()))
        .join()
        .unwrap();

    assert!(matches!(result, Err(Error::LockFailed { .. })));
}

#[test]
fn test_lock_is_released_on_drop() {
    let dir = tempdir().unwrap();
    let lock = NormalizedPath::new(dir.path().join(".elm-vendor.lock"));
    let target = NormalizedPath::new(dir.path().join("elm-vendor.json"));

    {
        let mut tx = Transaction::begin(&lock, RobustnessConfig::default()).unwrap();
        tx.stage(&target, &Fingerprint::Absent, b"{}").unwrap();
        // dropped without commit
    }

    let mut tx = Transaction::begin(&lock, RobustnessConfig::default()).unwrap();
    tx.stage(&target, &Fingerprint::Absent, b"{}\n").unwrap();
    tx.commit().unwrap();
    assert_eq!(std::fs::read_to_string(target.to_native()).unwrap(), "{}\n");
}
