//! Manifest writer
//!
//! Produces the next host manifest from a merge or a snapshot and persists
//! project files through a single locked [`Transaction`]. A file is only
//! written when its rendered text differs from what was read, and only if
//! it still has the fingerprint it had when read.

use similar::TextDiff;
use tracing::info;
use vendor_fs::{FileSnapshot, NormalizedPath, RobustnessConfig, Transaction};

use crate::Result;
use crate::manifest::Manifest;
use crate::reconcile::MergedManifest;
use crate::registry::Snapshot;

/// `host` with its source directories and dependencies replaced by the merge.
pub fn apply(host: &Manifest, merged: &MergedManifest) -> Manifest {
    let mut next = host.clone();
    next.set_source_directories(merged.source_directories.clone());
    next.set_dependencies(merged.dependencies.clone());
    next
}

/// `host` with its source directories and dependencies put back to `snapshot`.
pub fn restore(host: &Manifest, snapshot: &Snapshot) -> Manifest {
    let mut next = host.clone();
    next.set_source_directories(snapshot.source_directories.clone());
    next.set_dependencies(snapshot.dependencies.clone());
    next
}

/// New content for a file read earlier in this invocation.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub before: FileSnapshot,
    pub after: String,
}

impl PendingWrite {
    pub fn new(before: FileSnapshot, after: String) -> Self {
        Self { before, after }
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.before.path
    }

    /// Whether writing would change the file.
    pub fn changes(&self) -> bool {
        self.before.content.as_deref() != Some(self.after.as_str())
    }

    /// Unified diff from the content read to the pending content.
    pub fn diff(&self, label: &str) -> String {
        unified_diff(label, self.before.content.as_deref().unwrap_or(""), &self.after)
    }
}

/// Write every changed file under `lock`, in order.
///
/// Every file in `writes` has its fingerprint re-checked, including the ones
/// whose content is unchanged, since the new content was derived from all of
/// them. Nothing is renamed into place until all checks passed. Returns how
/// many files were written.
pub fn commit(lock: &NormalizedPath, writes: &[&PendingWrite], config: RobustnessConfig) -> Result<usize> {
    let changed: Vec<&&PendingWrite> = writes.iter().filter(|write| write.changes()).collect();
    if changed.is_empty() {
        return Ok(0);
    }

    let mut transaction = Transaction::begin(lock, config)?;
    for write in writes {
        if write.changes() {
            transaction.stage(write.path(), &write.before.fingerprint, write.after.as_bytes())?;
        } else {
            transaction.verify(write.path(), &write.before.fingerprint)?;
        }
    }
    let count = transaction.len();
    transaction.commit()?;

    for write in &changed {
        info!(path = %write.path(), "wrote");
    }
    Ok(count)
}

/// Unified diff with three lines of context.
pub fn unified_diff(label: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Reconciler, VendoredPackage};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use vendor_fs::io::read_snapshot;

    const HOST: &str = r#"{
    "type": "application",
    "source-directories": [
        "src"
    ],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": {
            "elm/core": "1.0.5"
        },
        "indirect": {}
    },
    "test-dependencies": {
        "direct": {},
        "indirect": {}
    }
}
"#;

    fn merged(host: &Manifest) -> MergedManifest {
        let package = VendoredPackage {
            path: NormalizedPath::new("vendor/ui"),
            manifest: Manifest::parse(
                "vendor/ui/elm.json",
                r#"{"type": "package", "name": "a/ui", "dependencies": {"elm/html": "1.0.0 <= v < 2.0.0"}}"#,
            )
            .unwrap(),
        };
        Reconciler::default()
            .reconcile(&Snapshot::of(host), &[package])
            .into_result()
            .unwrap()
    }

    #[test]
    fn apply_replaces_only_owned_fields() {
        let host = Manifest::parse("elm.json", HOST).unwrap();
        let next = apply(&host, &merged(&host));
        let text = next.render().unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["elm-version"], "0.19.1");
        assert_eq!(value["source-directories"], serde_json::json!(["src", "vendor/ui/src"]));
        assert_eq!(value["dependencies"]["direct"]["elm/html"], "1.0.0");
    }

    #[test]
    fn restore_returns_original_bytes() {
        let host = Manifest::parse("elm.json", HOST).unwrap();
        let base = Snapshot::of(&host);
        let vendored = Manifest::parse("elm.json", &apply(&host, &merged(&host)).render().unwrap())
            .unwrap();

        assert_eq!(restore(&vendored, &base).render().unwrap(), HOST);
    }

    #[test]
    fn unchanged_write_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = NormalizedPath::new(temp.path().join("elm.json"));
        std::fs::write(temp.path().join("elm.json"), HOST).unwrap();
        let lock = NormalizedPath::new(temp.path().join(".elm-vendor.lock"));

        let write = PendingWrite::new(read_snapshot(&path).unwrap(), HOST.to_string());
        assert!(!write.changes());
        assert_eq!(commit(&lock, &[&write], RobustnessConfig::default()).unwrap(), 0);
        assert!(!temp.path().join(".elm-vendor.lock").exists());
    }

    #[test]
    fn stale_snapshot_is_a_write_conflict() {
        let temp = TempDir::new().unwrap();
        let path = NormalizedPath::new(temp.path().join("elm.json"));
        std::fs::write(temp.path().join("elm.json"), HOST).unwrap();
        let lock = NormalizedPath::new(temp.path().join(".elm-vendor.lock"));

        let write = PendingWrite::new(read_snapshot(&path).unwrap(), "{}\n".to_string());
        std::fs::write(temp.path().join("elm.json"), "edited elsewhere").unwrap();

        let err = commit(&lock, &[&write], RobustnessConfig::default()).unwrap_err();
        assert!(matches!(err, crate::Error::WriteConflict { .. }));
        assert_eq!(std::fs::read_to_string(temp.path().join("elm.json")).unwrap(), "edited elsewhere");
    }

    #[test]
    fn unchanged_file_edited_elsewhere_blocks_the_other_write() {
        let temp = TempDir::new().unwrap();
        let manifest = NormalizedPath::new(temp.path().join("elm.json"));
        let registry = NormalizedPath::new(temp.path().join("elm-vendor.json"));
        std::fs::write(manifest.to_native(), HOST).unwrap();
        std::fs::write(registry.to_native(), "{}\n").unwrap();
        let lock = NormalizedPath::new(temp.path().join(".elm-vendor.lock"));

        let manifest_write = PendingWrite::new(read_snapshot(&manifest).unwrap(), "{}\n".to_string());
        let registry_write = PendingWrite::new(read_snapshot(&registry).unwrap(), "{}\n".to_string());
        assert!(!registry_write.changes());
        std::fs::write(registry.to_native(), "{\"edited\": true}\n").unwrap();

        let err = commit(&lock, &[&manifest_write, &registry_write], RobustnessConfig::default())
            .unwrap_err();
        assert!(matches!(err, crate::Error::WriteConflict { .. }));
        assert_eq!(std::fs::read_to_string(manifest.to_native()).unwrap(), HOST);
    }

    #[test]
    fn diff_has_headers_and_changes() {
        let diff = unified_diff("elm.json", "a\nb\n", "a\nc\n");
        assert!(diff.starts_with("--- a/elm.json\n+++ b/elm.json\n"));
        assert!(diff.contains("-b\n"));
        assert!(diff.contains("+c\n"));
    }
}
