//! The vendor registry
//!
//! The registry lives next to `elm.json` and records which directories are
//! vendored. It also keeps the `base` snapshot of the host manifest as it
//! was before anything was vendored, so every reconciliation starts from
//! the user's own declarations rather than from its previous output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use vendor_fs::{ConfigStore, NormalizedPath};

use crate::manifest::{Dependencies, Manifest, ManifestKind};
use crate::{Error, Result};

/// Registry format version for forward compatibility
pub const FORMAT_VERSION: &str = "1";

/// The host-owned fields of a manifest at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub kind: ManifestKind,
    pub source_directories: Vec<NormalizedPath>,
    #[serde(default)]
    pub dependencies: Dependencies,
    /// Pass-through fields; only recorded for the base snapshot
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl Snapshot {
    /// Capture source directories, dependencies and pass-through fields.
    pub fn of(manifest: &Manifest) -> Self {
        Self {
            kind: manifest.kind(),
            source_directories: manifest.source_directories().to_vec(),
            dependencies: manifest.dependencies().clone(),
            fields: manifest.pass_through(),
        }
    }

    /// The same snapshot without pass-through fields.
    pub fn without_fields(mut self) -> Self {
        self.fields = Map::new();
        self
    }
}

/// One vendored directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Entry {
    /// Directory relative to the project root
    pub path: NormalizedPath,
    /// When the directory was first vendored
    pub recorded_at: DateTime<Utc>,
    /// Host source directories and dependencies just before this directory
    /// was first vendored. Never rewritten; restoring the host reads `base`,
    /// which also carries installs made after this entry was recorded.
    pub snapshot: Snapshot,
}

/// The persisted registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    version: String,
    base: Snapshot,
    /// Source directories and dependencies last written to the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Snapshot>,
    #[serde(default)]
    vendored: Vec<Entry>,
}

impl Registry {
    /// A registry with no vendored directories.
    pub fn new(base: Snapshot) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            base,
            output: None,
            vendored: Vec::new(),
        }
    }

    /// Parse registry text read from `path` (JSON or TOML by extension).
    ///
    /// Entries are put back in path order and duplicates dropped, so a
    /// hand-edited registry still enumerates deterministically.
    pub fn parse(path: &NormalizedPath, content: &str) -> Result<Self> {
        let mut registry: Registry = ConfigStore::new().parse(path, content)?;

        if registry.version != FORMAT_VERSION {
            return Err(vendor_fs::Error::ConfigParse {
                path: path.to_native(),
                format: "registry".into(),
                message: format!(
                    "unsupported registry version {} (expected {FORMAT_VERSION})",
                    registry.version
                ),
            }
            .into());
        }

        registry.vendored.sort_by(|a, b| a.path.cmp(&b.path));
        registry.vendored.dedup_by(|a, b| a.path == b.path);
        Ok(registry)
    }

    /// Serialize in the format implied by `path`.
    pub fn render(&self, path: &NormalizedPath) -> Result<String> {
        Ok(ConfigStore::new().render(path, self)?)
    }

    /// The pre-vendoring snapshot of the host manifest.
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Snapshot {
        &mut self.base
    }

    pub fn set_base(&mut self, base: Snapshot) {
        self.base = base;
    }

    /// What the last vendoring run wrote, while anything is vendored.
    pub fn output(&self) -> Option<&Snapshot> {
        self.output.as_ref()
    }

    pub fn output_mut(&mut self) -> Option<&mut Snapshot> {
        self.output.as_mut()
    }

    pub fn set_output(&mut self, output: Option<Snapshot>) {
        self.output = output;
    }

    /// All entries, ordered by path.
    pub fn entries(&self) -> &[Entry] {
        &self.vendored
    }

    pub fn is_empty(&self) -> bool {
        self.vendored.is_empty()
    }

    pub fn get(&self, path: &NormalizedPath) -> Option<&Entry> {
        self.vendored.iter().find(|entry| &entry.path == path)
    }

    /// Register `path` with the snapshot taken just before it was vendored.
    ///
    /// Re-registering a known path keeps the existing entry untouched.
    /// Returns `true` if a new entry was added.
    pub fn record(&mut self, path: NormalizedPath, snapshot: Snapshot, at: DateTime<Utc>) -> bool {
        match self.vendored.binary_search_by(|entry| entry.path.cmp(&path)) {
            Ok(_) => {
                debug!(path = %path, "directory already registered");
                false
            }
            Err(index) => {
                self.vendored.insert(
                    index,
                    Entry {
                        path,
                        recorded_at: at,
                        snapshot,
                    },
                );
                true
            }
        }
    }

    /// Remove the entry for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVendorDirectory`] if `path` is not registered.
    pub fn remove(&mut self, path: &NormalizedPath) -> Result<Entry> {
        let index = self
            .vendored
            .iter()
            .position(|entry| &entry.path == path)
            .ok_or_else(|| Error::UnknownVendorDirectory { path: path.clone() })?;
        Ok(self.vendored.remove(index))
    }

    /// Remove every entry.
    pub fn clear(&mut self) -> Vec<Entry> {
        std::mem::take(&mut self.vendored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn base() -> Snapshot {
        let manifest = Manifest::parse(
            "elm.json",
            r#"{
                "type": "application",
                "source-directories": ["src"],
                "elm-version": "0.19.1",
                "dependencies": {"direct": {"elm/core": "1.0.5"}, "indirect": {}}
            }"#,
        )
        .unwrap();
        Snapshot::of(&manifest)
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn record_keeps_entries_sorted_and_unique() {
        let mut registry = Registry::new(base());
        assert!(registry.record("vendor/b".into(), base().without_fields(), at()));
        assert!(registry.record("vendor/a".into(), base().without_fields(), at()));
        assert!(!registry.record("vendor/b/".into(), base().without_fields(), at()));

        let paths: Vec<_> = registry.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["vendor/a", "vendor/b"]);
    }

    #[test]
    fn remove_unknown_directory_fails() {
        let mut registry = Registry::new(base());
        let err = registry.remove(&"vendor/missing".into()).unwrap_err();
        assert!(matches!(err, Error::UnknownVendorDirectory { .. }));
    }

    #[test]
    fn json_round_trip() {
        let mut registry = Registry::new(base());
        registry.record("vendor/a".into(), base().without_fields(), at());
        let path = NormalizedPath::new("elm-vendor.json");

        let text = registry.render(&path).unwrap();
        assert!(text.contains("\"recorded-at\": \"2024-05-01T12:00:00Z\""));
        assert!(text.contains("\"elm-version\": \"0.19.1\""));

        assert_eq!(Registry::parse(&path, &text).unwrap(), registry);
    }

    #[test]
    fn toml_round_trip() {
        let mut registry = Registry::new(base());
        registry.record("vendor/a".into(), base().without_fields(), at());
        let path = NormalizedPath::new("elm-vendor.toml");

        let text = registry.render(&path).unwrap();
        assert_eq!(Registry::parse(&path, &text).unwrap(), registry);
    }

    #[test]
    fn parse_sorts_hand_edited_entries() {
        let text = r#"{
            "version": "1",
            "base": {"kind": "application", "source-directories": ["src"]},
            "vendored": [
                {"path": "vendor/z", "recorded-at": "2024-05-01T12:00:00Z",
                 "snapshot": {"kind": "application", "source-directories": ["src"]}},
                {"path": "vendor/a", "recorded-at": "2024-05-01T12:00:00Z",
                 "snapshot": {"kind": "application", "source-directories": ["src"]}}
            ]
        }"#;
        let registry = Registry::parse(&"elm-vendor.json".into(), text).unwrap();
        let paths: Vec<_> = registry.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["vendor/a", "vendor/z"]);
    }

    #[test]
    fn entry_snapshot_outlives_later_base_and_output_changes() {
        let mut registry = Registry::new(base());
        registry.record("vendor/a".into(), base().without_fields(), at());

        let mut later = base().without_fields();
        later.source_directories.push("vendor/a/src".into());
        registry.set_output(Some(later.clone()));
        registry.set_base(later);
        assert!(!registry.record("vendor/a".into(), registry.base().clone(), at()));

        let path = NormalizedPath::new("elm-vendor.json");
        let reloaded = Registry::parse(&path, &registry.render(&path).unwrap()).unwrap();
        let entry = reloaded.get(&"vendor/a".into()).unwrap();
        assert_eq!(entry.snapshot, base().without_fields());
        assert_eq!(reloaded.output(), registry.output());
    }

    #[test]
    fn parse_rejects_unknown_version() {
        let text = r#"{"version": "9", "base": {"kind": "package", "source-directories": []}}"#;
        assert!(Registry::parse(&"elm-vendor.json".into(), text).is_err());
    }
}
