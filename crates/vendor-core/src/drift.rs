//! Drift detection
//!
//! Compares the host manifest on disk with what the registry and the
//! reconciler say it should contain. Detection is read-only.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::manifest::{Bucket, Manifest};
use crate::reconcile::MergedManifest;
use crate::registry::Snapshot;
use crate::version::Constraint;
use vendor_fs::NormalizedPath;

/// Where and how a dependency is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyState {
    pub bucket: Bucket,
    pub constraint: Constraint,
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.constraint, self.bucket)
    }
}

/// One dependency whose declaration differs from the expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyDrift {
    pub name: String,
    pub expected: Option<DependencyState>,
    pub actual: Option<DependencyState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldChange {
    Added,
    Removed,
    Changed,
}

/// A pass-through field that differs from the base snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDrift {
    pub field: String,
    pub change: FieldChange,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceDirectoryChange {
    /// Expected but not listed
    Missing,
    /// Listed but not expected
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDirectoryDrift {
    pub path: NormalizedPath,
    pub change: SourceDirectoryChange,
}

/// Everything that differs between the host manifest and the expectation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriftReport {
    /// Declared in the host but known to neither the base nor any vendored package
    pub untracked: Vec<DependencyDrift>,
    /// Expected but not declared
    pub missing: Vec<DependencyDrift>,
    /// Declared with another constraint or in another bucket
    pub mismatched: Vec<DependencyDrift>,
    pub fields: Vec<FieldDrift>,
    pub source_directories: Vec<SourceDirectoryDrift>,
}

impl DriftReport {
    /// No drift in any category.
    pub fn is_clean(&self) -> bool {
        self.untracked.is_empty()
            && self.missing.is_empty()
            && self.mismatched.is_empty()
            && self.fields.is_empty()
            && self.source_directories.is_empty()
    }

    /// Total number of reported differences.
    pub fn len(&self) -> usize {
        self.untracked.len()
            + self.missing.len()
            + self.mismatched.len()
            + self.fields.len()
            + self.source_directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clean()
    }

    /// Only the differences that `other` reports as well.
    ///
    /// Dependencies match by name, fields by key and source directories by
    /// path and kind of change.
    pub fn shared_with(mut self, other: &DriftReport) -> DriftReport {
        let names: BTreeSet<&str> = other
            .untracked
            .iter()
            .chain(&other.missing)
            .chain(&other.mismatched)
            .map(|drift| drift.name.as_str())
            .collect();
        for list in [&mut self.untracked, &mut self.missing, &mut self.mismatched] {
            list.retain(|drift| names.contains(drift.name.as_str()));
        }
        self.fields
            .retain(|field| other.fields.iter().any(|o| o.field == field.field));
        self.source_directories
            .retain(|dir| other.source_directories.contains(dir));
        self
    }
}

fn show(value: Option<&Value>) -> String {
    value.map_or_else(|| "<none>".to_string(), Value::to_string)
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("No drift");
        }

        let mut sections: Vec<String> = Vec::new();
        if !self.untracked.is_empty() {
            let mut s = String::from("Dependencies added outside elm-vendor:");
            for drift in &self.untracked {
                if let Some(actual) = &drift.actual {
                    s.push_str(&format!("\n    + {} {actual}", drift.name));
                }
            }
            sections.push(s);
        }
        if !self.missing.is_empty() {
            let mut s = String::from("Expected dependencies missing:");
            for drift in &self.missing {
                if let Some(expected) = &drift.expected {
                    s.push_str(&format!("\n    - {} {expected}", drift.name));
                }
            }
            sections.push(s);
        }
        if !self.mismatched.is_empty() {
            let mut s = String::from("Dependencies not matching the registry:");
            for drift in &self.mismatched {
                if let (Some(expected), Some(actual)) = (&drift.expected, &drift.actual) {
                    s.push_str(&format!(
                        "\n    ~ {}: expected {expected}, found {actual}",
                        drift.name
                    ));
                }
            }
            sections.push(s);
        }
        if !self.fields.is_empty() {
            let mut s = String::from("Fields changed since the registry was created:");
            for drift in &self.fields {
                s.push_str(&format!(
                    "\n    ~ {}: expected {}, found {}",
                    drift.field,
                    show(drift.expected.as_ref()),
                    show(drift.actual.as_ref())
                ));
            }
            sections.push(s);
        }
        if !self.source_directories.is_empty() {
            let mut s = String::from("Source directories:");
            for drift in &self.source_directories {
                let (sign, label) = match drift.change {
                    SourceDirectoryChange::Missing => ('-', "missing"),
                    SourceDirectoryChange::Unexpected => ('+', "unexpected"),
                };
                s.push_str(&format!("\n    {sign} {} ({label})", drift.path));
            }
            sections.push(s);
        }
        f.write_str(&sections.join("\n"))
    }
}

/// Compare `actual` with the reconciled expectation and the base fields.
///
/// Source-directory order is not drift; only membership is compared.
pub fn detect(actual: &Manifest, expected: &MergedManifest, base: &Snapshot) -> DriftReport {
    let mut report = DriftReport::default();
    let declared = actual.dependencies();

    for (bucket, name, constraint) in declared.iter() {
        let state = DependencyState {
            bucket,
            constraint: constraint.clone(),
        };
        match expected.dependencies.find(name) {
            None => report.untracked.push(DependencyDrift {
                name: name.to_string(),
                expected: None,
                actual: Some(state),
            }),
            Some((expected_bucket, expected_constraint)) => {
                if expected_bucket != bucket || !expected.accepts(bucket, name, constraint) {
                    report.mismatched.push(DependencyDrift {
                        name: name.to_string(),
                        expected: Some(DependencyState {
                            bucket: expected_bucket,
                            constraint: expected_constraint.clone(),
                        }),
                        actual: Some(state),
                    });
                }
            }
        }
    }

    for (bucket, name, constraint) in expected.dependencies.iter() {
        if !declared.contains(name) {
            report.missing.push(DependencyDrift {
                name: name.to_string(),
                expected: Some(DependencyState {
                    bucket,
                    constraint: constraint.clone(),
                }),
                actual: None,
            });
        }
    }

    let fields = actual.pass_through();
    let keys: BTreeSet<&String> = base.fields.keys().chain(fields.keys()).collect();
    for key in keys {
        let (before, after) = (base.fields.get(key), fields.get(key));
        let change = match (before, after) {
            (Some(_), None) => FieldChange::Removed,
            (None, Some(_)) => FieldChange::Added,
            (Some(b), Some(a)) if a != b => FieldChange::Changed,
            _ => continue,
        };
        report.fields.push(FieldDrift {
            field: key.clone(),
            change,
            expected: before.cloned(),
            actual: after.cloned(),
        });
    }

    let listed: BTreeSet<&NormalizedPath> = actual.source_directories().iter().collect();
    let wanted: BTreeSet<&NormalizedPath> = expected.source_directories.iter().collect();
    for path in wanted.difference(&listed) {
        report.source_directories.push(SourceDirectoryDrift {
            path: (*path).clone(),
            change: SourceDirectoryChange::Missing,
        });
    }
    for path in listed.difference(&wanted) {
        report.source_directories.push(SourceDirectoryDrift {
            path: (*path).clone(),
            change: SourceDirectoryChange::Unexpected,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Reconciler, VendoredPackage};
    use crate::writer;
    use pretty_assertions::assert_eq;

    const HOST: &str = r#"{
    "type": "application",
    "source-directories": ["src"],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": {"elm/core": "1.0.5"},
        "indirect": {"elm/json": "1.1.3"}
    },
    "test-dependencies": {"direct": {}, "indirect": {}}
}"#;

    fn vendored() -> VendoredPackage {
        VendoredPackage {
            path: NormalizedPath::new("vendor/ui"),
            manifest: Manifest::parse(
                "vendor/ui/elm.json",
                r#"{"type": "package", "name": "a/ui",
                    "dependencies": {"elm/html": "1.0.0 <= v < 2.0.0"}}"#,
            )
            .unwrap(),
        }
    }

    /// The host after vendoring, its expectation and its base.
    fn setup() -> (Manifest, MergedManifest, Snapshot) {
        let host = Manifest::parse("elm.json", HOST).unwrap();
        let base = Snapshot::of(&host);
        let merged = Reconciler::default()
            .reconcile(&base, &[vendored()])
            .into_result()
            .unwrap();
        let written = writer::apply(&host, &merged);
        let reparsed = Manifest::parse("elm.json", &written.render().unwrap()).unwrap();
        (reparsed, merged, base)
    }

    fn edited(manifest: &Manifest, edit: impl FnOnce(&mut Value)) -> Manifest {
        let mut value: Value = serde_json::from_str(&manifest.render().unwrap()).unwrap();
        edit(&mut value);
        Manifest::parse("elm.json", &value.to_string()).unwrap()
    }

    #[test]
    fn freshly_written_manifest_is_clean() {
        let (actual, merged, base) = setup();
        let report = detect(&actual, &merged, &base);
        assert!(report.is_clean(), "{report}");
        assert_eq!(report.to_string(), "No drift");
    }

    #[test]
    fn manually_added_dependency_is_only_untracked() {
        let (actual, merged, base) = setup();
        let actual = edited(&actual, |v| {
            v["dependencies"]["direct"]["elm/http"] = "2.0.0".into();
        });

        let report = detect(&actual, &merged, &base);
        assert_eq!(
            report,
            DriftReport {
                untracked: vec![DependencyDrift {
                    name: "elm/http".into(),
                    expected: None,
                    actual: Some(DependencyState {
                        bucket: Bucket::Direct,
                        constraint: Constraint::parse("2.0.0").unwrap(),
                    }),
                }],
                ..DriftReport::default()
            }
        );
        assert!(report.to_string().contains("+ elm/http 2.0.0 (direct)"));
    }

    #[test]
    fn removed_and_repinned_dependencies_are_reported() {
        let (actual, merged, base) = setup();
        let actual = edited(&actual, |v| {
            v["dependencies"]["direct"]
                .as_object_mut()
                .unwrap()
                .remove("elm/core");
            v["dependencies"]["indirect"]["elm/json"] = "1.1.2".into();
        });

        let report = detect(&actual, &merged, &base);
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].name, "elm/core");
        assert_eq!(report.mismatched.len(), 1);
        assert_eq!(report.mismatched[0].name, "elm/json");
        assert!(report.untracked.is_empty());
    }

    #[test]
    fn other_pin_inside_vendored_range_is_not_drift() {
        let (actual, merged, base) = setup();
        let actual = edited(&actual, |v| {
            v["dependencies"]["direct"]["elm/html"] = "1.0.9".into();
        });
        assert!(detect(&actual, &merged, &base).is_clean());
    }

    #[test]
    fn dependency_moved_between_buckets_is_mismatched() {
        let (actual, merged, base) = setup();
        let actual = edited(&actual, |v| {
            v["dependencies"]["indirect"]
                .as_object_mut()
                .unwrap()
                .remove("elm/json");
            v["dependencies"]["direct"]["elm/json"] = "1.1.3".into();
        });

        let report = detect(&actual, &merged, &base);
        assert_eq!(report.mismatched.len(), 1);
        let drift = &report.mismatched[0];
        assert_eq!(drift.expected.as_ref().unwrap().bucket, Bucket::Indirect);
        assert_eq!(drift.actual.as_ref().unwrap().bucket, Bucket::Direct);
    }

    #[test]
    fn pass_through_field_changes_are_reported() {
        let (actual, merged, base) = setup();
        let actual = edited(&actual, |v| {
            v["elm-version"] = "0.19.0".into();
            v["summary"] = "new".into();
        });

        let report = detect(&actual, &merged, &base);
        let changes: Vec<_> = report
            .fields
            .iter()
            .map(|f| (f.field.as_str(), f.change))
            .collect();
        assert_eq!(
            changes,
            vec![
                ("elm-version", FieldChange::Changed),
                ("summary", FieldChange::Added)
            ]
        );
    }

    #[test]
    fn source_directory_membership_is_compared() {
        let (actual, merged, base) = setup();
        let reordered = edited(&actual, |v| {
            v["source-directories"] = serde_json::json!(["vendor/ui/src", "src"]);
        });
        assert!(detect(&reordered, &merged, &base).is_clean());

        let replaced = edited(&actual, |v| {
            v["source-directories"] = serde_json::json!(["src", "lib"]);
        });
        let report = detect(&replaced, &merged, &base);
        assert_eq!(
            report.source_directories,
            vec![
                SourceDirectoryDrift {
                    path: NormalizedPath::new("vendor/ui/src"),
                    change: SourceDirectoryChange::Missing,
                },
                SourceDirectoryDrift {
                    path: NormalizedPath::new("lib"),
                    change: SourceDirectoryChange::Unexpected,
                },
            ]
        );
    }

    #[test]
    fn vendored_package_dropped_from_host_is_expected() {
        let host = edited(&Manifest::parse("elm.json", HOST).unwrap(), |v| {
            v["dependencies"]["direct"]["a/ui"] = "1.0.0".into();
        });
        let base = Snapshot::of(&host);
        let merged = Reconciler::default()
            .reconcile(&base, &[vendored()])
            .into_result()
            .unwrap();
        let written = writer::apply(&host, &merged);
        assert!(!written.dependencies().contains("a/ui"));
        assert!(detect(&written, &merged, &base).is_clean());

        // Listing it again is a host edit
        let relisted = edited(&written, |v| {
            v["dependencies"]["direct"]["a/ui"] = "1.0.0".into();
        });
        let report = detect(&relisted, &merged, &base);
        assert_eq!(report.untracked.len(), 1);
        assert_eq!(report.untracked[0].name, "a/ui");
    }

    #[test]
    fn shared_with_keeps_common_differences() {
        let (actual, merged, base) = setup();
        let actual = edited(&actual, |v| {
            v["dependencies"]["direct"]["elm/http"] = "2.0.0".into();
            v["dependencies"]["direct"]["elm/html"] = "1.0.9".into();
        });

        let against_merge = detect(&actual, &merged, &base);
        let written = MergedManifest::recorded(&Snapshot::of(&setup().0));
        let against_written = detect(&actual, &written, &base);
        assert_eq!(against_merge.len(), 1);
        assert_eq!(against_written.len(), 2);

        let shared = against_written.shared_with(&against_merge);
        assert_eq!(shared, against_merge);
    }
}
