//! Constraint reconciliation
//!
//! Merges the dependency constraints of the host's base snapshot with the
//! direct constraints of every vendored package. Each vendored package is an
//! opaque contributor: its own transitive dependencies are not re-solved, only
//! the constraints it declares take part.
//!
//! For every dependency name the constraints of all contributors are
//! intersected. A non-empty intersection yields a merged constraint and a
//! concrete pin; an empty one is a conflict naming every contributor.
//! Reconciliation is a pure function of its inputs.

mod index;

pub use index::{ElmHomeIndex, NoIndex, PackageIndex};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use semver::Version;
use serde::Serialize;
use tracing::debug;
use vendor_fs::NormalizedPath;

use crate::manifest::{Bucket, Dependencies, DependencyMap, Manifest, ManifestKind};
use crate::registry::Snapshot;
use crate::sources::merge_source_directories;
use crate::version::Constraint;
use crate::{Error, Result};

/// A vendored directory with the manifest read from it on this run.
#[derive(Debug, Clone)]
pub struct VendoredPackage {
    /// Directory relative to the project root
    pub path: NormalizedPath,
    pub manifest: Manifest,
}

/// Who declared a constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "kebab-case")]
pub enum Source {
    /// The host's own declarations, as recorded in the registry base
    Host,
    /// A vendored directory
    Vendored(NormalizedPath),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Vendored(path) => write!(f, "{path}"),
        }
    }
}

/// One constraint on one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    pub source: Source,
    pub bucket: Bucket,
    pub constraint: Constraint,
}

/// All constraints on a dependency that cannot hold together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyConflict {
    pub name: String,
    /// Host first, then vendored directories in path order
    pub contributions: Vec<Contribution>,
}

/// Every irreconcilable dependency, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<DependencyConflict>,
}

impl ConflictReport {
    pub fn get(&self, name: &str) -> Option<&DependencyConflict> {
        self.conflicts.iter().find(|conflict| conflict.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conflicts.iter().map(|conflict| conflict.name.as_str())
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, conflict) in self.conflicts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "Conflicting constraints for {}:", conflict.name)?;
            for contribution in &conflict.contributions {
                write!(
                    f,
                    "\n    {} wanted {} ({})",
                    contribution.source, contribution.constraint, contribution.bucket
                )?;
            }
        }
        Ok(())
    }
}

/// The narrowed range and chosen version for one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub range: Constraint,
    pub pin: Version,
}

/// Conflict-free merged fragment of the host manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedManifest {
    pub kind: ManifestKind,
    pub source_directories: Vec<NormalizedPath>,
    /// What gets written: pins for applications, ranges for packages
    pub dependencies: Dependencies,
    /// Range and pin of every reconciled direct or indirect dependency
    pub resolved: BTreeMap<String, Resolved>,
}

impl MergedManifest {
    /// The merge that was written as `snapshot`.
    ///
    /// No ranges are known, so only the written constraints are accepted.
    pub fn recorded(snapshot: &Snapshot) -> Self {
        Self {
            kind: snapshot.kind,
            source_directories: snapshot.source_directories.clone(),
            dependencies: snapshot.dependencies.clone(),
            resolved: BTreeMap::new(),
        }
    }

    /// Whether `actual` in `bucket` satisfies what this merge expects.
    ///
    /// Application pins other than the chosen one are accepted as long as
    /// they lie in the reconciled range.
    pub fn accepts(&self, bucket: Bucket, name: &str, actual: &Constraint) -> bool {
        let Some(expected) = self.dependencies.bucket(bucket).get(name) else {
            return false;
        };
        if expected == actual {
            return true;
        }
        self.kind == ManifestKind::Application
            && !bucket.is_test()
            && match (actual.as_exact(), self.resolved.get(name)) {
                (Some(pin), Some(resolved)) => resolved.range.contains(pin),
                _ => false,
            }
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Merged(MergedManifest),
    Conflict(ConflictReport),
}

impl Reconciliation {
    /// The merged fragment, or [`Error::Conflict`].
    pub fn into_result(self) -> Result<MergedManifest> {
        match self {
            Self::Merged(merged) => Ok(merged),
            Self::Conflict(report) => Err(Error::Conflict(report)),
        }
    }
}

type Wanted = BTreeMap<String, Vec<Contribution>>;

fn add_all(wanted: &mut Wanted, source: &Source, bucket: Bucket, deps: &DependencyMap) {
    for (name, constraint) in deps {
        wanted.entry(name.clone()).or_default().push(Contribution {
            source: source.clone(),
            bucket,
            constraint: constraint.clone(),
        });
    }
}

/// Merges host and vendored constraints.
pub struct Reconciler<'a> {
    index: &'a dyn PackageIndex,
}

impl Default for Reconciler<'static> {
    fn default() -> Self {
        Self { index: &NoIndex }
    }
}

impl<'a> Reconciler<'a> {
    /// A reconciler consulting `index` when choosing pins.
    pub fn new(index: &'a dyn PackageIndex) -> Self {
        Self { index }
    }

    /// Reconcile the base snapshot with `packages`.
    ///
    /// Direct constraints of the base and of every package are merged.
    /// Indirect pins of the base and of vendored applications are carried
    /// along; a name that ends up direct is dropped from indirect once its
    /// pin also satisfies the indirect constraints. Test dependencies come
    /// from the base only and are dropped when a compatible direct or
    /// indirect entry supersedes them. Names published by a vendored
    /// package are removed everywhere since its sources are now local.
    pub fn reconcile(&self, base: &Snapshot, packages: &[VendoredPackage]) -> Reconciliation {
        let mut ordered: Vec<&VendoredPackage> = packages.iter().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path));

        let provided: BTreeSet<&str> = ordered
            .iter()
            .filter(|package| package.manifest.kind() == ManifestKind::Package)
            .filter_map(|package| package.manifest.name())
            .collect();

        let kind = base.kind;
        let tracks_indirect = kind == ManifestKind::Application;
        let mut direct = Wanted::new();
        let mut indirect = Wanted::new();

        add_all(&mut direct, &Source::Host, Bucket::Direct, &base.dependencies.direct);
        if tracks_indirect {
            add_all(&mut indirect, &Source::Host, Bucket::Indirect, &base.dependencies.indirect);
        }
        for package in &ordered {
            let source = Source::Vendored(package.path.clone());
            let deps = package.manifest.dependencies();
            add_all(&mut direct, &source, Bucket::Direct, &deps.direct);
            if tracks_indirect {
                add_all(&mut indirect, &source, Bucket::Indirect, &deps.indirect);
            }
        }
        let mut tests = Wanted::new();
        for bucket in [Bucket::Test, Bucket::TestIndirect] {
            add_all(&mut tests, &Source::Host, bucket, base.dependencies.bucket(bucket));
        }
        for name in &provided {
            direct.remove(*name);
            indirect.remove(*name);
            tests.remove(*name);
        }

        let mut conflicts = Vec::new();
        let mut merged = Dependencies::default();
        let mut resolved = BTreeMap::new();

        let main = direct
            .iter()
            .map(|(name, wanted)| (Bucket::Direct, name, wanted))
            .chain(
                indirect
                    .iter()
                    .filter(|(name, _)| !direct.contains_key(*name))
                    .map(|(name, wanted)| (Bucket::Indirect, name, wanted)),
            );
        for (bucket, name, wanted) in main {
            let mut all = wanted.clone();
            if bucket == Bucket::Direct
                && let Some(also) = indirect.get(name)
            {
                all.extend(also.iter().cloned());
            }
            let tested = tests.get(name).map(Vec::as_slice).unwrap_or_default();
            match self.resolve(name, &all, tested) {
                Some(resolution) => {
                    merged
                        .bucket_mut(bucket)
                        .insert(name.clone(), written(kind, &resolution));
                    resolved.insert(name.clone(), resolution);
                }
                None => {
                    all.extend(tested.iter().cloned());
                    all.sort_by(|a, b| a.source.cmp(&b.source));
                    conflicts.push(DependencyConflict {
                        name: name.clone(),
                        contributions: all,
                    });
                }
            }
        }

        // Test entries for names resolved above are covered by the main entry
        for (name, wanted) in &tests {
            if direct.contains_key(name) || indirect.contains_key(name) {
                continue;
            }
            for contribution in wanted {
                merged
                    .bucket_mut(contribution.bucket)
                    .insert(name.clone(), contribution.constraint.clone());
            }
        }

        if !conflicts.is_empty() {
            conflicts.sort_by(|a, b| a.name.cmp(&b.name));
            debug!(count = conflicts.len(), "reconciliation found conflicts");
            return Reconciliation::Conflict(ConflictReport { conflicts });
        }

        Reconciliation::Merged(MergedManifest {
            kind,
            source_directories: merge_source_directories(&base.source_directories, packages),
            dependencies: merged,
            resolved,
        })
    }

    /// Intersect `wanted` and choose a pin that also satisfies `tested`.
    ///
    /// Test constraints never widen or narrow the written range, they only
    /// restrict which pin may be chosen.
    fn resolve(&self, name: &str, wanted: &[Contribution], tested: &[Contribution]) -> Option<Resolved> {
        let range = wanted
            .iter()
            .fold(Constraint::any(), |acc, c| acc.intersect(&c.constraint));
        let feasible = tested
            .iter()
            .fold(range.clone(), |acc, c| acc.intersect(&c.constraint));
        if feasible.is_empty() {
            debug!(dependency = name, "constraints do not intersect");
            return None;
        }
        let pin = self.select_pin(name, &feasible, wanted.iter().chain(tested));
        Some(Resolved { range, pin })
    }

    /// The version to pin for a non-empty `range`.
    ///
    /// An exact range is its own pin. Otherwise the index decides, and
    /// failing that the greatest version that some contributor names
    /// explicitly and that lies in the range.
    fn select_pin<'c>(
        &self,
        name: &str,
        range: &Constraint,
        wanted: impl Iterator<Item = &'c Contribution>,
    ) -> Version {
        if let Some(pin) = range.as_exact() {
            return pin.clone();
        }
        if let Some(available) = self.index.newest_matching(name, range) {
            return available;
        }
        let floor = range
            .lower()
            .cloned()
            .unwrap_or_else(|| Version::new(0, 0, 0));
        wanted
            .flat_map(|c| c.constraint.bound_versions())
            .filter(|version| range.contains(version))
            .fold(floor, std::cmp::max)
    }
}

fn written(kind: ManifestKind, resolution: &Resolved) -> Constraint {
    match kind {
        ManifestKind::Application => Constraint::exact(resolution.pin.clone()),
        ManifestKind::Package => resolution.range.clone(),
    }
}
