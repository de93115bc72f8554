//! VendorEngine implementation
//!
//! The engine coordinates the registry, the host manifest and the vendored
//! manifests of one project. Every operation reads both project files once,
//! works in memory, and writes through a single locked transaction that
//! refuses to overwrite a file changed since it was read.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use vendor_fs::io::{read_snapshot, read_text};
use vendor_fs::{FileSnapshot, NormalizedPath, RobustnessConfig};

use crate::drift::{self, DriftReport};
use crate::error::MissingManifest;
use crate::install::{Dialect, PackageInstaller};
use crate::layout::ProjectLayout;
use crate::manifest::{Bucket, Dependencies, Manifest};
use crate::reconcile::{MergedManifest, NoIndex, PackageIndex, Reconciler, VendoredPackage};
use crate::registry::{Registry, Snapshot};
use crate::version::Constraint;
use crate::writer::{self, PendingWrite};
use crate::{Error, Result};

/// Options for `vendor`
#[derive(Debug, Clone, Copy, Default)]
pub struct VendorOptions {
    /// Compute and report changes without writing
    pub dry_run: bool,
    /// Skip the drift check and accept the current pass-through fields
    pub force: bool,
}

/// Options for `unvendor`
#[derive(Debug, Clone, Copy, Default)]
pub struct UnvendorOptions {
    /// Compute and report changes without writing
    pub dry_run: bool,
}

/// Outcome of a mutating operation.
#[derive(Debug, Clone, Serialize)]
pub struct VendorReport {
    /// Directories registered after the operation
    pub directories: Vec<NormalizedPath>,
    pub manifest_changed: bool,
    pub registry_changed: bool,
    pub dry_run: bool,
    /// Unified diff of the pending changes, for dry runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl VendorReport {
    /// Whether any file was (or would be) written.
    pub fn changed(&self) -> bool {
        self.manifest_changed || self.registry_changed
    }
}

/// Outcome of `install`.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub dialect: Dialect,
    /// Dependencies whose declaration the installer changed
    pub changed: Vec<String>,
}

/// Both project files as read at the start of an operation.
struct State {
    manifest_file: FileSnapshot,
    manifest: Manifest,
    registry_file: FileSnapshot,
    registry: Registry,
}

/// Engine for vendoring Elm packages into a host project
pub struct VendorEngine {
    layout: ProjectLayout,
    index: Box<dyn PackageIndex>,
    robustness: RobustnessConfig,
}

impl VendorEngine {
    /// Engine for the project rooted at `root`, choosing pins without an index.
    pub fn new(root: impl Into<NormalizedPath>) -> Self {
        Self {
            layout: ProjectLayout::new(root),
            index: Box::new(NoIndex),
            robustness: RobustnessConfig::default(),
        }
    }

    /// Consult `index` when choosing pins.
    pub fn with_index(mut self, index: Box<dyn PackageIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.index.as_ref())
    }

    /// Create the registry from the current host manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryExists`] if the project already has one.
    pub fn init(&self) -> Result<NormalizedPath> {
        if let Some(existing) = self.layout.find_registry()? {
            return Err(Error::RegistryExists {
                path: existing.to_native(),
            });
        }

        let (_, manifest) = self.read_manifest()?;
        let path = self.layout.default_registry();
        let registry = Registry::new(Snapshot::of(&manifest));
        let write = PendingWrite::new(read_snapshot(&path)?, registry.render(&path)?);
        writer::commit(&self.layout.lock(), &[&write], self.robustness)?;

        info!(path = %path, "registry created");
        Ok(path)
    }

    /// Vendor `dir` (if given) and reconcile every registered directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriftDetected`] when directories are registered and
    /// the host manifest no longer matches what they produced, unless
    /// `options.force` is set. Conflicts, missing vendored manifests and
    /// concurrent edits abort without writing anything.
    pub fn vendor(&self, dir: Option<&Path>, options: VendorOptions) -> Result<VendorReport> {
        let mut state = self.load_state()?;

        let added = dir.map(|dir| self.existing_vendor_dir(dir)).transpose()?;

        if state.registry.is_empty() {
            debug!("nothing vendored yet, refreshing base snapshot");
            state.registry.set_base(Snapshot::of(&state.manifest));
        } else if options.force {
            state.registry.base_mut().fields = state.manifest.pass_through();
        } else {
            let report = self.edits_since_last_write(&state)?;
            if !report.is_clean() {
                return Err(Error::DriftDetected(report));
            }
        }

        if let Some(path) = added {
            let snapshot = Snapshot::of(&state.manifest).without_fields();
            if state.registry.record(path.clone(), snapshot, Utc::now()) {
                info!(path = %path, "registered vendored directory");
            }
        }

        let packages = self.load_vendored(&state.registry)?;
        let merged = self
            .reconciler()
            .reconcile(state.registry.base(), &packages)
            .into_result()?;
        let next = writer::apply(&state.manifest, &merged);
        self.finish(state, next, options.dry_run)
    }

    /// Unvendor `dir`, or every registered directory when `dir` is `None`.
    ///
    /// With directories left, the manifest is recomputed from them; with none
    /// left, the base snapshot is restored exactly.
    pub fn unvendor(&self, dir: Option<&Path>, options: UnvendorOptions) -> Result<VendorReport> {
        let mut state = self.load_state()?;

        match dir {
            Some(dir) => {
                let path = self.layout.resolve_vendor_dir(dir)?;
                state.registry.remove(&path)?;
                info!(path = %path, "unregistered vendored directory");
            }
            None if state.registry.is_empty() => {
                debug!("nothing vendored, leaving elm.json alone");
                return Ok(VendorReport {
                    directories: Vec::new(),
                    manifest_changed: false,
                    registry_changed: false,
                    dry_run: options.dry_run,
                    diff: options.dry_run.then(String::new),
                });
            }
            None => {
                let removed = state.registry.clear();
                info!(count = removed.len(), "unregistered every vendored directory");
            }
        }

        let next = if state.registry.is_empty() {
            writer::restore(&state.manifest, state.registry.base())
        } else {
            let packages = self.load_vendored(&state.registry)?;
            let merged = self
                .reconciler()
                .reconcile(state.registry.base(), &packages)
                .into_result()?;
            writer::apply(&state.manifest, &merged)
        };
        self.finish(state, next, options.dry_run)
    }

    /// Compare the host manifest with what the registry expects. Read-only.
    pub fn check(&self) -> Result<DriftReport> {
        let state = self.load_state()?;
        let expected = self.expectation(&state.registry, &state.manifest)?;
        let base = self.effective_base(&state.registry, &state.manifest);
        Ok(drift::detect(&state.manifest, &expected, &base))
    }

    /// Reconcile the registered directories in memory.
    pub fn plan(&self) -> Result<MergedManifest> {
        let state = self.load_state()?;
        self.expectation(&state.registry, &state.manifest)
    }

    /// Install `dependency` with the project's toolchain and record the
    /// resulting dependency changes in the base snapshot.
    pub fn install(
        &self,
        dependency: &str,
        version: Option<&str>,
        installer: &dyn PackageInstaller,
    ) -> Result<InstallReport> {
        let state = self.load_state()?;
        let dialect = Dialect::detect(state.manifest.dependencies());
        debug!(%dialect, dependency, "running installer");
        installer.install(dialect, dependency, version)?;

        let (_, after) = self.read_manifest()?;
        let before = state.manifest.dependencies();
        let mut registry = state.registry;

        let mut updates: Vec<(&str, Option<(Bucket, &Constraint)>)> = Vec::new();
        for (bucket, name, constraint) in after.dependencies().iter() {
            if before.find(name) != Some((bucket, constraint)) {
                updates.push((name, Some((bucket, constraint))));
            }
        }
        for (_, name, _) in before.iter() {
            if !after.dependencies().contains(name) {
                updates.push((name, None));
            }
        }

        if registry.is_empty() {
            registry.set_base(Snapshot::of(&after));
        } else {
            apply_updates(&mut registry.base_mut().dependencies, &updates);
            // The installer's edit is not drift either
            if let Some(output) = registry.output_mut() {
                apply_updates(&mut output.dependencies, &updates);
            }
        }
        let mut changed: Vec<String> = updates.iter().map(|(name, _)| name.to_string()).collect();
        changed.sort();
        changed.dedup();

        let path = state.registry_file.path.clone();
        let write = PendingWrite::new(state.registry_file, registry.render(&path)?);
        writer::commit(&self.layout.lock(), &[&write], self.robustness)?;

        Ok(InstallReport { dialect, changed })
    }

    fn existing_vendor_dir(&self, dir: &Path) -> Result<NormalizedPath> {
        let path = self.layout.resolve_vendor_dir(dir)?;
        if !self.layout.vendored_dir(&path).is_dir() {
            return Err(Error::InvalidVendorPath {
                path: dir.display().to_string(),
                reason: "not an existing directory".to_string(),
            });
        }
        Ok(path)
    }

    /// The base to compare against: the host itself while nothing is vendored.
    fn effective_base(&self, registry: &Registry, manifest: &Manifest) -> Snapshot {
        if registry.is_empty() {
            Snapshot::of(manifest)
        } else {
            registry.base().clone()
        }
    }

    /// Host edits made since elm-vendor last wrote the manifest.
    ///
    /// A difference only counts when the manifest departs both from what was
    /// last written and from what the vendored sources now produce, so
    /// changes inside vendored directories never block a resync.
    fn edits_since_last_write(&self, state: &State) -> Result<DriftReport> {
        let base = state.registry.base();
        let expected = self.expectation(&state.registry, &state.manifest)?;
        let current = drift::detect(&state.manifest, &expected, base);
        Ok(match state.registry.output() {
            Some(output) => {
                let written = MergedManifest::recorded(output);
                drift::detect(&state.manifest, &written, base).shared_with(&current)
            }
            None => current,
        })
    }

    fn expectation(&self, registry: &Registry, manifest: &Manifest) -> Result<MergedManifest> {
        let base = self.effective_base(registry, manifest);
        let packages = self.load_vendored(registry)?;
        self.reconciler().reconcile(&base, &packages).into_result()
    }

    fn read_manifest(&self) -> Result<(FileSnapshot, Manifest)> {
        let path = self.layout.manifest();
        let file = read_snapshot(&path)?;
        let Some(content) = file.content.as_deref() else {
            return Err(vendor_fs::Error::io(
                path.to_native(),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
            .into());
        };
        let manifest = Manifest::parse(path.to_native(), content)?;
        Ok((file, manifest))
    }

    fn load_state(&self) -> Result<State> {
        let registry_path = self.layout.require_registry()?;
        let registry_file = read_snapshot(&registry_path)?;
        let Some(content) = registry_file.content.as_deref() else {
            return Err(Error::RegistryNotFound {
                root: self.layout.root().to_native(),
            });
        };
        let registry = Registry::parse(&registry_path, content)?;
        let (manifest_file, manifest) = self.read_manifest()?;

        Ok(State {
            manifest_file,
            manifest,
            registry_file,
            registry,
        })
    }

    /// Read the manifest of every registered directory.
    ///
    /// Absent or unreadable manifests are collected and reported together;
    /// a manifest that reads but does not parse fails immediately.
    fn load_vendored(&self, registry: &Registry) -> Result<Vec<VendoredPackage>> {
        let mut packages = Vec::new();
        let mut missing = Vec::new();

        for entry in registry.entries() {
            let path = self.layout.vendored_manifest(&entry.path);
            match read_text(&path) {
                Ok(content) => {
                    debug!(path = %entry.path, "read vendored manifest");
                    packages.push(VendoredPackage {
                        path: entry.path.clone(),
                        manifest: Manifest::parse(path.to_native(), &content)?,
                    });
                }
                Err(e) => {
                    let reason = if e.is_not_found() {
                        "elm.json not found".to_string()
                    } else {
                        e.to_string()
                    };
                    missing.push(MissingManifest {
                        directory: entry.path.clone(),
                        reason,
                    });
                }
            }
        }

        if missing.is_empty() {
            Ok(packages)
        } else {
            Err(Error::MissingVendoredManifests(missing))
        }
    }

    /// Render both files and either report the diff or write them.
    fn finish(&self, mut state: State, next: Manifest, dry_run: bool) -> Result<VendorReport> {
        let output = (!state.registry.is_empty()).then(|| Snapshot::of(&next).without_fields());
        state.registry.set_output(output);

        let registry_path = state.registry_file.path.clone();
        let manifest = PendingWrite::new(state.manifest_file, next.render()?);
        let registry = PendingWrite::new(state.registry_file, state.registry.render(&registry_path)?);

        let mut report = VendorReport {
            directories: state.registry.entries().iter().map(|e| e.path.clone()).collect(),
            manifest_changed: manifest.changes(),
            registry_changed: registry.changes(),
            dry_run,
            diff: None,
        };

        if dry_run {
            let registry_label = registry_path.file_name().unwrap_or("registry").to_string();
            let diff: String = [(&manifest, "elm.json"), (&registry, registry_label.as_str())]
                .into_iter()
                .filter(|(write, _)| write.changes())
                .map(|(write, label)| write.diff(label))
                .collect();
            report.diff = Some(diff);
            return Ok(report);
        }

        writer::commit(&self.layout.lock(), &[&manifest, &registry], self.robustness)?;
        Ok(report)
    }
}

/// Move or remove each updated name in `dependencies`.
fn apply_updates(dependencies: &mut Dependencies, updates: &[(&str, Option<(Bucket, &Constraint)>)]) {
    for (name, update) in updates {
        dependencies.remove(name);
        if let Some((bucket, constraint)) = update {
            dependencies
                .bucket_mut(*bucket)
                .insert(name.to_string(), (*constraint).clone());
        }
    }
}
