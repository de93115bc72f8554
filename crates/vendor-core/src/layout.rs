//! Where project files live
//!
//! All paths are derived from the project root passed in by the caller;
//! nothing is looked up from the process environment.

use std::path::Path;

use vendor_fs::{NormalizedPath, ProjectFile};

use crate::{Error, Result};

/// File locations of one Elm project.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: NormalizedPath,
}

impl ProjectLayout {
    pub fn new(root: impl Into<NormalizedPath>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    /// The host `elm.json`.
    pub fn manifest(&self) -> NormalizedPath {
        self.root.join(ProjectFile::Manifest.as_str())
    }

    /// Lock file serializing mutations of this project.
    pub fn lock(&self) -> NormalizedPath {
        self.root.join(ProjectFile::Lock.as_str())
    }

    /// Registry path used when creating a new registry.
    pub fn default_registry(&self) -> NormalizedPath {
        self.root.join(ProjectFile::RegistryJson.as_str())
    }

    /// The existing registry file, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousRegistry`] when both the JSON and the TOML
    /// registry exist.
    pub fn find_registry(&self) -> Result<Option<NormalizedPath>> {
        let found: Vec<NormalizedPath> = ProjectFile::registry_candidates()
            .iter()
            .map(|file| self.root.join(file.as_str()))
            .filter(|path| path.is_file())
            .collect();

        match found.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(single.clone())),
            [first, second, ..] => Err(Error::AmbiguousRegistry([
                first.to_native(),
                second.to_native(),
            ])),
        }
    }

    /// The existing registry file, or [`Error::RegistryNotFound`].
    pub fn require_registry(&self) -> Result<NormalizedPath> {
        self.find_registry()?.ok_or_else(|| Error::RegistryNotFound {
            root: self.root.to_native(),
        })
    }

    /// Absolute location of a vendored directory.
    pub fn vendored_dir(&self, dir: &NormalizedPath) -> NormalizedPath {
        self.root.join(dir.as_str())
    }

    /// The `elm.json` inside a vendored directory.
    pub fn vendored_manifest(&self, dir: &NormalizedPath) -> NormalizedPath {
        self.vendored_dir(dir).join(ProjectFile::Manifest.as_str())
    }

    /// Turn a user-supplied directory into a registry path.
    ///
    /// Relative paths are taken relative to the project root. The result is
    /// normalised and must name a directory strictly inside the root.
    pub fn resolve_vendor_dir(&self, dir: &Path) -> Result<NormalizedPath> {
        let input = NormalizedPath::new(dir);
        let invalid = |reason: &str| Error::InvalidVendorPath {
            path: dir.display().to_string(),
            reason: reason.to_string(),
        };

        let relative = if input.is_absolute() {
            input
                .strip_prefix(&self.root)
                .ok_or_else(|| invalid("outside the project root"))?
        } else {
            input
        };

        if relative.escapes_root() {
            return Err(invalid("outside the project root"));
        }
        if relative.as_str() == "." {
            return Err(invalid("the project root cannot vendor itself"));
        }
        Ok(relative)
    }
}
