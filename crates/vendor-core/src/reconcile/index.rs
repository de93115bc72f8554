//! Package availability
//!
//! The reconciler only narrows ranges. Which concrete versions exist is
//! answered by a [`PackageIndex`]; none of the implementations here touch
//! the network.

use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use tracing::debug;

use crate::version::{Constraint, parse_version};

/// Elm compiler version whose package cache layout is read.
const ELM_CACHE_VERSION: &str = "0.19.1";

/// Answers which versions of a package are available.
pub trait PackageIndex {
    /// Every known version of `name`, in any order.
    fn versions(&self, name: &str) -> Vec<Version>;

    /// The newest known version of `name` satisfying `range`.
    fn newest_matching(&self, name: &str, range: &Constraint) -> Option<Version> {
        self.versions(name)
            .into_iter()
            .filter(|version| range.contains(version))
            .max()
    }
}

/// Knows nothing; pins fall back to the versions constraints mention.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl PackageIndex for NoIndex {
    fn versions(&self, _name: &str) -> Vec<Version> {
        Vec::new()
    }
}

/// Versions already downloaded into the local Elm package cache.
///
/// Reads `$ELM_HOME/0.19.1/packages/<author>/<project>/<version>/`.
#[derive(Debug, Clone)]
pub struct ElmHomeIndex {
    packages: PathBuf,
}

impl ElmHomeIndex {
    /// Index the cache under `elm_home`.
    pub fn new(elm_home: impl AsRef<Path>) -> Self {
        Self {
            packages: elm_home.as_ref().join(ELM_CACHE_VERSION).join("packages"),
        }
    }

    /// Use `elm_home` if given, otherwise `~/.elm` like the compiler does.
    pub fn locate(elm_home: Option<PathBuf>) -> Option<Self> {
        elm_home
            .or_else(|| dirs::home_dir().map(|home| home.join(".elm")))
            .map(Self::new)
    }
}

impl PackageIndex for ElmHomeIndex {
    fn versions(&self, name: &str) -> Vec<Version> {
        let Some((author, project)) = name.split_once('/') else {
            return Vec::new();
        };
        let dir = self.packages.join(author).join(project);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(package = name, dir = %dir.display(), error = %e, "package not cached");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| parse_version(&entry.file_name().to_string_lossy()).ok())
            .collect()
    }
}
