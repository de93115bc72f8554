//! External package manager seam

use std::fmt;

use serde::Serialize;

use crate::Result;
use crate::manifest::Dependencies;

/// Marker dependency of Lamdera projects.
pub const LAMDERA_MARKER: &str = "lamdera/core";

/// Which toolchain owns the host project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Elm,
    Lamdera,
}

impl Dialect {
    /// `Lamdera` if its marker appears in any bucket.
    pub fn detect(dependencies: &Dependencies) -> Self {
        if dependencies.contains(LAMDERA_MARKER) {
            Self::Lamdera
        } else {
            Self::Elm
        }
    }

    /// Executable name of the toolchain.
    pub fn program(&self) -> &'static str {
        match self {
            Self::Elm => "elm",
            Self::Lamdera => "lamdera",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Installs a dependency into the host manifest.
///
/// Implementations run synchronously and must only return `Ok` once the
/// host `elm.json` has been updated.
pub trait PackageInstaller {
    fn install(&self, dialect: Dialect, dependency: &str, version: Option<&str>) -> Result<()>;
}
