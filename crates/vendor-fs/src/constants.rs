//! Well-known file names inside an Elm project.

use std::path::Path;

/// Files elm-vendor reads or writes relative to a project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFile {
    /// The Elm project manifest
    Manifest,
    /// The vendor registry in JSON form (the default)
    RegistryJson,
    /// The vendor registry in TOML form
    RegistryToml,
    /// Advisory lock guarding mutations of the project files
    Lock,
}

impl ProjectFile {
    /// Get the file name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "elm.json",
            Self::RegistryJson => "elm-vendor.json",
            Self::RegistryToml => "elm-vendor.toml",
            Self::Lock => ".elm-vendor.lock",
        }
    }

    /// Both accepted registry file names, default first.
    pub fn registry_candidates() -> [ProjectFile; 2] {
        [Self::RegistryJson, Self::RegistryToml]
    }
}

impl AsRef<Path> for ProjectFile {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for ProjectFile {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for ProjectFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
