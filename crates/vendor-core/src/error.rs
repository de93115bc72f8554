//! Error types for vendor-core

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use vendor_fs::NormalizedPath;

use crate::drift::DriftReport;
use crate::reconcile::ConflictReport;

/// Result type for vendor-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// A registered directory whose manifest could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingManifest {
    /// The vendored directory, relative to the project root
    pub directory: NormalizedPath,
    /// Why the manifest was unusable
    pub reason: String,
}

impl fmt::Display for MissingManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.directory, self.reason)
    }
}

/// Errors that can occur in vendor-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A manifest could not be parsed or lacks a required field
    #[error("Malformed manifest {path}: `{field}`: {message}")]
    MalformedManifest {
        path: PathBuf,
        field: String,
        message: String,
    },

    /// Unvendor target that is not registered
    #[error("{path} is not a vendored directory")]
    UnknownVendorDirectory { path: NormalizedPath },

    /// Dependency constraints that cannot all hold at once
    #[error("{0}")]
    Conflict(ConflictReport),

    /// A file changed on disk between read and write
    #[error("{path} was modified by another process since it was read; re-run the command")]
    WriteConflict { path: PathBuf },

    /// One or more registered directories have no readable manifest
    #[error("Vendored manifests could not be read:\n{}", format_missing(.0))]
    MissingVendoredManifests(Vec<MissingManifest>),

    /// No registry exists at the project root
    #[error("No elm-vendor registry found in {root}; run `elm-vendor init` first")]
    RegistryNotFound { root: PathBuf },

    /// `init` was run on an already initialised project
    #[error("A registry already exists at {path}")]
    RegistryExists { path: PathBuf },

    /// Both registry formats are present
    #[error("Found both {} and {}; keep only one", .0[0].display(), .0[1].display())]
    AmbiguousRegistry([PathBuf; 2]),

    /// Vendor path outside the project or otherwise unusable
    #[error("Invalid vendor path {path}: {reason}")]
    InvalidVendorPath { path: String, reason: String },

    /// The host manifest was edited outside the tool
    #[error("elm.json has drifted from the registry:\n{0}")]
    DriftDetected(DriftReport),

    /// The external package manager failed
    #[error("Install failed: {message}")]
    Install { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from vendor-fs
    #[error(transparent)]
    Fs(vendor_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<vendor_fs::Error> for Error {
    fn from(err: vendor_fs::Error) -> Self {
        match err {
            vendor_fs::Error::WriteConflict { path, .. } => Self::WriteConflict { path },
            other => Self::Fs(other),
        }
    }
}

fn format_missing(missing: &[MissingManifest]) -> String {
    missing
        .iter()
        .map(|m| format!("  {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_conflict_from_fs_is_lifted() {
        let fs_err = vendor_fs::Error::WriteConflict {
            path: PathBuf::from("elm.json"),
            expected: "a".into(),
            found: "b".into(),
        };
        assert!(matches!(Error::from(fs_err), Error::WriteConflict { .. }));
    }

    #[test]
    fn missing_manifests_lists_every_directory() {
        let err = Error::MissingVendoredManifests(vec![
            MissingManifest {
                directory: NormalizedPath::new("vendor/a"),
                reason: "no elm.json".into(),
            },
            MissingManifest {
                directory: NormalizedPath::new("vendor/b"),
                reason: "permission denied".into(),
            },
        ]);
        let display = err.to_string();
        assert!(display.contains("vendor/a: no elm.json"));
        assert!(display.contains("vendor/b: permission denied"));
    }
}
