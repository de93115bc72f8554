//! Error types for vendor-cli

use std::path::PathBuf;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from vendor-core
    #[error(transparent)]
    Core(#[from] vendor_core::Error),

    /// Error from vendor-fs
    #[error(transparent)]
    Fs(#[from] vendor_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Interactive prompt error
    #[error("Interactive prompt error: {0}")]
    Dialoguer(#[from] dialoguer::Error),

    /// Git repository error
    #[error(transparent)]
    Git(#[from] git2::Error),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// elm.json has uncommitted changes
    #[error("{} has uncommitted changes; commit them first or pass --allow-dirty", .path.display())]
    Dirty { path: PathBuf },

    /// Drift already printed in machine-readable form
    #[error("elm.json has drifted from the registry")]
    DriftReported,

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        use vendor_core::Error as Core;

        match self {
            Self::Core(err) => match err {
                Core::MalformedManifest { .. } => 2,
                Core::Fs(vendor_fs::Error::ConfigParse { .. }) => 2,
                Core::UnknownVendorDirectory { .. } | Core::InvalidVendorPath { .. } => 3,
                Core::Conflict(_) => 4,
                Core::WriteConflict { .. } => 5,
                Core::MissingVendoredManifests(_) => 6,
                Core::DriftDetected(_) => 7,
                Core::RegistryNotFound { .. }
                | Core::RegistryExists { .. }
                | Core::AmbiguousRegistry(_) => 8,
                Core::Install { .. } => 10,
                _ => 1,
            },
            Self::Fs(vendor_fs::Error::WriteConflict { .. }) => 5,
            Self::DriftReported => 7,
            Self::Dirty { .. } => 9,
            _ => 1,
        }
    }
}
