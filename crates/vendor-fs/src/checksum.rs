//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! optimistic concurrency checks on project files.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw bytes.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Identity of a file's content at the moment it was read.
///
/// Captured when a project file is read and compared again right before it
/// is replaced, so a concurrent edit is detected instead of overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// The file did not exist
    Absent,
    /// Checksum of the file content
    Content(String),
}

impl Fingerprint {
    /// Fingerprint of in-memory content.
    pub fn of(content: &[u8]) -> Self {
        Self::Content(compute_checksum(content))
    }

    /// Fingerprint of a file as it currently is on disk.
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        match std::fs::read(path) {
            Ok(content) => Ok(Self::of(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::Absent),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "<absent>"),
            Self::Content(checksum) => write!(f, "{}", checksum),
        }
    }
}
