//! Filesystem primitives for elm-vendor
//!
//! Provides normalized path handling, content fingerprints and the guarded
//! write path used for every mutation of a project file.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;

pub use checksum::Fingerprint;
pub use config::{ConfigStore, Format};
pub use constants::ProjectFile;
pub use error::{Error, Result};
pub use io::{FileLock, FileSnapshot, RobustnessConfig, StagedWrite, Transaction};
pub use path::NormalizedPath;
