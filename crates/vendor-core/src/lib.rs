//! Manifest reconciliation engine for vendored Elm packages
//!
//! Vendoring copies a package's sources into the host project. This crate
//! keeps the host `elm.json` consistent with the set of vendored packages:
//!
//! - [`manifest`] parses and renders `elm.json`
//! - [`registry`] records vendored directories and the pre-vendoring base
//! - [`reconcile`] merges dependency constraints or reports conflicts
//! - [`sources`] merges source directories
//! - [`drift`] compares the host manifest with the expectation
//! - [`engine`] ties them together into `init`, `vendor`, `unvendor`,
//!   `check` and `install`

pub mod drift;
pub mod engine;
pub mod error;
pub mod install;
pub mod layout;
pub mod manifest;
pub mod reconcile;
pub mod registry;
pub mod sources;
pub mod version;
pub mod writer;

pub use drift::DriftReport;
pub use engine::{InstallReport, UnvendorOptions, VendorEngine, VendorOptions, VendorReport};
pub use error::{Error, MissingManifest, Result};
pub use install::{Dialect, PackageInstaller};
pub use layout::ProjectLayout;
pub use manifest::{Bucket, Dependencies, Manifest, ManifestKind};
pub use reconcile::{
    ConflictReport, ElmHomeIndex, MergedManifest, NoIndex, PackageIndex, Reconciler,
    Reconciliation, VendoredPackage,
};
pub use registry::Registry;
pub use version::Constraint;
