//! Command implementations

pub mod check;
pub mod init;
pub mod install;
pub mod vendor;

use std::path::PathBuf;

use vendor_core::{ElmHomeIndex, VendorEngine};
use vendor_fs::NormalizedPath;

pub use check::run_check;
pub use init::run_init;
pub use install::run_install;
pub use vendor::{run_unvendor, run_vendor};

/// Engine for `root`, choosing pins from the local Elm package cache.
pub fn engine(root: &NormalizedPath) -> VendorEngine {
    let engine = VendorEngine::new(root.clone());
    match ElmHomeIndex::locate(std::env::var_os("ELM_HOME").map(PathBuf::from)) {
        Some(index) => engine.with_index(Box::new(index)),
        None => engine,
    }
}
