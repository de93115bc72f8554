//! Check command implementation

use colored::Colorize;
use vendor_fs::NormalizedPath;

use super::engine;
use crate::error::{CliError, Result};

/// Run the check command
///
/// Exits non-zero when elm.json differs from what the registry expects.
pub fn run_check(root: &NormalizedPath, json: bool) -> Result<()> {
    let report = engine(root).check()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return if report.is_clean() {
            Ok(())
        } else {
            Err(CliError::DriftReported)
        };
    }

    if report.is_clean() {
        println!("{} elm.json matches the registry.", "OK".green().bold());
        Ok(())
    } else {
        Err(vendor_core::Error::DriftDetected(report).into())
    }
}
