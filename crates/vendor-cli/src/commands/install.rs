//! Install command implementation

use colored::Colorize;
use vendor_fs::NormalizedPath;

use super::engine;
use crate::error::Result;
use crate::installer::ElmBinary;

/// Run the install command
///
/// Lets `elm` or `lamdera` update elm.json, then records the result so it
/// survives vendoring and unvendoring.
pub fn run_install(root: &NormalizedPath, dependency: &str, version: Option<&str>) -> Result<()> {
    let installer = ElmBinary::new(root.to_native());
    let report = engine(root).install(dependency, version, &installer)?;

    if report.changed.is_empty() {
        println!(
            "{} {} was already installed.",
            "OK".green().bold(),
            dependency.cyan()
        );
    } else {
        println!(
            "{} Installed with {}; recorded {}",
            "OK".green().bold(),
            report.dialect.to_string().yellow(),
            report.changed.join(", ").cyan()
        );
    }
    Ok(())
}
