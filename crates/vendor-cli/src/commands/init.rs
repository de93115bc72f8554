//! Init command implementation

use colored::Colorize;
use dialoguer::Confirm;
use vendor_fs::NormalizedPath;

use super::engine;
use crate::error::Result;

/// Run the init command
///
/// Records the current elm.json as the base every later reconciliation
/// starts from.
pub fn run_init(root: &NormalizedPath, yes: bool) -> Result<()> {
    let engine = engine(root);
    let layout = engine.layout();

    if !yes {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Record {} as the pre-vendoring state of this project?",
                layout.manifest()
            ))
            .default(true)
            .interact()?;
        if !proceed {
            println!("{} Nothing written.", "=>".blue().bold());
            return Ok(());
        }
    }

    let path = engine.init()?;
    println!("{} Created {}", "OK".green().bold(), path.to_string().cyan());
    Ok(())
}
