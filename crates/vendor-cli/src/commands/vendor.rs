//! Vendor and unvendor command implementations

use std::path::Path;

use colored::Colorize;
use vendor_core::{UnvendorOptions, VendorOptions, VendorReport};
use vendor_fs::NormalizedPath;

use super::engine;
use crate::error::Result;
use crate::git;

/// Run the vendor command
pub fn run_vendor(
    root: &NormalizedPath,
    dir: Option<&Path>,
    options: VendorOptions,
    allow_dirty: bool,
) -> Result<()> {
    let engine = engine(root);
    if !allow_dirty && !options.dry_run {
        git::ensure_clean(&engine.layout().manifest().to_native())?;
    }

    let report = engine.vendor(dir, options)?;
    print_report(&report, "vendored");
    Ok(())
}

/// Run the unvendor command
pub fn run_unvendor(
    root: &NormalizedPath,
    dir: Option<&Path>,
    options: UnvendorOptions,
    allow_dirty: bool,
) -> Result<()> {
    let engine = engine(root);
    if !allow_dirty && !options.dry_run {
        git::ensure_clean(&engine.layout().manifest().to_native())?;
    }

    let report = engine.unvendor(dir, options)?;
    print_report(&report, "still vendored");
    Ok(())
}

fn print_report(report: &VendorReport, label: &str) {
    if report.dry_run {
        match report.diff.as_deref() {
            Some(diff) if !diff.is_empty() => {
                println!("{} Would apply:", "[dry-run]".yellow().bold());
                print!("{diff}");
            }
            _ => println!("{} No changes.", "[dry-run]".yellow().bold()),
        }
        return;
    }

    if report.changed() {
        println!("{} elm.json updated.", "OK".green().bold());
    } else {
        println!("{} elm.json already up to date.", "OK".green().bold());
    }
    if report.directories.is_empty() {
        println!("   Nothing {label}.");
    } else {
        println!("   {} {}:", report.directories.len(), label);
        for dir in &report.directories {
            println!("   {} {}", "-".dimmed(), dir.to_string().cyan());
        }
    }
}
