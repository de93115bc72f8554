//! elm-vendor CLI
//!
//! Keeps elm.json consistent with the Elm packages vendored into a project.

mod cli;
mod commands;
mod error;
mod git;
mod installer;
mod logging;

use clap::Parser;
use colored::Colorize;
use vendor_core::{UnvendorOptions, VendorOptions};
use vendor_fs::NormalizedPath;

use cli::{Cli, Commands};
use error::{CliError, Result};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: could not set up logging: {e}", "warning".yellow().bold());
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = NormalizedPath::canonicalize(&cli.root)?;
    if !root.is_dir() {
        return Err(CliError::user(format!("{root} is not a directory")));
    }
    tracing::debug!(root = %root, "project root");

    match cli.command {
        Commands::Init => commands::run_init(&root, cli.yes),
        Commands::Vendor {
            dir,
            dry_run,
            force,
        } => commands::run_vendor(
            &root,
            dir.as_deref(),
            VendorOptions { dry_run, force },
            cli.allow_dirty,
        ),
        Commands::Unvendor { dir, dry_run } => commands::run_unvendor(
            &root,
            dir.as_deref(),
            UnvendorOptions { dry_run },
            cli.allow_dirty,
        ),
        Commands::Check { json } => commands::run_check(&root, json),
        Commands::Install {
            dependency,
            version,
        } => commands::run_install(&root, &dependency, version.as_deref()),
    }
}
