//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// elm-vendor - Keep elm.json in step with vendored Elm packages
#[derive(Parser, Debug)]
#[command(name = "elm-vendor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project root containing elm.json
    #[arg(long, global = true, env = "ELM_VENDOR_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip the check that elm.json has no uncommitted changes
    #[arg(long, global = true)]
    pub allow_dirty: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create elm-vendor.json from the current elm.json
    Init,

    /// Vendor a directory and reconcile elm.json
    ///
    /// Without a directory, every registered directory is reconciled again.
    ///
    /// Examples:
    ///   elm-vendor vendor vendor/elm-ui   # Vendor one package
    ///   elm-vendor vendor                 # Re-apply all vendored packages
    ///   elm-vendor vendor --dry-run       # Show the diff only
    Vendor {
        /// Directory holding the vendored package, relative to the root
        dir: Option<PathBuf>,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Vendor even if elm.json was edited by hand
        #[arg(long)]
        force: bool,
    },

    /// Stop vendoring a directory and restore elm.json
    ///
    /// Without a directory, everything is unvendored.
    Unvendor {
        /// Registered directory to remove
        dir: Option<PathBuf>,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Check elm.json for drift from the registry; suitable for CI
    Check {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Install a dependency with elm or lamdera and record it
    Install {
        /// Package name, e.g. elm/http
        dependency: String,

        /// Version to record (the toolchain picks the newest compatible one)
        version: Option<String>,
    },
}
