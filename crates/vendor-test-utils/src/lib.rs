//! Shared test fixtures for the elm-vendor workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`] - git repository fixtures
//! - [`project`] - [`TestProject`] builder for Elm host projects

pub mod git;
pub mod project;

pub use project::TestProject;
