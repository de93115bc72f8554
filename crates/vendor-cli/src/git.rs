//! Git cleanliness check for elm.json

use std::path::Path;

use git2::{Repository, Status};
use tracing::{debug, warn};

use crate::error::{CliError, Result};

/// Fail if `file` has uncommitted changes in the repository containing it.
///
/// Files outside any git repository are not checked.
pub fn ensure_clean(file: &Path) -> Result<()> {
    let Some(dir) = file.parent() else {
        return Ok(());
    };
    let repo = match Repository::discover(dir) {
        Ok(repo) => repo,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "not a git repository, skipping clean check");
            return Ok(());
        }
    };
    let Some(workdir) = repo.workdir() else {
        debug!("bare repository, skipping clean check");
        return Ok(());
    };
    let workdir = dunce::canonicalize(workdir)?;
    let Ok(relative) = file.strip_prefix(&workdir) else {
        warn!(file = %file.display(), workdir = %workdir.display(), "file is outside the work tree");
        return Ok(());
    };

    let status = repo.status_file(relative)?;
    if status.is_empty() || status.contains(Status::IGNORED) {
        Ok(())
    } else {
        debug!(file = %file.display(), ?status, "uncommitted changes");
        Err(CliError::Dirty {
            path: file.to_path_buf(),
        })
    }
}
