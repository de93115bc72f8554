//! Runs `elm install` or `lamdera install`

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, warn};
use vendor_core::{Dialect, Error, PackageInstaller};

/// The toolchain executable on `PATH`, run inside the project root.
pub struct ElmBinary {
    root: PathBuf,
}

impl ElmBinary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PackageInstaller for ElmBinary {
    fn install(
        &self,
        dialect: Dialect,
        dependency: &str,
        version: Option<&str>,
    ) -> vendor_core::Result<()> {
        if let Some(version) = version {
            warn!(
                version,
                "`{} install` picks the version itself; the requested version is not enforced",
                dialect.program()
            );
        }

        let program = dialect.program();
        debug!(program, dependency, root = %self.root.display(), "spawning installer");
        let mut child = Command::new(program)
            .arg("install")
            .arg(dependency)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Install {
                message: format!("could not run `{program}`: {e}"),
            })?;

        // Accept the proposed plan
        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(b"y\n")
        {
            debug!(error = %e, "installer closed stdin early");
        }

        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            Err(Error::Install {
                message: format!(
                    "`{program} install {dependency}` failed ({}): {}",
                    output.status,
                    detail.trim()
                ),
            })
        }
    }
}
