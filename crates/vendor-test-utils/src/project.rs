//! [`TestProject`] builder for elm-vendor test scenarios.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tempfile::TempDir;

/// Host application used by [`TestProject::application`].
pub const APPLICATION: &str = r#"{
    "type": "application",
    "source-directories": [
        "src"
    ],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": {
            "elm/core": "1.0.5"
        },
        "indirect": {
            "elm/json": "1.1.3"
        }
    },
    "test-dependencies": {
        "direct": {},
        "indirect": {}
    }
}
"#;

/// A temporary Elm project with helpers for arranging and inspecting files.
///
/// # Example
///
/// ```rust,no_run
/// use vendor_test_utils::TestProject;
///
/// let project = TestProject::application()
///     .with_vendored("vendor/ui", r#"{"type": "package", "name": "a/ui", "dependencies": {}}"#);
/// assert!(project.root().join("vendor/ui/elm.json").exists());
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl TestProject {
    /// A project whose host manifest is [`APPLICATION`].
    pub fn application() -> Self {
        Self::with_manifest(APPLICATION)
    }

    /// A project whose host manifest is `manifest`.
    pub fn with_manifest(manifest: &str) -> Self {
        let project = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        project.write("elm.json", manifest);
        fs::create_dir_all(project.root().join("src")).unwrap();
        project
    }

    /// Add a vendored directory at `path` holding `manifest` and a `src/`.
    pub fn with_vendored(self, path: &str, manifest: &str) -> Self {
        self.write(&format!("{path}/elm.json"), manifest);
        fs::create_dir_all(self.root().join(path).join("src")).unwrap();
        self
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Read a file relative to the root.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read(&self, path: &str) -> String {
        let full_path = self.root().join(path);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Could not read {}: {e}", full_path.display()))
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn write(&self, path: &str, content: &str) {
        let full_path = self.root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Could not write {}: {e}", full_path.display()));
    }

    /// Delete a file relative to the root.
    pub fn remove(&self, path: &str) {
        fs::remove_file(self.root().join(path)).unwrap();
    }

    /// Whether `path` (relative to the root) exists.
    pub fn exists(&self, path: &str) -> bool {
        self.root().join(path).exists()
    }

    /// The host manifest as JSON.
    pub fn manifest_json(&self) -> Value {
        serde_json::from_str(&self.read("elm.json")).unwrap()
    }

    /// Edit the host manifest as JSON, the way a user or `elm install` would.
    pub fn edit_manifest(&self, edit: impl FnOnce(&mut Value)) {
        let mut value = self.manifest_json();
        edit(&mut value);
        let mut text = serde_json::to_string_pretty(&value).unwrap();
        text.push('\n');
        self.write("elm.json", &text);
    }
}
