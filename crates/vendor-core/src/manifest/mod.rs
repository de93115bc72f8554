//! The `elm.json` manifest model
//!
//! A manifest is either an application or a package. Both share one
//! representation; the kind only decides how dependency buckets are laid out
//! on disk and whether constraints are pins or ranges.
//!
//! Only `source-directories`, `dependencies` and `test-dependencies` are
//! owned by this crate. Every other key is kept in the parsed document and
//! written back in its original position.

mod dependencies;

pub use dependencies::{Bucket, Dependencies, DependencyMap};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vendor_fs::NormalizedPath;
use vendor_fs::config::to_json_pretty;

use crate::version::Constraint;
use crate::{Error, Result};

pub const TYPE: &str = "type";
pub const NAME: &str = "name";
pub const SOURCE_DIRECTORIES: &str = "source-directories";
pub const DEPENDENCIES: &str = "dependencies";
pub const TEST_DEPENDENCIES: &str = "test-dependencies";

/// Keys whose values are rewritten by reconciliation.
pub const OWNED_KEYS: [&str; 3] = [SOURCE_DIRECTORIES, DEPENDENCIES, TEST_DEPENDENCIES];

const DEFAULT_SOURCE_DIRECTORY: &str = "src";

/// Whether a manifest describes an application or a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    /// Exact pins split into direct and indirect
    Application,
    /// Flat ranges, published under a name
    Package,
}

impl ManifestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Package => "package",
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned state as it was parsed, used to detect an unchanged manifest.
#[derive(Debug, Clone)]
struct Original {
    text: String,
    source_directories: Vec<NormalizedPath>,
    dependencies: Dependencies,
}

/// A parsed `elm.json`.
#[derive(Debug, Clone)]
pub struct Manifest {
    kind: ManifestKind,
    name: Option<String>,
    source_directories: Vec<NormalizedPath>,
    dependencies: Dependencies,
    /// The whole document in its original key order
    document: Map<String, Value>,
    original: Option<Original>,
}

impl Manifest {
    /// Parse manifest text read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedManifest`] naming the offending field when
    /// the document is not a JSON object, a required field is missing, or a
    /// version constraint cannot be parsed.
    pub fn parse(path: impl AsRef<Path>, content: &str) -> Result<Self> {
        let path = path.as_ref();
        let malformed = |e: FieldError| Error::MalformedManifest {
            path: path.to_path_buf(),
            field: e.field,
            message: e.message,
        };

        let value: Value = serde_json::from_str(content)
            .map_err(|e| malformed(FieldError::new("<document>", e.to_string())))?;
        let Value::Object(document) = value else {
            return Err(malformed(FieldError::new(
                "<document>",
                "expected a JSON object",
            )));
        };

        let parsed = parse_document(&document).map_err(malformed)?;

        Ok(Self {
            kind: parsed.kind,
            name: parsed.name,
            original: Some(Original {
                text: content.to_string(),
                source_directories: parsed.source_directories.clone(),
                dependencies: parsed.dependencies.clone(),
            }),
            source_directories: parsed.source_directories,
            dependencies: parsed.dependencies,
            document,
        })
    }

    /// An empty manifest of the given kind.
    pub fn new(kind: ManifestKind) -> Self {
        let mut document = Map::new();
        document.insert(TYPE.to_string(), Value::String(kind.as_str().to_string()));
        Self {
            kind,
            name: None,
            source_directories: match kind {
                ManifestKind::Application => Vec::new(),
                ManifestKind::Package => vec![NormalizedPath::new(DEFAULT_SOURCE_DIRECTORY)],
            },
            dependencies: Dependencies::default(),
            document,
            original: None,
        }
    }

    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    /// The published name; only packages are required to have one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Source directories relative to the manifest's own directory.
    pub fn source_directories(&self) -> &[NormalizedPath] {
        &self.source_directories
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn set_source_directories(&mut self, source_directories: Vec<NormalizedPath>) {
        self.source_directories = source_directories;
    }

    pub fn set_dependencies(&mut self, dependencies: Dependencies) {
        self.dependencies = dependencies;
    }

    /// Every top-level field this crate does not own, in document order.
    pub fn pass_through(&self) -> Map<String, Value> {
        self.document
            .iter()
            .filter(|(key, _)| !OWNED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Whether the owned fields still hold what was parsed.
    pub fn is_unchanged(&self) -> bool {
        self.original.as_ref().is_some_and(|original| {
            original.source_directories == self.source_directories
                && original.dependencies == self.dependencies
        })
    }

    /// The text this manifest was parsed from, if any.
    pub fn original_text(&self) -> Option<&str> {
        self.original.as_ref().map(|original| original.text.as_str())
    }

    /// Serialize the manifest.
    ///
    /// An unchanged manifest renders to its original bytes. Otherwise the
    /// owned keys are replaced in place and the document is written with
    /// four-space indentation and a trailing newline.
    pub fn render(&self) -> Result<String> {
        if self.is_unchanged()
            && let Some(text) = self.original_text()
        {
            return Ok(text.to_string());
        }

        let mut document = self.document.clone();

        let default_dirs = [NormalizedPath::new(DEFAULT_SOURCE_DIRECTORY)];
        if self.kind == ManifestKind::Application
            || document.contains_key(SOURCE_DIRECTORIES)
            || self.source_directories != default_dirs
        {
            let dirs = self
                .source_directories
                .iter()
                .map(|dir| Value::String(dir.as_str().to_string()))
                .collect();
            document.insert(SOURCE_DIRECTORIES.to_string(), Value::Array(dirs));
        }

        let deps = &self.dependencies;
        let (dependencies, test_dependencies) = match self.kind {
            ManifestKind::Application => (
                split_buckets(&deps.direct, &deps.indirect),
                split_buckets(&deps.test, &deps.test_indirect),
            ),
            ManifestKind::Package => (flat_bucket(&deps.direct), flat_bucket(&deps.test)),
        };
        document.insert(DEPENDENCIES.to_string(), dependencies);
        if document.contains_key(TEST_DEPENDENCIES)
            || !deps.test.is_empty()
            || !deps.test_indirect.is_empty()
        {
            document.insert(TEST_DEPENDENCIES.to_string(), test_dependencies);
        }

        let mut text = to_json_pretty(&Value::Object(document))?;
        text.push('\n');
        Ok(text)
    }
}

fn flat_bucket(bucket: &DependencyMap) -> Value {
    Value::Object(
        bucket
            .iter()
            .map(|(name, constraint)| (name.clone(), Value::String(constraint.to_string())))
            .collect(),
    )
}

fn split_buckets(direct: &DependencyMap, indirect: &DependencyMap) -> Value {
    let mut map = Map::new();
    map.insert("direct".to_string(), flat_bucket(direct));
    map.insert("indirect".to_string(), flat_bucket(indirect));
    Value::Object(map)
}

struct FieldError {
    field: String,
    message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required field is missing")
    }
}

struct Parsed {
    kind: ManifestKind,
    name: Option<String>,
    source_directories: Vec<NormalizedPath>,
    dependencies: Dependencies,
}

fn parse_document(document: &Map<String, Value>) -> std::result::Result<Parsed, FieldError> {
    let kind = match document.get(TYPE) {
        Some(Value::String(kind)) if kind == "application" => ManifestKind::Application,
        Some(Value::String(kind)) if kind == "package" => ManifestKind::Package,
        Some(other) => {
            return Err(FieldError::new(
                TYPE,
                format!("expected \"application\" or \"package\", found {other}"),
            ));
        }
        None => return Err(FieldError::missing(TYPE)),
    };

    let name = match (kind, document.get(NAME)) {
        (_, Some(Value::String(name))) => Some(name.clone()),
        (ManifestKind::Package, Some(_)) => {
            return Err(FieldError::new(NAME, "expected a string"));
        }
        (ManifestKind::Package, None) => return Err(FieldError::missing(NAME)),
        (ManifestKind::Application, _) => None,
    };

    let source_directories = match document.get(SOURCE_DIRECTORIES) {
        Some(value) => parse_source_directories(value)?,
        None if kind == ManifestKind::Package => {
            vec![NormalizedPath::new(DEFAULT_SOURCE_DIRECTORY)]
        }
        None => return Err(FieldError::missing(SOURCE_DIRECTORIES)),
    };

    let mut dependencies = Dependencies::default();
    let deps = document
        .get(DEPENDENCIES)
        .ok_or_else(|| FieldError::missing(DEPENDENCIES))?;
    let test_deps = document.get(TEST_DEPENDENCIES);

    match kind {
        ManifestKind::Application => {
            dependencies.direct = nested_bucket(deps, DEPENDENCIES, "direct", true)?;
            dependencies.indirect = nested_bucket(deps, DEPENDENCIES, "indirect", true)?;
            if let Some(test_deps) = test_deps {
                dependencies.test = nested_bucket(test_deps, TEST_DEPENDENCIES, "direct", false)?;
                dependencies.test_indirect =
                    nested_bucket(test_deps, TEST_DEPENDENCIES, "indirect", false)?;
            }
        }
        ManifestKind::Package => {
            dependencies.direct = dependency_map(deps, DEPENDENCIES)?;
            if let Some(test_deps) = test_deps {
                dependencies.test = dependency_map(test_deps, TEST_DEPENDENCIES)?;
            }
        }
    }

    check_buckets_agree(kind, &dependencies)?;

    Ok(Parsed {
        kind,
        name,
        source_directories,
        dependencies,
    })
}

/// Where `bucket` lives in the document of a `kind` manifest.
fn bucket_field(kind: ManifestKind, bucket: Bucket) -> String {
    match (kind, bucket) {
        (ManifestKind::Package, Bucket::Direct | Bucket::Indirect) => DEPENDENCIES.to_string(),
        (ManifestKind::Package, _) => TEST_DEPENDENCIES.to_string(),
        (ManifestKind::Application, Bucket::Direct) => format!("{DEPENDENCIES}.direct"),
        (ManifestKind::Application, Bucket::Indirect) => format!("{DEPENDENCIES}.indirect"),
        (ManifestKind::Application, Bucket::Test) => format!("{TEST_DEPENDENCIES}.direct"),
        (ManifestKind::Application, Bucket::TestIndirect) => format!("{TEST_DEPENDENCIES}.indirect"),
    }
}

/// A name listed in several buckets must be satisfiable by one version.
fn check_buckets_agree(
    kind: ManifestKind,
    dependencies: &Dependencies,
) -> std::result::Result<(), FieldError> {
    let mut seen: BTreeMap<&str, (Bucket, &Constraint)> = BTreeMap::new();
    for (bucket, name, constraint) in dependencies.iter() {
        match seen.get(name) {
            Some((first, earlier)) if earlier.intersect(constraint).is_empty() => {
                return Err(FieldError::new(
                    format!("{}.{name}", bucket_field(kind, bucket)),
                    format!(
                        "{constraint} is incompatible with {earlier} in {}.{name}",
                        bucket_field(kind, *first)
                    ),
                ));
            }
            Some(_) => {}
            None => {
                seen.insert(name, (bucket, constraint));
            }
        }
    }
    Ok(())
}

fn parse_source_directories(value: &Value) -> std::result::Result<Vec<NormalizedPath>, FieldError> {
    let Value::Array(items) = value else {
        return Err(FieldError::new(SOURCE_DIRECTORIES, "expected an array of paths"));
    };

    let mut dirs: Vec<NormalizedPath> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::String(dir) = item else {
            return Err(FieldError::new(
                format!("{SOURCE_DIRECTORIES}[{index}]"),
                "expected a path string",
            ));
        };
        let dir = NormalizedPath::new(dir);
        // Unique after normalisation
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    Ok(dirs)
}

fn nested_bucket(
    value: &Value,
    field: &str,
    key: &str,
    required: bool,
) -> std::result::Result<DependencyMap, FieldError> {
    let Value::Object(map) = value else {
        return Err(FieldError::new(field, "expected an object"));
    };
    let path = format!("{field}.{key}");
    match map.get(key) {
        Some(bucket) => dependency_map(bucket, &path),
        None if required => Err(FieldError::missing(path)),
        None => Ok(DependencyMap::new()),
    }
}

fn dependency_map(value: &Value, field: &str) -> std::result::Result<DependencyMap, FieldError> {
    let Value::Object(map) = value else {
        return Err(FieldError::new(field, "expected an object of dependencies"));
    };

    map.iter()
        .map(|(name, constraint)| {
            let path = format!("{field}.{name}");
            let Value::String(raw) = constraint else {
                return Err(FieldError::new(path, "expected a version string"));
            };
            let constraint =
                Constraint::parse(raw).map_err(|e| FieldError::new(path, e.to_string()))?;
            Ok((name.clone(), constraint))
        })
        .collect()
}
