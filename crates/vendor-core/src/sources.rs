//! Source-directory merging
//!
//! Each vendored package lists source directories relative to its own
//! `elm.json`. They are re-rooted at the package's directory and appended
//! to the host's list: host directories first, then packages in path order,
//! each package's directories in the order it declares them. A path that
//! normalises to one already present is skipped.

use std::collections::HashSet;

use vendor_fs::NormalizedPath;

use crate::reconcile::VendoredPackage;

/// Union of the host's source directories with every package's.
pub fn merge_source_directories(
    host: &[NormalizedPath],
    packages: &[VendoredPackage],
) -> Vec<NormalizedPath> {
    let mut ordered: Vec<&VendoredPackage> = packages.iter().collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    let contextualized = ordered.into_iter().flat_map(|package| {
        package
            .manifest
            .source_directories()
            .iter()
            .map(|dir| package.path.join(dir.as_str()))
    });

    let mut seen = HashSet::new();
    host.iter()
        .cloned()
        .chain(contextualized)
        .filter(|dir| seen.insert(dir.clone()))
        .collect()
}
