//! Dependency buckets of a manifest

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Constraint;

/// Dependency name to constraint, ordered by name.
pub type DependencyMap = BTreeMap<String, Constraint>;

/// The four places a dependency can be declared.
///
/// Packages only use `Direct` and `Test`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    Direct,
    Indirect,
    Test,
    TestIndirect,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Direct,
        Bucket::Indirect,
        Bucket::Test,
        Bucket::TestIndirect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Indirect => "indirect",
            Self::Test => "test",
            Self::TestIndirect => "test-indirect",
        }
    }

    /// Whether the bucket only matters when running tests.
    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test | Self::TestIndirect)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All declared dependencies of one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dependencies {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub direct: DependencyMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indirect: DependencyMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub test: DependencyMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub test_indirect: DependencyMap,
}

impl Dependencies {
    pub fn bucket(&self, bucket: Bucket) -> &DependencyMap {
        match bucket {
            Bucket::Direct => &self.direct,
            Bucket::Indirect => &self.indirect,
            Bucket::Test => &self.test,
            Bucket::TestIndirect => &self.test_indirect,
        }
    }

    pub fn bucket_mut(&mut self, bucket: Bucket) -> &mut DependencyMap {
        match bucket {
            Bucket::Direct => &mut self.direct,
            Bucket::Indirect => &mut self.indirect,
            Bucket::Test => &mut self.test,
            Bucket::TestIndirect => &mut self.test_indirect,
        }
    }

    /// Every entry, bucket by bucket and by name within a bucket.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &str, &Constraint)> {
        Bucket::ALL.into_iter().flat_map(move |bucket| {
            self.bucket(bucket)
                .iter()
                .map(move |(name, constraint)| (bucket, name.as_str(), constraint))
        })
    }

    /// The first bucket declaring `name`, with its constraint.
    pub fn find(&self, name: &str) -> Option<(Bucket, &Constraint)> {
        Bucket::ALL
            .into_iter()
            .find_map(|bucket| self.bucket(bucket).get(name).map(|c| (bucket, c)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Remove `name` from every bucket.
    pub fn remove(&mut self, name: &str) {
        for bucket in Bucket::ALL {
            self.bucket_mut(bucket).remove(name);
        }
    }

    pub fn len(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.bucket(*b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
