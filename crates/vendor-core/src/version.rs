//! Version constraint parsing and intersection.
//!
//! Every constraint is stored as a half-open range `[lower, upper)` over
//! `MAJOR.MINOR.PATCH` versions. Versions are discrete, so all accepted
//! forms map onto that one shape:
//!
//! - `1.0.5` or `==1.0.5` is the pin `[1.0.5, 1.0.6)`
//! - `1.0.0 <= v < 2.0.0` is taken as written
//! - `>1.2.3` becomes `>=1.2.4`, and `<=2.0.0` becomes `<2.0.1`
//! - `*` has neither bound
//!
//! Comparator lists such as `>=1.0 <2.0` or `>=1.0, <2.0` intersect all of
//! their comparators.
//!
//! # Examples
//!
//! ```
//! use vendor_core::version::Constraint;
//!
//! let host = Constraint::parse(">=1.0").unwrap();
//! let vendored = Constraint::parse("1.5.0 <= v < 2.0.0").unwrap();
//!
//! let merged = host.intersect(&vendored);
//! assert_eq!(merged.to_string(), "1.5.0 <= v < 2.0.0");
//! ```

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

/// A constraint string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version constraint `{constraint}`: {reason}")]
pub struct ConstraintError {
    pub constraint: String,
    pub reason: String,
}

/// A range of acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Constraint {
    /// Inclusive lower bound
    lower: Option<Version>,
    /// Exclusive upper bound
    upper: Option<Version>,
}

impl Constraint {
    /// Any version at all.
    pub fn any() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    /// Exactly `version`.
    pub fn exact(version: Version) -> Self {
        let upper = successor(&version);
        Self {
            lower: Some(version),
            upper: Some(upper),
        }
    }

    /// `lower <= v < upper`.
    pub fn between(lower: Version, upper: Version) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Parse a constraint string.
    ///
    /// Accepts pins, Elm ranges, comparator lists and `*`. A range that
    /// admits no version is rejected.
    pub fn parse(input: &str) -> Result<Self, ConstraintError> {
        let trimmed = input.trim();
        let fail = |reason: String| ConstraintError {
            constraint: input.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(fail("empty constraint".to_string()));
        }

        let constraint = if trimmed == "*" {
            Self::any()
        } else if trimmed.split_whitespace().any(|token| token == "v") {
            parse_elm_range(trimmed).map_err(fail)?
        } else {
            parse_comparators(trimmed).map_err(fail)?
        };

        if constraint.is_empty() {
            return Err(fail("range contains no versions".to_string()));
        }
        Ok(constraint)
    }

    /// Inclusive lower bound, if any.
    pub fn lower(&self) -> Option<&Version> {
        self.lower.as_ref()
    }

    /// Exclusive upper bound, if any.
    pub fn upper(&self) -> Option<&Version> {
        self.upper.as_ref()
    }

    /// The single version this constraint admits, if it is a pin.
    pub fn as_exact(&self) -> Option<&Version> {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) if *upper == successor(lower) => Some(lower),
            _ => None,
        }
    }

    /// Whether no version satisfies this constraint.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => lower >= upper,
            (None, Some(upper)) => *upper == Version::new(0, 0, 0),
            _ => false,
        }
    }

    /// Whether `version` satisfies this constraint.
    pub fn contains(&self, version: &Version) -> bool {
        self.lower.as_ref().is_none_or(|lower| version >= lower)
            && self.upper.as_ref().is_none_or(|upper| version < upper)
    }

    /// The versions admitted by both constraints.
    ///
    /// The result may be empty; check with [`Constraint::is_empty`].
    pub fn intersect(&self, other: &Self) -> Self {
        let lower = match (&self.lower, &other.lower) {
            (Some(a), Some(b)) => Some(a.max(b).clone()),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        let upper = match (&self.upper, &other.upper) {
            (Some(a), Some(b)) => Some(a.min(b).clone()),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        Self { lower, upper }
    }

    /// Concrete versions named by this constraint's bounds.
    ///
    /// That is the lower bound (`0.0.0` when unbounded) and, when the upper
    /// bound is not a `.0` patch release, the greatest version below it. A
    /// pin therefore yields just itself.
    pub fn bound_versions(&self) -> Vec<Version> {
        let mut versions = vec![self.lower.clone().unwrap_or_else(|| Version::new(0, 0, 0))];
        if let Some(greatest) = self.upper.as_ref().and_then(predecessor)
            && !versions.contains(&greatest)
        {
            versions.push(greatest);
        }
        versions
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pin) = self.as_exact() {
            return write!(f, "{pin}");
        }
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => write!(f, "{lower} <= v < {upper}"),
            (Some(lower), None) => write!(f, ">={lower}"),
            (None, Some(upper)) => write!(f, "<{upper}"),
            (None, None) => f.write_str("*"),
        }
    }
}

impl TryFrom<String> for Constraint {
    type Error = ConstraintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Constraint> for String {
    fn from(constraint: Constraint) -> Self {
        constraint.to_string()
    }
}

impl std::str::FromStr for Constraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse `MAJOR.MINOR.PATCH`, accepting `MAJOR.MINOR` as `MAJOR.MINOR.0`.
///
/// Pre-release and build metadata are rejected.
pub fn parse_version(input: &str) -> Result<Version, String> {
    let s = input.trim();
    let version = Version::parse(s)
        .or_else(|_| Version::parse(&format!("{s}.0")))
        .map_err(|e| format!("invalid version `{s}`: {e}"))?;

    if !version.pre.is_empty() || !version.build.is_empty() {
        return Err(format!(
            "pre-release and build metadata are not supported in `{s}`"
        ));
    }
    // Bounds are exclusive above, so every version needs a successor
    if version.patch.checked_add(1).is_none() {
        return Err(format!("patch component of `{s}` is too large"));
    }
    Ok(version)
}

/// The next patch release.
///
/// Parsed versions always have one; other patch numbers saturate.
fn successor(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch.saturating_add(1))
}

fn predecessor(version: &Version) -> Option<Version> {
    version
        .patch
        .checked_sub(1)
        .map(|patch| Version::new(version.major, version.minor, patch))
}

const OPERATORS: [&str; 6] = [">=", "<=", "==", ">", "<", "="];

/// `1.0.0 <= v < 2.0.0`, with `<` or `<=` on either side.
fn parse_elm_range(s: &str) -> Result<Constraint, String> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    let [low, low_op, "v", high_op, high] = tokens.as_slice() else {
        return Err("expected `<low> <= v < <high>`".to_string());
    };

    let low = parse_version(low)?;
    let high = parse_version(high)?;

    let lower = match *low_op {
        "<=" => low,
        "<" => successor(&low),
        other => return Err(format!("unexpected operator `{other}`")),
    };
    let upper = match *high_op {
        "<" => high,
        "<=" => successor(&high),
        other => return Err(format!("unexpected operator `{other}`")),
    };
    Ok(Constraint::between(lower, upper))
}

fn parse_comparators(s: &str) -> Result<Constraint, String> {
    let mut comparators = Vec::new();
    let mut pending: Option<&str> = None;

    // `>= 1.0` is the same comparator as `>=1.0`
    for token in s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match pending.take() {
            Some(op) => comparators.push(format!("{op}{token}")),
            None if OPERATORS.contains(&token) => pending = Some(token),
            None => comparators.push(token.to_string()),
        }
    }
    if let Some(op) = pending {
        return Err(format!("operator `{op}` is missing a version"));
    }

    comparators
        .iter()
        .try_fold(Constraint::any(), |acc, comparator| {
            Ok(acc.intersect(&parse_comparator(comparator)?))
        })
}

fn parse_comparator(s: &str) -> Result<Constraint, String> {
    let (op, rest) = OPERATORS
        .iter()
        .find_map(|op| s.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("==", s));
    let version = parse_version(rest)?;

    Ok(match op {
        ">=" => Constraint {
            lower: Some(version),
            upper: None,
        },
        ">" => Constraint {
            lower: Some(successor(&version)),
            upper: None,
        },
        "<" => Constraint {
            lower: None,
            upper: Some(version),
        },
        "<=" => Constraint {
            lower: None,
            upper: Some(successor(&version)),
        },
        _ => Constraint::exact(version),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    #[rstest]
    #[case("1.0.5", "1.0.5")]
    #[case("==1.0.5", "1.0.5")]
    #[case("1.0", "1.0.0")]
    #[case("1.0.0 <= v < 2.0.0", "1.0.0 <= v < 2.0.0")]
    #[case("1.0.0 < v <= 2.0.0", "1.0.1 <= v < 2.0.1")]
    #[case("1.0.0 <= v <= 1.0.0", "1.0.0")]
    #[case(">=1.0", ">=1.0.0")]
    #[case(">1.2.3", ">=1.2.4")]
    #[case("<2.0", "<2.0.0")]
    #[case(">=1.0 <2.0", "1.0.0 <= v < 2.0.0")]
    #[case(">=1.0, <2.0", "1.0.0 <= v < 2.0.0")]
    #[case(">= 1.5, < 2.0", "1.5.0 <= v < 2.0.0")]
    #[case(">=1.0 >=1.5 <3.0 <2.0", "1.5.0 <= v < 2.0.0")]
    #[case("*", "*")]
    #[case("  1.1.3  ", "1.1.3")]
    fn test_parse_canonical_display(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Constraint::parse(input).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case(">=")]
    #[case("!=1.0.0")]
    #[case("1.0.0-beta")]
    #[case("1.0.0+build")]
    #[case("2.0.0 <= v < 1.0.0")]
    #[case("1.0.0 <= v < 1.0.0")]
    #[case("1.0.0 => v < 2.0.0")]
    #[case("1.0.0 <= v")]
    #[case(">=2.0 <1.0")]
    #[case("<0.0.0")]
    #[case("1.0.18446744073709551615")]
    #[case(">1.0.18446744073709551615")]
    #[case("1.0.0 <= v <= 1.0.18446744073709551615")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(Constraint::parse(input).is_err(), "accepted `{input}`");
    }

    #[test]
    fn test_narrowing() {
        let host = Constraint::parse(">=1.0").unwrap();
        let vendored = Constraint::parse(">=1.5 <2.0").unwrap();
        let merged = host.intersect(&vendored);
        assert_eq!(merged, Constraint::between(v("1.5.0"), v("2.0.0")));
        assert_eq!(merged.to_string(), "1.5.0 <= v < 2.0.0");
    }

    #[test]
    fn test_disjoint_ranges_intersect_to_empty() {
        let a = Constraint::parse(">=1.0 <2.0").unwrap();
        let b = Constraint::parse(">=2.0 <3.0").unwrap();
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_pin_inside_range() {
        let pin = Constraint::parse("1.0.5").unwrap();
        let range = Constraint::parse("1.0.0 <= v < 2.0.0").unwrap();
        let merged = pin.intersect(&range);
        assert_eq!(merged.as_exact(), Some(&v("1.0.5")));
    }

    #[test]
    fn test_contains() {
        let c = Constraint::parse("1.0.0 <= v < 2.0.0").unwrap();
        assert!(c.contains(&v("1.0.0")));
        assert!(c.contains(&v("1.99.99")));
        assert!(!c.contains(&v("2.0.0")));
        assert!(!c.contains(&v("0.9.0")));
    }

    #[test]
    fn test_bound_versions() {
        assert_eq!(
            Constraint::parse("1.0.5").unwrap().bound_versions(),
            vec![v("1.0.5")]
        );
        assert_eq!(
            Constraint::parse("1.0.0 <= v < 2.0.0").unwrap().bound_versions(),
            vec![v("1.0.0")]
        );
        assert_eq!(
            Constraint::parse("<=1.4.2").unwrap().bound_versions(),
            vec![v("0.0.0"), v("1.4.2")]
        );
    }

    #[test]
    fn test_serde_as_string() {
        let c = Constraint::parse(">=1.0 <2.0").unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"1.0.0 <= v < 2.0.0\"");
        let back: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        assert!(serde_json::from_str::<Constraint>("\"nope\"").is_err());
    }

    fn arb_version() -> impl Strategy<Value = Version> {
        (0u64..4, 0u64..4, 0u64..4).prop_map(|(a, b, c)| Version::new(a, b, c))
    }

    fn arb_constraint() -> impl Strategy<Value = Constraint> {
        (
            proptest::option::of(arb_version()),
            proptest::option::of(arb_version()),
        )
            .prop_map(|(lower, upper)| Constraint { lower, upper })
    }

    proptest! {
        #[test]
        fn prop_intersection_is_commutative(a in arb_constraint(), b in arb_constraint()) {
            prop_assert_eq!(a.intersect(&b), b.intersect(&a));
        }

        #[test]
        fn prop_intersection_admits_exactly_common_versions(
            a in arb_constraint(),
            b in arb_constraint(),
            x in arb_version(),
        ) {
            let both = a.intersect(&b);
            prop_assert_eq!(both.contains(&x), a.contains(&x) && b.contains(&x));
        }

        #[test]
        fn prop_display_parses_back(c in arb_constraint()) {
            prop_assume!(!c.is_empty());
            let reparsed = Constraint::parse(&c.to_string()).unwrap();
            prop_assert_eq!(reparsed, c);
        }

        #[test]
        fn prop_bound_versions_satisfy_own_constraint(c in arb_constraint()) {
            prop_assume!(!c.is_empty());
            prop_assert!(c.bound_versions().iter().any(|version| c.contains(version)));
        }
    }
}
