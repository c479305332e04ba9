// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

pub mod parsing;

use std::cmp::Ordering;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::version::Version;
use crate::{Error, Result};


pub const VERSION_RANGE_SEP: &str = ":";
pub const VERSION_LIST_SEP: &str = ",";

/// A contiguous set of versions.
///
/// Bounds are inclusive and use prefix matching, so the range `1.2:1.4`
/// contains `1.4.7` and the degenerate range `1.2` (`1.2:1.2`) contains
/// every version that starts with `1.2`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum VersionRange {
    /// Exactly one version, written `=1.2`.
    Exact(Version),
    Span {
        lo: Option<Version>,
        hi: Option<Version>,
    },
}

impl VersionRange {
    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionRange::Exact(v) => v == version,
            VersionRange::Span { lo, hi } => {
                let above = lo.as_ref().is_none_or(|lo| version >= lo);
                let below = hi
                    .as_ref()
                    .is_none_or(|hi| version <= hi || hi.is_prefix_of(version));
                above && below
            }
        }
    }

    /// The overlap of two ranges, or `None` if they share no versions.
    pub fn intersection(&self, other: &VersionRange) -> Option<VersionRange> {
        match (self, other) {
            (VersionRange::Exact(v), o) | (o, VersionRange::Exact(v)) => {
                o.contains(v).then(|| VersionRange::Exact(v.clone()))
            }
            (
                VersionRange::Span { lo: lo1, hi: hi1 },
                VersionRange::Span { lo: lo2, hi: hi2 },
            ) => {
                let lo = match (lo1, lo2) {
                    (Some(a), Some(b)) => Some(a.max(b).clone()),
                    (a, b) => a.clone().or_else(|| b.clone()),
                };
                let hi = match (hi1, hi2) {
                    (Some(a), Some(b)) => Some(tighter_upper_bound(a, b).clone()),
                    (a, b) => a.clone().or_else(|| b.clone()),
                };
                if let (Some(lo), Some(hi)) = (&lo, &hi) {
                    if lo > hi && !hi.is_prefix_of(lo) {
                        return None;
                    }
                }
                Some(VersionRange::Span { lo, hi })
            }
        }
    }

    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.intersection(other).is_some()
    }

    /// True if every version in this range is also in `other`.
    pub fn is_subset_of(&self, other: &VersionRange) -> bool {
        match (self, other) {
            (VersionRange::Exact(v), o) => o.contains(v),
            (VersionRange::Span { .. }, VersionRange::Exact(_)) => false,
            (
                VersionRange::Span { lo: lo1, hi: hi1 },
                VersionRange::Span { lo: lo2, hi: hi2 },
            ) => {
                let lo_ok = match (lo1, lo2) {
                    (_, None) => true,
                    (None, Some(_)) => false,
                    (Some(a), Some(b)) => a >= b,
                };
                let hi_ok = match (hi1, hi2) {
                    (_, None) => true,
                    (None, Some(_)) => false,
                    (Some(a), Some(b)) => b.is_prefix_of(a) || (a < b && !a.is_prefix_of(b)),
                };
                lo_ok && hi_ok
            }
        }
    }

    /// The single version this range allows, if it allows exactly one.
    pub fn concrete(&self) -> Option<&Version> {
        match self {
            VersionRange::Exact(v) => Some(v),
            VersionRange::Span { .. } => None,
        }
    }

    fn lower_bound(&self) -> Option<&Version> {
        match self {
            VersionRange::Exact(v) => Some(v),
            VersionRange::Span { lo, .. } => lo.as_ref(),
        }
    }
}

/// Of two upper bounds, the one that admits fewer versions.
fn tighter_upper_bound<'a>(a: &'a Version, b: &'a Version) -> &'a Version {
    // `:1` admits 1.9 while `:1.5` does not, so a longer bound that
    // extends the shorter one is the tighter of the two
    if a.is_prefix_of(b) {
        b
    } else if b.is_prefix_of(a) {
        a
    } else {
        a.min(b)
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionRange::Exact(v) => write!(f, "={v}"),
            VersionRange::Span {
                lo: Some(lo),
                hi: Some(hi),
            } if lo == hi => lo.fmt(f),
            VersionRange::Span { lo, hi } => {
                if let Some(lo) = lo {
                    lo.fmt(f)?;
                }
                f.write_str(VERSION_RANGE_SEP)?;
                if let Some(hi) = hi {
                    hi.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}

/// A version requirement, the union of zero or more ranges.
///
/// The empty union is written as nothing at all and
/// allows every version.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct VersionConstraint {
    ranges: Vec<VersionRange>,
}

impl VersionConstraint {
    /// A constraint that allows every version.
    pub fn any() -> Self {
        Self::default()
    }

    /// A constraint that allows only the given version.
    pub fn exact(version: Version) -> Self {
        Self {
            ranges: vec![VersionRange::Exact(version)],
        }
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = VersionRange>) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
        }
    }

    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    pub fn is_any(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.is_any() || self.ranges.iter().any(|r| r.contains(version))
    }

    /// The versions allowed by both constraints, or `None` if there are none.
    pub fn intersection(&self, other: &VersionConstraint) -> Option<VersionConstraint> {
        if self.is_any() {
            return Some(other.clone());
        }
        if other.is_any() {
            return Some(self.clone());
        }
        let ranges: Vec<_> = self
            .ranges
            .iter()
            .cartesian_product(other.ranges.iter())
            .filter_map(|(a, b)| a.intersection(b))
            .unique()
            .collect();
        if ranges.is_empty() {
            None
        } else {
            Some(Self { ranges })
        }
    }

    pub fn intersects(&self, other: &VersionConstraint) -> bool {
        self.intersection(other).is_some()
    }

    /// True if every version allowed here is also allowed by `other`.
    pub fn satisfies(&self, other: &VersionConstraint) -> bool {
        if other.is_any() {
            return true;
        }
        if self.is_any() {
            return false;
        }
        self.ranges
            .iter()
            .all(|r| other.ranges.iter().any(|o| r.is_subset_of(o)))
    }

    /// The single version required by this constraint, if any.
    pub fn concrete(&self) -> Option<&Version> {
        match self.ranges.as_slice() {
            [only] => only.concrete(),
            _ => None,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.concrete().is_some()
    }

    /// True when this constraint names one version, either as `=1.2` or as
    /// the degenerate range `1.2` that also matches `1.2.x`.
    pub fn pins(&self, version: &Version) -> bool {
        match self.ranges.as_slice() {
            [VersionRange::Exact(v)] => v == version,
            [
                VersionRange::Span {
                    lo: Some(lo),
                    hi: Some(hi),
                },
            ] => lo == hi && lo.is_prefix_of(version),
            _ => false,
        }
    }

    /// Order constraints by where they start, unbounded ranges first.
    pub fn cmp_lower_bound(&self, other: &VersionConstraint) -> Ordering {
        fn lo(c: &VersionConstraint) -> Option<Option<&Version>> {
            c.ranges.iter().map(|r| r.lower_bound()).min()
        }
        lo(self).cmp(&lo(other))
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.ranges.iter().join(VERSION_LIST_SEP))
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        parse_version_constraint(source)
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse_version_constraint(&value).map_err(serde::de::Error::custom)
    }
}

/// Parse a version constraint like `1.2:1.4,2.0:` or `=1.2.3`.
pub fn parse_version_constraint<S: AsRef<str>>(source: S) -> Result<VersionConstraint> {
    use nom::combinator::all_consuming;

    let source = source.as_ref();
    if source.is_empty() {
        return Ok(VersionConstraint::any());
    }
    all_consuming(parsing::version_constraint::<nom_supreme::error::ErrorTree<_>>)(source)
        .map(|(_, constraint)| constraint)
        .map_err(|err| match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::ParseError {
                input: source.to_owned(),
                message: e.to_string(),
            },
            nom::Err::Incomplete(_) => unreachable!(),
        })
}
