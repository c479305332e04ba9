// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::name::PkgName;
use crate::version::Version;
use crate::version_range::VersionConstraint;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./compiler_test.rs"]
mod compiler_test;

/// A compiler requirement such as `gcc` or `gcc@10:`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CompilerConstraint {
    pub name: PkgName,
    pub versions: VersionConstraint,
}

impl CompilerConstraint {
    pub fn new(name: PkgName, versions: VersionConstraint) -> Self {
        Self { name, versions }
    }

    pub fn is_satisfied_by(&self, compiler: &CompilerSpec) -> bool {
        self.name == compiler.name && self.versions.contains(&compiler.version)
    }

    pub fn intersection(&self, other: &CompilerConstraint) -> Option<CompilerConstraint> {
        if self.name != other.name {
            return None;
        }
        self.versions
            .intersection(&other.versions)
            .map(|versions| CompilerConstraint::new(self.name.clone(), versions))
    }

    pub fn intersects(&self, other: &CompilerConstraint) -> bool {
        self.intersection(other).is_some()
    }

    pub fn satisfies(&self, other: &CompilerConstraint) -> bool {
        self.name == other.name && self.versions.satisfies(&other.versions)
    }

    /// The concrete compiler this constraint pins down, if it is exact.
    pub fn concrete(&self) -> Option<CompilerSpec> {
        self.versions.concrete().map(|version| CompilerSpec {
            name: self.name.clone(),
            version: version.clone(),
        })
    }
}

impl std::fmt::Display for CompilerConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)?;
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        Ok(())
    }
}

impl FromStr for CompilerConstraint {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        use nom::combinator::all_consuming;

        all_consuming(parsing::compiler_constraint::<nom_supreme::error::ErrorTree<_>>)(source)
            .map(|(_, constraint)| constraint)
            .map_err(|err| match err {
                nom::Err::Error(e) | nom::Err::Failure(e) => Error::ParseError {
                    input: source.to_owned(),
                    message: e.to_string(),
                },
                nom::Err::Incomplete(_) => unreachable!(),
            })
    }
}

impl Serialize for CompilerConstraint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CompilerConstraint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// An exact compiler, such as `gcc@10.2.1`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CompilerSpec {
    pub name: PkgName,
    pub version: Version,
}

impl CompilerSpec {
    pub fn new(name: PkgName, version: Version) -> Self {
        Self { name, version }
    }

    /// The constraint that only this compiler satisfies.
    pub fn to_constraint(&self) -> CompilerConstraint {
        CompilerConstraint::new(
            self.name.clone(),
            VersionConstraint::exact(self.version.clone()),
        )
    }
}

impl std::fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for CompilerSpec {
    type Err = Error;

    /// Accepts `gcc@10.2.1` and `gcc@=10.2.1`.
    fn from_str(source: &str) -> Result<Self> {
        let constraint: CompilerConstraint = source.parse()?;
        let version = match constraint.versions.ranges() {
            [crate::version_range::VersionRange::Exact(v)] => v.clone(),
            [
                crate::version_range::VersionRange::Span {
                    lo: Some(lo),
                    hi: Some(hi),
                },
            ] if lo == hi => lo.clone(),
            _ => {
                return Err(Error::String(format!(
                    "compiler must name a single version: {source}"
                )));
            }
        };
        Ok(CompilerSpec::new(constraint.name, version))
    }
}

impl Serialize for CompilerSpec {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CompilerSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

pub mod parsing {
    use nom::IResult;
    use nom::character::complete::char;
    use nom::combinator::{map, opt};
    use nom::error::{ContextError, FromExternalError, ParseError, context};
    use nom::sequence::{pair, preceded};

    use super::CompilerConstraint;
    use crate::name::parsing::pkg_name;
    use crate::version_range::VersionConstraint;
    use crate::version_range::parsing::version_constraint;

    /// Parse a compiler name with an optional `@versions` suffix.
    pub fn compiler_constraint<'a, E>(input: &'a str) -> IResult<&'a str, CompilerConstraint, E>
    where
        E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, crate::Error>,
    {
        context(
            "compiler",
            map(
                pair(pkg_name, opt(preceded(char('@'), version_constraint))),
                |(name, versions)| {
                    CompilerConstraint::new(name, versions.unwrap_or_else(VersionConstraint::any))
                },
            ),
        )(input)
    }
}
