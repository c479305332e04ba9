// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Error, Result};

/// Denotes that an invalid architecture was given.
#[derive(Debug, Error)]
#[error("Invalid architecture: {message}")]
pub struct InvalidArchError {
    pub message: String,
}

impl InvalidArchError {
    pub fn new_error(msg: String) -> Error {
        Error::InvalidArchError(Self { message: msg })
    }
}

pub(crate) fn is_arch_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

/// A fully specified platform, operating system and target triple.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Arch {
    pub platform: String,
    pub os: String,
    pub target: String,
}

impl Arch {
    pub fn new(
        platform: impl Into<String>,
        os: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            os: os.into(),
            target: target.into(),
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.platform, self.os, self.target)
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        let constraint = ArchConstraint::from_triple(source)?;
        match constraint {
            ArchConstraint {
                platform: Some(platform),
                os: Some(os),
                target: Some(target),
            } => Ok(Arch {
                platform,
                os,
                target,
            }),
            _ => Err(InvalidArchError::new_error(format!(
                "expected platform-os-target, got: {source}"
            ))),
        }
    }
}

impl Serialize for Arch {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Arch {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A possibly partial architecture requirement.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ArchConstraint {
    pub platform: Option<String>,
    pub os: Option<String>,
    pub target: Option<String>,
}

impl ArchConstraint {
    /// Parse the value of `arch=`, either `platform` alone or
    /// `platform-os-target`.
    pub fn from_triple(source: &str) -> Result<Self> {
        if source.is_empty() || !source.chars().all(is_arch_char) {
            return Err(InvalidArchError::new_error(format!(
                "invalid architecture string: {source:?}"
            )));
        }
        let Some((platform, rest)) = source.split_once('-') else {
            return Ok(Self {
                platform: Some(source.to_owned()),
                ..Default::default()
            });
        };
        let Some((os, target)) = rest.rsplit_once('-') else {
            return Err(InvalidArchError::new_error(format!(
                "expected platform-os-target, got: {source}"
            )));
        };
        let part = |s: &str| (!s.is_empty() && s != "None").then(|| s.to_owned());
        Ok(Self {
            platform: part(platform),
            os: part(os),
            target: part(target),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.os.is_none() && self.target.is_none()
    }

    pub fn is_satisfied_by(&self, arch: &Arch) -> bool {
        self.platform.as_ref().is_none_or(|p| p == &arch.platform)
            && self.os.as_ref().is_none_or(|o| o == &arch.os)
            && self.target.as_ref().is_none_or(|t| t == &arch.target)
    }

    /// Combine two constraints, or `None` if any part disagrees.
    pub fn merge(&self, other: &ArchConstraint) -> Option<ArchConstraint> {
        fn part(a: &Option<String>, b: &Option<String>) -> Option<Option<String>> {
            match (a, b) {
                (Some(a), Some(b)) if a != b => None,
                (a, b) => Some(a.clone().or_else(|| b.clone())),
            }
        }
        Some(ArchConstraint {
            platform: part(&self.platform, &other.platform)?,
            os: part(&self.os, &other.os)?,
            target: part(&self.target, &other.target)?,
        })
    }

    pub fn intersects(&self, other: &ArchConstraint) -> bool {
        self.merge(other).is_some()
    }

    /// Fill in the missing parts of this constraint from `default`.
    pub fn complete(&self, default: &Arch) -> Arch {
        Arch {
            platform: self.platform.clone().unwrap_or_else(|| default.platform.clone()),
            os: self.os.clone().unwrap_or_else(|| default.os.clone()),
            target: self.target.clone().unwrap_or_else(|| default.target.clone()),
        }
    }
}

impl From<&Arch> for ArchConstraint {
    fn from(arch: &Arch) -> Self {
        Self {
            platform: Some(arch.platform.clone()),
            os: Some(arch.os.clone()),
            target: Some(arch.target.clone()),
        }
    }
}

impl std::fmt::Display for ArchConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(p), Some(o), Some(t)) = (&self.platform, &self.os, &self.target) {
            return write!(f, "arch={p}-{o}-{t}");
        }
        let mut first = true;
        for (key, value) in [
            ("platform", &self.platform),
            ("os", &self.os),
            ("target", &self.target),
        ] {
            if let Some(value) = value {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{key}={value}")?;
                first = false;
            }
        }
        Ok(())
    }
}
