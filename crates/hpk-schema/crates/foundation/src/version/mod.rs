// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

pub mod parsing;

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./version_test.rs"]
mod version_test;

/// Words that name a development line rather than a release.
///
/// These sort above every numbered release, and later entries
/// in this list sort above earlier ones.
pub const INFINITY_VERSIONS: &[&str] = &["stable", "trunk", "head", "master", "main", "develop"];

/// Characters that separate the parts of a version string.
pub const VERSION_SEPARATORS: &[char] = &['.', '-', '_'];

/// Denotes that an invalid version number was given.
#[derive(Debug, Error)]
#[error("Invalid version: {message}")]
pub struct InvalidVersionError {
    pub message: String,
}

impl InvalidVersionError {
    pub fn new_error(msg: String) -> Error {
        Error::InvalidVersionError(Self { message: msg })
    }
}

/// One numeric or textual component of a version.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum VersionPart {
    Number(u64),
    Word(String),
}

impl VersionPart {
    fn infinity_rank(&self) -> Option<usize> {
        match self {
            VersionPart::Word(w) => INFINITY_VERSIONS.iter().position(|i| i == w),
            VersionPart::Number(_) => None,
        }
    }
}

impl PartialOrd for VersionPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionPart {
    fn cmp(&self, other: &Self) -> Ordering {
        use VersionPart::*;
        match (self.infinity_rank(), other.infinity_rank()) {
            (Some(a), Some(b)) => return a.cmp(&b),
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => {}
        }
        match (self, other) {
            (Number(a), Number(b)) => a.cmp(b),
            (Word(a), Word(b)) => a.cmp(b),
            (Number(_), Word(_)) => Ordering::Greater,
            (Word(_), Number(_)) => Ordering::Less,
        }
    }
}

impl std::fmt::Display for VersionPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionPart::Number(n) => n.fmt(f),
            VersionPart::Word(w) => f.write_str(w),
        }
    }
}

/// A single, exact package version, eg `1.2.3` or `2.0rc1`.
///
/// Comparison happens part by part. When one version is a prefix of
/// the other, the shorter one sorts lower, so `1.0 < 1.0.0`.
#[derive(Clone, Debug)]
pub struct Version {
    parts: Vec<VersionPart>,
    text: String,
}

impl Version {
    pub fn parts(&self) -> &[VersionPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// True if this version names a development line like `develop`.
    pub fn is_develop(&self) -> bool {
        self.parts.iter().any(|p| p.infinity_rank().is_some())
    }

    /// True if every part of this version begins `other`.
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        other.parts.starts_with(&self.parts)
    }

    /// A new version made of at most the first `n` parts of this one.
    pub fn up_to(&self, n: usize) -> Version {
        let parts: Vec<_> = self.parts.iter().take(n).cloned().collect();
        let text = parts.iter().map(ToString::to_string).collect::<Vec<_>>().join(".");
        Version { parts, text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        parse_version(source)
    }
}

impl TryFrom<&str> for Version {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        parse_version(value)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VersionVisitor;

        impl serde::de::Visitor<'_> for VersionVisitor {
            type Value = Version;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a version number (eg: 1.0.0, 2.4rc1, develop)")
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                parse_version(value).map_err(serde::de::Error::custom)
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }

            fn visit_f64<E>(self, value: f64) -> std::result::Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                // yaml will read `1.0` as a float, which does not preserve
                // trailing zeros but is common enough to accept
                self.visit_str(&value.to_string())
            }
        }
        deserializer.deserialize_any(VersionVisitor)
    }
}

/// Parse a string as a version specifier.
pub fn parse_version<S: AsRef<str>>(version: S) -> Result<Version> {
    let text = version.as_ref();
    if text.is_empty() {
        return Err(InvalidVersionError::new_error(
            "version cannot be empty".to_owned(),
        ));
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut previous_was_sep = true;
    for c in text.chars() {
        if VERSION_SEPARATORS.contains(&c) {
            if previous_was_sep {
                return Err(InvalidVersionError::new_error(format!(
                    "empty component in version: {text}"
                )));
            }
            parts.push(make_part(std::mem::take(&mut current), text)?);
            previous_was_sep = true;
            continue;
        }
        if !c.is_ascii_alphanumeric() {
            return Err(InvalidVersionError::new_error(format!(
                "invalid character '{c}' in version: {text}"
            )));
        }
        // a change between digits and letters starts a new part, so
        // that `2.0rc1` compares as [2, 0, rc, 1]
        if let Some(last) = current.chars().last() {
            if last.is_ascii_digit() != c.is_ascii_digit() {
                parts.push(make_part(std::mem::take(&mut current), text)?);
            }
        }
        current.push(c);
        previous_was_sep = false;
    }
    if previous_was_sep {
        return Err(InvalidVersionError::new_error(format!(
            "version cannot end with a separator: {text}"
        )));
    }
    parts.push(make_part(current, text)?);
    Ok(Version {
        parts,
        text: text.to_owned(),
    })
}

fn make_part(part: String, text: &str) -> Result<VersionPart> {
    if part.chars().all(|c| c.is_ascii_digit()) {
        part.parse::<u64>().map(VersionPart::Number).map_err(|err| {
            InvalidVersionError::new_error(format!("invalid number in version {text}: {err}"))
        })
    } else {
        Ok(VersionPart::Word(part))
    }
}
