// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

pub mod parsing;

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Error, Result};


/// Parse a package name from a string.
///
/// This will panic if the name is invalid,
/// and should only be used for testing.
///
/// ```
/// # #[macro_use] extern crate hpk_schema_foundation;
/// # fn main() {
/// pkg_name!("quantum-espresso");
/// # }
/// ```
#[macro_export]
macro_rules! pkg_name {
    ($name:literal) => {
        $crate::name::PkgName::new($name).unwrap()
    };
}

/// Parse a variant name from a string.
///
/// This will panic if the name is invalid,
/// and should only be used for testing.
#[macro_export]
macro_rules! variant_name {
    ($name:literal) => {
        $crate::name::VariantName::new($name).unwrap()
    };
}

/// Words that are parsed as architecture keys and so cannot name a variant.
pub const RESERVED_VARIANT_NAMES: &[&str] = &["arch", "platform", "os", "target"];

/// Denotes that an invalid name was given.
#[derive(Debug, Error)]
#[error("Invalid name: {message}")]
pub struct InvalidNameError {
    pub message: String,
}

impl InvalidNameError {
    pub fn new_error(msg: String) -> Error {
        Error::InvalidNameError(Self { message: msg })
    }
}

macro_rules! validated_name {
    ($type_name:ident, $validate:ident, $what:literal) => {
        #[doc = concat!("A validated ", $what, " name")]
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $type_name(String);

        impl $type_name {
            pub fn new<S: Into<String>>(name: S) -> Result<Self> {
                let name = name.into();
                $validate(&name)?;
                Ok(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $type_name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<str> for $type_name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $type_name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $type_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $type_name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $type_name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$type_name> for String {
            fn from(value: $type_name) -> String {
                value.0
            }
        }

        impl PartialEq<str> for $type_name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $type_name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

validated_name!(PkgName, validate_pkg_name, "package");
validated_name!(VariantName, validate_variant_name, "variant");

/// Ensure that the provided string is a valid package name.
///
/// Package names are made of lowercase ascii letters, digits,
/// dashes and underscores and must start with a letter or digit.
pub fn validate_pkg_name<S: AsRef<str>>(name: S) -> Result<()> {
    let name = name.as_ref();
    let Some(first) = name.chars().next() else {
        return Err(InvalidNameError::new_error(
            "package name cannot be empty".to_owned(),
        ));
    };
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return Err(InvalidNameError::new_error(format!(
            "package name must start with a lowercase letter or digit: {name}"
        )));
    }
    if let Some(index) = name.find(|c: char| !is_pkg_name_char(c)) {
        return Err(InvalidNameError::new_error(format!(
            "invalid package name character at position {index}: {name}"
        )));
    }
    Ok(())
}

/// Ensure that the provided string is a valid variant name.
pub fn validate_variant_name<S: AsRef<str>>(name: S) -> Result<()> {
    let name = name.as_ref();
    let Some(first) = name.chars().next() else {
        return Err(InvalidNameError::new_error(
            "variant name cannot be empty".to_owned(),
        ));
    };
    if !first.is_ascii_alphabetic() {
        return Err(InvalidNameError::new_error(format!(
            "variant name must start with a letter: {name}"
        )));
    }
    if let Some(index) = name.find(|c: char| !is_variant_name_char(c)) {
        return Err(InvalidNameError::new_error(format!(
            "invalid variant name character at position {index}: {name}"
        )));
    }
    if RESERVED_VARIANT_NAMES.contains(&name) {
        return Err(InvalidNameError::new_error(format!(
            "'{name}' is reserved for architecture constraints"
        )));
    }
    Ok(())
}

pub(crate) fn is_pkg_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

pub(crate) fn is_variant_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
