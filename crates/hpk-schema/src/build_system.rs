// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::foundation::variant::VariantValue;
use crate::{ConcreteNode, Error, Result};

#[cfg(test)]
#[path = "./build_system_test.rs"]
mod build_system_test;

/// The capabilities shared by every supported build system.
#[enum_dispatch]
pub trait BuildSystemT {
    /// The name used for this build system in package files.
    fn name(&self) -> &'static str;

    /// The ordered installation phases.
    fn phases(&self) -> &'static [&'static str];

    /// The external tool that drives the build, if any.
    fn build_tool(&self) -> Option<&'static str>;

    /// Arguments for the configure step, derived from the node's variants.
    fn configure_args(&self, node: &ConcreteNode) -> Vec<String>;
}

/// `./configure && make && make install`
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Autotools;

impl BuildSystemT for Autotools {
    fn name(&self) -> &'static str {
        "autotools"
    }

    fn phases(&self) -> &'static [&'static str] {
        &["autoreconf", "configure", "build", "install"]
    }

    fn build_tool(&self) -> Option<&'static str> {
        Some("make")
    }

    fn configure_args(&self, node: &ConcreteNode) -> Vec<String> {
        node.variants()
            .iter()
            .map(|(name, value)| match value {
                VariantValue::Bool(true) => format!("--enable-{name}"),
                VariantValue::Bool(false) => format!("--disable-{name}"),
                VariantValue::Single(v) => format!("--with-{name}={v}"),
                VariantValue::Multi(set) => format!("--with-{name}={}", set.iter().join(",")),
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct CMake;

impl BuildSystemT for CMake {
    fn name(&self) -> &'static str {
        "cmake"
    }

    fn phases(&self) -> &'static [&'static str] {
        &["cmake", "build", "install"]
    }

    fn build_tool(&self) -> Option<&'static str> {
        Some("cmake")
    }

    fn configure_args(&self, node: &ConcreteNode) -> Vec<String> {
        node.variants()
            .iter()
            .map(|(name, value)| {
                let var = name.to_uppercase().replace('-', "_");
                match value {
                    VariantValue::Bool(b) => {
                        format!("-D{var}:BOOL={}", if *b { "ON" } else { "OFF" })
                    }
                    VariantValue::Single(v) => format!("-D{var}:STRING={v}"),
                    VariantValue::Multi(set) => format!("-D{var}:STRING={}", set.iter().join(";")),
                }
            })
            .collect()
    }
}

/// A hand written makefile, no configure step.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Make;

impl BuildSystemT for Make {
    fn name(&self) -> &'static str {
        "make"
    }

    fn phases(&self) -> &'static [&'static str] {
        &["edit", "build", "install"]
    }

    fn build_tool(&self) -> Option<&'static str> {
        Some("make")
    }

    fn configure_args(&self, _node: &ConcreteNode) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Python;

impl BuildSystemT for Python {
    fn name(&self) -> &'static str {
        "python"
    }

    fn phases(&self) -> &'static [&'static str] {
        &["install"]
    }

    fn build_tool(&self) -> Option<&'static str> {
        Some("pip")
    }

    fn configure_args(&self, _node: &ConcreteNode) -> Vec<String> {
        Vec::new()
    }
}

/// A package that installs itself without any external build tool.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Generic;

impl BuildSystemT for Generic {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn phases(&self) -> &'static [&'static str] {
        &["install"]
    }

    fn build_tool(&self) -> Option<&'static str> {
        None
    }

    fn configure_args(&self, _node: &ConcreteNode) -> Vec<String> {
        Vec::new()
    }
}

/// The build system used by a package.
#[enum_dispatch(BuildSystemT)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BuildSystem {
    Autotools(Autotools),
    CMake(CMake),
    Make(Make),
    Python(Python),
    Generic(Generic),
}

impl Default for BuildSystem {
    fn default() -> Self {
        Generic.into()
    }
}

impl std::fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "autotools" => Autotools.into(),
            "cmake" => CMake.into(),
            "make" | "makefile" => Make.into(),
            "python" => Python.into(),
            "generic" => Generic.into(),
            _ => return Err(Error::String(format!("unknown build system: {s:?}"))),
        })
    }
}

impl Serialize for BuildSystem {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for BuildSystem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
