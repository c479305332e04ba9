// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::foundation::arch::{Arch, ArchConstraint};
use crate::foundation::compiler::{CompilerConstraint, CompilerSpec};
use crate::foundation::variant::{VariantMap, VariantValue};
use crate::foundation::version::Version;
use crate::foundation::version_range::VersionConstraint;
use crate::{Error, PkgName, Result};

#[cfg(test)]
#[path = "./spec_test.rs"]
mod spec_test;

/// The attributes of a single node whose every choice has been made.
pub trait NodeAttrs {
    fn node_name(&self) -> &PkgName;
    fn node_version(&self) -> &Version;
    fn node_variants(&self) -> &VariantMap;
    fn node_compiler(&self) -> &CompilerSpec;
    fn node_arch(&self) -> &Arch;
}

/// The constraints placed on a single package in a spec.
///
/// Every field may be left open. A node without a name is anonymous and
/// is used for conditions like `+mpi` or `@2:`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct NodeSpec {
    pub name: Option<PkgName>,
    pub versions: VersionConstraint,
    pub variants: VariantMap,
    pub compiler: Option<CompilerConstraint>,
    pub arch: ArchConstraint,
}

impl NodeSpec {
    pub fn named(name: PkgName) -> Self {
        Self {
            name: Some(name),
            ..Default::default()
        }
    }

    /// True if nothing beyond the name is constrained.
    pub fn is_unconstrained(&self) -> bool {
        self.versions.is_any()
            && self.variants.is_empty()
            && self.compiler.is_none()
            && self.arch.is_empty()
    }

    /// True if some concrete node could satisfy both constraints.
    pub fn intersects(&self, other: &NodeSpec) -> bool {
        let mut merged = self.clone();
        merged.constrain(other).is_ok()
    }

    /// Narrow these constraints by `other`, failing if they cannot both hold.
    ///
    /// Valued variants given as lists on either side are merged as
    /// multi-valued, all others must agree exactly.
    pub fn constrain(&mut self, other: &NodeSpec) -> Result<()> {
        match (&self.name, &other.name) {
            (Some(a), Some(b)) if a != b => {
                return Err(Error::String(format!(
                    "cannot constrain {a} with {b}: names differ"
                )));
            }
            (None, Some(b)) => self.name = Some(b.clone()),
            _ => {}
        }
        self.versions = self
            .versions
            .intersection(&other.versions)
            .ok_or_else(|| {
                Error::String(format!(
                    "versions '{}' and '{}' do not intersect",
                    self.versions, other.versions
                ))
            })?;
        for (name, value) in other.variants.iter() {
            let merged = match self.variants.get(name) {
                None => value.clone(),
                Some(existing) => {
                    let multi = matches!(existing, VariantValue::Multi(_))
                        || matches!(value, VariantValue::Multi(_));
                    existing.merge(value, multi).ok_or_else(|| {
                        Error::String(format!(
                            "variant '{name}' cannot be both {} and {}",
                            crate::foundation::variant::format_assignment(name, existing),
                            crate::foundation::variant::format_assignment(name, value),
                        ))
                    })?
                }
            };
            self.variants.insert(name.clone(), merged);
        }
        self.compiler = match (&self.compiler, &other.compiler) {
            (Some(a), Some(b)) => Some(a.intersection(b).ok_or_else(|| {
                Error::String(format!("compilers '{a}' and '{b}' do not intersect"))
            })?),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        self.arch = self.arch.merge(&other.arch).ok_or_else(|| {
            Error::String(format!(
                "architectures '{}' and '{}' do not intersect",
                self.arch, other.arch
            ))
        })?;
        Ok(())
    }

    /// True if every node satisfying this spec also satisfies `other`.
    pub fn satisfies(&self, other: &NodeSpec) -> bool {
        if let Some(name) = &other.name {
            if self.name.as_ref() != Some(name) {
                return false;
            }
        }
        if !self.versions.satisfies(&other.versions) {
            return false;
        }
        let variants_ok = other.variants.iter().all(|(name, wanted)| {
            self.variants
                .get(name)
                .is_some_and(|have| wanted.is_satisfied_by(have))
        });
        if !variants_ok {
            return false;
        }
        let compiler_ok = match (&self.compiler, &other.compiler) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a.satisfies(b),
        };
        let arch_ok = [
            (&self.arch.platform, &other.arch.platform),
            (&self.arch.os, &other.arch.os),
            (&self.arch.target, &other.arch.target),
        ]
        .into_iter()
        .all(|(have, want)| want.is_none() || have == want);
        compiler_ok && arch_ok
    }

    /// True if the given node meets every constraint here.
    ///
    /// Variants that the node does not have never satisfy a constraint.
    pub fn is_satisfied_by<N: NodeAttrs + ?Sized>(&self, node: &N) -> bool {
        self.name.as_ref().is_none_or(|n| n == node.node_name())
            && self.versions.contains(node.node_version())
            && self.variants.iter().all(|(name, wanted)| {
                node.node_variants()
                    .get(name)
                    .is_some_and(|have| wanted.is_satisfied_by(have))
            })
            && self
                .compiler
                .as_ref()
                .is_none_or(|c| c.is_satisfied_by(node.node_compiler()))
            && self.arch.is_satisfied_by(node.node_arch())
    }

    /// The name and version part only, eg `fftw@:1.0`.
    pub fn format_versions(&self) -> String {
        let mut out = self.name.as_ref().map(ToString::to_string).unwrap_or_default();
        if !self.versions.is_any() {
            out.push('@');
            out.push_str(&self.versions.to_string());
        }
        out
    }
}

impl std::fmt::Display for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = self.format_versions();
        out.push_str(&self.variants.to_string());
        if let Some(compiler) = &self.compiler {
            out.push_str(" %");
            out.push_str(&compiler.to_string());
        }
        if !self.arch.is_empty() {
            out.push(' ');
            out.push_str(&self.arch.to_string());
        }
        f.write_str(out.trim_start())
    }
}

/// An abstract, possibly under-constrained request for a package and
/// some of its dependencies, eg `quantum-espresso+invino ^fftw~mpi`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Spec {
    root: NodeSpec,
    dependencies: Vec<NodeSpec>,
}

impl Spec {
    pub fn new(root: NodeSpec) -> Self {
        Self {
            root,
            dependencies: Vec::new(),
        }
    }

    /// Parse a spec string.
    pub fn parse<S: AsRef<str>>(source: S) -> Result<Self> {
        crate::parsing::parse_spec(source)
    }

    pub fn root(&self) -> &NodeSpec {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut NodeSpec {
        &mut self.root
    }

    pub fn name(&self) -> Option<&PkgName> {
        self.root.name.as_ref()
    }

    /// The named `^dependency` constraints, in the order given.
    pub fn dependencies(&self) -> &[NodeSpec] {
        &self.dependencies
    }

    pub fn dependency(&self, name: &str) -> Option<&NodeSpec> {
        self.dependencies
            .iter()
            .find(|d| d.name.as_ref().is_some_and(|n| n == name))
    }

    /// The root followed by every dependency constraint.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        std::iter::once(&self.root).chain(self.dependencies.iter())
    }

    /// Add a `^dependency` constraint, merging it with any
    /// existing constraint for the same package.
    pub fn add_dependency(&mut self, dependency: NodeSpec) -> Result<()> {
        let Some(name) = dependency.name.clone() else {
            return Err(Error::InvalidSpec {
                spec: dependency.to_string(),
                message: "dependencies must be named".to_owned(),
            });
        };
        match self
            .dependencies
            .iter_mut()
            .find(|d| d.name.as_ref() == Some(&name))
        {
            Some(existing) => existing.constrain(&dependency),
            None => {
                self.dependencies.push(dependency);
                Ok(())
            }
        }
    }

    /// Narrow this spec by all constraints in `other`.
    pub fn constrain(&mut self, other: &Spec) -> Result<()> {
        self.root.constrain(&other.root)?;
        for dep in other.dependencies.iter() {
            self.add_dependency(dep.clone())?;
        }
        Ok(())
    }

    pub fn intersects(&self, other: &Spec) -> bool {
        let mut merged = self.clone();
        merged.constrain(other).is_ok()
    }

    /// True if every concrete spec satisfying this one also satisfies `other`.
    pub fn satisfies(&self, other: &Spec) -> bool {
        self.root.satisfies(&other.root)
            && other.dependencies.iter().all(|wanted| {
                wanted
                    .name
                    .as_ref()
                    .and_then(|name| self.dependency(name))
                    .is_some_and(|have| have.satisfies(wanted))
            })
    }

    /// True if this spec has no name and no `^dependencies`, like `+mpi`.
    pub fn is_anonymous(&self) -> bool {
        self.root.name.is_none()
    }
}

impl From<NodeSpec> for Spec {
    fn from(root: NodeSpec) -> Self {
        Spec::new(root)
    }
}

impl std::fmt::Display for Spec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.root.fmt(f)?;
        for dep in self.dependencies.iter() {
            write!(f, " ^{dep}")?;
        }
        Ok(())
    }
}

impl FromStr for Spec {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        Spec::parse(source)
    }
}

impl Serialize for Spec {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Spec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Spec::parse(value).map_err(serde::de::Error::custom)
    }
}
