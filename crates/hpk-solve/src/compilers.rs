// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::cmp::Reverse;

use hpk_config::{ALL_PACKAGES, CompilerEntry, Config};
use hpk_schema::foundation::arch::Arch;
use hpk_schema::foundation::compiler::{CompilerConstraint, CompilerSpec};
use hpk_schema::{ConcreteSpec, PkgName, Spec};
use itertools::Itertools;

use crate::{Error, Result, UnavailableCompilerVersionError};

#[cfg(test)]
#[path = "./compilers_test.rs"]
mod compilers_test;

/// A compiler that the solver knows of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownCompiler {
    pub spec: CompilerSpec,
    pub operating_system: Option<String>,
    pub target: Option<String>,
    /// False for compilers that are only known from installed specs,
    /// which can be reused but not used for new builds.
    pub available: bool,
    /// The configuration that this compiler came from, if any.
    pub entry: Option<CompilerEntry>,
}

impl KnownCompiler {
    /// True if this compiler can produce code for the given architecture.
    pub fn supports(&self, arch: &Arch) -> bool {
        self.operating_system.as_ref().is_none_or(|os| os == &arch.os)
            && self.target.as_ref().is_none_or(|t| t == &arch.target)
    }
}

impl std::fmt::Display for KnownCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.spec.fmt(f)?;
        if !self.available {
            f.write_str(" [unavailable]")?;
        }
        Ok(())
    }
}

/// The registry of compilers for one concretization.
#[derive(Clone, Debug)]
pub struct CompilerParser {
    compilers: Vec<KnownCompiler>,
    preferences: Vec<CompilerConstraint>,
    bootstrap: bool,
}

impl CompilerParser {
    /// Load the configured compilers.
    pub fn new(config: &Config) -> Result<Self> {
        let mut compilers = Vec::with_capacity(config.compilers.len());
        for entry in config.compilers.iter() {
            let spec = entry
                .spec
                .parse::<CompilerSpec>()
                .map_err(|source| Error::InvalidCompilerEntry {
                    spec: entry.spec.clone(),
                    source,
                })?;
            let part = |value: &str| (!value.is_empty()).then(|| value.to_owned());
            compilers.push(KnownCompiler {
                spec,
                operating_system: part(&entry.operating_system),
                target: part(&entry.target),
                available: true,
                entry: Some(entry.clone()),
            });
        }
        Ok(Self {
            compilers,
            preferences: parse_preferences(config.compiler_preferences(ALL_PACKAGES)),
            bootstrap: config.concretizer.bootstrap_compilers,
        })
    }

    /// Every known compiler, best first.
    ///
    /// Available compilers come before those only known from installed
    /// specs. Then the configured preference decides, then the order in
    /// which compiler names were first configured, then newer versions
    /// before older ones.
    pub fn possible_compilers(&self) -> impl Iterator<Item = &KnownCompiler> {
        let names: Vec<&PkgName> = self.compilers.iter().map(|c| &c.spec.name).unique().collect();
        self.compilers.iter().sorted_by_cached_key(|compiler| {
            (
                !compiler.available,
                rank(&self.preferences, &compiler.spec),
                names.iter().position(|n| *n == &compiler.spec.name),
                Reverse(compiler.spec.version.clone()),
            )
        })
    }

    /// Check that every compiler pinned by the given specs is known,
    /// whether on the root or on any of its dependencies.
    ///
    /// When bootstrapping is allowed, exact pins of unknown compilers
    /// are added so that they can be built first.
    pub fn with_input_specs(&mut self, specs: &[Spec]) -> Result<()> {
        for node in specs.iter().flat_map(Spec::nodes) {
            let Some(constraint) = &node.compiler else {
                continue;
            };
            let known = self.compilers.iter().any(|c| {
                constraint.is_satisfied_by(&c.spec)
                    && node.arch.os.as_ref().is_none_or(|os| c.operating_system.as_ref().is_none_or(|o| o == os))
                    && node.arch.target.as_ref().is_none_or(|t| c.target.as_ref().is_none_or(|ct| ct == t))
            });
            if known {
                continue;
            }
            match constraint.concrete() {
                Some(spec) if self.bootstrap => {
                    tracing::debug!(%spec, "compiler will be bootstrapped");
                    self.compilers.push(KnownCompiler {
                        spec,
                        operating_system: node.arch.os.clone(),
                        target: node.arch.target.clone(),
                        available: true,
                        entry: None,
                    });
                }
                _ => {
                    return Err(UnavailableCompilerVersionError {
                        spec: constraint.clone(),
                        operating_system: node.arch.os.clone(),
                        target: node.arch.target.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Learn the compilers used by an installed spec.
    pub fn add_compiler_from_concrete_spec(&mut self, spec: &ConcreteSpec) {
        for node in spec.traverse() {
            let arch = node.arch();
            let known = self
                .compilers
                .iter()
                .any(|c| &c.spec == node.compiler() && c.supports(arch));
            if known {
                continue;
            }
            tracing::trace!(compiler = %node.compiler(), from = %node.format_node(), "compiler known from installed spec");
            self.compilers.push(KnownCompiler {
                spec: node.compiler().clone(),
                operating_system: Some(arch.os.clone()),
                target: Some(arch.target.clone()),
                available: false,
                entry: None,
            });
        }
    }

    /// The compilers that may build a node for `arch`, best first.
    ///
    /// The compiler of the node's parent is tried first, then the
    /// package's own preferences, then the overall order.
    pub fn compilers_for(
        &self,
        arch: &Arch,
        constraint: Option<&CompilerConstraint>,
        package_preferences: &[String],
        parent: Option<&CompilerSpec>,
    ) -> Vec<CompilerSpec> {
        let preferences = parse_preferences(package_preferences);
        self.possible_compilers()
            .filter(|c| c.available && c.supports(arch))
            .filter(|c| constraint.is_none_or(|wanted| wanted.is_satisfied_by(&c.spec)))
            .map(|c| &c.spec)
            .unique()
            .enumerate()
            .sorted_by_key(|(index, spec)| {
                (
                    Some(*spec) != parent,
                    rank(&preferences, spec),
                    *index,
                )
            })
            .map(|(_, spec)| spec.clone())
            .collect()
    }

    /// Every known compiler, as exact specs, best first.
    pub fn all_specs(&self) -> Vec<CompilerSpec> {
        self.possible_compilers()
            .map(|c| c.spec.clone())
            .unique()
            .collect()
    }
}

fn parse_preferences(values: &[String]) -> Vec<CompilerConstraint> {
    values
        .iter()
        .filter_map(|value| match value.parse::<CompilerConstraint>() {
            Ok(constraint) => Some(constraint),
            Err(err) => {
                tracing::warn!("ignoring compiler preference '{value}': {err}");
                None
            }
        })
        .collect()
}

fn rank(preferences: &[CompilerConstraint], spec: &CompilerSpec) -> usize {
    preferences
        .iter()
        .position(|p| p.is_satisfied_by(spec))
        .unwrap_or(usize::MAX)
}
