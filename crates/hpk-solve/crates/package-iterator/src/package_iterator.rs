// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::path::PathBuf;

use hpk_schema::foundation::arch::Arch;
use hpk_schema::foundation::compiler::CompilerSpec;
use hpk_schema::foundation::variant::{VariantMap, VariantValue};
use hpk_schema::foundation::version::Version;
use hpk_schema::{ConcreteSpec, NodeAttrs, NodeSpec, PkgName, VariantName};
use itertools::Itertools;

use crate::{ExternalFact, PackageFacts};

#[cfg(test)]
#[path = "./package_iterator_test.rs"]
mod package_iterator_test;

/// Log target for the candidate ordering of each package.
pub const BUILD_SORT_TARGET: &str = "build_sort";

/// The attributes chosen for one node, without saying where it comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildCandidate {
    pub name: PkgName,
    pub version: Version,
    pub variants: VariantMap,
    pub compiler: CompilerSpec,
    pub arch: Arch,
}

impl NodeAttrs for BuildCandidate {
    fn node_name(&self) -> &PkgName {
        &self.name
    }

    fn node_version(&self) -> &Version {
        &self.version
    }

    fn node_variants(&self) -> &VariantMap {
        &self.variants
    }

    fn node_compiler(&self) -> &CompilerSpec {
        &self.compiler
    }

    fn node_arch(&self) -> &Arch {
        &self.arch
    }
}

impl std::fmt::Display for BuildCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}{} %{} arch={}",
            self.name, self.version, self.variants, self.compiler, self.arch
        )
    }
}

/// One way to satisfy a package.
#[derive(Clone, Debug)]
pub enum Candidate {
    /// An installed spec, reused along with its dependencies.
    Reuse(ConcreteSpec),
    External {
        node: BuildCandidate,
        prefix: PathBuf,
    },
    Build(BuildCandidate),
}

impl Candidate {
    pub fn is_build(&self) -> bool {
        matches!(self, Candidate::Build(_))
    }

    /// The attributes of the node this candidate would resolve to.
    pub fn attrs(&self) -> &dyn NodeAttrs {
        match self {
            Candidate::Reuse(spec) => &**spec,
            Candidate::External { node, .. } | Candidate::Build(node) => node,
        }
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Candidate::Reuse(spec) => write!(f, "{} [installed]", spec.format_node()),
            Candidate::External { node, prefix } => {
                write!(f, "{node} [external {}]", prefix.display())
            }
            Candidate::Build(node) => node.fmt(f),
        }
    }
}

/// Order the versions of a package that satisfy `requirement`, best first.
///
/// Configured preferences come first, then versions the package marks
/// as preferred, then the rest from newest to oldest. Deprecated
/// versions are left out unless allowed or pinned by the requirement.
pub fn ordered_versions(
    facts: &PackageFacts,
    requirement: &NodeSpec,
    allow_deprecated: bool,
) -> Vec<Version> {
    let preference = |version: &Version| {
        facts
            .version_preferences
            .iter()
            .position(|c| c.contains(version))
            .unwrap_or(usize::MAX)
    };
    facts
        .package
        .versions
        .iter()
        .filter(|def| requirement.versions.contains(&def.version))
        .filter(|def| {
            !def.deprecated || allow_deprecated || requirement.versions.pins(&def.version)
        })
        .sorted_by_cached_key(|def| {
            (
                preference(&def.version),
                !def.preferred,
                def.deprecated,
                Reverse(def.version.clone()),
            )
        })
        .map(|def| def.version.clone())
        .collect()
}

/// Turn the configured externals that satisfy `requirement` into candidates,
/// in configuration order.
///
/// Variants that an external does not mention take their defaults, and
/// it is assumed to be built by the first of `compilers` unless it says
/// otherwise.
pub fn external_candidates(
    facts: &PackageFacts,
    requirement: &NodeSpec,
    compilers: &[CompilerSpec],
    arch: &Arch,
) -> Vec<Candidate> {
    facts
        .externals
        .iter()
        .filter_map(|external| {
            let node = external_node(facts, external, compilers, arch)?;
            requirement.is_satisfied_by(&node).then(|| Candidate::External {
                node,
                prefix: external.prefix.clone(),
            })
        })
        .collect()
}

fn external_node(
    facts: &PackageFacts,
    external: &ExternalFact,
    compilers: &[CompilerSpec],
    arch: &Arch,
) -> Option<BuildCandidate> {
    let compiler = match external.spec.compiler.as_ref() {
        Some(constraint) => constraint.concrete()?,
        None => compilers.first()?.clone(),
    };
    let mut variants = external.spec.variants.clone();
    for def in facts.package.variants.iter().filter(|d| d.when.is_none()) {
        variants
            .entry(def.name.clone())
            .or_insert_with(|| def.default_value());
    }
    Some(BuildCandidate {
        name: facts.package.name.clone(),
        version: external.version.clone(),
        variants,
        compiler,
        arch: external.spec.arch.complete(arch),
    })
}

/// One variant of a package and the values to try for it, best first.
#[derive(Clone, Debug)]
struct VariantAxis {
    name: VariantName,
    values: Vec<VariantValue>,
    when: Option<NodeSpec>,
}

/// Lazily walks every combination of version, variant values and
/// compiler for building a package from source.
///
/// Combinations are produced in preference order: the version changes
/// least often and the compiler most often.
#[derive(Clone, Debug)]
pub struct BuildIterator {
    name: PkgName,
    versions: Vec<Version>,
    axes: Vec<VariantAxis>,
    compilers: Vec<CompilerSpec>,
    arch: Arch,
    // one position per axis: version, each variant, then compiler
    position: Vec<usize>,
    exhausted: bool,
}

impl BuildIterator {
    pub fn new(
        facts: &PackageFacts,
        requirement: &NodeSpec,
        versions: Vec<Version>,
        compilers: Vec<CompilerSpec>,
        arch: Arch,
    ) -> Self {
        let axes = facts
            .package
            .variants
            .iter()
            .map(|def| {
                let values = match requirement.variants.get(&def.name) {
                    Some(requested) => vec![requested.clone()],
                    None => facts
                        .variant_preferences
                        .get(&def.name)
                        .cloned()
                        .into_iter()
                        .chain(def.candidates())
                        .unique()
                        .collect(),
                };
                VariantAxis {
                    name: def.name.clone(),
                    values,
                    when: def.when.as_ref().map(|w| w.root().clone()),
                }
            })
            .collect_vec();
        let exhausted = versions.is_empty() || compilers.is_empty();
        tracing::debug!(
            target: BUILD_SORT_TARGET,
            "{}: versions [{}], compilers [{}]",
            facts.package.name,
            versions.iter().join(", "),
            compilers.iter().join(", ")
        );
        Self {
            name: facts.package.name.clone(),
            position: vec![0; axes.len() + 2],
            versions,
            axes,
            compilers,
            arch,
            exhausted,
        }
    }

    /// Move to the next combination, returning false once all are visited.
    fn advance(&mut self) -> bool {
        let sizes = std::iter::once(self.versions.len())
            .chain(self.axes.iter().map(|a| a.values.len()))
            .chain(std::iter::once(self.compilers.len()))
            .collect_vec();
        for (index, size) in sizes.iter().enumerate().rev() {
            self.position[index] += 1;
            if self.position[index] < *size {
                return true;
            }
            self.position[index] = 0;
        }
        false
    }

    /// The candidate at the current position, or `None` if the
    /// position selects a value for a variant that does not apply.
    fn current(&self) -> Option<BuildCandidate> {
        let compiler_index = self.position[self.axes.len() + 1];
        let mut node = BuildCandidate {
            name: self.name.clone(),
            version: self.versions[self.position[0]].clone(),
            variants: VariantMap::default(),
            compiler: self.compilers[compiler_index].clone(),
            arch: self.arch.clone(),
        };
        let mut conditional = Vec::new();
        for (axis, index) in self.axes.iter().zip(self.position[1..].iter()) {
            match &axis.when {
                None => {
                    node.variants
                        .insert(axis.name.clone(), axis.values[*index].clone());
                }
                Some(when) => conditional.push((axis, *index, when)),
            }
        }
        // conditions can only refer to unconditional variants
        let mut applied = VariantMap::default();
        for (axis, index, when) in conditional {
            if when.is_satisfied_by(&node) {
                applied.insert(axis.name.clone(), axis.values[index].clone());
            } else if index != 0 {
                return None;
            }
        }
        node.variants.extend(applied);
        Some(node)
    }
}

impl Iterator for BuildIterator {
    type Item = BuildCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            let candidate = self.current();
            if !self.advance() {
                self.exhausted = true;
            }
            if candidate.is_some() {
                return candidate;
            }
        }
        None
    }
}

/// All candidates for one package: installed specs first, then
/// externals, then builds from source.
#[derive(Debug)]
pub struct PackageIterator {
    reusable: VecDeque<ConcreteSpec>,
    externals: VecDeque<Candidate>,
    builds: Option<BuildIterator>,
}

impl PackageIterator {
    pub fn new(
        reusable: Vec<ConcreteSpec>,
        externals: Vec<Candidate>,
        builds: Option<BuildIterator>,
    ) -> Self {
        Self {
            reusable: reusable.into(),
            externals: externals.into(),
            builds,
        }
    }

    /// Stop offering builds from source, for when it's known
    /// that none of them can work.
    pub fn skip_builds(&mut self) {
        self.builds = None;
    }
}

impl Iterator for PackageIterator {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(spec) = self.reusable.pop_front() {
            return Some(Candidate::Reuse(spec));
        }
        if let Some(external) = self.externals.pop_front() {
            return Some(external);
        }
        self.builds.as_mut()?.next().map(Candidate::Build)
    }
}
