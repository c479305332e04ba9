// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use hpk_config::Config;
use hpk_schema::foundation::arch::Arch;
use hpk_schema::{ConcreteSpec, NodeSpec, Package, PkgName, Repository, Spec};
use hpk_solve_package_iterator::PackageFacts;
use itertools::Itertools;

use crate::{CompilerParser, Error, InvalidDependencyError, Result};

#[cfg(test)]
#[path = "./setup_test.rs"]
mod setup_test;

/// One spec to be concretized.
#[derive(Clone, Debug)]
pub struct Request {
    /// The spec as it was given, for messages.
    pub spec: Spec,
    /// The spec with every variant in its canonical form.
    pub normalized: Spec,
}

/// Everything the solver needs to know about one concretization.
#[derive(Clone, Debug)]
pub struct Problem {
    pub config: Arc<Config>,
    pub requests: Vec<Request>,
    /// Every package that could appear in the solution.
    pub facts: BTreeMap<PkgName, PackageFacts>,
    /// Every virtual package that could appear, with its providers.
    pub virtuals: BTreeMap<PkgName, Vec<Arc<Package>>>,
    pub compilers: CompilerParser,
    /// Installed nodes that may be reused, by name, newest first.
    pub reusable: BTreeMap<PkgName, Vec<ConcreteSpec>>,
    pub host: Arch,
}

impl Problem {
    pub fn is_virtual(&self, name: &str) -> bool {
        self.virtuals.contains_key(name)
    }

    /// Rewrite a constraint on a package into its canonical form.
    ///
    /// Constraints on virtual packages are left as they are.
    pub fn normalize(&self, node: &NodeSpec) -> Result<NodeSpec> {
        match node.name.as_ref().and_then(|n| self.facts.get(n)) {
            Some(facts) => Ok(facts.package.normalize_node(node)?),
            None => Ok(node.clone()),
        }
    }
}

/// Collects the facts of a concretization problem from the
/// configuration and a package repository.
pub struct ProblemSetup {
    config: Arc<Config>,
    repo: Arc<dyn Repository>,
}

impl ProblemSetup {
    pub fn new(config: Arc<Config>, repo: Arc<dyn Repository>) -> Self {
        Self { config, repo }
    }

    /// Gather what is needed to concretize `specs` together.
    ///
    /// Installed specs in `reusable` are only considered when reuse
    /// is enabled in the configuration.
    pub fn setup(&self, specs: &[Spec], reusable: &[ConcreteSpec]) -> Result<Problem> {
        let mut facts = BTreeMap::new();
        let mut virtuals = BTreeMap::new();
        let mut requests = Vec::with_capacity(specs.len());
        for spec in specs {
            let Some(root) = spec.name() else {
                return Err(hpk_schema::Error::InvalidSpec {
                    spec: spec.to_string(),
                    message: "only named specs can be concretized".to_owned(),
                }
                .into());
            };
            let closure = self.closure(root, &mut facts, &mut virtuals)?;
            for dep in spec.dependencies() {
                let Some(name) = dep.name.as_ref() else {
                    continue;
                };
                if !closure.contains(name) {
                    return Err(InvalidDependencyError {
                        root: root.clone(),
                        dependency: name.clone(),
                    }
                    .into());
                }
            }
            requests.push(spec);
        }

        let mut problem = Problem {
            config: Arc::clone(&self.config),
            requests: Vec::new(),
            facts,
            virtuals,
            compilers: CompilerParser::new(&self.config)?,
            reusable: BTreeMap::new(),
            host: Arch::new(
                &self.config.host.platform,
                &self.config.host.os,
                &self.config.host.target,
            ),
        };

        for spec in requests {
            let mut normalized = Spec::new(problem.normalize(spec.root())?);
            for dep in spec.dependencies() {
                normalized.add_dependency(problem.normalize(dep)?)?;
            }
            problem.requests.push(Request {
                spec: spec.clone(),
                normalized,
            });
        }

        if self.config.concretizer.reuse {
            problem.reusable = self.reusable_nodes(reusable)?;
            for spec in problem.reusable.values().flatten() {
                problem.compilers.add_compiler_from_concrete_spec(spec);
            }
        }
        problem.compilers.with_input_specs(specs)?;

        tracing::debug!(
            packages = problem.facts.len(),
            virtuals = problem.virtuals.len(),
            reusable = problem.reusable.values().map(Vec::len).sum::<usize>(),
            "problem setup complete"
        );
        Ok(problem)
    }

    /// Find every package and virtual package that could end up in the
    /// solution for `root`, under any condition, recording what is
    /// known about each of them.
    fn closure(
        &self,
        root: &PkgName,
        facts: &mut BTreeMap<PkgName, PackageFacts>,
        virtuals: &mut BTreeMap<PkgName, Vec<Arc<Package>>>,
    ) -> Result<BTreeSet<PkgName>> {
        let mut seen = BTreeSet::from([root.clone()]);
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(name) = queue.pop_front() {
            let mut next = Vec::new();
            if let Some(existing) = facts.get(&name) {
                next.extend(dependency_names(&existing.package));
            } else if let Some(providers) = virtuals.get(&name) {
                next.extend(providers.iter().map(|p| p.name.clone()));
            } else {
                match self.repo.get_package(&name) {
                    Ok(package) => {
                        next.extend(dependency_names(&package));
                        facts.insert(name.clone(), PackageFacts::new(package, &self.config)?);
                    }
                    Err(err) if err.is_package_not_found() => {
                        let providers = self.repo.providers_for(&name)?;
                        if providers.is_empty() {
                            return Err(Error::UnknownPackage(name));
                        }
                        next.extend(providers.iter().map(|p| p.name.clone()));
                        virtuals.insert(name.clone(), providers);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            for name in next {
                if seen.insert(name.clone()) {
                    queue.push_back(name);
                }
            }
        }
        Ok(seen)
    }

    /// Index every node of the given installed specs by name, newest
    /// version first, leaving out any spec that uses packages that
    /// the repository no longer defines.
    fn reusable_nodes(
        &self,
        reusable: &[ConcreteSpec],
    ) -> Result<BTreeMap<PkgName, Vec<ConcreteSpec>>> {
        let mut nodes: BTreeMap<PkgName, Vec<ConcreteSpec>> = BTreeMap::new();
        'specs: for spec in reusable {
            let traversed = spec.traverse();
            for node in traversed.iter() {
                if !self.repo.has_package(node.name())? {
                    tracing::debug!(
                        spec = %spec.format_node(),
                        missing = %node.name(),
                        "not reusable, package is unknown"
                    );
                    continue 'specs;
                }
            }
            for node in traversed {
                nodes.entry(node.name().clone()).or_default().push(node);
            }
        }
        for specs in nodes.values_mut() {
            *specs = std::mem::take(specs)
                .into_iter()
                .unique_by(|s| s.dag_hash().clone())
                .sorted_by_cached_key(|s| (Reverse(s.version().clone()), s.dag_hash().clone()))
                .collect();
        }
        Ok(nodes)
    }
}

fn dependency_names(package: &Package) -> Vec<PkgName> {
    package
        .depends_on
        .iter()
        .flat_map(|dep| dep.spec.nodes().filter_map(|n| n.name.clone()))
        .collect()
}
