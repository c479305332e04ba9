// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::sync::Arc;

use hpk_config::Config;
use hpk_schema::{ConcreteSpec, Repository, Spec};
use itertools::Itertools;

use crate::{Error, ProblemSetup, Result, Solver};

#[cfg(test)]
#[path = "./concretizer_test.rs"]
mod concretizer_test;

/// Turns abstract specs into concrete ones against one configuration
/// and package repository.
///
/// Each call sets up and solves a fresh problem, so one concretizer
/// can be shared for any number of requests.
#[derive(Clone)]
pub struct Concretizer {
    config: Arc<Config>,
    repo: Arc<dyn Repository>,
    reusable: Vec<ConcreteSpec>,
}

impl Concretizer {
    pub fn new(config: Arc<Config>, repo: Arc<dyn Repository>) -> Self {
        Self {
            config,
            repo,
            reusable: Vec::new(),
        }
    }

    /// Offer already installed specs for reuse.
    ///
    /// They are only considered when `concretizer.reuse` is enabled.
    pub fn with_reusable<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = ConcreteSpec>,
    {
        self.reusable.extend(specs);
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// Concretize all of the given specs together, returning one
    /// concrete spec per input in the same order.
    ///
    /// Packages that appear under more than one root are resolved
    /// to the same node.
    pub fn concretize(&self, specs: &[Spec]) -> Result<Vec<ConcreteSpec>> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }
        let problem = ProblemSetup::new(Arc::clone(&self.config), Arc::clone(&self.repo))
            .setup(specs, &self.reusable)?;
        let mut solver = Solver::new(problem);
        let result = solver.solve();
        match &result {
            Ok(solution) => tracing::info!(
                steps = solver.steps(),
                "concretized {}",
                solution.iter().map(|s| s.format_node()).join(", ")
            ),
            Err(err) => tracing::debug!(steps = solver.steps(), "concretization failed: {err}"),
        }
        result
    }

    /// Concretize a single spec on its own.
    pub fn concretize_one(&self, spec: &Spec) -> Result<ConcreteSpec> {
        self.concretize(std::slice::from_ref(spec))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::String(format!("no solution was produced for {spec}")))
    }
}

/// Something that can be made concrete.
pub trait Concretize {
    /// Produce a new, frozen concrete spec, leaving `self` unchanged.
    fn concretized(&self, concretizer: &Concretizer) -> Result<ConcreteSpec>;
}

impl Concretize for Spec {
    fn concretized(&self, concretizer: &Concretizer) -> Result<ConcreteSpec> {
        concretizer.concretize_one(self)
    }
}

impl Concretize for str {
    fn concretized(&self, concretizer: &Concretizer) -> Result<ConcreteSpec> {
        Spec::parse(self)?.concretized(concretizer)
    }
}
