// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::path::PathBuf;
use std::sync::Arc;

use hpk_config::Config;
use hpk_database::{InstallStatus, InstallStatuses, Query, ReindexReport, Store};
use hpk_schema::{ConcreteSpec, Repository, Spec};
use hpk_solve::Concretizer;
use itertools::Itertools;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./session_test.rs"]
mod session_test;

/// One configuration, package repository and store, used together
/// to concretize requests and manage what is installed.
pub struct Session {
    config: Arc<Config>,
    repo: Arc<dyn Repository>,
    store: Store,
}

impl Session {
    /// Open the store named in the configuration.
    pub fn new(config: Arc<Config>, repo: Arc<dyn Repository>) -> Result<Self> {
        let store = Store::from_config(&config)?;
        Ok(Self::with_store(config, repo, store))
    }

    /// Use the current global configuration.
    pub fn from_current_config(repo: Arc<dyn Repository>) -> Result<Self> {
        Self::new(Config::current()?, repo)
    }

    pub fn with_store(config: Arc<Config>, repo: Arc<dyn Repository>, store: Store) -> Self {
        Self {
            config,
            repo,
            store,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A concretizer that can reuse what is installed, when
    /// `concretizer.reuse` is enabled.
    pub fn concretizer(&self) -> Result<Concretizer> {
        let concretizer = Concretizer::new(Arc::clone(&self.config), Arc::clone(&self.repo));
        if !self.config.concretizer.reuse {
            return Ok(concretizer);
        }
        let reusable = self.store.reusable_specs()?;
        tracing::debug!(count = reusable.len(), "offering installed specs for reuse");
        Ok(concretizer.with_reusable(reusable))
    }

    /// Concretize the requests together, one result per request.
    pub fn concretize(&self, requests: &[Spec]) -> Result<Vec<ConcreteSpec>> {
        Ok(self.concretizer()?.concretize(requests)?)
    }

    /// Parse and concretize a single request.
    pub fn concretize_str(&self, request: &str) -> Result<ConcreteSpec> {
        let spec = Spec::parse(request)?;
        Ok(self.concretizer()?.concretize_one(&spec)?)
    }

    /// Concretize the requests and install the results, each as
    /// an explicit install.
    pub fn install(&self, requests: &[Spec]) -> Result<Vec<ConcreteSpec>> {
        let specs = self.concretize(requests)?;
        for spec in specs.iter() {
            self.install_concrete(spec, true)?;
        }
        Ok(specs)
    }

    /// Install a concrete spec, returning its prefix.
    pub fn install_concrete(&self, spec: &ConcreteSpec, explicit: bool) -> Result<PathBuf> {
        Ok(self.store.install(spec, explicit)?)
    }

    /// Installed specs that satisfy the given constraints.
    pub fn find(&self, spec: &Spec) -> Result<Vec<ConcreteSpec>> {
        self.query(&Query::spec(spec.clone()))
    }

    /// The single installed spec that satisfies the constraints.
    pub fn find_one(&self, spec: &Spec) -> Result<ConcreteSpec> {
        self.store
            .db()
            .query_one(&Query::spec(spec.clone()))?
            .ok_or_else(|| Error::NoMatch(spec.to_string()))
    }

    pub fn query(&self, query: &Query) -> Result<Vec<ConcreteSpec>> {
        Ok(self.store.db().query(query)?)
    }

    /// Replace the installed spec matching `old` with the one
    /// matching `new`.
    pub fn deprecate(&self, old: &Spec, new: &Spec) -> Result<(ConcreteSpec, ConcreteSpec)> {
        let deprecated = self
            .store
            .db()
            .query_one(&Query::spec(old.clone()).with_installed(InstallStatuses::new([
                InstallStatus::Installed,
                InstallStatus::Deprecated,
            ])))?
            .ok_or_else(|| Error::NoMatch(old.to_string()))?;
        let deprecator = self.find_one(new)?;
        self.store.deprecate(&deprecated, &deprecator)?;
        Ok((deprecated, deprecator))
    }

    /// Remove every installed spec matching `spec`.
    pub fn uninstall(&self, spec: &Spec) -> Result<Vec<ConcreteSpec>> {
        let matches = self.find(spec)?;
        if matches.is_empty() {
            return Err(Error::NoMatch(spec.to_string()));
        }
        for found in matches.iter() {
            self.store.uninstall(found)?;
        }
        tracing::debug!(
            "removed {}",
            matches.iter().map(|s| s.format_node()).join(", ")
        );
        Ok(matches)
    }

    /// Rebuild the database from the install prefixes.
    pub fn reindex(&self) -> Result<ReindexReport> {
        Ok(self.store.reindex()?)
    }
}
