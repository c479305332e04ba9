// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::path::{Path, PathBuf};
use std::time::Duration;

use hpk_config::Config;
use hpk_schema::ConcreteSpec;
use itertools::Itertools;

use crate::{
    Database,
    DirectoryLayout,
    Direction,
    Error,
    InstallStatus,
    InstallStatuses,
    Query,
    ReindexReport,
    Result,
};

#[cfg(test)]
#[path = "./store_test.rs"]
mod store_test;

/// The install prefixes under one root, along with their database.
#[derive(Debug)]
pub struct Store {
    layout: DirectoryLayout,
    db: Database,
}

impl Store {
    pub fn open<P: Into<PathBuf>>(root: P, lock_timeout: Duration) -> Result<Self> {
        let root = root.into();
        let layout = DirectoryLayout::new(&root);
        let db = Database::new(&root, Some(layout.clone()), lock_timeout)?;
        Ok(Self { layout, db })
    }

    /// Open the store configured in `store.root`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(
            &config.store.root,
            Duration::from_secs(config.store.lock_timeout_seconds),
        )
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Lay out the prefix of every node in the spec that is not
    /// already there, and record each node in the database.
    ///
    /// Nothing is built, each prefix only holds the spec metadata.
    /// Dependencies are recorded as implicit unless they were
    /// already installed.
    pub fn install(&self, spec: &ConcreteSpec, explicit: bool) -> Result<PathBuf> {
        self.db.update(|index| {
            for node in spec.traverse_post_order() {
                if !node.is_external() && self.layout.check_installed(&node)?.is_none() {
                    let prefix = self.layout.create_install_directory(&node)?;
                    tracing::info!(prefix = %prefix.display(), "installed {}", node.format_node());
                }
                let known = index
                    .get(node.dag_hash())
                    .filter(|record| record.installed);
                if node.dag_hash() == spec.dag_hash() {
                    let explicit = explicit || known.is_some_and(|record| record.explicit);
                    index.add(&node, Some(&self.layout), explicit, None)?;
                } else if known.is_none() {
                    index.add(&node, Some(&self.layout), false, None)?;
                }
            }
            Ok(())
        })?;
        Ok(self.layout.path_for_spec(spec))
    }

    /// Remove an installed spec, and its record unless other records
    /// still need it.
    pub fn uninstall(&self, spec: &ConcreteSpec) -> Result<()> {
        let query = Query::new().with_hashes([spec.dag_hash().clone()]);
        let dependents = self
            .db
            .installed_relatives(&query, Direction::Parents, false)?;
        let deprecated = self.db.specs_deprecated_by(spec)?;
        if !dependents.is_empty() || !deprecated.is_empty() {
            return Err(Error::HasDependents {
                spec: spec.format_node(),
                dependents: dependents
                    .iter()
                    .chain(deprecated.iter())
                    .map(|s| s.format_node())
                    .collect(),
            });
        }
        self.layout.remove_install_directory(spec)?;
        self.db.remove(spec)?;
        tracing::info!("uninstalled {}", spec.format_node());
        Ok(())
    }

    /// Replace an installed spec with another one.
    ///
    /// The prefix of `spec` is removed, and its metadata is kept in
    /// the prefix of `deprecator` so that a reindex can recover it.
    pub fn deprecate(&self, spec: &ConcreteSpec, deprecator: &ConcreteSpec) -> Result<()> {
        if spec.dag_hash() == deprecator.dag_hash() {
            return Err(Error::SelfDeprecation(spec.format_node()));
        }
        self.db.update(|index| {
            let record = index.record(spec)?;
            if !matches!(
                record.status(),
                InstallStatus::Installed | InstallStatus::Deprecated
            ) {
                return Err(Error::NotInstalled(spec.format_node()));
            }
            let replacement = index.record(deprecator)?;
            if replacement.status() != InstallStatus::Installed {
                return Err(Error::NotInstalled(deprecator.format_node()));
            }
            let previous = index.deprecator(spec)?;
            // specs replaced by `spec` keep their metadata in its prefix,
            // so they move over to the new deprecator first
            for replaced in index.specs_deprecated_by(spec) {
                index.deprecate(&replaced, deprecator)?;
                self.layout.deprecate(&replaced, deprecator)?;
                tracing::debug!(
                    "moved {} over to {}",
                    replaced.format_node(),
                    deprecator.format_node()
                );
            }
            index.deprecate(spec, deprecator)?;

            self.layout.deprecate(spec, deprecator)?;
            if let Some(previous) = previous.filter(|p| p != deprecator) {
                self.layout.remove_deprecated_file(spec, &previous)?;
            }
            Ok(())
        })?;
        tracing::info!(
            "deprecated {} in favor of {}",
            spec.format_node(),
            deprecator.format_node()
        );
        Ok(())
    }

    pub fn reindex(&self) -> Result<ReindexReport> {
        let report = self.db.reindex()?;
        if !report.skipped.is_empty() {
            tracing::warn!(
                "skipped {} unreadable install prefixes: {}",
                report.skipped.len(),
                report.skipped.iter().map(|s| s.path.display()).join(", ")
            );
        }
        Ok(report)
    }

    /// The installed specs that can be reused by the concretizer.
    pub fn reusable_specs(&self) -> Result<Vec<ConcreteSpec>> {
        self.db
            .query(&Query::new().with_installed(InstallStatuses::installed()))
    }
}
