// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use hpk_schema::{ConcreteSpec, DagHash, DepType, DependencyEdge};
use serde::{Deserialize, Serialize};

use crate::layout::DirectoryLayout;
use crate::record::RecordData;
use crate::{Error, InstallRecord, InstallStatuses, Query, Result};

#[cfg(test)]
#[path = "./index_test.rs"]
mod index_test;

/// The version of the index file format.
pub const INDEX_VERSION: u32 = 1;

/// Which way to follow dependency edges from a spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Parents,
    Children,
}

/// Only these dependencies are reference counted, since the others
/// are not needed once their dependent is installed.
fn is_tracked(edge: &DependencyEdge) -> bool {
    edge.types.contains(&DepType::Link) || edge.types.contains(&DepType::Run)
}

fn tracked_dependencies(spec: &ConcreteSpec) -> impl Iterator<Item = &ConcreteSpec> {
    spec.dependencies()
        .iter()
        .filter(|edge| is_tracked(edge))
        .map(|edge| &edge.spec)
}

/// Every installation record, by hash.
///
/// This does no locking or file access of its own, see [`crate::Database`]
/// for the transactional view over the index file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Index {
    records: BTreeMap<DagHash, InstallRecord>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &InstallRecord> {
        self.records.values()
    }

    pub fn get(&self, hash: &DagHash) -> Option<&InstallRecord> {
        self.records.get(hash)
    }

    fn get_mut(&mut self, hash: &DagHash) -> Result<&mut InstallRecord> {
        self.records
            .get_mut(hash)
            .ok_or_else(|| Error::NoSuchRecord(hash.to_string()))
    }

    /// The record of exactly this spec.
    pub fn record(&self, spec: &ConcreteSpec) -> Result<&InstallRecord> {
        self.records
            .get(spec.dag_hash())
            .ok_or_else(|| Error::NoSuchRecord(spec.format_node()))
    }

    /// Every spec that matches the query, sorted.
    pub fn query(&self, query: &Query) -> Vec<ConcreteSpec> {
        let mut results: Vec<ConcreteSpec> = self
            .records
            .values()
            .filter(|record| query.matches(record))
            .map(|record| record.spec.clone())
            .collect();
        results.sort();
        results
    }

    /// The one spec that matches the query, if any.
    pub fn query_one(&self, query: &Query) -> Result<Option<ConcreteSpec>> {
        let mut results = self.query(query);
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            _ => Err(Error::AmbiguousQuery {
                query: query.to_string(),
                matches: results.iter().map(|s| s.format_node()).collect(),
            }),
        }
    }

    /// Look up specs by full hash, or by a hash prefix.
    pub fn get_by_hash(&self, prefix: &str, installed: &InstallStatuses) -> Vec<ConcreteSpec> {
        if let Ok(hash) = DagHash::new(prefix) {
            return self
                .records
                .get(&hash)
                .filter(|record| record.install_type_matches(installed))
                .map(|record| vec![record.spec.clone()])
                .unwrap_or_default();
        }
        self.records
            .iter()
            .filter(|(hash, record)| {
                hash.as_str().starts_with(prefix) && record.install_type_matches(installed)
            })
            .map(|(_, record)| record.spec.clone())
            .collect()
    }

    /// True if the spec is known, but not installed.
    pub fn missing(&self, spec: &ConcreteSpec) -> bool {
        self.records
            .get(spec.dag_hash())
            .is_some_and(|record| !record.installed)
    }

    /// Record a spec, along with every dependency that is not yet known.
    ///
    /// Dependencies are added as implicit. When a layout is given, new
    /// records are marked missing unless their prefix is found in it.
    pub fn add(
        &mut self,
        spec: &ConcreteSpec,
        layout: Option<&DirectoryLayout>,
        explicit: bool,
        installation_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let key = spec.dag_hash().clone();
        let installation_time = installation_time.unwrap_or_else(Utc::now);

        for dep in tracked_dependencies(spec) {
            if !self.records.contains_key(dep.dag_hash()) {
                self.add(dep, layout, false, Some(installation_time))?;
            }
        }

        match self.records.get_mut(&key) {
            Some(record) => {
                record.installed = true;
                record.installation_time = installation_time;
                record.explicit = explicit;
            }
            None => {
                // without a layout to check, the spec is taken as installed
                let mut installed = true;
                let mut path = spec.external().map(ToOwned::to_owned);
                if let (false, Some(layout)) = (spec.is_external(), layout) {
                    path = Some(layout.path_for_spec(spec));
                    installed = false;
                    match layout.check_installed(spec) {
                        Ok(Some(_)) => installed = true,
                        Ok(None) => {
                            tracing::warn!(
                                spec = %spec.format_node(),
                                "dependency missing: may be deprecated or corrupted"
                            );
                        }
                        Err(err) => {
                            tracing::warn!(spec = %spec.format_node(), "dependency missing: {err}");
                        }
                    }
                }
                let mut record = InstallRecord::new(spec.clone(), path, installed);
                record.explicit = explicit;
                record.installation_time = installation_time;
                self.records.insert(key, record);
                for dep in tracked_dependencies(spec) {
                    self.increment_ref_count(dep.dag_hash());
                }
            }
        }
        Ok(())
    }

    fn increment_ref_count(&mut self, hash: &DagHash) {
        if let Some(record) = self.records.get_mut(hash) {
            record.ref_count += 1;
        }
    }

    /// Drop a reference to a record, removing it once nothing refers
    /// to it and it is not installed.
    fn decrement_ref_count(&mut self, hash: &DagHash) {
        let Some(record) = self.records.get_mut(hash) else {
            tracing::debug!(%hash, "reference to a record that is not in the database");
            return;
        };
        record.ref_count = record.ref_count.saturating_sub(1);
        if record.ref_count > 0 || record.installed {
            return;
        }
        let Some(record) = self.records.remove(hash) else {
            return;
        };
        for dep in tracked_dependencies(&record.spec) {
            self.decrement_ref_count(dep.dag_hash());
        }
    }

    /// Remove a spec on uninstall.
    ///
    /// A spec that others still depend on is kept, but marked as not
    /// installed. Otherwise it is removed, along with any dependencies
    /// that are no longer needed and not installed themselves.
    pub fn remove(&mut self, spec: &ConcreteSpec) -> Result<ConcreteSpec> {
        let key = spec.dag_hash();
        let record = self.get_mut(key)?;
        if record.ref_count > 0 {
            record.installed = false;
            return Ok(record.spec.clone());
        }
        let record = self
            .records
            .remove(key)
            .ok_or_else(|| Error::NoSuchRecord(key.to_string()))?;
        for dep in tracked_dependencies(&record.spec) {
            self.decrement_ref_count(dep.dag_hash());
        }
        if let Some(deprecator) = &record.deprecated_for {
            self.decrement_ref_count(deprecator);
        }
        Ok(record.spec)
    }

    /// Mark `spec` as replaced by `deprecator`.
    ///
    /// Returns the spec that previously replaced it, if any.
    pub fn deprecate(
        &mut self,
        spec: &ConcreteSpec,
        deprecator: &ConcreteSpec,
    ) -> Result<Option<DagHash>> {
        if spec.dag_hash() == deprecator.dag_hash() {
            return Err(Error::SelfDeprecation(spec.format_node()));
        }
        let deprecator_key = self.record(deprecator)?.spec.dag_hash().clone();
        let previous = self.record(spec)?.deprecated_for.clone();

        self.increment_ref_count(&deprecator_key);
        if let Some(previous) = &previous {
            self.decrement_ref_count(previous);
        }
        let record = self.get_mut(spec.dag_hash())?;
        record.deprecated_for = Some(deprecator_key);
        record.installed = false;
        Ok(previous)
    }

    /// The spec that replaces the given one, if it is deprecated.
    pub fn deprecator(&self, spec: &ConcreteSpec) -> Result<Option<ConcreteSpec>> {
        let record = self.record(spec)?;
        let Some(hash) = &record.deprecated_for else {
            return Ok(None);
        };
        let deprecator = self
            .records
            .get(hash)
            .ok_or_else(|| Error::NoSuchRecord(hash.to_string()))?;
        Ok(Some(deprecator.spec.clone()))
    }

    /// Every spec deprecated in favor of the given one.
    pub fn specs_deprecated_by(&self, spec: &ConcreteSpec) -> Vec<ConcreteSpec> {
        self.records
            .values()
            .filter(|record| record.deprecated_for.as_ref() == Some(spec.dag_hash()))
            .map(|record| record.spec.clone())
            .collect()
    }

    /// Change whether a spec counts as requested by the user.
    ///
    /// Returns true if the record changed.
    pub fn update_explicit(&mut self, spec: &ConcreteSpec, explicit: bool) -> Result<bool> {
        let record = self.get_mut(spec.dag_hash())?;
        if record.explicit == explicit {
            return Ok(false);
        }
        tracing::debug!(
            "{}@{} : marking the package {}",
            spec.name(),
            spec.version(),
            if explicit { "explicit" } else { "implicit" }
        );
        record.explicit = explicit;
        Ok(true)
    }

    /// Installed specs related to any of the specs matching `query`,
    /// either below them or above them in the DAG.
    pub fn installed_relatives(
        &self,
        query: &Query,
        direction: Direction,
        transitive: bool,
    ) -> BTreeSet<ConcreteSpec> {
        let mut relatives = BTreeSet::new();
        for spec in self.query(query) {
            let found = match direction {
                Direction::Children if transitive => {
                    spec.traverse().into_iter().skip(1).collect::<Vec<_>>()
                }
                Direction::Children => spec.dependencies().iter().map(|e| e.spec.clone()).collect(),
                Direction::Parents => self.dependents(&spec, transitive),
            };
            for relative in found {
                match self.records.get(relative.dag_hash()) {
                    Some(record) if record.installed => {
                        relatives.insert(relative);
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!(
                            "Inconsistent state! {} {} of {} not in DB",
                            match direction {
                                Direction::Parents => "Dependent",
                                Direction::Children => "Dependency",
                            },
                            relative.dag_hash(),
                            spec.dag_hash()
                        );
                    }
                }
            }
        }
        relatives
    }

    /// Recorded specs that depend on `spec`.
    fn dependents(&self, spec: &ConcreteSpec, transitive: bool) -> Vec<ConcreteSpec> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([spec.dag_hash().clone()]);
        let mut queue = vec![spec.dag_hash().clone()];
        while let Some(hash) = queue.pop() {
            for record in self.records.values() {
                let depends = record
                    .spec
                    .dependencies()
                    .iter()
                    .any(|edge| edge.spec.dag_hash() == &hash);
                if depends && seen.insert(record.spec.dag_hash().clone()) {
                    found.push(record.spec.clone());
                    if transitive {
                        queue.push(record.spec.dag_hash().clone());
                    }
                }
            }
        }
        found
    }

    /// Installed specs that were neither requested explicitly nor are
    /// needed at link or run time by anything that was.
    pub fn unused_specs(&self) -> Vec<ConcreteSpec> {
        let mut needed = HashSet::new();
        for record in self.records.values().filter(|r| r.explicit) {
            let mut stack = vec![record.spec.clone()];
            while let Some(spec) = stack.pop() {
                if !needed.insert(spec.dag_hash().clone()) {
                    continue;
                }
                stack.extend(tracked_dependencies(&spec).cloned());
            }
        }
        self.records
            .iter()
            .filter(|(hash, record)| record.installed && !needed.contains(*hash))
            .map(|(_, record)| record.spec.clone())
            .collect()
    }

    /// Make sure that every reference count matches the records that
    /// refer to it.
    pub fn check_ref_counts(&self) -> Result<()> {
        let mut counts: BTreeMap<&DagHash, u32> = BTreeMap::new();
        for (hash, record) in self.records.iter() {
            counts.entry(hash).or_default();
            for dep in tracked_dependencies(&record.spec) {
                *counts.entry(dep.dag_hash()).or_default() += 1;
            }
            if let Some(deprecator) = &record.deprecated_for {
                *counts.entry(deprecator).or_default() += 1;
            }
        }
        for (hash, record) in self.records.iter() {
            let expected = counts.get(hash).copied().unwrap_or_default();
            if record.ref_count != expected {
                return Err(Error::InvalidRefCount {
                    hash: hash.clone(),
                    found: record.ref_count,
                    expected,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn to_file(&self) -> IndexFile {
        IndexFile {
            database: IndexContents {
                version: INDEX_VERSION,
                installs: self
                    .records
                    .iter()
                    .map(|(hash, record)| (hash.clone(), record.to_data()))
                    .collect(),
            },
        }
    }

    pub(crate) fn from_file(file: IndexFile) -> Result<Self> {
        let contents = file.database;
        if contents.version != INDEX_VERSION {
            return Err(Error::InvalidDatabaseVersion {
                expected: INDEX_VERSION,
                found: contents.version,
            });
        }
        let mut records = BTreeMap::new();
        for (hash, data) in contents.installs {
            let record = InstallRecord::from_data(data)?;
            if record.spec.dag_hash() != &hash {
                return Err(Error::String(format!(
                    "index entry {hash} holds spec {}",
                    record.spec.dag_hash()
                )));
            }
            records.insert(hash, record);
        }
        Ok(Self { records })
    }
}

/// The serialized form of the index.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexFile {
    database: IndexContents,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexContents {
    version: u32,
    installs: BTreeMap<DagHash, RecordData>,
}
