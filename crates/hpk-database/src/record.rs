// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hpk_schema::{ConcreteSpec, DagHash, NodeList, Spec};
use serde::{Deserialize, Serialize};

use crate::Result;

#[cfg(test)]
#[path = "./record_test.rs"]
mod record_test;

/// Whether a record stands for an installation that can be used.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum InstallStatus {
    Installed,
    /// Replaced by another spec, its prefix is gone.
    Deprecated,
    /// Known to the database, usually as a dependency of something
    /// installed, but not installed itself.
    Missing,
}

/// A set of [`InstallStatus`] to match records against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallStatuses(BTreeSet<InstallStatus>);

impl InstallStatuses {
    pub fn new(statuses: impl IntoIterator<Item = InstallStatus>) -> Self {
        Self(statuses.into_iter().collect())
    }

    /// Only usable installations, the default for queries.
    pub fn installed() -> Self {
        Self::new([InstallStatus::Installed])
    }

    pub fn missing() -> Self {
        Self::new([InstallStatus::Missing])
    }

    pub fn deprecated() -> Self {
        Self::new([InstallStatus::Deprecated])
    }

    /// Every record in the database.
    pub fn any() -> Self {
        Self::new([
            InstallStatus::Installed,
            InstallStatus::Deprecated,
            InstallStatus::Missing,
        ])
    }

    pub fn contains(&self, status: InstallStatus) -> bool {
        self.0.contains(&status)
    }
}

impl Default for InstallStatuses {
    fn default() -> Self {
        Self::installed()
    }
}

impl From<InstallStatus> for InstallStatuses {
    fn from(status: InstallStatus) -> Self {
        Self::new([status])
    }
}

/// What the database knows about one concrete spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallRecord {
    pub spec: ConcreteSpec,
    /// The install prefix, or the existing installation for externals.
    pub path: Option<PathBuf>,
    pub installed: bool,
    /// Installed on request, rather than as a dependency.
    pub explicit: bool,
    pub installation_time: DateTime<Utc>,
    /// The number of records that depend on this one at link or run
    /// time, plus the number of records deprecated in favor of it.
    pub ref_count: u32,
    /// The hash of the spec that replaces this one.
    pub deprecated_for: Option<DagHash>,
}

impl InstallRecord {
    pub fn new(spec: ConcreteSpec, path: Option<PathBuf>, installed: bool) -> Self {
        Self {
            spec,
            path,
            installed,
            explicit: false,
            installation_time: Utc::now(),
            ref_count: 0,
            deprecated_for: None,
        }
    }

    pub fn status(&self) -> InstallStatus {
        if self.deprecated_for.is_some() {
            InstallStatus::Deprecated
        } else if self.installed {
            InstallStatus::Installed
        } else {
            InstallStatus::Missing
        }
    }

    pub fn install_type_matches(&self, statuses: &InstallStatuses) -> bool {
        statuses.contains(self.status())
    }

    pub(crate) fn to_data(&self) -> RecordData {
        RecordData {
            spec: self.spec.to_node_list(),
            path: self.path.clone(),
            installed: self.installed,
            explicit: self.explicit,
            installation_time: self.installation_time,
            ref_count: self.ref_count,
            deprecated_for: self.deprecated_for.clone(),
        }
    }

    pub(crate) fn from_data(data: RecordData) -> Result<Self> {
        Ok(Self {
            spec: data.spec.into_spec()?,
            path: data.path,
            installed: data.installed,
            explicit: data.explicit,
            installation_time: data.installation_time,
            ref_count: data.ref_count,
            deprecated_for: data.deprecated_for,
        })
    }
}

/// The serialized form of an [`InstallRecord`] in the index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct RecordData {
    spec: NodeList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    installed: bool,
    #[serde(default)]
    explicit: bool,
    installation_time: DateTime<Utc>,
    #[serde(default)]
    ref_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deprecated_for: Option<DagHash>,
}

/// Filters for selecting records from the database.
///
/// The default query matches every installed, non-deprecated spec.
#[derive(Clone, Debug, Default)]
pub struct Query {
    pub spec: Option<Spec>,
    pub installed: InstallStatuses,
    pub explicit: Option<bool>,
    pub hashes: Option<Vec<DagHash>>,
    /// Only records installed after this time.
    pub start_date: Option<DateTime<Utc>>,
    /// Only records installed before this time.
    pub end_date: Option<DateTime<Utc>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match specs that satisfy the given constraints.
    pub fn spec(spec: Spec) -> Self {
        Self {
            spec: Some(spec),
            ..Self::default()
        }
    }

    pub fn with_installed<S: Into<InstallStatuses>>(mut self, installed: S) -> Self {
        self.installed = installed.into();
        self
    }

    pub fn with_explicit(mut self, explicit: bool) -> Self {
        self.explicit = Some(explicit);
        self
    }

    pub fn with_hashes<I: IntoIterator<Item = DagHash>>(mut self, hashes: I) -> Self {
        self.hashes = Some(hashes.into_iter().collect());
        self
    }

    pub fn installed_between(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn matches(&self, record: &InstallRecord) -> bool {
        if let Some(hashes) = &self.hashes {
            if !hashes.contains(record.spec.dag_hash()) {
                return false;
            }
        }
        if !record.install_type_matches(&self.installed) {
            return false;
        }
        if self
            .explicit
            .is_some_and(|explicit| explicit != record.explicit)
        {
            return false;
        }
        if self
            .start_date
            .is_some_and(|start| record.installation_time <= start)
        {
            return false;
        }
        if self
            .end_date
            .is_some_and(|end| record.installation_time >= end)
        {
            return false;
        }
        self.spec
            .as_ref()
            .is_none_or(|spec| record.spec.satisfies(spec))
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.spec {
            Some(spec) => spec.fmt(f),
            None => f.write_str("*"),
        }
    }
}
