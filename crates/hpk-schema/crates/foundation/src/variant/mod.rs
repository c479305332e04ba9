// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::name::VariantName;


/// Create a variant map from a sequence of assignments, for tests.
///
/// ```
/// # #[macro_use] extern crate hpk_schema_foundation;
/// # use hpk_schema_foundation::variant::VariantValue;
/// # fn main() {
/// variant_map!{"mpi" => VariantValue::Bool(true)};
/// # }
/// ```
#[macro_export]
macro_rules! variant_map {
    ($($k:expr => $v:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::variant::VariantMap::default();
        $(map.insert($crate::name::VariantName::new($k).unwrap(), $v);)*
        map
    }};
}

/// The value of a variant, as requested or as concretized.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Single(String),
    Multi(BTreeSet<String>),
}

impl VariantValue {
    /// Interpret the text after `name=` in a spec.
    pub fn parse(text: &str) -> Self {
        if text.contains(',') {
            VariantValue::Multi(
                text.split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
            )
        } else {
            VariantValue::Single(text.to_owned())
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariantValue::Bool(b) => Some(*b),
            VariantValue::Single(s) => parse_bool(s),
            VariantValue::Multi(_) => None,
        }
    }

    /// The set of values this holds, for membership checks.
    pub fn values(&self) -> BTreeSet<String> {
        match self {
            VariantValue::Bool(b) => BTreeSet::from([b.to_string()]),
            VariantValue::Single(s) => BTreeSet::from([s.clone()]),
            VariantValue::Multi(set) => set.clone(),
        }
    }

    /// True if a concrete value fulfills this requested value.
    ///
    /// A requested multi-valued entry is met when all of its values
    /// are present in the concrete set.
    pub fn is_satisfied_by(&self, concrete: &VariantValue) -> bool {
        use VariantValue::*;
        match (self, concrete) {
            (Bool(a), Bool(b)) => a == b,
            (Bool(a), Single(b)) => parse_bool(b) == Some(*a),
            (Bool(_), Multi(_)) => false,
            (Single(a), Single(b)) => a == b,
            (Single(a), Multi(set)) => set.contains(a),
            (Multi(req), Multi(set)) => req.is_subset(set),
            (Multi(req), Single(b)) => req.len() == 1 && req.contains(b),
            (Multi(_), Bool(_)) => false,
            (Single(a), Bool(b)) => parse_bool(a) == Some(*b),
        }
    }

    /// Merge two requested values, or `None` if they cannot hold together
    /// on a single-valued variant.
    pub fn merge(&self, other: &VariantValue, multi: bool) -> Option<VariantValue> {
        if multi {
            let mut values = self.values();
            values.extend(other.values());
            return Some(VariantValue::Multi(values));
        }
        match (self.as_bool(), other.as_bool()) {
            (Some(a), Some(b)) if a == b => Some(VariantValue::Bool(a)),
            _ if self == other => Some(self.clone()),
            _ => None,
        }
    }

    /// Display order for conflicting values: disabled before
    /// enabled, then by value.
    pub fn cmp_for_display(&self, other: &VariantValue) -> Ordering {
        match (self.as_bool(), other.as_bool()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.values().cmp(&other.values()),
        }
    }
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Format one variant assignment the way it would be written in a spec.
pub fn format_assignment(name: &VariantName, value: &VariantValue) -> String {
    match value {
        VariantValue::Bool(true) => format!("+{name}"),
        VariantValue::Bool(false) => format!("~{name}"),
        VariantValue::Single(s) => format!("{name}={s}"),
        VariantValue::Multi(set) => format!("{name}={}", set.iter().join(",")),
    }
}

/// A set of variant assignments, keyed by variant name.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct VariantMap(BTreeMap<VariantName, VariantValue>);

impl Deref for VariantMap {
    type Target = BTreeMap<VariantName, VariantValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for VariantMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(VariantName, VariantValue)> for VariantMap {
    fn from_iter<T: IntoIterator<Item = (VariantName, VariantValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for VariantMap {
    type Item = (VariantName, VariantValue);
    type IntoIter = std::collections::btree_map::IntoIter<VariantName, VariantValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl std::fmt::Display for VariantMap {
    /// Boolean variants are written first and packed together (`+a~b`),
    /// valued ones follow with a leading space (` c=d`).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (flags, valued): (Vec<_>, Vec<_>) = self
            .0
            .iter()
            .partition(|(_, v)| matches!(v, VariantValue::Bool(_)));
        for (name, value) in flags {
            f.write_str(&format_assignment(name, value))?;
        }
        for (name, value) in valued {
            write!(f, " {}", format_assignment(name, value))?;
        }
        Ok(())
    }
}
