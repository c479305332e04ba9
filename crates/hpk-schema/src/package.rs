// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::foundation::variant::VariantValue;
use crate::foundation::version::Version;
use crate::{BuildSystem, DepType, Error, NodeSpec, PkgName, Result, Spec, VariantName};

#[cfg(test)]
#[path = "./package_test.rs"]
mod package_test;

/// One known version of a package.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VersionDef {
    pub version: Version,
    /// Chosen ahead of newer versions when nothing else decides.
    #[serde(default, skip_serializing_if = "is_false")]
    pub preferred: bool,
    /// Only used when pinned, or when deprecated versions are allowed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VariantKind {
    #[default]
    Bool,
    Single,
    Multi,
}

/// A build option declared by a package.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: VariantName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<VariantKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<VariantValue>,
    /// The allowed values, any value is allowed when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// The condition under which this variant exists at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Spec>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl VariantDef {
    /// The declared kind, or the one implied by the default and values.
    pub fn kind(&self) -> VariantKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        match &self.default {
            Some(VariantValue::Multi(_)) => VariantKind::Multi,
            Some(VariantValue::Single(s)) if s.parse::<bool>().is_err() => VariantKind::Single,
            _ if !self.values.is_empty() => VariantKind::Single,
            _ => VariantKind::Bool,
        }
    }

    pub fn is_multi(&self) -> bool {
        self.kind() == VariantKind::Multi
    }

    pub fn default_value(&self) -> VariantValue {
        match self.kind() {
            VariantKind::Bool => VariantValue::Bool(
                self.default
                    .as_ref()
                    .and_then(VariantValue::as_bool)
                    .unwrap_or(false),
            ),
            VariantKind::Single => match &self.default {
                Some(value) => VariantValue::Single(
                    value.values().into_iter().next().unwrap_or_default(),
                ),
                None => VariantValue::Single(self.values.first().cloned().unwrap_or_default()),
            },
            VariantKind::Multi => VariantValue::Multi(
                self.default
                    .as_ref()
                    .map(VariantValue::values)
                    .unwrap_or_default(),
            ),
        }
    }

    fn is_allowed(&self, value: &str) -> bool {
        self.values.is_empty() || self.values.iter().any(|v| v == value)
    }

    /// Bring a requested value into the canonical form for this variant.
    pub fn normalize(&self, value: &VariantValue) -> std::result::Result<VariantValue, String> {
        match self.kind() {
            VariantKind::Bool => value
                .as_bool()
                .map(VariantValue::Bool)
                .ok_or_else(|| "expected a boolean value".to_owned()),
            VariantKind::Single => {
                let values = value.values();
                let mut iter = values.iter();
                let (Some(single), None) = (iter.next(), iter.next()) else {
                    return Err("multiple values given for a single-valued variant".to_owned());
                };
                if !self.is_allowed(single) {
                    return Err(format!("allowed values are {}", self.values.join(", ")));
                }
                Ok(VariantValue::Single(single.clone()))
            }
            VariantKind::Multi => {
                if let Some(bad) = value.values().iter().find(|v| !self.is_allowed(v)) {
                    return Err(format!(
                        "'{bad}' is not one of {}",
                        self.values.join(", ")
                    ));
                }
                Ok(VariantValue::Multi(value.values()))
            }
        }
    }

    /// Values to try for this variant when it is not requested, best first.
    pub fn candidates(&self) -> Vec<VariantValue> {
        let default = self.default_value();
        match (&default, self.kind()) {
            (VariantValue::Bool(b), _) => vec![VariantValue::Bool(*b), VariantValue::Bool(!*b)],
            (_, VariantKind::Single) => std::iter::once(default.clone())
                .chain(
                    self.values
                        .iter()
                        .map(|v| VariantValue::Single(v.clone()))
                        .filter(|v| v != &default),
                )
                .collect(),
            _ => vec![default],
        }
    }
}

#[derive(Deserialize)]
struct RawDependency {
    spec: Spec,
    #[serde(default)]
    when: Option<Spec>,
    #[serde(default = "DepType::defaults", rename = "type")]
    types: BTreeSet<DepType>,
}

/// A `depends_on` declaration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DependencyDef {
    #[serde(skip_serializing)]
    name: PkgName,
    pub spec: Spec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<Spec>,
    #[serde(rename = "type")]
    pub types: BTreeSet<DepType>,
}

impl DependencyDef {
    pub fn new(
        spec: Spec,
        when: Option<Spec>,
        types: impl IntoIterator<Item = DepType>,
    ) -> Result<Self> {
        let name = named(&spec, "dependency")?;
        let mut types: BTreeSet<_> = types.into_iter().collect();
        if types.is_empty() {
            types = DepType::defaults();
        }
        Ok(Self {
            name,
            spec,
            when,
            types,
        })
    }

    /// The name of the package depended upon.
    pub fn name(&self) -> &PkgName {
        &self.name
    }
}

impl<'de> Deserialize<'de> for DependencyDef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawDependency::deserialize(deserializer)?;
        DependencyDef::new(raw.spec, raw.when, raw.types).map_err(serde::de::Error::custom)
    }
}

/// A combination of constraints that can never be built.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConflictDef {
    pub spec: Spec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Spec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

#[derive(Deserialize)]
struct RawProvides {
    spec: Spec,
    #[serde(default)]
    when: Option<Spec>,
}

/// A `provides` declaration, naming a virtual package.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProvidesDef {
    #[serde(skip_serializing)]
    name: PkgName,
    pub spec: Spec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<Spec>,
}

impl ProvidesDef {
    pub fn new(spec: Spec, when: Option<Spec>) -> Result<Self> {
        let name = named(&spec, "provided virtual")?;
        Ok(Self { name, spec, when })
    }

    /// The name of the virtual package.
    pub fn name(&self) -> &PkgName {
        &self.name
    }
}

impl<'de> Deserialize<'de> for ProvidesDef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawProvides::deserialize(deserializer)?;
        ProvidesDef::new(raw.spec, raw.when).map_err(serde::de::Error::custom)
    }
}

fn named(spec: &Spec, what: &str) -> Result<PkgName> {
    spec.name().cloned().ok_or_else(|| Error::InvalidSpec {
        spec: spec.to_string(),
        message: format!("a {what} must be named"),
    })
}

/// A package definition: what can be built and how it may be configured.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: PkgName,
    #[serde(default)]
    pub build_system: BuildSystem,
    #[serde(default)]
    pub versions: Vec<VersionDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<DependencyDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<ProvidesDef>,
}

impl Package {
    /// Load and validate a package from yaml text.
    pub fn from_yaml<S: AsRef<str>>(source: S) -> Result<Self> {
        let package: Package = serde_yaml::from_str(source.as_ref())
            .map_err(|err| Error::String(format!("invalid package yaml: {err}")))?;
        package.validate()?;
        Ok(package)
    }

    /// Load and validate a package file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|err| Error::FileOpenError(path.to_owned(), err))?;
        let package: Package = serde_yaml::from_reader(file)
            .map_err(|err| Error::InvalidPackageFile(path.to_owned(), err))?;
        package.validate()?;
        Ok(package)
    }

    /// Check the internal consistency of this definition.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidPackage(self.name.clone(), msg));

        let mut seen = HashSet::new();
        for def in self.versions.iter() {
            if !seen.insert(&def.version) {
                return invalid(format!("version {} is listed twice", def.version));
            }
        }

        let mut seen = HashSet::new();
        for def in self.variants.iter() {
            if !seen.insert(&def.name) {
                return invalid(format!("variant '{}' is declared twice", def.name));
            }
            if let Err(msg) = def.normalize(&def.default_value()) {
                return invalid(format!("default of variant '{}': {msg}", def.name));
            }
            self.check_condition(def.when.as_ref())?;
        }

        for dep in self.depends_on.iter() {
            if dep.name() == &self.name {
                return invalid("a package cannot depend on itself".to_owned());
            }
            self.check_condition(dep.when.as_ref())?;
        }
        for conflict in self.conflicts.iter() {
            self.check_condition(Some(&conflict.spec))?;
            self.check_condition(conflict.when.as_ref())?;
        }
        for provided in self.provides.iter() {
            if provided.name() == &self.name {
                return invalid("a package cannot provide itself".to_owned());
            }
            self.check_condition(provided.when.as_ref())?;
        }
        Ok(())
    }

    /// A condition must either be anonymous or name this package.
    fn check_condition(&self, condition: Option<&Spec>) -> Result<()> {
        match condition.and_then(Spec::name) {
            Some(name) if name != &self.name => Err(Error::InvalidPackage(
                self.name.clone(),
                format!("condition on {name} must be written relative to {}", self.name),
            )),
            _ => Ok(()),
        }
    }

    pub fn variant(&self, name: &str) -> Option<&VariantDef> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn version(&self, version: &Version) -> Option<&VersionDef> {
        self.versions.iter().find(|v| &v.version == version)
    }

    /// Every package that may appear as a direct dependency, under any condition.
    pub fn possible_dependencies(&self) -> BTreeSet<&PkgName> {
        self.depends_on.iter().map(DependencyDef::name).collect()
    }

    /// The virtual packages this package can provide, under any condition.
    pub fn provided_virtuals(&self) -> BTreeSet<&PkgName> {
        self.provides.iter().map(ProvidesDef::name).collect()
    }

    /// Rewrite the variants of a node constraint into their canonical forms,
    /// failing on unknown variants and disallowed values.
    pub fn normalize_node(&self, node: &NodeSpec) -> Result<NodeSpec> {
        let mut normalized = node.clone();
        for (name, value) in node.variants.iter() {
            let def = self.variant(name).ok_or_else(|| Error::UnknownVariant {
                package: self.name.clone(),
                variant: name.clone(),
            })?;
            let value = def
                .normalize(value)
                .map_err(|message| Error::InvalidVariantValue {
                    package: self.name.clone(),
                    variant: name.clone(),
                    value: value.values().iter().join(","),
                    message,
                })?;
            normalized.variants.insert(name.clone(), value);
        }
        Ok(normalized)
    }
}
