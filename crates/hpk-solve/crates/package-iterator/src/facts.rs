// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::path::PathBuf;
use std::sync::Arc;

use hpk_config::Config;
use hpk_schema::foundation::variant::VariantMap;
use hpk_schema::foundation::version::Version;
use hpk_schema::foundation::version_range::{
    VersionConstraint,
    VersionRange,
    parse_version_constraint,
};
use hpk_schema::{NodeSpec, Package, Spec};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./facts_test.rs"]
mod facts_test;

/// A configured installation that may stand in for a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalFact {
    /// The normalized spec of the installation, with an exact version.
    pub spec: NodeSpec,
    pub version: Version,
    pub prefix: PathBuf,
}

impl ExternalFact {
    /// The attributes of this external that `requirement` rejects,
    /// as a spec naming only those, eg: `quantum-espresso~veritas`
    pub fn unsatisfied_parts(&self, requirement: &NodeSpec) -> NodeSpec {
        let mut parts = NodeSpec {
            name: self.spec.name.clone(),
            ..Default::default()
        };
        if !requirement.versions.contains(&self.version) {
            parts.versions = self.spec.versions.clone();
        }
        for (name, wanted) in requirement.variants.iter() {
            if let Some(have) = self.spec.variants.get(name) {
                if !wanted.is_satisfied_by(have) {
                    parts.variants.insert(name.clone(), have.clone());
                }
            }
        }
        if let (Some(want), Some(have)) = (&requirement.compiler, &self.spec.compiler) {
            if !want.intersects(have) {
                parts.compiler = Some(have.clone());
            }
        }
        if !requirement.arch.intersects(&self.spec.arch) {
            parts.arch = self.spec.arch.clone();
        }
        parts
    }
}

/// Everything known about one package before solving: its
/// definition and how the configuration says it should be chosen.
#[derive(Clone, Debug)]
pub struct PackageFacts {
    pub package: Arc<Package>,
    pub buildable: bool,
    pub externals: Vec<ExternalFact>,
    /// Preferred versions, best first.
    pub version_preferences: Vec<VersionConstraint>,
    /// Preferred values for variants that are not requested.
    pub variant_preferences: VariantMap,
}

impl PackageFacts {
    /// Collect the facts about a package from its definition and
    /// the configured package settings.
    pub fn new(package: Arc<Package>, config: &Config) -> Result<Self> {
        let name = package.name.as_str();
        let mut externals = Vec::new();
        for entry in config.externals(name) {
            externals.push(parse_external(&package, &entry.spec, entry.prefix.clone())?);
        }

        let version_preferences = config
            .version_preferences(name)
            .iter()
            .map(|value| {
                parse_version_constraint(value).map_err(|err| Error::InvalidPreference {
                    package: name.to_owned(),
                    value: value.clone(),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut variant_preferences = VariantMap::default();
        if let Some(value) = config.variant_preferences(name) {
            let spec = Spec::parse(value).map_err(|err| Error::InvalidPreference {
                package: name.to_owned(),
                value: value.to_owned(),
                reason: err.to_string(),
            })?;
            // package-wide preferences name variants that many
            // packages do not have, those are ignored
            for (variant, value) in spec.root().variants.iter() {
                let Some(def) = package.variant(variant) else {
                    continue;
                };
                match def.normalize(value) {
                    Ok(value) => {
                        variant_preferences.insert(variant.clone(), value);
                    }
                    Err(reason) => {
                        tracing::warn!("ignoring preferred value for {name} {variant}: {reason}");
                    }
                }
            }
        }

        Ok(Self {
            buildable: config.is_buildable(name),
            externals,
            version_preferences,
            variant_preferences,
            package,
        })
    }

    /// Facts for a package with no configured settings.
    pub fn unconfigured(package: Arc<Package>) -> Self {
        Self {
            package,
            buildable: true,
            externals: Vec::new(),
            version_preferences: Vec::new(),
            variant_preferences: VariantMap::default(),
        }
    }
}

fn parse_external(package: &Package, source: &str, prefix: PathBuf) -> Result<ExternalFact> {
    let invalid = |reason: String| Error::InvalidExternal {
        package: package.name.to_string(),
        spec: source.to_owned(),
        reason,
    };
    let spec = Spec::parse(source).map_err(|err| invalid(err.to_string()))?;
    if spec.name() != Some(&package.name) {
        return Err(invalid(format!("it must be named {}", package.name)));
    }
    if !spec.dependencies().is_empty() {
        return Err(invalid("externals cannot have dependencies".to_owned()));
    }
    let node = package
        .normalize_node(spec.root())
        .map_err(|err| invalid(err.to_string()))?;
    // `@1.0` names the installed version just like `@=1.0` here
    let version = match node.versions.ranges() {
        [VersionRange::Exact(v)] => v.clone(),
        [VersionRange::Span {
            lo: Some(lo),
            hi: Some(hi),
        }] if lo == hi => lo.clone(),
        _ => return Err(invalid("a single version is required".to_owned())),
    };
    Ok(ExternalFact {
        spec: node,
        version,
        prefix,
    })
}
