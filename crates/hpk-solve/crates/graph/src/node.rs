// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use hpk_schema::foundation::arch::{Arch, ArchConstraint};
use hpk_schema::foundation::compiler::CompilerSpec;
use hpk_schema::foundation::variant::VariantMap;
use hpk_schema::foundation::version::Version;
use hpk_schema::foundation::version_range::VersionConstraint;
use hpk_schema::{ConcreteSpec, NodeAttrs, NodeSpec, PkgName, Spec};

#[cfg(test)]
#[path = "./node_test.rs"]
mod node_test;

/// Why a requirement exists.
///
/// Origins link back to the origins of whatever made them apply, so
/// that a failure can be traced all the way to the user's request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Part of a spec given to the solver.
    Explicit { request: Spec },
    /// Declared by a package that was selected.
    DependsOn {
        parent: PkgName,
        dependency: Spec,
        when: Option<Spec>,
        because: Vec<Arc<Origin>>,
    },
    /// A provider was chosen for a virtual package.
    Provides {
        virtual_name: PkgName,
        provider: PkgName,
        because: Vec<Arc<Origin>>,
    },
}

impl Origin {
    /// The origins that caused this one to apply.
    pub fn because(&self) -> &[Arc<Origin>] {
        match self {
            Origin::Explicit { .. } => &[],
            Origin::DependsOn { because, .. } | Origin::Provides { because, .. } => because,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, Origin::Explicit { .. })
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Explicit { request } => write!(f, "{request} requested explicitly"),
            Origin::DependsOn {
                parent,
                dependency,
                when,
                ..
            } => {
                write!(f, "{parent} depends on {dependency}")?;
                if let Some(when) = when {
                    write!(f, " when {when}")?;
                }
                Ok(())
            }
            Origin::Provides {
                virtual_name,
                provider,
                ..
            } => write!(f, "{virtual_name} is provided by {provider}"),
        }
    }
}

/// A constraint on one package or virtual package, and why it holds.
#[derive(Clone, Debug)]
pub struct Requirement {
    pub name: PkgName,
    pub constraint: NodeSpec,
    pub origin: Arc<Origin>,
    /// The decisions that this requirement stems from. Undoing any
    /// one of them may remove the requirement.
    pub sources: BTreeSet<PkgName>,
    /// Whether this requirement puts the package into the solution,
    /// rather than only constraining it if something else does.
    pub activates: bool,
}

impl Requirement {
    /// A requirement that adds `constraint` to the solution.
    ///
    /// The constraint must be named.
    pub fn new(constraint: NodeSpec, origin: Arc<Origin>) -> hpk_schema::Result<Self> {
        let name = constraint
            .name
            .clone()
            .ok_or_else(|| hpk_schema::Error::InvalidSpec {
                spec: constraint.to_string(),
                message: "requirements must be named".to_owned(),
            })?;
        Ok(Self {
            name,
            constraint,
            origin,
            sources: BTreeSet::new(),
            activates: true,
        })
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = PkgName>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Only constrain the package, do not bring it into the solution.
    pub fn passive(mut self) -> Self {
        self.activates = false;
        self
    }
}

/// Where a resolved node comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeSource {
    /// To be built from source.
    Build,
    /// Provided by an existing installation outside of the store.
    External { prefix: PathBuf },
    /// Already installed, taken as-is with its dependencies.
    Reused { spec: ConcreteSpec },
}

/// A package whose attributes have all been decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedNode {
    pub name: PkgName,
    pub version: Version,
    pub variants: VariantMap,
    pub compiler: CompilerSpec,
    pub arch: Arch,
    pub source: NodeSource,
}

impl ResolvedNode {
    /// Describe an installed node so that it can be reused.
    pub fn reused(spec: &ConcreteSpec) -> Self {
        Self {
            name: spec.name().clone(),
            version: spec.version().clone(),
            variants: spec.variants().clone(),
            compiler: spec.compiler().clone(),
            arch: spec.arch().clone(),
            source: match spec.external() {
                Some(prefix) => NodeSource::External {
                    prefix: prefix.to_owned(),
                },
                None => NodeSource::Reused { spec: spec.clone() },
            },
        }
    }

    /// True if every attribute named by `constraint` holds for this node.
    pub fn satisfies(&self, constraint: &NodeSpec) -> bool {
        constraint.is_satisfied_by(self)
    }

    /// The constraint that only this node satisfies.
    pub fn to_node_spec(&self) -> NodeSpec {
        NodeSpec {
            name: Some(self.name.clone()),
            versions: VersionConstraint::exact(self.version.clone()),
            variants: self.variants.clone(),
            compiler: Some(self.compiler.to_constraint()),
            arch: ArchConstraint::from(&self.arch),
        }
    }

    pub fn is_build(&self) -> bool {
        matches!(self.source, NodeSource::Build)
    }
}

impl NodeAttrs for ResolvedNode {
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

impl std::fmt::Display for ResolvedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}{} %{} arch={}",
            self.name, self.version, self.variants, self.compiler, self.arch
        )
    }
}
