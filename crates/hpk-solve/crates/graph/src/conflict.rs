// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::BTreeSet;
use std::sync::Arc;

use hpk_schema::{NodeSpec, PkgName, VariantName};

use crate::{Origin, Requirement, ResolvedNode};

/// The reason that a set of decisions cannot all hold.
#[derive(Clone, Debug)]
pub enum ConflictKind {
    /// Two requirements ask for versions that do not overlap.
    Versions {
        name: PkgName,
        requirements: Vec<Requirement>,
    },
    /// A single-valued variant was given two different values.
    Variant {
        name: PkgName,
        variant: VariantName,
        requirements: Vec<Requirement>,
    },
    /// Requirements that disagree on compiler or architecture.
    Incompatible {
        name: PkgName,
        requirements: Vec<Requirement>,
    },
    /// A requirement arrived after the package was already resolved
    /// to something that does not satisfy it.
    AlreadyResolved {
        node: Arc<ResolvedNode>,
        requirements: Vec<Requirement>,
    },
    /// The package may not be built and none of its externals fit.
    NotBuildable {
        name: PkgName,
        /// The attributes of each external that were not satisfied.
        externals: Vec<NodeSpec>,
        requirements: Vec<Requirement>,
    },
    NoVersion {
        name: PkgName,
        requirements: Vec<Requirement>,
    },
    NoCompiler {
        name: PkgName,
        requirements: Vec<Requirement>,
    },
    NoProvider {
        name: PkgName,
        requirements: Vec<Requirement>,
    },
    /// Every candidate for the package was rejected.
    NoCandidate {
        name: PkgName,
        reasons: Vec<String>,
        requirements: Vec<Requirement>,
    },
    /// A declared conflict of a package applies to the solution.
    PackageConflict {
        node: Arc<ResolvedNode>,
        description: String,
        requirements: Vec<Requirement>,
    },
    /// A dependency was requested explicitly, but nothing depends on it.
    NotADependency {
        name: PkgName,
        requirements: Vec<Requirement>,
    },
}

/// A failure found while solving, and the decisions it stems from.
#[derive(Clone, Debug)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Decisions that, if changed, might avoid this conflict.
    pub items: BTreeSet<PkgName>,
}

impl Conflict {
    /// Create a conflict caused by the given requirements, plus any
    /// additional decisions.
    pub fn new(kind: ConflictKind, extra: impl IntoIterator<Item = PkgName>) -> Self {
        let mut items: BTreeSet<PkgName> = kind
            .requirements()
            .iter()
            .flat_map(|r| r.sources.iter().cloned())
            .collect();
        items.extend(extra);
        Self { kind, items }
    }

    /// True if any other choice for `item` would run into this same
    /// conflict when building from source.
    ///
    /// This holds when the only requirements coming from `item` are its
    /// unconditional dependencies, which every build of it declares.
    pub fn is_build_invariant(&self, item: &PkgName) -> bool {
        if let ConflictKind::AlreadyResolved { node, .. } | ConflictKind::PackageConflict { node, .. } =
            &self.kind
        {
            if &node.name == item {
                return false;
            }
        }
        let mut from_item = self
            .kind
            .requirements()
            .iter()
            .filter(|r| r.sources.contains(item))
            .peekable();
        from_item.peek().is_some()
            && from_item.all(|r| {
                r.sources.len() == 1
                    && matches!(
                        r.origin.as_ref(),
                        Origin::DependsOn { parent, when: None, .. } if parent == item
                    )
            })
    }
}

impl ConflictKind {
    /// The package or virtual package that this conflict is about.
    pub fn name(&self) -> &PkgName {
        match self {
            ConflictKind::Versions { name, .. }
            | ConflictKind::Variant { name, .. }
            | ConflictKind::Incompatible { name, .. }
            | ConflictKind::NotBuildable { name, .. }
            | ConflictKind::NoVersion { name, .. }
            | ConflictKind::NoCompiler { name, .. }
            | ConflictKind::NoProvider { name, .. }
            | ConflictKind::NoCandidate { name, .. }
            | ConflictKind::NotADependency { name, .. } => name,
            ConflictKind::AlreadyResolved { node, .. }
            | ConflictKind::PackageConflict { node, .. } => &node.name,
        }
    }

    /// The requirements involved, oldest first.
    pub fn requirements(&self) -> &[Requirement] {
        match self {
            ConflictKind::Versions { requirements, .. }
            | ConflictKind::Variant { requirements, .. }
            | ConflictKind::Incompatible { requirements, .. }
            | ConflictKind::AlreadyResolved { requirements, .. }
            | ConflictKind::NotBuildable { requirements, .. }
            | ConflictKind::NoVersion { requirements, .. }
            | ConflictKind::NoCompiler { requirements, .. }
            | ConflictKind::NoProvider { requirements, .. }
            | ConflictKind::NoCandidate { requirements, .. }
            | ConflictKind::PackageConflict { requirements, .. }
            | ConflictKind::NotADependency { requirements, .. } => requirements,
        }
    }
}
