// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use hpk_schema::foundation::Compatibility;
use hpk_schema::foundation::variant::VariantValue;
use hpk_schema::{DepType, DependencyDef, NodeSpec, PkgName, Spec};
use indexmap::IndexSet;

use crate::{Conflict, ConflictKind, Origin, Requirement, ResolvedNode};

#[cfg(test)]
#[path = "./graph_test.rs"]
mod graph_test;

type ChangeResult = std::result::Result<Arc<State>, Conflict>;

#[derive(Clone, Debug)]
pub enum Change {
    AddRequirement(AddRequirement),
    SetNode(SetNode),
    SetProvider(SetProvider),
    AddEdge(AddEdge),
    DeferDependency(DeferDependency),
    ClearDeferred(ClearDeferred),
}

impl Change {
    pub fn apply(&self, base: &Arc<State>) -> ChangeResult {
        match self {
            Change::AddRequirement(c) => c.apply(base),
            Change::SetNode(c) => c.apply(base),
            Change::SetProvider(c) => c.apply(base),
            Change::AddEdge(c) => Ok(c.apply(base)),
            Change::DeferDependency(c) => Ok(c.apply(base)),
            Change::ClearDeferred(c) => Ok(c.apply(base)),
        }
    }

    pub fn as_decision(&self) -> Decision {
        Decision {
            changes: vec![self.clone()],
            notes: Vec::default(),
        }
    }
}

/// The decision represents a choice made by the solver.
///
/// Each decision connects one state to the next. Applying it fails
/// with a [`Conflict`] when the choice contradicts the state.
#[derive(Clone, Debug, Default)]
pub struct Decision {
    pub changes: Vec<Change>,
    pub notes: Vec<Note>,
}

impl Decision {
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            changes,
            notes: Vec::default(),
        }
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn apply(&self, base: &Arc<State>) -> ChangeResult {
        let mut state = Arc::clone(base);
        for change in self.changes.iter() {
            state = change.apply(&state)?;
        }
        let mut next = state.derive();
        next.depth = base.depth + 1;
        Ok(Arc::new(next))
    }

    pub fn add_notes(&mut self, notes: impl IntoIterator<Item = Note>) {
        self.notes.extend(notes)
    }
}

/// Some additional information left by the solver
#[derive(Clone, Debug)]
pub enum Note {
    SkipCandidate(SkipCandidateNote),
    Other(String),
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Note::SkipCandidate(note) => {
                write!(f, "TRY {} - {}", note.candidate, note.reason)
            }
            Note::Other(msg) => f.write_str(msg),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SkipCandidateNote {
    pub name: PkgName,
    pub candidate: String,
    pub reason: Compatibility,
}

impl SkipCandidateNote {
    pub fn new(name: PkgName, candidate: impl ToString, reason: Compatibility) -> Self {
        Self {
            name,
            candidate: candidate.to_string(),
            reason,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AddRequirement {
    pub requirement: Requirement,
}

impl AddRequirement {
    pub fn new(requirement: Requirement) -> Self {
        Self { requirement }
    }

    pub fn apply(&self, base: &Arc<State>) -> ChangeResult {
        base.check_requirement(&self.requirement)?;
        let req = &self.requirement;
        let mut state = base.derive();
        Arc::make_mut(&mut state.requirements)
            .entry(req.name.clone())
            .or_default()
            .push(req.clone());
        if req.activates {
            Arc::make_mut(&mut state.present).insert(req.name.clone());
        }
        Ok(Arc::new(state))
    }
}

#[derive(Clone, Debug)]
pub struct SetNode {
    pub node: Arc<ResolvedNode>,
    /// The decision that this node was chosen by, which differs
    /// from the node itself for the dependencies of reused specs.
    pub decided_by: PkgName,
}

impl SetNode {
    pub fn new(node: Arc<ResolvedNode>, decided_by: PkgName) -> Self {
        Self { node, decided_by }
    }

    pub fn apply(&self, base: &Arc<State>) -> ChangeResult {
        let name = &self.node.name;
        if let Some(existing) = base.resolved.get(name) {
            if existing.node == self.node {
                return Ok(Arc::clone(base));
            }
            return Err(Conflict::new(
                ConflictKind::AlreadyResolved {
                    node: Arc::clone(&existing.node),
                    requirements: base.requirements(name).to_vec(),
                },
                [self.decided_by.clone(), existing.decided_by.clone()],
            ));
        }
        if let Some(unmet) = base
            .requirements(name)
            .iter()
            .find(|r| !self.node.satisfies(&r.constraint))
        {
            return Err(Conflict::new(
                ConflictKind::AlreadyResolved {
                    node: Arc::clone(&self.node),
                    requirements: vec![unmet.clone()],
                },
                [self.decided_by.clone()],
            ));
        }
        let mut state = base.derive();
        Arc::make_mut(&mut state.present).insert(name.clone());
        Arc::make_mut(&mut state.resolved).insert(
            name.clone(),
            Resolution {
                node: Arc::clone(&self.node),
                decided_by: self.decided_by.clone(),
            },
        );
        Ok(Arc::new(state))
    }
}

/// The package chosen to stand in for a virtual package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderChoice {
    pub provider: PkgName,
    /// What the provider declares that it provides, eg: `mpi@:3`
    pub provides: NodeSpec,
}

#[derive(Clone, Debug)]
pub struct SetProvider {
    pub virtual_name: PkgName,
    pub choice: ProviderChoice,
    pub decided_by: PkgName,
}

impl SetProvider {
    pub fn new(virtual_name: PkgName, choice: ProviderChoice, decided_by: PkgName) -> Self {
        Self {
            virtual_name,
            choice,
            decided_by,
        }
    }

    pub fn apply(&self, base: &Arc<State>) -> ChangeResult {
        let name = &self.virtual_name;
        if let Some(existing) = base.providers.get(name) {
            if existing.choice == self.choice {
                return Ok(Arc::clone(base));
            }
            return Err(Conflict::new(
                ConflictKind::Incompatible {
                    name: name.clone(),
                    requirements: base.requirements(name).to_vec(),
                },
                [self.decided_by.clone(), existing.decided_by.clone()],
            ));
        }
        let requirements = base.requirements(name);
        if requirements
            .iter()
            .any(|r| !r.constraint.intersects(&self.choice.provides))
        {
            return Err(Conflict::new(
                ConflictKind::NoProvider {
                    name: name.clone(),
                    requirements: requirements.to_vec(),
                },
                [self.decided_by.clone()],
            ));
        }
        let mut state = base.derive();
        Arc::make_mut(&mut state.present).insert(name.clone());
        Arc::make_mut(&mut state.providers).insert(
            name.clone(),
            ProvidedBy {
                choice: self.choice.clone(),
                decided_by: self.decided_by.clone(),
            },
        );
        Ok(Arc::new(state))
    }
}

/// A dependency from one package to another, or to a virtual package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub parent: PkgName,
    pub child: PkgName,
    pub types: BTreeSet<DepType>,
}

#[derive(Clone, Debug)]
pub struct AddEdge {
    pub edge: Edge,
}

impl AddEdge {
    pub fn new(parent: PkgName, child: PkgName, types: BTreeSet<DepType>) -> Self {
        Self {
            edge: Edge {
                parent,
                child,
                types,
            },
        }
    }

    pub fn apply(&self, base: &Arc<State>) -> Arc<State> {
        let mut state = base.derive();
        let edges = Arc::make_mut(&mut state.edges);
        match edges
            .iter_mut()
            .find(|e| e.parent == self.edge.parent && e.child == self.edge.child)
        {
            Some(existing) => existing.types.extend(self.edge.types.iter().copied()),
            None => edges.push(self.edge.clone()),
        }
        Arc::new(state)
    }
}

/// A dependency whose condition depends on other packages, which
/// can only be checked once they are resolved.
#[derive(Debug)]
pub struct DeferredDependency {
    pub parent: PkgName,
    pub dependency: DependencyDef,
    pub because: Vec<Arc<Origin>>,
}

#[derive(Clone, Debug)]
pub struct DeferDependency {
    pub deferred: Arc<DeferredDependency>,
}

impl DeferDependency {
    pub fn new(deferred: DeferredDependency) -> Self {
        Self {
            deferred: Arc::new(deferred),
        }
    }

    pub fn apply(&self, base: &Arc<State>) -> Arc<State> {
        let mut state = base.derive();
        Arc::make_mut(&mut state.deferred).push(Arc::clone(&self.deferred));
        Arc::new(state)
    }
}

#[derive(Clone, Debug)]
pub struct ClearDeferred {
    pub deferred: Arc<DeferredDependency>,
}

impl ClearDeferred {
    pub fn new(deferred: Arc<DeferredDependency>) -> Self {
        Self { deferred }
    }

    pub fn apply(&self, base: &Arc<State>) -> Arc<State> {
        let mut state = base.derive();
        Arc::make_mut(&mut state.deferred).retain(|d| !Arc::ptr_eq(d, &self.deferred));
        Arc::new(state)
    }
}

#[derive(Clone, Debug)]
struct Resolution {
    node: Arc<ResolvedNode>,
    decided_by: PkgName,
}

#[derive(Clone, Debug)]
struct ProvidedBy {
    choice: ProviderChoice,
    decided_by: PkgName,
}

// `State` is immutable. It should not derive Clone.
#[derive(Debug, Default)]
pub struct State {
    requirements: Arc<BTreeMap<PkgName, Vec<Requirement>>>,
    // The packages and virtual packages in the solution, in the order
    // that they were added. Undecided ones are worked through in
    // this order.
    present: Arc<IndexSet<PkgName>>,
    resolved: Arc<BTreeMap<PkgName, Resolution>>,
    providers: Arc<BTreeMap<PkgName, ProvidedBy>>,
    edges: Arc<Vec<Edge>>,
    deferred: Arc<Vec<Arc<DeferredDependency>>>,
    // How deep is this state?
    pub depth: u64,
}

impl State {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn derive(&self) -> State {
        State {
            requirements: Arc::clone(&self.requirements),
            present: Arc::clone(&self.present),
            resolved: Arc::clone(&self.resolved),
            providers: Arc::clone(&self.providers),
            edges: Arc::clone(&self.edges),
            deferred: Arc::clone(&self.deferred),
            depth: self.depth,
        }
    }

    /// The requirements placed on a package, oldest first.
    pub fn requirements(&self, name: &str) -> &[Requirement] {
        self.requirements
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every requirement in the state, grouped by package name.
    pub fn all_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.values().flatten()
    }

    /// All requirements on a package, merged into one constraint.
    pub fn merged_requirement(&self, name: &PkgName) -> hpk_schema::Result<NodeSpec> {
        let mut merged = NodeSpec::named(name.clone());
        for req in self.requirements(name) {
            merged.constrain(&req.constraint)?;
        }
        Ok(merged)
    }

    /// The decisions that the requirements on a package stem from.
    pub fn sources(&self, name: &str) -> BTreeSet<PkgName> {
        self.requirements(name)
            .iter()
            .flat_map(|r| r.sources.iter().cloned())
            .collect()
    }

    /// The origins of the requirements that brought a package into
    /// the solution, or of all of them if none did.
    pub fn presence_origins(&self, name: &str) -> Vec<Arc<Origin>> {
        let requirements = self.requirements(name);
        let activating: Vec<_> = requirements
            .iter()
            .filter(|r| r.activates)
            .map(|r| Arc::clone(&r.origin))
            .collect();
        if activating.is_empty() {
            requirements.iter().map(|r| Arc::clone(&r.origin)).collect()
        } else {
            activating
        }
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.present.contains(name)
    }

    pub fn present(&self) -> impl Iterator<Item = &PkgName> {
        self.present.iter()
    }

    pub fn node(&self, name: &str) -> Option<&Arc<ResolvedNode>> {
        self.resolved.get(name).map(|r| &r.node)
    }

    /// Every resolved package, by name.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<ResolvedNode>> {
        self.resolved.values().map(|r| &r.node)
    }

    pub fn provider(&self, virtual_name: &str) -> Option<&ProviderChoice> {
        self.providers.get(virtual_name).map(|p| &p.choice)
    }

    /// The decision that settled a package or virtual package.
    pub fn decided_by(&self, name: &str) -> Option<&PkgName> {
        self.resolved
            .get(name)
            .map(|r| &r.decided_by)
            .or_else(|| self.providers.get(name).map(|p| &p.decided_by))
    }

    pub fn is_decided(&self, name: &str) -> bool {
        self.resolved.contains_key(name) || self.providers.contains_key(name)
    }

    /// The next package or virtual package that needs a decision.
    pub fn next_item(&self) -> Option<&PkgName> {
        self.present.iter().find(|name| !self.is_decided(name))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn deferred(&self) -> &[Arc<DeferredDependency>] {
        &self.deferred
    }

    /// The packages that depend on `name`, either directly or through
    /// a virtual package that it provides.
    pub fn parents(&self, name: &str) -> Vec<&PkgName> {
        self.edges
            .iter()
            .filter(|e| {
                e.child == name
                    || self
                        .provider(&e.child)
                        .is_some_and(|choice| choice.provider == name)
            })
            .map(|e| &e.parent)
            .collect()
    }

    /// Follow a virtual package to its provider, if one was chosen.
    pub fn resolve_name<'a>(&'a self, name: &'a PkgName) -> &'a PkgName {
        self.provider(name).map(|c| &c.provider).unwrap_or(name)
    }

    /// Every name reachable through the dependencies of `name`,
    /// including the virtual packages passed through.
    pub fn reachable_from(&self, name: &PkgName) -> BTreeSet<PkgName> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.clone()];
        while let Some(current) = stack.pop() {
            for edge in self.edges.iter().filter(|e| e.parent == current) {
                if seen.insert(edge.child.clone()) {
                    let target = self.resolve_name(&edge.child);
                    if target != &edge.child {
                        seen.insert(target.clone());
                    }
                    stack.push(target.clone());
                }
            }
        }
        seen
    }

    /// Check a condition against a resolved node and its dependencies.
    pub fn condition_holds(&self, node: &ResolvedNode, when: &Spec) -> bool {
        if !node.satisfies(when.root()) {
            return false;
        }
        if when.dependencies().is_empty() {
            return true;
        }
        let reachable = self.reachable_from(&node.name);
        when.dependencies().iter().all(|dep| {
            let Some(name) = dep.name.as_ref() else {
                return false;
            };
            if !reachable.contains(name) {
                return false;
            }
            match (self.node(name), self.provider(name)) {
                (Some(resolved), _) => resolved.satisfies(dep),
                (None, Some(choice)) => choice.provides.intersects(dep),
                (None, None) => false,
            }
        })
    }

    /// Check that a new requirement agrees with what is already known
    /// about its package.
    pub fn check_requirement(&self, new: &Requirement) -> std::result::Result<(), Conflict> {
        let name = &new.name;
        if let Some(resolution) = self.resolved.get(name) {
            if resolution.node.satisfies(&new.constraint) {
                return Ok(());
            }
            return Err(Conflict::new(
                ConflictKind::AlreadyResolved {
                    node: Arc::clone(&resolution.node),
                    requirements: vec![new.clone()],
                },
                [resolution.decided_by.clone()],
            ));
        }
        if let Some(provided) = self.providers.get(name) {
            if provided.choice.provides.intersects(&new.constraint) {
                return Ok(());
            }
            return Err(Conflict::new(
                ConflictKind::NoProvider {
                    name: name.clone(),
                    requirements: vec![new.clone()],
                },
                [provided.decided_by.clone()],
            ));
        }

        let existing = self.requirements(name);
        let mut merged = NodeSpec::named(name.clone());
        let mut consistent = true;
        for req in existing.iter().chain(std::iter::once(new)) {
            if merged.constrain(&req.constraint).is_err() {
                consistent = false;
                break;
            }
        }
        if consistent {
            return Ok(());
        }

        for req in existing {
            if let Some(kind) = classify_pair(name, req, new) {
                return Err(Conflict::new(kind, []));
            }
        }
        let requirements: Vec<_> = existing.iter().chain(std::iter::once(new)).cloned().collect();
        let kind = if existing
            .iter()
            .all(|r| r.constraint.versions.intersects(&new.constraint.versions))
        {
            ConflictKind::Incompatible {
                name: name.clone(),
                requirements,
            }
        } else {
            ConflictKind::Versions {
                name: name.clone(),
                requirements,
            }
        };
        Err(Conflict::new(kind, []))
    }
}

/// Find what makes two requirements on the same package disagree.
fn classify_pair(name: &PkgName, old: &Requirement, new: &Requirement) -> Option<ConflictKind> {
    let (a, b) = (&old.constraint, &new.constraint);
    let requirements = || vec![old.clone(), new.clone()];
    if !a.versions.intersects(&b.versions) {
        return Some(ConflictKind::Versions {
            name: name.clone(),
            requirements: requirements(),
        });
    }
    for (variant, value) in b.variants.iter() {
        let Some(existing) = a.variants.get(variant) else {
            continue;
        };
        let multi =
            matches!(existing, VariantValue::Multi(_)) || matches!(value, VariantValue::Multi(_));
        if existing.merge(value, multi).is_none() {
            return Some(ConflictKind::Variant {
                name: name.clone(),
                variant: variant.clone(),
                requirements: requirements(),
            });
        }
    }
    let compilers_agree = match (&a.compiler, &b.compiler) {
        (Some(x), Some(y)) => x.intersects(y),
        _ => true,
    };
    if !compilers_agree || !a.arch.intersects(&b.arch) {
        return Some(ConflictKind::Incompatible {
            name: name.clone(),
            requirements: requirements(),
        });
    }
    None
}
