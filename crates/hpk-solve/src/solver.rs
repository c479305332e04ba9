// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::mem::take;
use std::sync::Arc;

use hpk_schema::foundation::Compatibility;
use hpk_schema::{ConcreteSpec, DependencyDef, NodeSpec, PkgName, Spec};
use hpk_solve_graph::{
    AddEdge,
    AddRequirement,
    Change,
    ClearDeferred,
    Conflict,
    ConflictKind,
    Decision,
    DeferDependency,
    DeferredDependency,
    NodeSource,
    Note,
    Origin,
    ProviderChoice,
    Requirement,
    ResolvedNode,
    SetNode,
    SetProvider,
    SkipCandidateNote,
    State,
};
use hpk_solve_package_iterator::{
    BuildCandidate,
    BuildIterator,
    Candidate,
    PackageIterator,
    PromotionPatterns,
    external_candidates,
    ordered_versions,
};
use hpk_solve_validation::{ValidatorT, Validators, default_validators};
use itertools::Itertools;

use crate::{Error, Problem, Result, explain};

#[cfg(test)]
#[path = "./solver_test.rs"]
mod solver_test;

/// One way to provide a virtual package.
#[derive(Clone, Debug)]
struct ProviderOption {
    choice: ProviderChoice,
    /// The condition on the provider under which it provides.
    when: Option<Spec>,
}

#[derive(Debug)]
enum Options {
    Package(PackageIterator),
    Providers(VecDeque<ProviderOption>),
    Exhausted,
}

/// The choices left for one package or virtual package, and what
/// went wrong with the ones already tried.
#[derive(Debug)]
struct Frame {
    item: PkgName,
    /// The state before any choice was made for `item`.
    base: Arc<State>,
    options: Options,
    /// Earlier decisions that the failures below depend on.
    conflict_set: BTreeSet<PkgName>,
    failures: Vec<Conflict>,
    /// Candidates turned down by a validator.
    rejections: Vec<String>,
    notes: Vec<Note>,
}

impl Frame {
    fn new(item: PkgName, base: Arc<State>) -> Self {
        Self {
            item,
            base,
            options: Options::Exhausted,
            conflict_set: BTreeSet::new(),
            failures: Vec::new(),
            rejections: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn record(&mut self, conflict: Conflict) {
        tracing::trace!(
            item = %self.item,
            about = %conflict.kind.name(),
            items = %conflict.items.iter().join(", "),
            "conflict"
        );
        self.conflict_set.extend(
            conflict
                .items
                .iter()
                .filter(|name| *name != &self.item)
                .cloned(),
        );
        self.failures.push(conflict);
    }

    /// Leave no options, for when it's known up front that none can work.
    fn fail(&mut self, kind: ConflictKind) {
        self.options = Options::Exhausted;
        self.record(Conflict::new(kind, []));
    }
}

enum Finalized {
    Solved(Vec<ConcreteSpec>),
    /// More packages came into the solution, so solving goes on.
    Progress(Arc<State>),
    Conflict(Conflict),
}

/// Finds one concrete spec for every request of a [`Problem`].
///
/// The search decides one package or virtual package at a time, in the
/// order that they come into the solution, and jumps back to the most
/// recent decision involved when it runs out of choices.
pub struct Solver {
    problem: Problem,
    validators: Vec<Validators>,
    // For counting the number of candidates tried during the solve
    steps: u64,
}

impl Solver {
    pub fn new(problem: Problem) -> Self {
        let validators = default_validators(problem.config.concretizer.allow_deprecated);
        Self {
            problem,
            validators,
            steps: 0,
        }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// The number of candidates tried so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Solve the problem, returning one concrete spec per request,
    /// in the order that they were requested.
    pub fn solve(&mut self) -> Result<Vec<ConcreteSpec>> {
        let mut state = self.initial_state()?;
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            if let Some(item) = state.next_item().cloned() {
                let frame = self.open_frame(&item, &state)?;
                stack.push(frame);
            } else {
                match self.finalize(&state)? {
                    Finalized::Solved(specs) => {
                        tracing::debug!(steps = self.steps, "solved");
                        return Ok(specs);
                    }
                    Finalized::Progress(next) => {
                        state = next;
                        continue;
                    }
                    Finalized::Conflict(mut conflict) => {
                        if matches!(conflict.kind, ConflictKind::NotADependency { .. }) {
                            // any decision could have brought the dependency in
                            conflict
                                .items
                                .extend(stack.iter().map(|f| f.item.clone()));
                        }
                        record_failure(&mut stack, conflict)?;
                    }
                }
            }
            state = self.advance(&mut stack)?;
        }
    }

    fn initial_state(&self) -> Result<Arc<State>> {
        let mut changes = Vec::new();
        for request in self.problem.requests.iter() {
            let origin = Arc::new(Origin::Explicit {
                request: request.spec.clone(),
            });
            let root = Requirement::new(request.normalized.root().clone(), Arc::clone(&origin))?;
            changes.push(Change::AddRequirement(AddRequirement::new(root)));
            for dep in request.normalized.dependencies() {
                let dep = Requirement::new(dep.clone(), Arc::clone(&origin))?.passive();
                changes.push(Change::AddRequirement(AddRequirement::new(dep)));
            }
        }
        Decision::new(changes)
            .apply(&State::empty())
            .map_err(|conflict| Error::Unsatisfiable(explain(&[conflict])))
    }

    fn count_step(&mut self) -> Result<()> {
        self.steps += 1;
        let limit = self.problem.config.concretizer.max_steps;
        if self.steps > limit {
            return Err(Error::SolverInterrupted(format!(
                "gave up after trying {limit} candidates"
            )));
        }
        Ok(())
    }

    /// Collect the choices for `item` in the given state, best first.
    fn open_frame(&self, item: &PkgName, state: &Arc<State>) -> Result<Frame> {
        let mut frame = Frame::new(item.clone(), Arc::clone(state));
        let requirement = state.merged_requirement(item)?;

        if let Some(providers) = self.problem.virtuals.get(item) {
            let preferences =
                PromotionPatterns::new(self.problem.config.provider_preferences(item));
            let options: VecDeque<ProviderOption> = providers
                .iter()
                .flat_map(|package| {
                    package
                        .provides
                        .iter()
                        .filter(|def| def.name() == item && def.spec.root().intersects(&requirement))
                        .map(|def| ProviderOption {
                            choice: ProviderChoice {
                                provider: package.name.clone(),
                                provides: def.spec.root().clone(),
                            },
                            when: def.when.clone(),
                        })
                })
                .sorted_by_cached_key(|option| {
                    let provider = &option.choice.provider;
                    let wanted =
                        state.is_present(provider) || !state.requirements(provider).is_empty();
                    (
                        !wanted,
                        preferences.rank(provider).unwrap_or(usize::MAX),
                        provider.clone(),
                    )
                })
                .collect();
            tracing::debug!(
                "{item}: providers [{}]",
                options.iter().map(|o| &o.choice.provider).join(", ")
            );
            if options.is_empty() {
                frame.fail(ConflictKind::NoProvider {
                    name: item.clone(),
                    requirements: state.requirements(item).to_vec(),
                });
            } else {
                frame.options = Options::Providers(options);
            }
            return Ok(frame);
        }

        let facts = self
            .problem
            .facts
            .get(item)
            .ok_or_else(|| Error::UnknownPackage(item.clone()))?;
        let parent = state
            .parents(item)
            .into_iter()
            .find_map(|name| state.node(name));
        let arch = requirement
            .arch
            .complete(parent.map(|p| &p.arch).unwrap_or(&self.problem.host));
        let compilers = self.problem.compilers.compilers_for(
            &arch,
            requirement.compiler.as_ref(),
            self.problem.config.compiler_preferences(item),
            parent.map(|p| &p.compiler),
        );
        let versions = ordered_versions(
            facts,
            &requirement,
            self.problem.config.concretizer.allow_deprecated,
        );
        let reusable: Vec<ConcreteSpec> = self
            .problem
            .reusable
            .get(item)
            .into_iter()
            .flatten()
            .filter(|spec| spec.satisfies_node(&requirement))
            .cloned()
            .collect();
        // an external may have been built by any known compiler
        let external_compilers = if compilers.is_empty() {
            self.problem.compilers.all_specs()
        } else {
            compilers.clone()
        };
        let externals = external_candidates(facts, &requirement, &external_compilers, &arch);

        if reusable.is_empty() && externals.is_empty() {
            let requirements = state.requirements(item).to_vec();
            let kind = if !facts.buildable {
                Some(ConflictKind::NotBuildable {
                    name: item.clone(),
                    externals: facts
                        .externals
                        .iter()
                        .map(|e| e.unsatisfied_parts(&requirement))
                        .collect(),
                    requirements,
                })
            } else if versions.is_empty() {
                Some(ConflictKind::NoVersion {
                    name: item.clone(),
                    requirements,
                })
            } else if compilers.is_empty() {
                Some(ConflictKind::NoCompiler {
                    name: item.clone(),
                    requirements,
                })
            } else {
                None
            };
            if let Some(kind) = kind {
                frame.fail(kind);
                return Ok(frame);
            }
        }

        let builds = facts
            .buildable
            .then(|| BuildIterator::new(facts, &requirement, versions, compilers, arch));
        frame.options = Options::Package(PackageIterator::new(reusable, externals, builds));
        Ok(frame)
    }

    /// Make the next decision, stepping back as far as needed.
    fn advance(&mut self, stack: &mut Vec<Frame>) -> Result<Arc<State>> {
        loop {
            let Some(top) = stack.last_mut() else {
                return Err(Error::String("no decision left to change".to_owned()));
            };
            if let Some(state) = self.next_decision(top)? {
                return Ok(state);
            }
            backjump(stack)?;
        }
    }

    /// Try the remaining options of a frame until one applies.
    fn next_decision(&mut self, frame: &mut Frame) -> Result<Option<Arc<State>>> {
        loop {
            let candidate = match &mut frame.options {
                Options::Exhausted => return Ok(None),
                Options::Providers(options) => {
                    let Some(option) = options.pop_front() else {
                        return Ok(None);
                    };
                    self.count_step()?;
                    let decision = self.provider_decision(&frame.item, &frame.base, &option)?;
                    match decision.apply(&frame.base) {
                        Ok(state) => {
                            tracing::debug!(
                                "{} {} provided by {}",
                                ".".repeat(frame.base.depth as usize),
                                frame.item,
                                option.choice.provider
                            );
                            return Ok(Some(state));
                        }
                        Err(conflict) => {
                            frame.record(conflict);
                            continue;
                        }
                    }
                }
                Options::Package(candidates) => match candidates.next() {
                    Some(candidate) => candidate,
                    None => return Ok(None),
                },
            };
            self.count_step()?;

            let facts = self
                .problem
                .facts
                .get(&frame.item)
                .ok_or_else(|| Error::UnknownPackage(frame.item.clone()))?;
            let mut compat = Compatibility::Compatible;
            for validator in self.validators.iter() {
                compat = validator.validate_candidate(&frame.base, facts, &candidate)?;
                if !compat.is_ok() {
                    break;
                }
            }
            if let Compatibility::Incompatible(reason) = &compat {
                tracing::trace!("{} TRY {candidate} - {reason}", frame.item);
                frame.rejections.push(format!("{candidate}: {reason}"));
                frame.notes.push(Note::SkipCandidate(SkipCandidateNote::new(
                    frame.item.clone(),
                    &candidate,
                    compat.clone(),
                )));
                continue;
            }

            let mut decision = self.candidate_decision(&frame.item, &frame.base, &candidate)?;
            decision.add_notes(take(&mut frame.notes));
            match decision.apply(&frame.base) {
                Ok(state) => {
                    tracing::debug!(
                        "{} {candidate}",
                        ".".repeat(frame.base.depth as usize)
                    );
                    for note in decision.notes.iter() {
                        tracing::trace!("{note}");
                    }
                    return Ok(Some(state));
                }
                Err(conflict) => {
                    if candidate.is_build() && conflict.is_build_invariant(&frame.item) {
                        tracing::trace!(
                            item = %frame.item,
                            "every build would fail the same way, skipping the rest"
                        );
                        if let Options::Package(candidates) = &mut frame.options {
                            candidates.skip_builds();
                        }
                    }
                    frame.record(conflict);
                }
            }
        }
    }

    fn provider_decision(
        &self,
        item: &PkgName,
        base: &State,
        option: &ProviderOption,
    ) -> Result<Decision> {
        let provider = &option.choice.provider;
        let mut constraint = match &option.when {
            Some(when) => when.root().clone(),
            None => NodeSpec::default(),
        };
        constraint.name = Some(provider.clone());
        let constraint = self.problem.normalize(&constraint)?;
        let origin = Arc::new(Origin::Provides {
            virtual_name: item.clone(),
            provider: provider.clone(),
            because: base.presence_origins(item),
        });
        let requirement = Requirement::new(constraint, origin)?.with_sources([item.clone()]);
        Ok(Decision::new(vec![
            Change::SetProvider(SetProvider::new(
                item.clone(),
                option.choice.clone(),
                item.clone(),
            )),
            Change::AddRequirement(AddRequirement::new(requirement)),
        ]))
    }

    fn candidate_decision(
        &self,
        item: &PkgName,
        base: &State,
        candidate: &Candidate,
    ) -> Result<Decision> {
        match candidate {
            Candidate::Reuse(spec) => Ok(reuse_decision(item, base, spec)),
            Candidate::External { node, prefix } => {
                let node = resolve(
                    node,
                    NodeSource::External {
                        prefix: prefix.clone(),
                    },
                );
                Ok(Change::SetNode(SetNode::new(Arc::new(node), item.clone())).as_decision())
            }
            Candidate::Build(node) => self.build_decision(item, base, node),
        }
    }

    /// Select a build from source, adding the dependencies that apply to it.
    fn build_decision(
        &self,
        item: &PkgName,
        base: &State,
        node: &BuildCandidate,
    ) -> Result<Decision> {
        let facts = self
            .problem
            .facts
            .get(item)
            .ok_or_else(|| Error::UnknownPackage(item.clone()))?;
        let resolved = Arc::new(resolve(node, NodeSource::Build));
        let mut decision = Decision::new(vec![Change::SetNode(SetNode::new(
            Arc::clone(&resolved),
            item.clone(),
        ))]);
        for dep in facts.package.depends_on.iter() {
            match &dep.when {
                Some(when) if !resolved.satisfies(when.root()) => continue,
                // conditions on other packages wait until those are decided
                Some(when) if !when.dependencies().is_empty() => {
                    decision.push(Change::DeferDependency(DeferDependency::new(
                        DeferredDependency {
                            parent: item.clone(),
                            dependency: dep.clone(),
                            because: because(base, item, Some(when)),
                        },
                    )));
                }
                when => {
                    let because = because(base, item, when.as_ref());
                    for change in self.dependency_changes(item, dep, because, [item.clone()])? {
                        decision.push(change);
                    }
                }
            }
        }
        Ok(decision)
    }

    /// The changes that add one dependency of `parent` to the solution.
    fn dependency_changes(
        &self,
        parent: &PkgName,
        dep: &DependencyDef,
        because: Vec<Arc<Origin>>,
        sources: impl IntoIterator<Item = PkgName>,
    ) -> Result<Vec<Change>> {
        let sources: BTreeSet<PkgName> = sources.into_iter().collect();
        let origin = Arc::new(Origin::DependsOn {
            parent: parent.clone(),
            dependency: dep.spec.clone(),
            when: dep.when.clone(),
            because,
        });
        let root = self.problem.normalize(dep.spec.root())?;
        let mut changes = vec![Change::AddRequirement(AddRequirement::new(
            Requirement::new(root, Arc::clone(&origin))?.with_sources(sources.iter().cloned()),
        ))];
        for sub in dep.spec.dependencies() {
            let sub = self.problem.normalize(sub)?;
            changes.push(Change::AddRequirement(AddRequirement::new(
                Requirement::new(sub, Arc::clone(&origin))?
                    .with_sources(sources.iter().cloned())
                    .passive(),
            )));
        }
        changes.push(Change::AddEdge(AddEdge::new(
            parent.clone(),
            dep.name().clone(),
            dep.types.clone(),
        )));
        Ok(changes)
    }

    /// Check what can only be checked once every package is decided.
    fn finalize(&self, state: &Arc<State>) -> Result<Finalized> {
        for deferred in state.deferred() {
            let Some(node) = state.node(&deferred.parent) else {
                continue;
            };
            let Some(when) = &deferred.dependency.when else {
                continue;
            };
            if !state.condition_holds(node, when) {
                continue;
            }
            tracing::debug!(
                "{} depends on {} when {when}",
                deferred.parent,
                deferred.dependency.spec
            );
            let mut sources = BTreeSet::from([deferred.parent.clone()]);
            sources.extend(deciders(state, when));
            let mut changes = vec![Change::ClearDeferred(ClearDeferred::new(Arc::clone(
                deferred,
            )))];
            changes.extend(self.dependency_changes(
                &deferred.parent,
                &deferred.dependency,
                deferred.because.clone(),
                sources,
            )?);
            return Ok(match Decision::new(changes).apply(state) {
                Ok(next) => Finalized::Progress(next),
                Err(conflict) => Finalized::Conflict(conflict),
            });
        }

        for node in state.nodes() {
            let Some(facts) = self.problem.facts.get(&node.name) else {
                continue;
            };
            for def in facts.package.conflicts.iter() {
                let mentions_dependencies = !def.spec.dependencies().is_empty()
                    || def
                        .when
                        .as_ref()
                        .is_some_and(|w| !w.dependencies().is_empty());
                if !mentions_dependencies {
                    continue;
                }
                let mut condition = def.spec.clone();
                if let Some(when) = &def.when {
                    if condition.constrain(when).is_err() {
                        continue;
                    }
                }
                if !state.condition_holds(node, &condition) {
                    continue;
                }
                let mut items: BTreeSet<PkgName> =
                    state.decided_by(&node.name).cloned().into_iter().collect();
                items.extend(deciders(state, &condition));
                let description = match &def.msg {
                    Some(msg) => msg.clone(),
                    None => format!("conflicts with '{}'", def.spec),
                };
                return Ok(Finalized::Conflict(Conflict::new(
                    ConflictKind::PackageConflict {
                        node: Arc::clone(node),
                        description,
                        requirements: state.requirements(&node.name).to_vec(),
                    },
                    items,
                )));
            }
        }

        for request in self.problem.requests.iter() {
            let Some(root) = request.normalized.name() else {
                continue;
            };
            let reachable = state.reachable_from(state.resolve_name(root));
            for dep in request.normalized.dependencies() {
                let Some(name) = &dep.name else {
                    continue;
                };
                if !reachable.contains(name) {
                    return Ok(Finalized::Conflict(Conflict::new(
                        ConflictKind::NotADependency {
                            name: name.clone(),
                            requirements: state.requirements(name).to_vec(),
                        },
                        [],
                    )));
                }
            }
        }

        let mut memo = BTreeMap::new();
        let mut roots = Vec::with_capacity(self.problem.requests.len());
        for request in self.problem.requests.iter() {
            let Some(root) = request.normalized.name() else {
                continue;
            };
            let mut visiting = Vec::new();
            roots.push(build_spec(
                state,
                state.resolve_name(root),
                &mut memo,
                &mut visiting,
            )?);
        }
        Ok(Finalized::Solved(roots))
    }
}

/// Select an installed spec, along with every node below it.
fn reuse_decision(item: &PkgName, base: &State, spec: &ConcreteSpec) -> Decision {
    let mut decision = Decision::default();
    for node in spec.traverse() {
        decision.push(Change::SetNode(SetNode::new(
            Arc::new(ResolvedNode::reused(&node)),
            item.clone(),
        )));
        for edge in node.dependencies() {
            if edge.virtuals.is_empty() {
                decision.push(Change::AddEdge(AddEdge::new(
                    node.name().clone(),
                    edge.spec.name().clone(),
                    edge.types.clone(),
                )));
                continue;
            }
            for virtual_name in edge.virtuals.iter() {
                decision.push(Change::AddEdge(AddEdge::new(
                    node.name().clone(),
                    virtual_name.clone(),
                    edge.types.clone(),
                )));
                let chosen = base.provider(virtual_name).map(|c| &c.provider);
                if chosen == Some(edge.spec.name()) {
                    continue;
                }
                decision.push(Change::SetProvider(SetProvider::new(
                    virtual_name.clone(),
                    ProviderChoice {
                        provider: edge.spec.name().clone(),
                        provides: NodeSpec::named(virtual_name.clone()),
                    },
                    item.clone(),
                )));
            }
        }
    }
    decision
}

fn resolve(node: &BuildCandidate, source: NodeSource) -> ResolvedNode {
    ResolvedNode {
        name: node.name.clone(),
        version: node.version.clone(),
        variants: node.variants.clone(),
        compiler: node.compiler.clone(),
        arch: node.arch.clone(),
        source,
    }
}

/// The origins that a dependency of `item` applies because of: those
/// that brought `item` in, and for a conditional dependency, those
/// that constrain the same attributes as the condition.
fn because(base: &State, item: &PkgName, when: Option<&Spec>) -> Vec<Arc<Origin>> {
    let mut origins = base.presence_origins(item);
    if let Some(condition) = when.map(Spec::root) {
        for requirement in base.requirements(item) {
            let constraint = &requirement.constraint;
            let related = constraint
                .variants
                .keys()
                .any(|name| condition.variants.contains_key(name))
                || (!constraint.versions.is_any() && !condition.versions.is_any())
                || (constraint.compiler.is_some() && condition.compiler.is_some());
            if related {
                origins.push(Arc::clone(&requirement.origin));
            }
        }
    }
    origins.into_iter().unique().collect()
}

/// The decisions that settled the dependencies named in a condition.
fn deciders(state: &State, condition: &Spec) -> BTreeSet<PkgName> {
    let mut items = BTreeSet::new();
    for name in condition.dependencies().iter().filter_map(|d| d.name.as_ref()) {
        items.extend(state.decided_by(name).cloned());
        items.extend(state.decided_by(state.resolve_name(name)).cloned());
    }
    items
}

/// Step back from the frame on top of the stack to the most recent
/// decision that its failures depend on.
fn backjump(stack: &mut Vec<Frame>) -> Result<()> {
    let Some(mut frame) = stack.pop() else {
        return Err(Error::String("no decision left to change".to_owned()));
    };
    if !frame.rejections.is_empty() {
        let conflict = Conflict::new(
            ConflictKind::NoCandidate {
                name: frame.item.clone(),
                reasons: take(&mut frame.rejections),
                requirements: frame.base.requirements(&frame.item).to_vec(),
            },
            [],
        );
        frame.record(conflict);
    }
    let mut set = take(&mut frame.conflict_set);
    set.extend(frame.base.sources(&frame.item));
    set.remove(&frame.item);

    while stack.last().is_some_and(|top| !set.contains(&top.item)) {
        stack.pop();
    }
    let Some(top) = stack.last_mut() else {
        return Err(Error::Unsatisfiable(explain(&frame.failures)));
    };
    tracing::debug!("backjump from {} to {}", frame.item, top.item);
    set.remove(&top.item);
    top.conflict_set.extend(set);
    top.failures.extend(frame.failures);
    Ok(())
}

/// Hand a conflict found in a complete state to the most recent
/// decision involved in it.
fn record_failure(stack: &mut Vec<Frame>, conflict: Conflict) -> Result<()> {
    while stack
        .last()
        .is_some_and(|top| !conflict.items.contains(&top.item))
    {
        stack.pop();
    }
    match stack.last_mut() {
        Some(top) => {
            top.record(conflict);
            Ok(())
        }
        None => Err(Error::Unsatisfiable(explain(&[conflict]))),
    }
}

/// Assemble the concrete DAG below `name`, reusing nodes already built.
fn build_spec(
    state: &State,
    name: &PkgName,
    memo: &mut BTreeMap<PkgName, ConcreteSpec>,
    visiting: &mut Vec<PkgName>,
) -> Result<ConcreteSpec> {
    if let Some(spec) = memo.get(name) {
        return Ok(spec.clone());
    }
    let node = state
        .node(name)
        .ok_or_else(|| Error::String(format!("{name} was never resolved")))?;
    if let NodeSource::Reused { spec } = &node.source {
        memo.insert(name.clone(), spec.clone());
        return Ok(spec.clone());
    }
    if visiting.contains(name) {
        let cycle = visiting
            .iter()
            .skip_while(|n| *n != name)
            .chain(std::iter::once(name))
            .join(" -> ");
        return Err(hpk_solve_graph::Error::DependencyCycle(cycle).into());
    }
    visiting.push(name.clone());

    let mut builder = ConcreteSpec::builder(
        node.name.clone(),
        node.version.clone(),
        node.compiler.clone(),
        node.arch.clone(),
    )
    .with_variants(node.variants.clone());
    if let NodeSource::External { prefix } = &node.source {
        builder = builder.with_external(prefix.clone());
    }
    for edge in state.edges().iter().filter(|e| &e.parent == name) {
        let target = state.resolve_name(&edge.child);
        let virtuals = (target != &edge.child).then(|| edge.child.clone());
        let dependency = build_spec(state, target, memo, visiting)?;
        builder = builder.with_dependency(dependency, edge.types.iter().copied(), virtuals);
    }

    visiting.pop();
    let spec = builder.build()?;
    memo.insert(name.clone(), spec.clone());
    Ok(spec)
}
