// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod conflict;
mod error;
mod graph;
mod node;

pub use conflict::{Conflict, ConflictKind};
pub use error::{Error, Result};
pub use graph::{
    AddEdge,
    AddRequirement,
    Change,
    ClearDeferred,
    Decision,
    DeferDependency,
    DeferredDependency,
    Edge,
    Note,
    ProviderChoice,
    SetNode,
    SetProvider,
    SkipCandidateNote,
    State,
};
pub use node::{NodeSource, Origin, Requirement, ResolvedNode};
