// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod build_system;
mod concrete;
mod error;
mod macros;
mod package;
pub mod parsing;
mod repository;
mod spec;

pub use build_system::{Autotools, BuildSystem, BuildSystemT, CMake, Generic, Make, Python};
pub use concrete::{
    ConcreteNode,
    ConcreteSpec,
    ConcreteSpecBuilder,
    DagHash,
    DepType,
    DependencyEdge,
    NodeList,
};
pub use error::{Error, Result};
pub use hpk_schema_foundation as foundation;
pub use hpk_schema_foundation::name::{PkgName, VariantName};
pub use package::{
    ConflictDef,
    DependencyDef,
    Package,
    ProvidesDef,
    VariantDef,
    VariantKind,
    VersionDef,
};
pub use repository::{DirRepository, MemRepository, RepoPath, Repository};
pub use spec::{NodeAttrs, NodeSpec, Spec};
// used by the test macros
pub use serde_json;
