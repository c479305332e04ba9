// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod compilers;
mod concretizer;
mod error;
mod explain;
#[cfg(test)]
mod fixtures;
mod setup;
mod solver;

pub use compilers::{CompilerParser, KnownCompiler};
pub use concretizer::{Concretize, Concretizer};
pub use error::{
    Error,
    InvalidDependencyError,
    Result,
    UnavailableCompilerVersionError,
    UnsatisfiableSpecError,
};
pub use explain::explain;
pub use setup::{Problem, ProblemSetup, Request};
pub use solver::Solver;
pub use {
    hpk_solve_graph as graph,
    hpk_solve_package_iterator as package_iterator,
    hpk_solve_validation as validation,
};
