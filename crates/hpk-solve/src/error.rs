// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use hpk_schema::PkgName;
use hpk_schema::foundation::compiler::CompilerConstraint;
use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://hpk.dev/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("hpk::generic"))
    )
)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(forward(0))]
    UnavailableCompilerVersion(#[from] UnavailableCompilerVersionError),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Unsatisfiable(#[from] UnsatisfiableSpecError),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    InvalidDependency(#[from] InvalidDependencyError),
    #[error("Unknown package: {0}")]
    #[diagnostic(
        code(hpk::solve::unknown_package),
        help("the package is not defined by any repository, and nothing provides it")
    )]
    UnknownPackage(PkgName),
    #[error("Invalid compiler in configuration: '{spec}'")]
    #[diagnostic(
        code(hpk::config::invalid_compiler),
        help("compilers are configured with an exact version, eg: gcc@=10.2.1")
    )]
    InvalidCompilerEntry {
        spec: String,
        #[source]
        source: hpk_schema::foundation::Error,
    },
    #[error("Solver interrupted: {0}")]
    #[diagnostic(
        code(hpk::solve::interrupted),
        help("raise concretizer.max_steps to allow longer searches")
    )]
    SolverInterrupted(String),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Schema(#[from] hpk_schema::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Config(#[from] hpk_config::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Graph(#[from] hpk_solve_graph::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    PackageIterator(#[from] hpk_solve_package_iterator::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Validation(#[from] hpk_solve_validation::Error),
    #[error("Error: {0}")]
    String(String),
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::String(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Self::String(err.to_owned())
    }
}

/// A compiler was pinned that is neither configured nor known
/// from an installed spec.
#[derive(Diagnostic, Debug, Error)]
#[error(
    "No compilers with spec {spec} found{}",
    location_suffix(.operating_system, .target)
)]
#[diagnostic(
    code(hpk::solve::unavailable_compiler),
    help("add the compiler to the configuration, or enable concretizer.bootstrap_compilers")
)]
pub struct UnavailableCompilerVersionError {
    pub spec: CompilerConstraint,
    pub operating_system: Option<String>,
    pub target: Option<String>,
}

fn location_suffix(operating_system: &Option<String>, target: &Option<String>) -> String {
    match (operating_system, target) {
        (Some(os), Some(target)) => format!(" for operating system {os} and target {target}"),
        (Some(os), None) => format!(" for operating system {os}"),
        (None, Some(target)) => format!(" for target {target}"),
        (None, None) => String::new(),
    }
}

/// No assignment satisfies every constraint of the request.
///
/// The message lists every reason found, each with the chain of
/// requirements that leads back to what was requested.
#[derive(Diagnostic, Debug, Error)]
#[error("{explanation}")]
#[diagnostic(code(hpk::solve::unsatisfiable))]
pub struct UnsatisfiableSpecError {
    pub explanation: String,
    /// Each reason, as numbered in the explanation.
    pub reasons: Vec<String>,
}

#[derive(Diagnostic, Debug, Error)]
#[error("{root} does not depend on {dependency}")]
#[diagnostic(
    code(hpk::solve::invalid_dependency),
    help("only packages that {root} can depend on may be constrained with ^")
)]
pub struct InvalidDependencyError {
    pub root: PkgName,
    pub dependency: PkgName,
}
