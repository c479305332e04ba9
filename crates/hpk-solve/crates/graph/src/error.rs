// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

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
    Schema(#[from] hpk_schema::Error),
    #[error("Dependency cycle detected: {0}")]
    #[diagnostic(
        code(hpk::solve::dependency_cycle),
        help("packages may not depend on themselves, even indirectly")
    )]
    DependencyCycle(String),
    #[error("Solver error: {0}")]
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
