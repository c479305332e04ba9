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
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Graph(#[from] hpk_solve_graph::Error),
    #[error("Solver error: {0}")]
    SolverError(String),
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::SolverError(err)
    }
}
