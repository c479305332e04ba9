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
    Foundation(#[from] hpk_schema::foundation::Error),
    #[error("Invalid external for {package}: '{spec}', {reason}")]
    #[diagnostic(
        code(hpk::config::invalid_external),
        help("externals must name the package and an exact version, eg: pkg@=1.2")
    )]
    InvalidExternal {
        package: String,
        spec: String,
        reason: String,
    },
    #[error("Invalid preference for {package}: '{value}', {reason}")]
    #[diagnostic(code(hpk::config::invalid_preference))]
    InvalidPreference {
        package: String,
        value: String,
        reason: String,
    },
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
